//! Fragment routing.
//!
//! [`route_to_regex`] turns route patterns such as `search/:query/p:page` or
//! `files/*path` into anchored regular expressions. A [`Router`] binds named
//! routes on a shared [`History`] and announces matches as `route:<name>`
//! events carrying the extracted parameters.

mod history;

use std::fmt;
use std::rc::{Rc, Weak};

use regex::Regex;
use tracing::trace;

use crate::error::{ModelError, ModelResult};
use crate::events::{Callback, Event, Events};
use crate::id::{ContextId, ListenerId};

pub use history::{History, NavigateOptions, RouteHandler};

/// Callback receiving the parameters extracted from a matched fragment.
pub type RouteCallback = Rc<dyn Fn(&[String])>;

fn is_word(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

/// Compiles a route pattern.
///
/// `:name` matches one path segment, `*name` matches anything (lazily).
/// Everything else matches literally; the pattern is anchored at both ends.
///
/// # Errors
///
/// Returns [`ModelError::InvalidRoute`] if the resulting expression cannot be
/// compiled.
///
/// # Examples
///
/// ```
/// use modelkit::route_to_regex;
///
/// let re = route_to_regex("search/:query/p:page").unwrap();
/// let caps = re.captures("search/rust/p7").unwrap();
/// assert_eq!(&caps[1], "rust");
/// assert_eq!(&caps[2], "7");
/// assert!(!re.is_match("search/rust/p7/extra"));
/// ```
pub fn route_to_regex(pattern: &str) -> ModelResult<Regex> {
    let mut source = String::from("^");
    let mut literal = String::new();
    let mut chars = pattern.chars().peekable();

    while let Some(c) = chars.next() {
        let is_param = (c == ':' || c == '*') && chars.peek().copied().is_some_and(is_word);
        if !is_param {
            literal.push(c);
            continue;
        }
        while chars.next_if(|n| is_word(*n)).is_some() {}
        source.push_str(&regex::escape(&literal));
        literal.clear();
        source.push_str(if c == ':' { "([^/]+)" } else { "(.*?)" });
    }
    source.push_str(&regex::escape(&literal));
    source.push('$');

    Regex::new(&source).map_err(|e| ModelError::InvalidRoute {
        pattern: pattern.to_string(),
        reason: e.to_string(),
    })
}

/// Capture groups of `route` in `fragment`; unmatched groups are empty.
#[must_use]
pub fn extract_parameters(route: &Regex, fragment: &str) -> Vec<String> {
    route
        .captures(fragment)
        .map(|caps| {
            caps.iter()
                .skip(1)
                .map(|m| m.map_or_else(String::new, |m| m.as_str().to_string()))
                .collect()
        })
        .unwrap_or_default()
}

struct RouterInner {
    events: Events<Event>,
    history: History,
}

/// Named routes bound to a [`History`].
///
/// # Examples
///
/// ```
/// use std::cell::RefCell;
/// use std::rc::Rc;
/// use modelkit::{Event, History, HistoryConfig, NavigateOptions, Router};
///
/// let history = History::new();
/// let router = Router::with_routes(&history, [("help", "help"), ("item/:id", "item")]).unwrap();
/// let seen = Rc::new(RefCell::new(Vec::new()));
/// let sink = Rc::clone(&seen);
/// router.on("route:item", move |_, ev| {
///     if let Event::Route { params, .. } = ev {
///         sink.borrow_mut().extend(params.iter().cloned());
///     }
/// }, None);
///
/// history.start(&HistoryConfig::default(), "").unwrap();
/// router.navigate("item/12", NavigateOptions::new().trigger(true));
/// assert_eq!(*seen.borrow(), vec!["12"]);
/// ```
#[derive(Clone)]
pub struct Router {
    inner: Rc<RouterInner>,
}

impl Router {
    /// Creates a router with no routes.
    #[must_use]
    pub fn new(history: &History) -> Self {
        Self {
            inner: Rc::new(RouterInner {
                events: Events::new(),
                history: history.clone(),
            }),
        }
    }

    /// Creates a router from a `(pattern, name)` table.
    ///
    /// Entries are bound in reverse so that earlier entries win when several
    /// patterns match, letting catch-all routes go last.
    ///
    /// # Errors
    ///
    /// Returns [`ModelError::InvalidRoute`] for a pattern that does not
    /// compile.
    pub fn with_routes<I, P, N>(history: &History, routes: I) -> ModelResult<Self>
    where
        I: IntoIterator<Item = (P, N)>,
        P: AsRef<str>,
        N: Into<String>,
    {
        let router = Self::new(history);
        let routes: Vec<(P, N)> = routes.into_iter().collect();
        for (pattern, name) in routes.into_iter().rev() {
            router.route(pattern.as_ref(), name)?;
        }
        Ok(router)
    }

    /// Binds `pattern` under `name`; matches fire `route:<name>`.
    ///
    /// # Errors
    ///
    /// Returns [`ModelError::InvalidRoute`] for a pattern that does not
    /// compile.
    pub fn route(&self, pattern: &str, name: impl Into<String>) -> ModelResult<()> {
        self.bind(route_to_regex(pattern)?, name.into(), None);
        Ok(())
    }

    /// Binds `pattern` under `name` and calls `callback` with the extracted
    /// parameters before `route:<name>` fires.
    ///
    /// # Errors
    ///
    /// Returns [`ModelError::InvalidRoute`] for a pattern that does not
    /// compile.
    pub fn route_with<F>(&self, pattern: &str, name: impl Into<String>, callback: F) -> ModelResult<()>
    where
        F: Fn(&[String]) + 'static,
    {
        self.bind(route_to_regex(pattern)?, name.into(), Some(Rc::new(callback)));
        Ok(())
    }

    /// Binds a precompiled expression under `name`.
    pub fn route_regex(&self, route: Regex, name: impl Into<String>, callback: Option<RouteCallback>) {
        self.bind(route, name.into(), callback);
    }

    /// Navigates the shared history. See [`History::navigate`].
    pub fn navigate(&self, fragment: &str, options: NavigateOptions) -> bool {
        self.inner.history.navigate(fragment, options)
    }

    /// The history this router is bound to.
    #[must_use]
    pub fn history(&self) -> &History {
        &self.inner.history
    }

    /// Registers a listener. See [`Events::on`].
    pub fn on<F>(&self, events: &str, callback: F, context: Option<ContextId>) -> ListenerId
    where
        F: Fn(&str, &Event) + 'static,
    {
        self.inner.events.on(events, callback, context)
    }

    /// Removes listeners. See [`Events::off`].
    pub fn off(
        &self,
        events: Option<&str>,
        callback: Option<&Callback<Event>>,
        context: Option<ContextId>,
    ) {
        self.inner.events.off(events, callback, context);
    }

    /// Fires events on this router.
    pub fn trigger(&self, events: &str, event: &Event) {
        self.inner.events.trigger(events, event);
    }

    /// True if both handles refer to the same router.
    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    fn bind(&self, route: Regex, name: String, callback: Option<RouteCallback>) {
        let weak: Weak<RouterInner> = Rc::downgrade(&self.inner);
        let matcher = route.clone();
        self.inner.history.route(route, move |fragment| {
            let Some(inner) = weak.upgrade() else {
                return;
            };
            let router = Router { inner };
            let params = extract_parameters(&matcher, fragment);
            trace!(route = %name, ?params, "route dispatched");
            if let Some(callback) = callback.as_ref() {
                callback(&params);
            }
            let event = Event::Route {
                router: router.clone(),
                name: name.clone(),
                params,
            };
            router.trigger(&format!("route:{name}"), &event);
            router.inner.history.trigger("route", &event);
        });
    }
}

impl fmt::Debug for Router {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Router")
            .field("history", &self.inner.history)
            .finish_non_exhaustive()
    }
}
