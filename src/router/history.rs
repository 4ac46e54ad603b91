//! Fragment history and route dispatch.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use regex::Regex;
use tracing::{debug, trace};

use crate::config::HistoryConfig;
use crate::error::{ModelError, ModelResult};
use crate::events::{Callback, Event, Events};
use crate::id::{ContextId, ListenerId};

/// Handler invoked with the fragment that matched its route.
pub type RouteHandler = Rc<dyn Fn(&str)>;

/// Options for [`History::navigate`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NavigateOptions {
    /// Load the new fragment, running the matching route.
    pub trigger: bool,
    /// Replace the current entry instead of pushing a new one.
    pub replace: bool,
}

impl NavigateOptions {
    /// Record the fragment without running a route.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Run the matching route after recording.
    #[must_use]
    pub fn trigger(mut self, trigger: bool) -> Self {
        self.trigger = trigger;
        self
    }

    /// Replace the current entry.
    #[must_use]
    pub fn replace(mut self, replace: bool) -> Self {
        self.replace = replace;
        self
    }
}

struct Handler {
    route: Regex,
    callback: RouteHandler,
}

#[derive(Default)]
struct HistoryState {
    /// Most recently added first.
    handlers: Vec<Handler>,
    started: bool,
    root: String,
    fragment: String,
    entries: Vec<String>,
}

struct HistoryInner {
    events: Events<Event>,
    state: RefCell<HistoryState>,
}

/// Fragment history shared by routers.
///
/// Tracks the current fragment and a stack of visited fragments, and runs the
/// first registered route whose pattern matches a loaded fragment. Routes
/// added later take precedence.
///
/// # Examples
///
/// ```
/// use std::cell::RefCell;
/// use std::rc::Rc;
/// use modelkit::{route_to_regex, History, HistoryConfig, NavigateOptions};
///
/// let history = History::new();
/// let hits = Rc::new(RefCell::new(Vec::new()));
/// let sink = Rc::clone(&hits);
/// history.route(route_to_regex("page/:n").unwrap(), move |f| sink.borrow_mut().push(f.to_string()));
///
/// history.start(&HistoryConfig::default(), "/page/1").unwrap();
/// history.navigate("#page/2", NavigateOptions::new().trigger(true));
/// assert_eq!(*hits.borrow(), vec!["page/1", "page/2"]);
/// assert_eq!(history.fragment(), "page/2");
/// ```
#[derive(Clone)]
pub struct History {
    inner: Rc<HistoryInner>,
}

impl Default for History {
    fn default() -> Self {
        Self::new()
    }
}

impl History {
    /// Creates a stopped history with root `/`.
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: Rc::new(HistoryInner {
                events: Events::new(),
                state: RefCell::new(HistoryState {
                    root: HistoryConfig::default().root,
                    ..HistoryState::default()
                }),
            }),
        }
    }

    /// Registers `handler` for fragments matching `route`, ahead of every
    /// route registered before it.
    pub fn route<F>(&self, route: Regex, handler: F)
    where
        F: Fn(&str) + 'static,
    {
        trace!(route = route.as_str(), "route registered");
        self.inner.state.borrow_mut().handlers.insert(
            0,
            Handler {
                route,
                callback: Rc::new(handler),
            },
        );
    }

    /// Starts tracking from `location` and, unless `config.silent`, loads it.
    ///
    /// Returns whether a route matched the initial fragment.
    ///
    /// # Errors
    ///
    /// Returns [`ModelError::HistoryStarted`] if already started.
    pub fn start(&self, config: &HistoryConfig, location: &str) -> ModelResult<bool> {
        {
            let mut state = self.inner.state.borrow_mut();
            if state.started {
                return Err(ModelError::HistoryStarted);
            }
            state.root.clone_from(&config.root);
            state.started = true;
        }
        let fragment = self.get_fragment(location);
        debug!(root = %config.root, fragment = %fragment, "history started");
        {
            let mut state = self.inner.state.borrow_mut();
            state.entries.push(fragment.clone());
            state.fragment = fragment;
        }
        if config.silent {
            return Ok(false);
        }
        Ok(self.load_url(None))
    }

    /// Stops tracking; `navigate` becomes a no-op until restarted.
    pub fn stop(&self) {
        self.inner.state.borrow_mut().started = false;
    }

    /// True between `start` and `stop`.
    #[must_use]
    pub fn is_started(&self) -> bool {
        self.inner.state.borrow().started
    }

    /// Current fragment.
    #[must_use]
    pub fn fragment(&self) -> String {
        self.inner.state.borrow().fragment.clone()
    }

    /// Visited fragments, oldest first.
    #[must_use]
    pub fn entries(&self) -> Vec<String> {
        self.inner.state.borrow().entries.clone()
    }

    /// Normalizes a raw location: URL-decodes it, strips the root prefix,
    /// then one leading `#` or `/`.
    #[must_use]
    pub fn get_fragment(&self, raw: &str) -> String {
        let decoded = urlencoding::decode(raw).map_or_else(|_| raw.to_string(), |s| s.into_owned());
        let root = self.inner.state.borrow().root.clone();
        let rest = if root.is_empty() {
            decoded.as_str()
        } else {
            decoded.strip_prefix(root.as_str()).unwrap_or(&decoded)
        };
        strip_leading(rest).to_string()
    }

    /// Loads `fragment` (or the current one) and runs the first matching
    /// route. Returns false if no route matched.
    pub fn load_url(&self, fragment: Option<&str>) -> bool {
        let raw = fragment.map_or_else(|| self.fragment(), str::to_string);
        let fragment = self.get_fragment(&raw);
        let callback = {
            let mut state = self.inner.state.borrow_mut();
            state.fragment.clone_from(&fragment);
            state
                .handlers
                .iter()
                .find(|h| h.route.is_match(&fragment))
                .map(|h| Rc::clone(&h.callback))
        };
        match callback {
            Some(callback) => {
                trace!(fragment = %fragment, "route matched");
                callback(&fragment);
                true
            }
            None => {
                debug!(fragment = %fragment, "no route matched");
                false
            }
        }
    }

    /// Records `fragment` as the current location, optionally loading it.
    ///
    /// Returns false if history is stopped or the fragment is already
    /// current.
    pub fn navigate(&self, fragment: &str, options: NavigateOptions) -> bool {
        let frag = strip_leading(fragment).to_string();
        {
            let mut state = self.inner.state.borrow_mut();
            if !state.started {
                return false;
            }
            let decoded = urlencoding::decode(&frag).map_or_else(|_| frag.clone(), |s| s.into_owned());
            if state.fragment == frag || state.fragment == decoded {
                return false;
            }
            state.fragment.clone_from(&frag);
            if options.replace {
                state.entries.pop();
            }
            state.entries.push(frag.clone());
        }
        trace!(fragment = %frag, replace = options.replace, "navigated");
        if options.trigger {
            self.load_url(Some(&frag));
        }
        true
    }

    /// Registers a listener for `route` notifications.
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

    /// Fires events on this history.
    pub fn trigger(&self, events: &str, event: &Event) {
        self.inner.events.trigger(events, event);
    }
}

impl fmt::Debug for History {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut s = f.debug_struct("History");
        if let Ok(state) = self.inner.state.try_borrow() {
            s.field("started", &state.started)
                .field("root", &state.root)
                .field("fragment", &state.fragment)
                .field("routes", &state.handlers.len());
        }
        s.finish_non_exhaustive()
    }
}

fn strip_leading(fragment: &str) -> &str {
    fragment
        .strip_prefix('#')
        .or_else(|| fragment.strip_prefix('/'))
        .unwrap_or(fragment)
}
