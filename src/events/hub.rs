//! Named publish/subscribe hub.
//!
//! Listener lists are snapshotted when a dispatch starts, so callbacks may
//! freely call `on`, `off` or `trigger` on the same hub while it is
//! dispatching.

use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

use tracing::trace;

use crate::id::{ContextId, ListenerId};

/// Reserved wildcard event name. Listeners on `"all"` receive every event.
pub const ALL: &str = "all";

/// A shareable listener callback.
///
/// Callbacks receive the name of the event being dispatched and its payload.
/// Two `Callback`s are the same callback when they were cloned from one
/// another, which is what `off` matches on.
pub struct Callback<T>(Rc<dyn Fn(&str, &T)>);

impl<T> Callback<T> {
    /// Wraps a closure.
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(&str, &T) + 'static,
    {
        Self(Rc::new(f))
    }

    /// Invokes the callback.
    pub fn call(&self, event: &str, payload: &T) {
        (self.0)(event, payload);
    }

    /// Returns true if both handles point at the same closure.
    #[must_use]
    pub fn same(&self, other: &Self) -> bool {
        std::ptr::addr_eq(Rc::as_ptr(&self.0), Rc::as_ptr(&other.0))
    }
}

impl<T> Clone for Callback<T> {
    fn clone(&self) -> Self {
        Self(Rc::clone(&self.0))
    }
}

impl<T> fmt::Debug for Callback<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Callback")
            .field(&Rc::as_ptr(&self.0).cast::<()>())
            .finish()
    }
}

struct Listener<T> {
    id: ListenerId,
    callback: Callback<T>,
    context: Option<ContextId>,
}

impl<T> Clone for Listener<T> {
    fn clone(&self) -> Self {
        Self {
            id: self.id,
            callback: self.callback.clone(),
            context: self.context,
        }
    }
}

impl<T> Listener<T> {
    fn matches(&self, callback: Option<&Callback<T>>, context: Option<ContextId>) -> bool {
        callback.map_or(true, |cb| cb.same(&self.callback))
            && context.map_or(true, |ctx| self.context == Some(ctx))
    }
}

/// Event hub mapping event names to ordered listener lists.
///
/// # Examples
///
/// ```
/// use std::cell::Cell;
/// use std::rc::Rc;
/// use modelkit::Events;
///
/// let hub: Events<i32> = Events::new();
/// let seen = Rc::new(Cell::new(0));
/// let sink = Rc::clone(&seen);
/// hub.on("tick", move |_, n| sink.set(sink.get() + *n), None);
/// hub.trigger("tick", &5);
/// hub.trigger("tock", &100);
/// assert_eq!(seen.get(), 5);
/// ```
pub struct Events<T> {
    listeners: RefCell<HashMap<String, Vec<Listener<T>>>>,
}

impl<T> Default for Events<T> {
    fn default() -> Self {
        Self {
            listeners: RefCell::new(HashMap::new()),
        }
    }
}

impl<T> fmt::Debug for Events<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let counts: HashMap<String, usize> = self
            .listeners
            .try_borrow()
            .map(|map| map.iter().map(|(k, v)| (k.clone(), v.len())).collect())
            .unwrap_or_default();
        f.debug_struct("Events").field("listeners", &counts).finish()
    }
}

impl<T> Events<T> {
    /// Creates an empty hub.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a closure for each whitespace-separated event name.
    ///
    /// The returned id removes the registration from every name via
    /// [`Events::off_listener`].
    pub fn on<F>(&self, events: &str, callback: F, context: Option<ContextId>) -> ListenerId
    where
        F: Fn(&str, &T) + 'static,
    {
        self.on_callback(events, Callback::new(callback), context)
    }

    /// Registers a shareable callback, which can later be passed to `off`.
    pub fn on_callback(
        &self,
        events: &str,
        callback: Callback<T>,
        context: Option<ContextId>,
    ) -> ListenerId {
        let id = ListenerId::next();
        let mut map = self.listeners.borrow_mut();
        for name in events.split_whitespace() {
            map.entry(name.to_string()).or_default().push(Listener {
                id,
                callback: callback.clone(),
                context,
            });
        }
        id
    }

    /// Removes registrations.
    ///
    /// - no arguments: clears every listener;
    /// - `events` only: clears those event names;
    /// - `callback` and/or `context`: removes matching registrations, from the
    ///   named events or, when `events` is `None`, from every event.
    pub fn off(
        &self,
        events: Option<&str>,
        callback: Option<&Callback<T>>,
        context: Option<ContextId>,
    ) {
        let mut map = self.listeners.borrow_mut();
        match events {
            None if callback.is_none() && context.is_none() => map.clear(),
            None => {
                for list in map.values_mut() {
                    list.retain(|l| !l.matches(callback, context));
                }
                map.retain(|_, list| !list.is_empty());
            }
            Some(events) => {
                for name in events.split_whitespace() {
                    if callback.is_none() && context.is_none() {
                        map.remove(name);
                        continue;
                    }
                    if let Some(list) = map.get_mut(name) {
                        list.retain(|l| !l.matches(callback, context));
                        if list.is_empty() {
                            map.remove(name);
                        }
                    }
                }
            }
        }
    }

    /// Removes a single registration. Returns false if it was already gone.
    pub fn off_listener(&self, id: ListenerId) -> bool {
        let mut map = self.listeners.borrow_mut();
        let mut removed = false;
        for list in map.values_mut() {
            let before = list.len();
            list.retain(|l| l.id != id);
            removed |= list.len() != before;
        }
        map.retain(|_, list| !list.is_empty());
        removed
    }

    /// Fires each whitespace-separated event in turn.
    ///
    /// Listeners registered for the name run first, in registration order,
    /// then the wildcard listeners. Events with no listeners are ignored.
    pub fn trigger(&self, events: &str, payload: &T) {
        for name in events.split_whitespace() {
            let (named, wildcard) = {
                let map = self.listeners.borrow();
                let named = map.get(name).cloned().unwrap_or_default();
                let wildcard = if name == ALL {
                    Vec::new()
                } else {
                    map.get(ALL).cloned().unwrap_or_default()
                };
                (named, wildcard)
            };
            if named.is_empty() && wildcard.is_empty() {
                continue;
            }
            trace!(
                event = name,
                named = named.len(),
                wildcard = wildcard.len(),
                "dispatching event"
            );
            for listener in named.iter().chain(wildcard.iter()) {
                listener.callback.call(name, payload);
            }
        }
    }

    /// Number of listeners registered under `event` (wildcards not counted).
    #[must_use]
    pub fn listener_count(&self, event: &str) -> usize {
        self.listeners.borrow().get(event).map_or(0, Vec::len)
    }

    /// Returns true if nothing is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.listeners.borrow().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    fn recorder() -> (Rc<RefCell<Vec<String>>>, impl Fn(&'static str) -> Callback<i32>) {
        let log = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&log);
        let make = move |tag: &'static str| {
            let sink = Rc::clone(&sink);
            Callback::new(move |event: &str, n: &i32| {
                sink.borrow_mut().push(format!("{tag}:{event}:{n}"));
            })
        };
        (log, make)
    }

    #[test]
    fn test_trigger_without_listeners_is_noop() {
        let hub: Events<i32> = Events::new();
        hub.trigger("nothing", &1);
        assert!(hub.is_empty());
    }

    #[test]
    fn test_named_before_wildcard() {
        let hub = Events::new();
        let (log, make) = recorder();
        hub.on_callback(ALL, make("all"), None);
        hub.on_callback("a", make("a"), None);
        hub.trigger("a", &1);
        assert_eq!(*log.borrow(), vec!["a:a:1", "all:a:1"]);
    }

    #[test]
    fn test_multiple_names_fire_independently() {
        let hub = Events::new();
        let (log, make) = recorder();
        hub.on_callback("a b", make("x"), None);
        hub.trigger("a  b", &2);
        assert_eq!(*log.borrow(), vec!["x:a:2", "x:b:2"]);
        assert_eq!(hub.listener_count("a"), 1);
        assert_eq!(hub.listener_count("b"), 1);
    }

    #[test]
    fn test_off_by_callback_and_context() {
        let hub = Events::new();
        let (log, make) = recorder();
        let ctx = ContextId::new();
        let first = make("first");
        hub.on_callback("e", first.clone(), Some(ctx));
        hub.on_callback("e", first.clone(), None);
        hub.on_callback("e", make("second"), Some(ctx));

        hub.off(Some("e"), Some(&first), Some(ctx));
        hub.trigger("e", &0);
        assert_eq!(*log.borrow(), vec!["first:e:0", "second:e:0"]);

        log.borrow_mut().clear();
        hub.off(None, None, Some(ctx));
        hub.trigger("e", &0);
        assert_eq!(*log.borrow(), vec!["first:e:0"]);
    }

    #[test]
    fn test_off_callback_across_all_events() {
        let hub = Events::new();
        let (log, make) = recorder();
        let cb = make("cb");
        hub.on_callback("a b c", cb.clone(), None);
        hub.on_callback("c", make("other"), None);
        hub.off(None, Some(&cb), None);
        hub.trigger("a b c", &3);
        assert_eq!(*log.borrow(), vec!["other:c:3"]);
    }

    #[test]
    fn test_off_event_name_clears_all_callbacks() {
        let hub = Events::new();
        let (log, make) = recorder();
        hub.on_callback("a", make("1"), None);
        hub.on_callback("a", make("2"), None);
        hub.on_callback("b", make("3"), None);
        hub.off(Some("a"), None, None);
        hub.trigger("a b", &0);
        assert_eq!(*log.borrow(), vec!["3:b:0"]);

        hub.off(None, None, None);
        assert!(hub.is_empty());
    }

    #[test]
    fn test_registration_during_dispatch_is_deferred() {
        let hub: Rc<Events<i32>> = Rc::new(Events::new());
        let count = Rc::new(RefCell::new(0));

        let inner_hub = Rc::clone(&hub);
        let inner_count = Rc::clone(&count);
        hub.on(
            "e",
            move |_, _| {
                let c = Rc::clone(&inner_count);
                inner_hub.on("e", move |_, _| *c.borrow_mut() += 100, None);
                *inner_count.borrow_mut() += 1;
            },
            None,
        );

        hub.trigger("e", &0);
        assert_eq!(*count.borrow(), 1);
        hub.trigger("e", &0);
        assert_eq!(*count.borrow(), 1 + 1 + 100);
    }

    #[test]
    fn test_removal_during_dispatch_keeps_snapshot() {
        let hub: Rc<Events<i32>> = Rc::new(Events::new());
        let hits = Rc::new(RefCell::new(Vec::new()));

        let h = Rc::clone(&hub);
        let log = Rc::clone(&hits);
        hub.on(
            "e",
            move |_, _| {
                log.borrow_mut().push("first");
                h.off(Some("e"), None, None);
            },
            None,
        );
        let log = Rc::clone(&hits);
        hub.on("e", move |_, _| log.borrow_mut().push("second"), None);

        hub.trigger("e", &0);
        assert_eq!(*hits.borrow(), vec!["first", "second"]);
        hub.trigger("e", &0);
        assert_eq!(hits.borrow().len(), 2);
    }

    #[test]
    fn test_off_listener() {
        let hub: Events<i32> = Events::new();
        let id = hub.on("a b", |_, _| {}, None);
        assert!(hub.off_listener(id));
        assert!(hub.is_empty());
        assert!(!hub.off_listener(id));
    }

    #[test]
    fn test_triggering_all_fires_wildcard_once() {
        let hub = Events::new();
        let (log, make) = recorder();
        hub.on_callback(ALL, make("w"), None);
        hub.trigger(ALL, &9);
        assert_eq!(*log.borrow(), vec!["w:all:9"]);
    }
}
