//! Attribute store with change tracking.
//!
//! A [`Model`] owns a map of named [`Value`]s. Every mutation goes through
//! [`Model::set`] (or `unset` / `clear`), which validates the prospective
//! attributes, applies the delta, and runs a change cycle: one
//! `change:<key>` notification per changed key followed by a single
//! `change`. Sets made from inside a change cycle are applied immediately and
//! folded into the running cycle.

/// Construction and call options.
pub mod options;
/// Backend round-trips.
mod persist;

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::fmt;
use std::rc::{Rc, Weak};

use tracing::{debug, trace};

use crate::collection::{Collection, CollectionInner};
use crate::error::{ModelError, ModelResult};
use crate::events::{Callback, Event, Events};
use crate::id::{Cid, ContextId, ListenerId, ModelId};
use crate::value::{Attributes, Value};

pub use options::{
    InvalidHandler, ModelOptions, ParseHook, SetOptions, SyncErrorHandler, SyncOptions, Validator,
};

/// Pending change: `None` records a removed attribute.
type Pending = BTreeMap<String, Option<Value>>;

#[derive(Debug, Default, Clone)]
struct ModelState {
    attributes: Attributes,
    previous: Attributes,
    pending: Pending,
    id: Option<ModelId>,
    /// A `set` is running; nested sets must not start their own cycle.
    setting: bool,
    /// A change cycle is dispatching.
    changing: bool,
    /// A nested set asked the running cycle for another `change`.
    more_changes: bool,
}

pub(crate) struct ModelInner {
    cid: Cid,
    events: Events<Event>,
    options: ModelOptions,
    state: RefCell<ModelState>,
    collection: RefCell<Option<Weak<CollectionInner>>>,
}

/// Observable attribute store.
///
/// `Model` is a cheap handle; clones share the same attributes and
/// listeners.
///
/// # Examples
///
/// ```
/// use std::cell::RefCell;
/// use std::rc::Rc;
/// use modelkit::{attrs, Model, SetOptions, Value};
///
/// let book = Model::new(attrs! { "id" => Value::Null, "title" => "a" }).unwrap();
/// let log = Rc::new(RefCell::new(Vec::new()));
/// let sink = Rc::clone(&log);
/// book.on("all", move |name, _| sink.borrow_mut().push(name.to_string()), None);
///
/// assert!(book.set(attrs! { "title" => "b" }, &SetOptions::new()));
/// assert_eq!(*log.borrow(), vec!["change:title", "change"]);
/// assert_eq!(book.previous("title"), Some(Value::from("a")));
/// ```
#[derive(Clone)]
pub struct Model {
    inner: Rc<ModelInner>,
}

impl Model {
    /// Creates a model with default options.
    ///
    /// # Errors
    ///
    /// Never fails without a validator; see [`Model::with_options`].
    pub fn new(attributes: Attributes) -> ModelResult<Self> {
        Self::with_options(attributes, ModelOptions::default())
    }

    /// Creates a model, merging `options.config.defaults` under `attributes`.
    ///
    /// The initial attributes become the previous-attribute snapshot and
    /// nothing is pending.
    ///
    /// # Errors
    ///
    /// Returns [`ModelError::InvalidModel`] if the validator rejects the
    /// initial attributes.
    pub fn with_options(attributes: Attributes, options: ModelOptions) -> ModelResult<Self> {
        let mut merged = options.config.defaults.clone();
        merged.extend(attributes);

        if let Some(validator) = options.validator.as_ref() {
            if let Some(failure) = validator(&merged) {
                return Err(ModelError::InvalidModel(failure));
            }
        }

        let id = merged
            .get(&options.config.id_attribute)
            .and_then(ModelId::from_value);
        let state = ModelState {
            previous: merged.clone(),
            attributes: merged,
            id,
            ..ModelState::default()
        };

        let model = Self {
            inner: Rc::new(ModelInner {
                cid: Cid::next(),
                events: Events::new(),
                options,
                state: RefCell::new(state),
                collection: RefCell::new(None),
            }),
        };
        trace!(cid = %model.cid(), "model created");
        Ok(model)
    }

    /// Creates a new model with the same options and attributes but a fresh
    /// client id and no listeners.
    ///
    /// # Errors
    ///
    /// Returns [`ModelError::InvalidModel`] if the current attributes no
    /// longer validate (possible after silent sets).
    pub fn clone_model(&self) -> ModelResult<Self> {
        Self::with_options(self.attributes(), self.inner.options.clone())
    }

    /// Ephemeral client id.
    #[must_use]
    pub fn cid(&self) -> Cid {
        self.inner.cid
    }

    /// External id, read from the id attribute.
    #[must_use]
    pub fn id(&self) -> Option<ModelId> {
        self.inner.state.borrow().id.clone()
    }

    /// Name of the id attribute.
    #[must_use]
    pub fn id_attribute(&self) -> &str {
        &self.inner.options.config.id_attribute
    }

    /// A model is new until it has an external id.
    #[must_use]
    pub fn is_new(&self) -> bool {
        self.inner.state.borrow().id.is_none()
    }

    /// Current value of `key`.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<Value> {
        self.inner.state.borrow().attributes.get(key).cloned()
    }

    /// True if `key` holds a non-null value.
    #[must_use]
    pub fn has(&self, key: &str) -> bool {
        self.inner
            .state
            .borrow()
            .attributes
            .get(key)
            .is_some_and(|v| !v.is_null())
    }

    /// HTML-escaped display form of `key`; empty for absent or null values.
    #[must_use]
    pub fn escape(&self, key: &str) -> String {
        match self.get(key) {
            None | Some(Value::Null) => String::new(),
            Some(value) => escape_html(&value.to_string()),
        }
    }

    /// Copy of the current attributes.
    #[must_use]
    pub fn attributes(&self) -> Attributes {
        self.inner.state.borrow().attributes.clone()
    }

    /// Plain snapshot of the attributes for hand-off to a backend.
    #[must_use]
    pub fn to_json(&self) -> Attributes {
        self.attributes()
    }

    /// Snapshot of the attributes as JSON.
    ///
    /// # Errors
    ///
    /// Returns [`ModelError::CyclicValue`] if an attribute is cyclic.
    pub fn to_json_value(&self) -> ModelResult<serde_json::Value> {
        Value::Map(self.attributes()).to_json()
    }

    /// Value of `key` before the latest change cycle.
    #[must_use]
    pub fn previous(&self, key: &str) -> Option<Value> {
        self.inner.state.borrow().previous.get(key).cloned()
    }

    /// Attributes before the latest change cycle.
    #[must_use]
    pub fn previous_attributes(&self) -> Attributes {
        self.inner.state.borrow().previous.clone()
    }

    /// True if any attribute is pending notification.
    #[must_use]
    pub fn has_changed(&self) -> bool {
        !self.inner.state.borrow().pending.is_empty()
    }

    /// True if `key` is pending notification.
    #[must_use]
    pub fn has_changed_key(&self, key: &str) -> bool {
        self.inner.state.borrow().pending.contains_key(key)
    }

    /// Pending changes, or with `diff`, the entries of `diff` that differ
    /// from the previous snapshot. `None` when there is nothing to report.
    /// Removed attributes are reported as `Null`.
    #[must_use]
    pub fn changed_attributes(&self, diff: Option<&Attributes>) -> Option<Attributes> {
        let state = self.inner.state.borrow();
        let changed: Attributes = match diff {
            None => state
                .pending
                .iter()
                .map(|(k, v)| (k.clone(), v.clone().unwrap_or_default()))
                .collect(),
            Some(diff) => diff
                .iter()
                .filter(|(k, v)| !state.previous.get(*k).is_some_and(|old| old.deep_eq(v)))
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
        };
        (!changed.is_empty()).then_some(changed)
    }

    /// True if the validator accepts the current attributes.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        let Some(validator) = self.inner.options.validator.clone() else {
            return true;
        };
        let attributes = self.attributes();
        validator(&attributes).is_none()
    }

    /// Converts a backend response into attributes using the parse hook.
    ///
    /// Without a hook, maps become attributes and anything else yields an
    /// empty set.
    #[must_use]
    pub fn parse(&self, response: Value) -> Attributes {
        if let Some(parse) = self.inner.options.parse.clone() {
            return parse(response);
        }
        match response {
            Value::Map(attrs) => attrs,
            Value::Shared(cell) => match cell.try_borrow().map(|v| v.clone()) {
                Ok(Value::Map(attrs)) => attrs,
                _ => Attributes::new(),
            },
            _ => Attributes::new(),
        }
    }

    /// Sets a single attribute. See [`Model::set`].
    pub fn set_key(&self, key: impl Into<String>, value: impl Into<Value>, options: &SetOptions) -> bool {
        let mut attrs = Attributes::new();
        attrs.insert(key.into(), value.into());
        self.set(attrs, options)
    }

    /// Applies `attrs` as one change cycle.
    ///
    /// Returns false, leaving the model untouched, if the validator rejects
    /// the prospective attributes; the failure goes to `options.error` or an
    /// `error` event. Validation also runs for silent sets.
    pub fn set(&self, attrs: Attributes, options: &SetOptions) -> bool {
        let updates: Vec<(String, Option<Value>)> = attrs
            .into_iter()
            .map(|(k, v)| (k, (!options.unset).then_some(v)))
            .collect();

        if !self.validate(&updates, options) {
            return false;
        }

        let mut nested = Vec::new();
        let already_setting = {
            let mut guard = self.inner.state.borrow_mut();
            let state = &mut *guard;
            let id_attribute = &self.inner.options.config.id_attribute;
            if let Some((_, value)) = updates.iter().find(|(k, _)| k == id_attribute) {
                state.id = value.as_ref().and_then(ModelId::from_value);
            }

            let already_setting = state.setting;
            if !already_setting && !state.changing && state.pending.is_empty() {
                state.previous = state.attributes.clone();
            }
            state.setting = true;

            for (key, value) in updates {
                match &value {
                    Some(v) => {
                        state.attributes.insert(key.clone(), v.clone());
                    }
                    None => {
                        state.attributes.remove(&key);
                    }
                }

                if state.changing
                    && !opt_eq(state.pending.get(&key).and_then(Option::as_ref), value.as_ref())
                {
                    nested.push((key.clone(), value.clone()));
                    state.more_changes = true;
                }

                state.pending.remove(&key);
                let previous = state.previous.get(&key);
                let present = state.attributes.contains_key(&key);
                if !opt_eq(previous, value.as_ref()) || present != previous.is_some() {
                    state.pending.insert(key, value);
                }
            }
            already_setting
        };

        for (key, value) in nested {
            self.emit_attribute_change(key, value, options);
        }

        if !already_setting {
            if !options.silent && self.has_changed() {
                self.change(options);
            }
            self.inner.state.borrow_mut().setting = false;
        }
        true
    }

    /// Removes `key`. See [`Model::set`].
    pub fn unset(&self, key: impl Into<String>, options: &SetOptions) -> bool {
        let mut attrs = Attributes::new();
        attrs.insert(key.into(), Value::Null);
        self.set(attrs, &options.clone().unset(true))
    }

    /// Removes every attribute. See [`Model::set`].
    pub fn clear(&self, options: &SetOptions) -> bool {
        self.set(self.attributes(), &options.clone().unset(true))
    }

    /// Fires notifications for pending changes.
    ///
    /// No-op if nothing is pending or a cycle is already running. `change`
    /// repeats until listeners stop making further changes, then the pending
    /// set is cleared. The previous-attribute snapshot keeps the values from
    /// before the cycle.
    pub fn change(&self, options: &SetOptions) {
        let pending = {
            let mut state = self.inner.state.borrow_mut();
            if state.changing || state.pending.is_empty() {
                return;
            }
            state.changing = true;
            state.more_changes = true;
            state.pending.clone()
        };
        trace!(cid = %self.cid(), keys = pending.len(), "change cycle started");

        for (key, value) in pending {
            self.emit_attribute_change(key, value, options);
        }

        let mut rounds = 0usize;
        loop {
            {
                let mut state = self.inner.state.borrow_mut();
                if !state.more_changes {
                    break;
                }
                state.more_changes = false;
            }
            rounds += 1;
            self.trigger(
                "change",
                &Event::Changed {
                    model: self.clone(),
                    options: options.clone(),
                },
            );
        }

        let mut state = self.inner.state.borrow_mut();
        state.pending.clear();
        state.changing = false;
        trace!(cid = %self.cid(), rounds, "change cycle settled");
    }

    fn emit_attribute_change(&self, key: String, value: Option<Value>, options: &SetOptions) {
        let name = format!("change:{key}");
        let event = Event::AttributeChanged {
            model: self.clone(),
            key,
            value,
            options: options.clone(),
        };
        self.trigger(&name, &event);
    }

    fn validate(&self, updates: &[(String, Option<Value>)], options: &SetOptions) -> bool {
        let Some(validator) = self.inner.options.validator.clone() else {
            return true;
        };

        let mut candidate = self.attributes();
        for (key, value) in updates {
            match value {
                Some(v) => {
                    candidate.insert(key.clone(), v.clone());
                }
                None => {
                    candidate.remove(key);
                }
            }
        }

        let Some(failure) = validator(&candidate) else {
            return true;
        };

        debug!(cid = %self.cid(), error = %failure, "attribute update rejected");
        if let Some(handler) = options.error.as_ref() {
            handler(self, &failure);
        } else {
            self.trigger(
                "error",
                &Event::Invalid {
                    model: self.clone(),
                    error: failure,
                    options: options.clone(),
                },
            );
        }
        false
    }

    /// Registers a listener. See [`Events::on`].
    pub fn on<F>(&self, events: &str, callback: F, context: Option<ContextId>) -> ListenerId
    where
        F: Fn(&str, &Event) + 'static,
    {
        self.inner.events.on(events, callback, context)
    }

    /// Registers a shareable callback. See [`Events::on_callback`].
    pub fn on_callback(
        &self,
        events: &str,
        callback: Callback<Event>,
        context: Option<ContextId>,
    ) -> ListenerId {
        self.inner.events.on_callback(events, callback, context)
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

    /// Removes one registration.
    pub fn off_listener(&self, id: ListenerId) -> bool {
        self.inner.events.off_listener(id)
    }

    /// Fires events on this model.
    pub fn trigger(&self, events: &str, event: &Event) {
        self.inner.events.trigger(events, event);
    }

    /// The model's event hub.
    #[must_use]
    pub fn events(&self) -> &Events<Event> {
        &self.inner.events
    }

    /// The collection this model belongs to, if it is still alive.
    #[must_use]
    pub fn collection(&self) -> Option<Collection> {
        self.inner
            .collection
            .borrow()
            .as_ref()
            .and_then(Weak::upgrade)
            .map(Collection::from_inner)
    }

    /// True if both handles refer to the same model.
    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    pub(crate) fn attach(&self, collection: &Rc<CollectionInner>) {
        let mut slot = self.inner.collection.borrow_mut();
        if slot.as_ref().and_then(Weak::upgrade).is_none() {
            *slot = Some(Rc::downgrade(collection));
        }
    }

    pub(crate) fn detach(&self, collection: &Rc<CollectionInner>) {
        let mut slot = self.inner.collection.borrow_mut();
        if slot
            .as_ref()
            .is_some_and(|w| std::ptr::eq(w.as_ptr(), Rc::as_ptr(collection)))
        {
            *slot = None;
        }
    }

    pub(crate) fn options(&self) -> &ModelOptions {
        &self.inner.options
    }

    fn snapshot_state(&self) -> ModelState {
        self.inner.state.borrow().clone()
    }

    fn restore_state(&self, snapshot: ModelState) {
        let mut state = self.inner.state.borrow_mut();
        state.attributes = snapshot.attributes;
        state.previous = snapshot.previous;
        state.pending = snapshot.pending;
        state.id = snapshot.id;
    }
}

impl fmt::Debug for Model {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut s = f.debug_struct("Model");
        s.field("cid", &self.inner.cid);
        if let Ok(state) = self.inner.state.try_borrow() {
            s.field("id", &state.id).field("attributes", &state.attributes);
        }
        s.finish_non_exhaustive()
    }
}

fn opt_eq(a: Option<&Value>, b: Option<&Value>) -> bool {
    match (a, b) {
        (None, None) => true,
        (Some(a), Some(b)) => a.deep_eq(b),
        _ => false,
    }
}

fn escape_html(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#x27;"),
            '/' => out.push_str("&#x2F;"),
            c => out.push(c),
        }
    }
    out
}
