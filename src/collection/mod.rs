//! Ordered sets of models.
//!
//! A [`Collection`] holds models in order, indexes them by client id and by
//! external id, and relays every member event to its own listeners. Members
//! are held strongly; a member refers back to its collection weakly.

mod comparator;
mod options;

use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::rc::Rc;

use tracing::{debug, trace, warn};

use crate::error::{ModelError, ModelResult, SyncError};
use crate::events::{Callback, Event, Events, ALL};
use crate::id::{Cid, ContextId, ListenerId, ModelId};
use crate::model::{Model, SyncOptions};
use crate::sync::{Backend, Method, SyncRequest};
use crate::value::{Attributes, Value};

pub use comparator::Comparator;
pub use options::{AddOptions, CollectionOptions, CollectionParseHook, NotifyOptions};

/// Identifies a member for [`Collection::remove`].
#[derive(Debug, Clone)]
pub enum ModelRef {
    /// A model handle; looked up by client id, then by external id.
    Model(Model),
    /// External id.
    Id(ModelId),
    /// Client id.
    Cid(Cid),
}

impl From<Model> for ModelRef {
    fn from(model: Model) -> Self {
        Self::Model(model)
    }
}

impl From<&Model> for ModelRef {
    fn from(model: &Model) -> Self {
        Self::Model(model.clone())
    }
}

impl From<ModelId> for ModelRef {
    fn from(id: ModelId) -> Self {
        Self::Id(id)
    }
}

impl From<&ModelId> for ModelRef {
    fn from(id: &ModelId) -> Self {
        Self::Id(id.clone())
    }
}

impl From<Cid> for ModelRef {
    fn from(cid: Cid) -> Self {
        Self::Cid(cid)
    }
}

#[derive(Default)]
struct CollectionState {
    models: Vec<Model>,
    by_id: HashMap<ModelId, Model>,
    by_cid: HashMap<Cid, Model>,
}

impl CollectionState {
    /// Drops the id entries pointing at `cid`. An id another member still
    /// holds is handed back to that member.
    fn vacate(&mut self, cid: Cid) {
        let ids: Vec<ModelId> = self
            .by_id
            .iter()
            .filter(|(_, m)| m.cid() == cid)
            .map(|(id, _)| id.clone())
            .collect();
        for id in ids {
            self.by_id.remove(&id);
            let holder = self
                .models
                .iter()
                .find(|m| m.cid() != cid && m.id().as_ref() == Some(&id));
            if let Some(holder) = holder {
                trace!(%id, cid = %holder.cid(), "id entry restored");
                self.by_id.insert(id, holder.clone());
            }
        }
    }
}

pub(crate) struct CollectionInner {
    events: Events<Event>,
    /// Tags this collection's subscriptions on its members.
    context: ContextId,
    options: CollectionOptions,
    state: RefCell<CollectionState>,
}

impl Drop for CollectionInner {
    fn drop(&mut self) {
        for model in &self.state.get_mut().models {
            model.off(None, None, Some(self.context));
        }
    }
}

/// Ordered, identity-indexed set of models.
///
/// # Examples
///
/// ```
/// use modelkit::{attrs, AddOptions, Collection, CollectionOptions, Comparator, ModelId};
///
/// let books = Collection::new(CollectionOptions::new().comparator(Comparator::by_attribute("n")));
/// books
///     .add_attributes(vec![attrs! { "id" => 1, "n" => 3 }, attrs! { "id" => 2, "n" => 1 }], &AddOptions::new())
///     .unwrap();
/// assert_eq!(books.len(), 2);
/// assert_eq!(books.at(0).and_then(|m| m.id()), Some(ModelId::Int(2)));
/// assert!(books.get(&ModelId::Int(1)).is_some());
/// ```
#[derive(Clone)]
pub struct Collection {
    inner: Rc<CollectionInner>,
}

impl Collection {
    /// Creates an empty collection.
    #[must_use]
    pub fn new(options: CollectionOptions) -> Self {
        Self {
            inner: Rc::new(CollectionInner {
                events: Events::new(),
                context: ContextId::new(),
                options,
                state: RefCell::new(CollectionState::default()),
            }),
        }
    }

    /// Creates a collection holding `models`, without notifications.
    ///
    /// # Errors
    ///
    /// Returns [`ModelError::DuplicateIdentity`] if `models` repeat an
    /// identity.
    pub fn with_models(models: Vec<Model>, options: CollectionOptions) -> ModelResult<Self> {
        let collection = Self::new(options);
        collection.add(models, &AddOptions::new().silent(true))?;
        Ok(collection)
    }

    pub(crate) fn from_inner(inner: Rc<CollectionInner>) -> Self {
        Self { inner }
    }

    /// Number of members.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.state.borrow().models.len()
    }

    /// True if there are no members.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.state.borrow().models.is_empty()
    }

    /// Member at `index`.
    #[must_use]
    pub fn at(&self, index: usize) -> Option<Model> {
        self.inner.state.borrow().models.get(index).cloned()
    }

    /// Snapshot of the members in order.
    #[must_use]
    pub fn models(&self) -> Vec<Model> {
        self.inner.state.borrow().models.clone()
    }

    /// Member matching `target`: an external id, a client id, or a model
    /// (looked up by client id, then by external id).
    #[must_use]
    pub fn get(&self, target: impl Into<ModelRef>) -> Option<Model> {
        self.resolve(&target.into())
    }

    /// Member with the client id of `target`, a [`Cid`] or a model.
    /// External ids never match.
    #[must_use]
    pub fn get_by_cid(&self, target: impl Into<ModelRef>) -> Option<Model> {
        let cid = match target.into() {
            ModelRef::Model(model) => model.cid(),
            ModelRef::Cid(cid) => cid,
            ModelRef::Id(_) => return None,
        };
        self.resolve(&ModelRef::Cid(cid))
    }

    /// Position of `model`.
    #[must_use]
    pub fn index_of(&self, model: &Model) -> Option<usize> {
        self.inner
            .state
            .borrow()
            .models
            .iter()
            .position(|m| m.ptr_eq(model))
    }

    /// Value of `key` for every member, in order.
    #[must_use]
    pub fn pluck(&self, key: &str) -> Vec<Option<Value>> {
        self.models().iter().map(|m| m.get(key)).collect()
    }

    /// Attribute snapshots of every member, in order.
    #[must_use]
    pub fn to_json(&self) -> Vec<Attributes> {
        self.models().iter().map(Model::to_json).collect()
    }

    /// Members matching `predicate`, in order.
    pub fn filter<F>(&self, predicate: F) -> Vec<Model>
    where
        F: Fn(&Model) -> bool,
    {
        self.models().into_iter().filter(|m| predicate(m)).collect()
    }

    /// First member matching `predicate`.
    pub fn find<F>(&self, predicate: F) -> Option<Model>
    where
        F: Fn(&Model) -> bool,
    {
        self.models().into_iter().find(|m| predicate(m))
    }

    /// Endpoint of the collection.
    #[must_use]
    pub fn url(&self) -> Option<String> {
        self.inner.options.url.clone()
    }

    /// True if both handles refer to the same collection.
    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    /// Builds a model from raw attributes with the collection's model
    /// options.
    ///
    /// # Errors
    ///
    /// Returns [`ModelError::InvalidModel`] if the attributes do not validate.
    pub fn build(&self, attributes: Attributes) -> ModelResult<Model> {
        let model = Model::with_options(attributes, self.inner.options.model.clone())?;
        model.attach(&self.inner);
        Ok(model)
    }

    /// Inserts `models` and fires `add` for each unless silent.
    ///
    /// # Errors
    ///
    /// Returns [`ModelError::DuplicateIdentity`] and leaves the collection
    /// unchanged if a model's client id or external id is already present or
    /// repeats within the batch.
    pub fn add<I>(&self, models: I, options: &AddOptions) -> ModelResult<()>
    where
        I: IntoIterator<Item = Model>,
    {
        let models: Vec<Model> = models.into_iter().collect();
        self.check_batch(&models, true)?;
        if models.is_empty() {
            return Ok(());
        }

        for model in &models {
            self.subscribe(model);
        }
        {
            let mut state = self.inner.state.borrow_mut();
            for model in &models {
                state.by_cid.insert(model.cid(), model.clone());
                if let Some(id) = model.id() {
                    state.by_id.insert(id, model.clone());
                }
            }
            let at = options
                .at
                .map_or(state.models.len(), |i| i.min(state.models.len()));
            state.models.splice(at..at, models.iter().cloned());
        }
        trace!(added = models.len(), total = self.len(), "models added");

        if let Some(comparator) = self.inner.options.comparator.clone() {
            self.sort_with(&comparator);
        }

        if !options.silent {
            for model in &models {
                let Some(index) = self.index_of(model) else {
                    continue;
                };
                model.trigger(
                    "add",
                    &Event::Add {
                        model: model.clone(),
                        collection: self.clone(),
                        index,
                    },
                );
            }
        }
        Ok(())
    }

    /// Builds models from raw attributes and adds them.
    ///
    /// # Errors
    ///
    /// Returns [`ModelError::InvalidModel`] if any attributes do not
    /// validate, or [`ModelError::DuplicateIdentity`] as for `add`. Nothing
    /// is added on error.
    pub fn add_attributes(&self, attributes: Vec<Attributes>, options: &AddOptions) -> ModelResult<()> {
        let models = attributes
            .into_iter()
            .map(|attrs| self.build(attrs))
            .collect::<ModelResult<Vec<_>>>()?;
        self.add(models, options)
    }

    /// Removes members, firing `remove` with each one's former index unless
    /// silent. Targets that are not members are skipped.
    pub fn remove<I>(&self, targets: I, options: &NotifyOptions)
    where
        I: IntoIterator,
        I::Item: Into<ModelRef>,
    {
        for target in targets {
            let Some(model) = self.resolve(&target.into()) else {
                continue;
            };
            let cid = model.cid();
            let index = {
                let mut state = self.inner.state.borrow_mut();
                let Some(index) = state.models.iter().position(|m| m.ptr_eq(&model)) else {
                    continue;
                };
                state.models.remove(index);
                state.by_cid.remove(&cid);
                state.vacate(cid);
                index
            };
            trace!(cid = %cid, index, "model removed");

            if !options.silent {
                model.trigger(
                    "remove",
                    &Event::Remove {
                        model: model.clone(),
                        collection: self.clone(),
                        index,
                    },
                );
            }
            self.release(&model);
        }
    }

    /// Replaces every member and fires one `reset` unless silent.
    ///
    /// # Errors
    ///
    /// Returns [`ModelError::DuplicateIdentity`] if `models` repeat an
    /// identity; the collection keeps its members.
    pub fn reset(&self, models: Vec<Model>, options: &NotifyOptions) -> ModelResult<()> {
        self.check_batch(&models, false)?;
        let old = std::mem::take(&mut *self.inner.state.borrow_mut());
        for model in &old.models {
            self.release(model);
        }
        self.add(models, &AddOptions::new().silent(true))?;
        if !options.silent {
            self.trigger(
                "reset",
                &Event::Reset {
                    collection: self.clone(),
                },
            );
        }
        Ok(())
    }

    /// Re-sorts with the configured comparator and fires `reset` unless
    /// silent.
    ///
    /// # Errors
    ///
    /// Returns [`ModelError::MissingComparator`] if none is configured.
    pub fn sort(&self, options: &NotifyOptions) -> ModelResult<()> {
        let comparator = self
            .inner
            .options
            .comparator
            .clone()
            .ok_or(ModelError::MissingComparator)?;
        self.sort_with(&comparator);
        if !options.silent {
            self.trigger(
                "reset",
                &Event::Reset {
                    collection: self.clone(),
                },
            );
        }
        Ok(())
    }

    /// Reads the collection from `backend`, then resets it to the parsed
    /// response, or adds to it with `options.add`.
    ///
    /// # Errors
    ///
    /// Returns [`ModelError::MissingUrl`] without a url. Parsed attributes
    /// that fail validation or repeat an identity are returned as errors.
    pub fn fetch(&self, backend: &dyn Backend, options: &SyncOptions) -> ModelResult<bool> {
        let url = self.url().ok_or(ModelError::MissingUrl)?;
        let response = match backend.sync(SyncRequest::new(Method::Read, url)) {
            Ok(response) => response,
            Err(error) => {
                self.sync_failed(error, options);
                return Ok(false);
            }
        };

        let models = self
            .parse(response)
            .into_iter()
            .map(|attrs| self.build(attrs))
            .collect::<ModelResult<Vec<_>>>()?;
        debug!(count = models.len(), add = options.add, "collection fetched");
        if options.add {
            self.add(models, &AddOptions::new().silent(options.silent))?;
        } else {
            self.reset(models, &NotifyOptions::new().silent(options.silent))?;
        }
        Ok(true)
    }

    /// Builds a model from `attributes`, adds it, and saves it.
    ///
    /// With `wait` the model joins the collection only after the backend
    /// accepts it.
    ///
    /// # Errors
    ///
    /// Returns [`ModelError::InvalidModel`] if the attributes do not validate
    /// and [`ModelError::MissingUrl`] if no url is configured.
    pub fn create(
        &self,
        attributes: Attributes,
        backend: &dyn Backend,
        options: &SyncOptions,
    ) -> ModelResult<Model> {
        let model = self.build(attributes)?;
        if !options.wait {
            self.add([model.clone()], &AddOptions::new())?;
        }
        let saved = model.save(None, backend, options)?;
        if saved && options.wait {
            self.add([model.clone()], &AddOptions::new())?;
        }
        Ok(model)
    }

    /// Converts a backend response into raw member attributes using the
    /// parse hook. Without a hook, map entries of a list are kept.
    #[must_use]
    pub fn parse(&self, response: Value) -> Vec<Attributes> {
        if let Some(parse) = self.inner.options.parse.clone() {
            return parse(response);
        }
        match response {
            Value::List(items) => items
                .into_iter()
                .filter_map(|item| match item {
                    Value::Map(attrs) => Some(attrs),
                    _ => None,
                })
                .collect(),
            _ => Vec::new(),
        }
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

    /// Fires events on this collection.
    pub fn trigger(&self, events: &str, event: &Event) {
        self.inner.events.trigger(events, event);
    }

    /// The collection's event hub.
    #[must_use]
    pub fn events(&self) -> &Events<Event> {
        &self.inner.events
    }

    fn check_batch(&self, models: &[Model], against_members: bool) -> ModelResult<()> {
        let state = self.inner.state.borrow();
        let mut cids = HashSet::new();
        let mut ids = HashSet::new();
        for model in models {
            let cid = model.cid();
            let id = model.id();
            let present = against_members
                && (state.by_cid.contains_key(&cid)
                    || id.as_ref().is_some_and(|id| state.by_id.contains_key(id)));
            let repeated =
                !cids.insert(cid) || id.as_ref().is_some_and(|id| !ids.insert(id.clone()));
            if present || repeated {
                debug!(cid = %cid, ?id, "duplicate model rejected");
                return Err(ModelError::DuplicateIdentity { cid, id });
            }
        }
        Ok(())
    }

    fn subscribe(&self, model: &Model) {
        let weak = Rc::downgrade(&self.inner);
        model.on(
            ALL,
            move |name, event| {
                if let Some(inner) = weak.upgrade() {
                    Self::from_inner(inner).on_model_event(name, event);
                }
            },
            Some(self.inner.context),
        );
        model.attach(&self.inner);
    }

    fn release(&self, model: &Model) {
        model.detach(&self.inner);
        model.off(None, None, Some(self.inner.context));
    }

    fn resolve(&self, target: &ModelRef) -> Option<Model> {
        let state = self.inner.state.borrow();
        match target {
            ModelRef::Model(model) => state
                .by_cid
                .get(&model.cid())
                .or_else(|| model.id().and_then(|id| state.by_id.get(&id)))
                .cloned(),
            ModelRef::Id(id) => state.by_id.get(id).cloned(),
            ModelRef::Cid(cid) => state.by_cid.get(cid).cloned(),
        }
    }

    fn sort_with(&self, comparator: &Comparator) {
        let mut models = self.models();
        comparator.sort(&mut models);
        self.inner.state.borrow_mut().models = models;
    }

    fn reindex(&self, model: &Model) {
        let cid = model.cid();
        let conflict = {
            let mut state = self.inner.state.borrow_mut();
            if !state.by_cid.contains_key(&cid) {
                return;
            }
            state.vacate(cid);
            model.id().and_then(|id| {
                state
                    .by_id
                    .insert(id.clone(), model.clone())
                    .map(|displaced| (id, displaced))
            })
        };

        let Some((id, displaced)) = conflict else {
            return;
        };
        debug!(%id, cid = %cid, displaced = %displaced.cid(), "id collision while re-indexing");
        self.trigger(
            "error",
            &Event::IdentityConflict {
                model: model.clone(),
                displaced,
                collection: self.clone(),
                error: ModelError::DuplicateIdentity { cid, id: Some(id) },
            },
        );
    }

    fn on_model_event(&self, name: &str, event: &Event) {
        if (name == "add" || name == "remove")
            && event.collection().is_some_and(|c| !c.ptr_eq(self))
        {
            return;
        }

        if let Some(model) = event.model() {
            if name == "destroy" {
                self.remove([model], &NotifyOptions::new());
            } else if name
                .strip_prefix("change:")
                .is_some_and(|key| key == model.id_attribute())
            {
                self.reindex(model);
            }
        }

        self.trigger(name, event);
    }

    fn sync_failed(&self, error: SyncError, options: &SyncOptions) {
        warn!(error = %error, "collection backend request failed");
        if let Some(handler) = options.error.as_ref() {
            handler(&error);
        } else {
            self.trigger(
                "error",
                &Event::SyncFailed {
                    model: None,
                    collection: Some(self.clone()),
                    error,
                },
            );
        }
    }
}

impl fmt::Debug for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut s = f.debug_struct("Collection");
        s.field("url", &self.inner.options.url);
        if let Ok(state) = self.inner.state.try_borrow() {
            let cids: Vec<Cid> = state.models.iter().map(Model::cid).collect();
            s.field("members", &cids);
        }
        s.finish_non_exhaustive()
    }
}
