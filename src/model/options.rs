//! Model construction options and per-call options.

use std::fmt;
use std::rc::Rc;

use crate::config::ModelConfig;
use crate::error::{SyncError, ValidationFailure};
use crate::value::{Attributes, Value};

use super::Model;

/// Validation hook: inspects the prospective attributes of a `set`.
pub type Validator = Rc<dyn Fn(&Attributes) -> Option<ValidationFailure>>;

/// Parse hook: converts a backend response into attributes.
pub type ParseHook = Rc<dyn Fn(Value) -> Attributes>;

/// Per-call handler for rejected sets, used instead of the `error` event.
pub type InvalidHandler = Rc<dyn Fn(&Model, &ValidationFailure)>;

/// Per-call handler for backend failures, used instead of the `error` event.
pub type SyncErrorHandler = Rc<dyn Fn(&SyncError)>;

/// Construction options for a [`Model`].
///
/// # Examples
///
/// ```
/// use modelkit::{attrs, Model, ModelOptions, ValidationFailure};
///
/// let options = ModelOptions::new()
///     .defaults(attrs! { "done" => false })
///     .validator(|a| {
///         a.get("title")
///             .filter(|t| t.as_str().is_some_and(|s| !s.is_empty()))
///             .map_or_else(|| Some(ValidationFailure::on_field("title", "required")), |_| None)
///     });
///
/// let todo = Model::with_options(attrs! { "title" => "milk" }, options).unwrap();
/// assert_eq!(todo.get("done").and_then(|v| v.as_bool()), Some(false));
/// ```
#[derive(Clone, Default)]
pub struct ModelOptions {
    /// Serializable part of the options.
    pub config: ModelConfig,
    pub(crate) validator: Option<Validator>,
    pub(crate) parse: Option<ParseHook>,
}

impl ModelOptions {
    /// Creates default options (`id` attribute, no defaults, no hooks).
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts from a loaded configuration.
    #[must_use]
    pub fn from_config(config: ModelConfig) -> Self {
        Self {
            config,
            ..Self::default()
        }
    }

    /// Set the attribute that holds the external id (default: `id`).
    #[must_use]
    pub fn id_attribute(mut self, name: impl Into<String>) -> Self {
        self.config.id_attribute = name.into();
        self
    }

    /// Set the endpoint used outside of a collection.
    #[must_use]
    pub fn url_root(mut self, url: impl Into<String>) -> Self {
        self.config.url_root = Some(url.into());
        self
    }

    /// Set type-level default attributes.
    #[must_use]
    pub fn defaults(mut self, defaults: Attributes) -> Self {
        self.config.defaults = defaults;
        self
    }

    /// Set the validation hook.
    #[must_use]
    pub fn validator<F>(mut self, validator: F) -> Self
    where
        F: Fn(&Attributes) -> Option<ValidationFailure> + 'static,
    {
        self.validator = Some(Rc::new(validator));
        self
    }

    /// Set the response parse hook.
    #[must_use]
    pub fn parse<F>(mut self, parse: F) -> Self
    where
        F: Fn(Value) -> Attributes + 'static,
    {
        self.parse = Some(Rc::new(parse));
        self
    }
}

impl fmt::Debug for ModelOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModelOptions")
            .field("config", &self.config)
            .field("validator", &self.validator.is_some())
            .field("parse", &self.parse.is_some())
            .finish()
    }
}

/// Options for `set`, `unset`, `clear` and `change`.
///
/// The same options value is handed to listeners with every notification the
/// call produces.
#[derive(Clone, Default)]
pub struct SetOptions {
    /// Apply without notifying; pending changes fire on the next `change`.
    pub silent: bool,
    /// Delete the given keys instead of assigning them.
    pub unset: bool,
    /// Receives validation failures instead of the `error` event.
    pub error: Option<InvalidHandler>,
}

impl SetOptions {
    /// Default options.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply without notifying.
    #[must_use]
    pub fn silent(mut self, silent: bool) -> Self {
        self.silent = silent;
        self
    }

    /// Delete the given keys instead of assigning them.
    #[must_use]
    pub fn unset(mut self, unset: bool) -> Self {
        self.unset = unset;
        self
    }

    /// Route validation failures to `handler`.
    #[must_use]
    pub fn on_error<F>(mut self, handler: F) -> Self
    where
        F: Fn(&Model, &ValidationFailure) + 'static,
    {
        self.error = Some(Rc::new(handler));
        self
    }
}

impl fmt::Debug for SetOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SetOptions")
            .field("silent", &self.silent)
            .field("unset", &self.unset)
            .field("error", &self.error.is_some())
            .finish()
    }
}

/// Options for backend round-trips (`fetch`, `save`, `destroy`, `create`).
#[derive(Clone, Default)]
pub struct SyncOptions {
    /// Defer local changes (save, collection create) or the `destroy`
    /// notification until the backend has answered.
    pub wait: bool,
    /// Apply the response without notifying.
    pub silent: bool,
    /// Collection fetch appends instead of resetting.
    pub add: bool,
    /// Receives backend failures instead of the `error` event.
    pub error: Option<SyncErrorHandler>,
}

impl SyncOptions {
    /// Default options.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for the backend before applying changes.
    #[must_use]
    pub fn wait(mut self, wait: bool) -> Self {
        self.wait = wait;
        self
    }

    /// Apply the response without notifying.
    #[must_use]
    pub fn silent(mut self, silent: bool) -> Self {
        self.silent = silent;
        self
    }

    /// Append fetched models instead of resetting.
    #[must_use]
    pub fn add(mut self, add: bool) -> Self {
        self.add = add;
        self
    }

    /// Route backend failures to `handler`.
    #[must_use]
    pub fn on_error<F>(mut self, handler: F) -> Self
    where
        F: Fn(&SyncError) + 'static,
    {
        self.error = Some(Rc::new(handler));
        self
    }

    pub(crate) fn set_options(&self) -> SetOptions {
        SetOptions::new().silent(self.silent)
    }
}

impl fmt::Debug for SyncOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SyncOptions")
            .field("wait", &self.wait)
            .field("silent", &self.silent)
            .field("add", &self.add)
            .field("error", &self.error.is_some())
            .finish()
    }
}
