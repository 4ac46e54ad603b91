//! Collection construction options and per-call options.

use std::fmt;
use std::rc::Rc;

use crate::config::CollectionConfig;
use crate::model::ModelOptions;
use crate::value::{Attributes, Value};

use super::Comparator;

/// Parse hook: converts a backend response into raw member attributes.
pub type CollectionParseHook = Rc<dyn Fn(Value) -> Vec<Attributes>>;

/// Construction options for a [`Collection`](super::Collection).
#[derive(Clone, Default)]
pub struct CollectionOptions {
    /// Endpoint for the collection.
    pub url: Option<String>,
    /// Options for models built from raw attributes.
    pub model: ModelOptions,
    pub(crate) comparator: Option<Comparator>,
    pub(crate) parse: Option<CollectionParseHook>,
}

impl CollectionOptions {
    /// Options without url, comparator or hooks.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts from a loaded configuration.
    #[must_use]
    pub fn from_config(config: CollectionConfig) -> Self {
        Self {
            url: config.url,
            model: ModelOptions::from_config(config.model),
            ..Self::default()
        }
    }

    /// Set the collection endpoint.
    #[must_use]
    pub fn url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    /// Set the options for models built from raw attributes.
    #[must_use]
    pub fn model(mut self, model: ModelOptions) -> Self {
        self.model = model;
        self
    }

    /// Keep members ordered by `comparator`.
    #[must_use]
    pub fn comparator(mut self, comparator: Comparator) -> Self {
        self.comparator = Some(comparator);
        self
    }

    /// Set the response parse hook.
    #[must_use]
    pub fn parse<F>(mut self, parse: F) -> Self
    where
        F: Fn(Value) -> Vec<Attributes> + 'static,
    {
        self.parse = Some(Rc::new(parse));
        self
    }
}

impl fmt::Debug for CollectionOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CollectionOptions")
            .field("url", &self.url)
            .field("model", &self.model)
            .field("comparator", &self.comparator)
            .field("parse", &self.parse.is_some())
            .finish()
    }
}

/// Options for [`Collection::add`](super::Collection::add).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AddOptions {
    /// Insert position, clamped to the collection length. Appends when unset.
    pub at: Option<usize>,
    /// Skip `add` notifications.
    pub silent: bool,
}

impl AddOptions {
    /// Append, with notifications.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert at `index`.
    #[must_use]
    pub fn at(mut self, index: usize) -> Self {
        self.at = Some(index);
        self
    }

    /// Skip notifications.
    #[must_use]
    pub fn silent(mut self, silent: bool) -> Self {
        self.silent = silent;
        self
    }
}

/// Options for `remove`, `reset` and `sort`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NotifyOptions {
    /// Skip the `remove` or `reset` notification.
    pub silent: bool,
}

impl NotifyOptions {
    /// Notify.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Skip notifications.
    #[must_use]
    pub fn silent(mut self, silent: bool) -> Self {
        self.silent = silent;
        self
    }
}
