//! Payloads carried by model, collection and router notifications.

use crate::collection::Collection;
use crate::error::{ModelError, SyncError, ValidationFailure};
use crate::model::{Model, SetOptions};
use crate::router::Router;
use crate::value::Value;

/// Notification payload shared by models, collections and routers.
///
/// The event name travels separately; the table below lists the names each
/// variant is fired under.
///
/// | variant | event name |
/// |---|---|
/// | `AttributeChanged` | `change:<key>` |
/// | `Changed` | `change` |
/// | `Invalid`, `SyncFailed`, `IdentityConflict` | `error` |
/// | `Destroy` | `destroy` |
/// | `Synced` | `sync` |
/// | `Add` / `Remove` | `add` / `remove` |
/// | `Reset` | `reset` |
/// | `Route` | `route:<name>` on routers, `route` on history |
#[allow(missing_docs)]
#[derive(Debug)]
pub enum Event {
    /// A single attribute changed. `value` is `None` when it was unset.
    AttributeChanged {
        model: Model,
        key: String,
        value: Option<Value>,
        options: SetOptions,
    },

    /// A change cycle settled.
    Changed {
        model: Model,
        options: SetOptions,
    },

    /// A `set` was rejected by the validator.
    Invalid {
        model: Model,
        error: ValidationFailure,
        options: SetOptions,
    },

    /// The persistence backend reported a failure.
    SyncFailed {
        model: Option<Model>,
        collection: Option<Collection>,
        error: SyncError,
    },

    /// A member took an external id that `displaced` still holds.
    /// `collection` now finds `model` under that id.
    IdentityConflict {
        model: Model,
        displaced: Model,
        collection: Collection,
        error: ModelError,
    },

    /// A model is being destroyed.
    Destroy {
        model: Model,
        collection: Option<Collection>,
    },

    /// The backend acknowledged a save or destroy.
    Synced {
        model: Model,
        response: Value,
    },

    /// A model was inserted into `collection` at `index`.
    Add {
        model: Model,
        collection: Collection,
        index: usize,
    },

    /// A model was removed from `collection`; `index` is its former position.
    Remove {
        model: Model,
        collection: Collection,
        index: usize,
    },

    /// The collection's contents or order were replaced wholesale.
    Reset {
        collection: Collection,
    },

    /// A route matched the current fragment.
    Route {
        router: Router,
        name: String,
        params: Vec<String>,
    },

    /// Application-defined event.
    Custom(Vec<Value>),
}

impl Event {
    /// The model this event is about, if any.
    #[must_use]
    pub fn model(&self) -> Option<&Model> {
        match self {
            Self::AttributeChanged { model, .. }
            | Self::Changed { model, .. }
            | Self::Invalid { model, .. }
            | Self::IdentityConflict { model, .. }
            | Self::Destroy { model, .. }
            | Self::Synced { model, .. }
            | Self::Add { model, .. }
            | Self::Remove { model, .. } => Some(model),
            Self::SyncFailed { model, .. } => model.as_ref(),
            Self::Reset { .. } | Self::Route { .. } | Self::Custom(_) => None,
        }
    }

    /// The collection this event names, if any.
    #[must_use]
    pub fn collection(&self) -> Option<&Collection> {
        match self {
            Self::Add { collection, .. }
            | Self::Remove { collection, .. }
            | Self::IdentityConflict { collection, .. }
            | Self::Reset { collection } => Some(collection),
            Self::Destroy { collection, .. } | Self::SyncFailed { collection, .. } => {
                collection.as_ref()
            }
            _ => None,
        }
    }

    /// The new value for `change:<key>` events.
    #[must_use]
    pub fn value(&self) -> Option<&Value> {
        match self {
            Self::AttributeChanged { value, .. } => value.as_ref(),
            _ => None,
        }
    }
}
