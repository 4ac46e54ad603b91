//! # modelkit - Observable Models, Collections and Routes
//!
//! modelkit is an in-process object model for client applications: attribute
//! stores that report what changed, ordered sets that relay their members'
//! notifications, and a fragment router. Everything is single-threaded and
//! re-entrant; listeners may mutate the objects that notified them.
//!
//! ## Core Concepts
//!
//! - **Model**: an attribute store with validation and change tracking
//! - **Collection**: an ordered set of models indexed by client and external id
//! - **Events**: the publish/subscribe hub embedded in models, collections and routers
//! - **Backend**: the persistence hand-off used by `fetch`, `save` and `destroy`
//! - **Router**: named fragment routes dispatched through a shared `History`
//!
//! ## Usage
//!
//! ```rust
//! use modelkit::{attrs, AddOptions, Collection, CollectionOptions, MemoryBackend, SetOptions, SyncOptions};
//!
//! let backend = MemoryBackend::new();
//! let todos = Collection::new(CollectionOptions::new().url("/todos"));
//!
//! let todo = todos.create(attrs! { "title" => "write docs" }, &backend, &SyncOptions::new())?;
//! assert_eq!(todos.len(), 1);
//! assert_eq!(todo.url()?, "/todos/1");
//!
//! todo.set_key("done", true, &SetOptions::new());
//! assert!(todo.save(None, &backend, &SyncOptions::new())?);
//! # Ok::<(), modelkit::ModelError>(())
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

// Core types
pub mod config;
pub mod error;
pub mod id;
pub mod value;

// Notifications and the object model
pub mod collection;
pub mod events;
pub mod model;

// Persistence and routing
pub mod router;
pub mod sync;

pub use collection::{
    AddOptions, Collection, CollectionOptions, CollectionParseHook, Comparator, ModelRef,
    NotifyOptions,
};
pub use config::{CollectionConfig, HistoryConfig, ModelConfig, DEFAULT_ID_ATTRIBUTE};
pub use error::{ModelError, ModelResult, SyncError, ValidationFailure};
pub use events::{Callback, Event, Events, ALL};
pub use id::{Cid, ContextId, ListenerId, ModelId};
pub use model::{Model, ModelOptions, SetOptions, SyncOptions};
pub use router::{
    extract_parameters, route_to_regex, History, NavigateOptions, RouteCallback, Router,
};
pub use sync::{Backend, MemoryBackend, Method, SyncRequest, DEFAULT_REQUEST_LOG};
pub use value::{Attributes, SharedValue, Value};
