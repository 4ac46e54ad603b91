//! Publish/subscribe notifications.
//!
//! [`Events`] is the hub embedded by models, collections, routers and
//! history; [`Event`] is the payload they all dispatch.

/// Listener registry and dispatch.
pub mod hub;
/// Notification payloads.
pub mod payload;

pub use hub::{Callback, Events, ALL};
pub use payload::Event;
