//! Persistence hand-off.
//!
//! Models and collections talk to storage through the [`Backend`] trait.
//! [`MemoryBackend`] is the in-process implementation.

mod backend;
mod memory;

pub use backend::{Backend, Method, SyncRequest};
pub use memory::{MemoryBackend, DEFAULT_REQUEST_LOG};
