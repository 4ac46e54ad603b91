//! Identifier types.
//!
//! Models carry two identities: a process-local [`Cid`] handed out at
//! construction, and an optional external [`ModelId`] read from the model's
//! id attribute. Listener registrations and subscriber contexts use their own
//! counters.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

use crate::value::Value;

static NEXT_CID: AtomicU64 = AtomicU64::new(1);
static NEXT_CONTEXT: AtomicU64 = AtomicU64::new(1);
static NEXT_LISTENER: AtomicU64 = AtomicU64::new(1);

/// Ephemeral client id of a model.
///
/// Assigned once at construction, stable for the model's lifetime and never
/// reused within the process.
///
/// # Examples
///
/// ```
/// use modelkit::Model;
///
/// let a = Model::new(Default::default()).unwrap();
/// let b = Model::new(Default::default()).unwrap();
/// assert_ne!(a.cid(), b.cid());
/// assert!(a.cid().to_string().starts_with('c'));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Cid(u64);

impl Cid {
    pub(crate) fn next() -> Self {
        Self(NEXT_CID.fetch_add(1, Ordering::Relaxed))
    }

    /// Returns the numeric part of the id.
    #[must_use]
    pub const fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for Cid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "c{}", self.0)
    }
}

/// External id of a model, as assigned by a remote source.
///
/// Integral numbers and strings are kept apart so that `7` and `"7"` index
/// differently. Other attribute values are keyed by their display form.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ModelId {
    Int(i64),
    Str(String),
}

impl ModelId {
    /// Derives an id from an attribute value. `Null` has no id.
    #[must_use]
    pub fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Null => None,
            Value::Int(v) => Some(Self::Int(*v)),
            #[allow(clippy::cast_possible_truncation, clippy::cast_precision_loss)]
            Value::Float(v) if v.is_finite() && v.fract() == 0.0 && v.abs() < i64::MAX as f64 => {
                Some(Self::Int(*v as i64))
            }
            Value::String(v) => Some(Self::Str(v.clone())),
            Value::Shared(inner) => inner
                .try_borrow()
                .ok()
                .and_then(|inner| Self::from_value(&inner)),
            other => Some(Self::Str(other.to_string())),
        }
    }

    /// Converts the id back into an attribute value.
    #[must_use]
    pub fn to_value(&self) -> Value {
        match self {
            Self::Int(v) => Value::Int(*v),
            Self::Str(v) => Value::String(v.clone()),
        }
    }
}

impl fmt::Display for ModelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int(v) => write!(f, "{v}"),
            Self::Str(v) => write!(f, "{v}"),
        }
    }
}

impl From<i64> for ModelId {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<i32> for ModelId {
    fn from(v: i32) -> Self {
        Self::Int(i64::from(v))
    }
}

impl From<&str> for ModelId {
    fn from(v: &str) -> Self {
        Self::Str(v.to_string())
    }
}

impl From<String> for ModelId {
    fn from(v: String) -> Self {
        Self::Str(v)
    }
}

/// Token grouping listener registrations made on behalf of one subscriber.
///
/// Passing the same context to `off` removes every registration made with
/// it, without needing the individual callbacks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ContextId(u64);

impl ContextId {
    /// Allocates a fresh context token.
    #[must_use]
    pub fn new() -> Self {
        Self(NEXT_CONTEXT.fetch_add(1, Ordering::Relaxed))
    }
}

impl Default for ContextId {
    fn default() -> Self {
        Self::new()
    }
}

/// Handle for a single `on` registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

impl ListenerId {
    pub(crate) fn next() -> Self {
        Self(NEXT_LISTENER.fetch_add(1, Ordering::Relaxed))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cid_is_monotonic() {
        let a = Cid::next();
        let b = Cid::next();
        assert!(b > a);
        assert_eq!(format!("{a}"), format!("c{}", a.get()));
    }

    #[test]
    fn test_model_id_from_value() {
        assert_eq!(ModelId::from_value(&Value::Null), None);
        assert_eq!(ModelId::from_value(&Value::Int(7)), Some(ModelId::Int(7)));
        assert_eq!(ModelId::from_value(&Value::Float(7.0)), Some(ModelId::Int(7)));
        assert_eq!(
            ModelId::from_value(&Value::Float(7.5)),
            Some(ModelId::Str("7.5".to_string()))
        );
        assert_eq!(
            ModelId::from_value(&Value::from("abc")),
            Some(ModelId::Str("abc".to_string()))
        );
    }

    #[test]
    fn test_model_id_int_and_string_differ() {
        assert_ne!(ModelId::from(7), ModelId::from("7"));
        assert_eq!(ModelId::from(7).to_string(), "7");
    }

    #[test]
    fn test_model_id_serde_untagged() {
        let json = serde_json::to_string(&ModelId::Int(3)).unwrap();
        assert_eq!(json, "3");
        let back: ModelId = serde_json::from_str("\"x\"").unwrap();
        assert_eq!(back, ModelId::Str("x".to_string()));
    }

    #[test]
    fn test_context_ids_unique() {
        assert_ne!(ContextId::new(), ContextId::new());
    }
}
