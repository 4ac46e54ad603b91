//! Error types for modelkit.
//!
//! Recoverable conditions (a rejected `set`, a failed backend exchange) are
//! reported through notifications and boolean results. Programming errors
//! such as adding a duplicate model or sorting without a comparator are
//! returned as [`ModelError`].

use thiserror::Error;

use crate::id::{Cid, ModelId};

/// Error descriptor produced by a model's validator.
///
/// # Examples
///
/// ```
/// use modelkit::ValidationFailure;
///
/// let err = ValidationFailure::on_field("title", "title is required");
/// assert_eq!(err.field.as_deref(), Some("title"));
/// assert_eq!(err.to_string(), "title is required");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct ValidationFailure {
    /// Attribute the failure refers to, if any.
    pub field: Option<String>,
    /// Human readable reason.
    pub message: String,
}

impl ValidationFailure {
    /// Creates a failure that is not tied to one attribute.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            field: None,
            message: message.into(),
        }
    }

    /// Creates a failure for a specific attribute.
    #[must_use]
    pub fn on_field(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: Some(field.into()),
            message: message.into(),
        }
    }
}

/// Failures reported by a persistence backend.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SyncError {
    /// Nothing exists at the requested url.
    #[error("Resource not found: {url}")]
    NotFound {
        url: String,
    },

    /// The backend refused the request.
    #[error("Request to {url} rejected: {reason}")]
    Rejected {
        url: String,
        reason: String,
    },

    /// Transport or storage failure.
    #[error("Backend error: {message}")]
    Backend {
        message: String,
    },
}

impl SyncError {
    /// Creates a generic backend error.
    #[must_use]
    pub fn backend(message: impl Into<String>) -> Self {
        Self::Backend {
            message: message.into(),
        }
    }
}

/// Top-level error type for modelkit.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ModelError {
    /// Initial attributes failed validation.
    #[error("Cannot create an invalid model: {0}")]
    InvalidModel(ValidationFailure),

    /// A model with the same client or external id is already present.
    #[error(
        "Cannot add the same model to a collection twice (cid {cid}, id {})",
        .id.as_ref().map_or_else(|| "none".to_string(), ToString::to_string)
    )]
    DuplicateIdentity {
        cid: Cid,
        id: Option<ModelId>,
    },

    /// `sort` was called on a collection without a comparator.
    #[error("Cannot sort a collection without a comparator")]
    MissingComparator,

    /// Neither a collection url nor a url root is configured.
    #[error("A url or url_root must be specified")]
    MissingUrl,

    /// `History::start` was called twice.
    #[error("History has already been started")]
    HistoryStarted,

    /// A route pattern did not compile.
    #[error("Invalid route '{pattern}': {reason}")]
    InvalidRoute {
        pattern: String,
        reason: String,
    },

    /// A value refers to itself and cannot be serialized.
    #[error("Cannot serialize a cyclic value")]
    CyclicValue,

    /// Configuration input could not be parsed.
    #[error("Invalid configuration: {message}")]
    Config {
        message: String,
    },
}

impl ModelError {
    /// Returns true if this error came from a validator.
    #[must_use]
    pub const fn is_validation(&self) -> bool {
        matches!(self, Self::InvalidModel(_))
    }

    /// Returns true if this error signals a duplicate collection member.
    #[must_use]
    pub const fn is_duplicate(&self) -> bool {
        matches!(self, Self::DuplicateIdentity { .. })
    }

    /// Returns true if this error was caused by missing configuration
    /// (comparator, endpoint, or malformed config input).
    #[must_use]
    pub const fn is_configuration(&self) -> bool {
        matches!(
            self,
            Self::MissingComparator | Self::MissingUrl | Self::Config { .. }
        )
    }
}

/// Result type alias for modelkit operations.
pub type ModelResult<T> = Result<T, ModelError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_failure_display() {
        let err = ValidationFailure::new("too short");
        assert_eq!(format!("{err}"), "too short");
        assert!(err.field.is_none());
    }

    #[test]
    fn test_duplicate_identity_display() {
        let err = ModelError::DuplicateIdentity {
            cid: Cid::next(),
            id: Some(ModelId::Int(4)),
        };
        let msg = err.to_string();
        assert!(msg.contains("twice"));
        assert!(msg.contains("id 4"));

        let err = ModelError::DuplicateIdentity {
            cid: Cid::next(),
            id: None,
        };
        assert!(err.to_string().contains("id none"));
        assert!(err.is_duplicate());
    }

    #[test]
    fn test_configuration_errors() {
        assert!(ModelError::MissingComparator.is_configuration());
        assert!(ModelError::MissingUrl.is_configuration());
        assert!(!ModelError::CyclicValue.is_configuration());
        assert!(ModelError::InvalidModel(ValidationFailure::new("x")).is_validation());
    }

    #[test]
    fn test_sync_error_display() {
        let err = SyncError::NotFound {
            url: "/books/1".to_string(),
        };
        assert!(err.to_string().contains("/books/1"));
        assert!(SyncError::backend("boom").to_string().contains("boom"));
    }
}
