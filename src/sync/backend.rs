//! The persistence hand-off contract.

use std::fmt;

use crate::error::SyncError;
use crate::value::Value;

/// CRUD verb of a [`SyncRequest`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    /// Persist a new record.
    Create,
    /// Load a record or a collection.
    Read,
    /// Replace an existing record.
    Update,
    /// Delete an existing record.
    Delete,
}

impl Method {
    /// Conventional HTTP verb for the method.
    #[must_use]
    pub const fn http_verb(self) -> &'static str {
        match self {
            Self::Create => "POST",
            Self::Read => "GET",
            Self::Update => "PUT",
            Self::Delete => "DELETE",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.http_verb())
    }
}

/// One request handed to a [`Backend`].
#[derive(Debug, Clone, PartialEq)]
pub struct SyncRequest {
    /// CRUD verb.
    pub method: Method,
    /// Target url.
    pub url: String,
    /// The model's attributes for create and update.
    pub payload: Option<Value>,
}

impl SyncRequest {
    /// Creates a request without a payload.
    #[must_use]
    pub fn new(method: Method, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            payload: None,
        }
    }

    /// Attaches a payload.
    #[must_use]
    pub fn with_payload(mut self, payload: Value) -> Self {
        self.payload = Some(payload);
        self
    }
}

/// Persistence backend.
///
/// Implementations answer synchronously; the response of a create or update
/// is merged into the model, a read is parsed into attributes (model) or a
/// list of attribute maps (collection).
pub trait Backend {
    /// Executes one request.
    ///
    /// # Errors
    ///
    /// Returns a [`SyncError`] if the backend refuses or cannot complete the
    /// request.
    fn sync(&self, request: SyncRequest) -> Result<Value, SyncError>;
}

impl<B: Backend + ?Sized> Backend for &B {
    fn sync(&self, request: SyncRequest) -> Result<Value, SyncError> {
        (**self).sync(request)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn _assert_backend_object_safe(_: &dyn Backend) {}

    struct Echo;

    impl Backend for Echo {
        fn sync(&self, request: SyncRequest) -> Result<Value, SyncError> {
            request.payload.ok_or_else(|| SyncError::NotFound { url: request.url })
        }
    }

    #[test]
    fn test_http_verbs() {
        assert_eq!(Method::Create.http_verb(), "POST");
        assert_eq!(Method::Read.to_string(), "GET");
        assert_eq!(Method::Update.http_verb(), "PUT");
        assert_eq!(Method::Delete.http_verb(), "DELETE");
    }

    #[test]
    fn test_backend_through_reference() {
        let backend = Echo;
        let by_ref: &dyn Backend = &backend;
        let ok = by_ref
            .sync(SyncRequest::new(Method::Update, "/a/1").with_payload(Value::Int(1)))
            .unwrap();
        assert_eq!(ok, Value::Int(1));
        let err = (&backend).sync(SyncRequest::new(Method::Read, "/a")).unwrap_err();
        assert!(matches!(err, SyncError::NotFound { .. }));
    }
}
