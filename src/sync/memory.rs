//! In-memory backend.
//!
//! Records live under their collection url; a record url is the collection
//! url followed by `/` and the URL-encoded id. Intended for embedded usage and
//! tests.

use std::cell::RefCell;
use std::collections::{BTreeMap, VecDeque};

use tracing::trace;

use crate::config::DEFAULT_ID_ATTRIBUTE;
use crate::error::SyncError;
use crate::id::ModelId;
use crate::sync::backend::{Backend, Method, SyncRequest};
use crate::value::{Attributes, Value};

/// Requests kept by [`MemoryBackend::requests`] unless configured otherwise.
pub const DEFAULT_REQUEST_LOG: usize = 64;

fn busy_err(context: &'static str) -> SyncError {
    SyncError::backend(format!("backend re-entered: {context}"))
}

#[derive(Debug, Default)]
struct MemoryState {
    /// Collection url -> records in insertion order, keyed by id.
    collections: BTreeMap<String, Vec<(String, Attributes)>>,
    next_id: i64,
    /// Most recent requests, oldest first, at most `request_log` long.
    requests: VecDeque<SyncRequest>,
    fail_next: Option<SyncError>,
}

/// In-memory [`Backend`] that assigns integer ids on create.
///
/// # Examples
///
/// ```
/// use modelkit::{attrs, Backend, MemoryBackend, Method, SyncRequest, Value};
///
/// let backend = MemoryBackend::new();
/// let saved = backend
///     .sync(SyncRequest::new(Method::Create, "/books").with_payload(Value::Map(attrs! { "t" => "a" })))
///     .unwrap();
/// assert_eq!(saved.as_map().and_then(|m| m.get("id")), Some(&Value::Int(1)));
/// assert_eq!(backend.records("/books").len(), 1);
/// ```
#[derive(Debug)]
pub struct MemoryBackend {
    id_attribute: String,
    request_log: usize,
    state: RefCell<MemoryState>,
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryBackend {
    /// Creates an empty backend keyed by the `id` attribute.
    #[must_use]
    pub fn new() -> Self {
        Self::with_id_attribute(DEFAULT_ID_ATTRIBUTE)
    }

    /// Creates an empty backend keyed by `id_attribute`.
    #[must_use]
    pub fn with_id_attribute(id_attribute: impl Into<String>) -> Self {
        Self {
            id_attribute: id_attribute.into(),
            request_log: DEFAULT_REQUEST_LOG,
            state: RefCell::new(MemoryState {
                next_id: 1,
                ..MemoryState::default()
            }),
        }
    }

    /// Keeps the last `capacity` requests for [`MemoryBackend::requests`].
    /// Zero turns the log off.
    #[must_use]
    pub fn request_log(mut self, capacity: usize) -> Self {
        self.request_log = capacity;
        if let Ok(mut state) = self.state.try_borrow_mut() {
            state.requests.truncate(capacity);
        }
        self
    }

    /// Stores `records` under `url`, assigning ids to records without one.
    ///
    /// # Errors
    ///
    /// Fails only if called from inside a request.
    pub fn seed(&self, url: &str, records: Vec<Attributes>) -> Result<(), SyncError> {
        let mut state = self.state.try_borrow_mut().map_err(|_| busy_err("seed"))?;
        for record in records {
            self.insert(&mut state, url, record);
        }
        Ok(())
    }

    /// Records stored under a collection url.
    #[must_use]
    pub fn records(&self, url: &str) -> Vec<Attributes> {
        self.state
            .try_borrow()
            .map(|state| {
                state
                    .collections
                    .get(url)
                    .map(|rows| rows.iter().map(|(_, attrs)| attrs.clone()).collect())
                    .unwrap_or_default()
            })
            .unwrap_or_default()
    }

    /// The most recent requests, oldest first. See
    /// [`MemoryBackend::request_log`].
    #[must_use]
    pub fn requests(&self) -> Vec<SyncRequest> {
        self.state
            .try_borrow()
            .map(|state| state.requests.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Makes the next request fail with `error`.
    pub fn fail_next(&self, error: SyncError) {
        if let Ok(mut state) = self.state.try_borrow_mut() {
            state.fail_next = Some(error);
        }
    }

    fn record_id(&self, record: &Attributes) -> Option<String> {
        record
            .get(&self.id_attribute)
            .and_then(ModelId::from_value)
            .map(|id| id.to_string())
    }

    fn insert(&self, state: &mut MemoryState, url: &str, mut record: Attributes) -> Attributes {
        let key = if let Some(key) = self.record_id(&record) {
            key
        } else {
            let id = state.next_id;
            state.next_id += 1;
            record.insert(self.id_attribute.clone(), Value::Int(id));
            id.to_string()
        };
        if let Ok(n) = key.parse::<i64>() {
            state.next_id = state.next_id.max(n.saturating_add(1));
        }

        let rows = state.collections.entry(url.to_string()).or_default();
        match rows.iter_mut().find(|(k, _)| *k == key) {
            Some(row) => row.1 = record.clone(),
            None => rows.push((key, record.clone())),
        }
        record
    }

    fn execute(&self, state: &mut MemoryState, request: &SyncRequest) -> Result<Value, SyncError> {
        match request.method {
            Method::Create => {
                let record = payload_attributes(request)?;
                Ok(Value::Map(self.insert(state, &request.url, record)))
            }
            Method::Read => {
                if let Some(rows) = state.collections.get(&request.url) {
                    return Ok(Value::List(
                        rows.iter().map(|(_, attrs)| Value::Map(attrs.clone())).collect(),
                    ));
                }
                let (base, key) = split_record_url(&request.url)?;
                find_row(state, base, &key, &request.url).map(|row| Value::Map(row.1.clone()))
            }
            Method::Update => {
                let (base, key) = split_record_url(&request.url)?;
                let mut record = payload_attributes(request)?;
                let row = find_row(state, base, &key, &request.url)?;
                record
                    .entry(self.id_attribute.clone())
                    .or_insert_with(|| row.1.get(&self.id_attribute).cloned().unwrap_or_default());
                row.1 = record.clone();
                Ok(Value::Map(record))
            }
            Method::Delete => {
                let (base, key) = split_record_url(&request.url)?;
                let rows = state
                    .collections
                    .get_mut(base)
                    .ok_or_else(|| not_found(&request.url))?;
                let pos = rows
                    .iter()
                    .position(|(k, _)| *k == key)
                    .ok_or_else(|| not_found(&request.url))?;
                rows.remove(pos);
                Ok(Value::Null)
            }
        }
    }
}

impl Backend for MemoryBackend {
    fn sync(&self, request: SyncRequest) -> Result<Value, SyncError> {
        let mut state = self.state.try_borrow_mut().map_err(|_| busy_err("sync"))?;
        trace!(method = %request.method, url = %request.url, "memory backend request");
        if self.request_log > 0 {
            if state.requests.len() == self.request_log {
                state.requests.pop_front();
            }
            state.requests.push_back(request.clone());
        }
        if let Some(err) = state.fail_next.take() {
            return Err(err);
        }
        self.execute(&mut state, &request)
    }
}

fn not_found(url: &str) -> SyncError {
    SyncError::NotFound {
        url: url.to_string(),
    }
}

fn payload_attributes(request: &SyncRequest) -> Result<Attributes, SyncError> {
    match request.payload.as_ref() {
        Some(Value::Map(attrs)) => Ok(attrs.clone()),
        _ => Err(SyncError::Rejected {
            url: request.url.clone(),
            reason: format!("{} requires an attribute map payload", request.method),
        }),
    }
}

fn split_record_url(url: &str) -> Result<(&str, String), SyncError> {
    let (base, tail) = url.rsplit_once('/').ok_or_else(|| not_found(url))?;
    if tail.is_empty() {
        return Err(not_found(url));
    }
    let key = urlencoding::decode(tail).map_err(|e| SyncError::Rejected {
        url: url.to_string(),
        reason: e.to_string(),
    })?;
    Ok((base, key.into_owned()))
}

fn find_row<'a>(
    state: &'a mut MemoryState,
    base: &str,
    key: &str,
    url: &str,
) -> Result<&'a mut (String, Attributes), SyncError> {
    state
        .collections
        .get_mut(base)
        .and_then(|rows| rows.iter_mut().find(|(k, _)| k == key))
        .ok_or_else(|| not_found(url))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attrs;

    fn create(backend: &MemoryBackend, url: &str, attrs: Attributes) -> Value {
        backend
            .sync(SyncRequest::new(Method::Create, url).with_payload(Value::Map(attrs)))
            .unwrap()
    }

    #[test]
    fn test_create_assigns_sequential_ids() {
        let backend = MemoryBackend::new();
        let a = create(&backend, "/books", attrs! { "t" => "a" });
        let b = create(&backend, "/books", attrs! { "t" => "b" });
        assert_eq!(a.as_map().unwrap().get("id"), Some(&Value::Int(1)));
        assert_eq!(b.as_map().unwrap().get("id"), Some(&Value::Int(2)));
        assert_eq!(backend.records("/books").len(), 2);
    }

    #[test]
    fn test_create_keeps_explicit_id() {
        let backend = MemoryBackend::new();
        create(&backend, "/books", attrs! { "id" => 10 });
        let next = create(&backend, "/books", Attributes::new());
        assert_eq!(next.as_map().unwrap().get("id"), Some(&Value::Int(11)));
    }

    #[test]
    fn test_read_collection_and_record() {
        let backend = MemoryBackend::new();
        backend
            .seed("/books", vec![attrs! { "t" => "a" }, attrs! { "t" => "b" }])
            .unwrap();
        let all = backend.sync(SyncRequest::new(Method::Read, "/books")).unwrap();
        assert_eq!(all.as_list().unwrap().len(), 2);

        let one = backend.sync(SyncRequest::new(Method::Read, "/books/2")).unwrap();
        assert_eq!(one.as_map().unwrap().get("t"), Some(&Value::from("b")));

        let missing = backend.sync(SyncRequest::new(Method::Read, "/books/9")).unwrap_err();
        assert!(matches!(missing, SyncError::NotFound { .. }));
    }

    #[test]
    fn test_update_and_delete() {
        let backend = MemoryBackend::new();
        create(&backend, "/books", attrs! { "t" => "a" });
        let updated = backend
            .sync(
                SyncRequest::new(Method::Update, "/books/1")
                    .with_payload(Value::Map(attrs! { "t" => "z" })),
            )
            .unwrap();
        assert_eq!(updated.as_map().unwrap().get("id"), Some(&Value::Int(1)));
        assert_eq!(backend.records("/books")[0].get("t"), Some(&Value::from("z")));

        backend.sync(SyncRequest::new(Method::Delete, "/books/1")).unwrap();
        assert!(backend.records("/books").is_empty());
        let again = backend.sync(SyncRequest::new(Method::Delete, "/books/1")).unwrap_err();
        assert!(matches!(again, SyncError::NotFound { .. }));
    }

    #[test]
    fn test_encoded_string_ids() {
        let backend = MemoryBackend::new();
        create(&backend, "/notes", attrs! { "id" => "a b" });
        let got = backend.sync(SyncRequest::new(Method::Read, "/notes/a%20b")).unwrap();
        assert_eq!(got.as_map().unwrap().get("id"), Some(&Value::from("a b")));
    }

    #[test]
    fn test_fail_next_and_request_log() {
        let backend = MemoryBackend::new();
        backend.fail_next(SyncError::backend("offline"));
        let err = backend
            .sync(SyncRequest::new(Method::Create, "/x").with_payload(Value::Map(Attributes::new())))
            .unwrap_err();
        assert!(err.to_string().contains("offline"));
        create(&backend, "/x", Attributes::new());
        let log = backend.requests();
        assert_eq!(log.len(), 2);
        assert!(log.iter().all(|r| r.method == Method::Create));
    }

    #[test]
    fn test_request_log_is_bounded() {
        let backend = MemoryBackend::new().request_log(2);
        for n in 0..5i64 {
            create(&backend, "/x", attrs! { "n" => n });
        }
        let log = backend.requests();
        assert_eq!(log.len(), 2);
        let last = log[1].payload.as_ref().and_then(Value::as_map).unwrap();
        assert_eq!(last.get("n"), Some(&Value::Int(4)));
        assert_eq!(backend.records("/x").len(), 5);

        let quiet = MemoryBackend::new().request_log(0);
        create(&quiet, "/x", Attributes::new());
        assert!(quiet.requests().is_empty());
    }

    #[test]
    fn test_create_without_map_payload_rejected() {
        let backend = MemoryBackend::new();
        let err = backend.sync(SyncRequest::new(Method::Create, "/x")).unwrap_err();
        assert!(matches!(err, SyncError::Rejected { .. }));
    }

    #[test]
    fn test_custom_id_attribute() {
        let backend = MemoryBackend::with_id_attribute("_id");
        let saved = create(&backend, "/x", Attributes::new());
        assert_eq!(saved.as_map().unwrap().get("_id"), Some(&Value::Int(1)));
    }
}
