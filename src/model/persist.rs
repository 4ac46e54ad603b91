use tracing::{debug, warn};

use crate::error::{ModelError, ModelResult, SyncError};
use crate::events::Event;
use crate::sync::{Backend, Method, SyncRequest};
use crate::value::{Attributes, Value};

use super::{Model, SyncOptions};

impl Model {
    /// Resource url: the collection's url, or `url_root` outside a
    /// collection, extended with `/` and the URL-encoded id once the model
    /// has one.
    ///
    /// # Errors
    ///
    /// Returns [`ModelError::MissingUrl`] if neither is configured.
    pub fn url(&self) -> ModelResult<String> {
        let base = self
            .collection()
            .and_then(|c| c.url())
            .or_else(|| self.options().config.url_root.clone())
            .ok_or(ModelError::MissingUrl)?;

        let Some(id) = self.id() else {
            return Ok(base);
        };
        let encoded = urlencoding::encode(&id.to_string()).into_owned();
        if base.ends_with('/') {
            Ok(format!("{base}{encoded}"))
        } else {
            Ok(format!("{base}/{encoded}"))
        }
    }

    /// Reads the model from `backend` and sets the parsed response.
    ///
    /// Returns false if the backend failed or the response did not validate.
    ///
    /// # Errors
    ///
    /// Returns [`ModelError::MissingUrl`] if the model has no url.
    pub fn fetch(&self, backend: &dyn Backend, options: &SyncOptions) -> ModelResult<bool> {
        let url = self.url()?;
        match backend.sync(SyncRequest::new(Method::Read, url)) {
            Ok(response) => {
                let attrs = self.parse(response);
                Ok(self.set(attrs, &options.set_options()))
            }
            Err(error) => {
                self.sync_failed(error, options);
                Ok(false)
            }
        }
    }

    /// Applies `attrs` and persists the model: create while new, update
    /// afterwards. The backend response is set on the model and `sync` fires.
    ///
    /// With `wait`, `attrs` are validated and sent but only applied, merged
    /// under the response, once the backend succeeds.
    ///
    /// # Errors
    ///
    /// Returns [`ModelError::MissingUrl`] if the model has no url.
    pub fn save(
        &self,
        attrs: Option<Attributes>,
        backend: &dyn Backend,
        options: &SyncOptions,
    ) -> ModelResult<bool> {
        let set_options = options.set_options();
        let snapshot = options.wait.then(|| self.snapshot_state());

        if let Some(attrs) = attrs.clone() {
            let applied = if options.wait {
                self.set(attrs, &set_options.clone().silent(true))
            } else {
                self.set(attrs, &set_options)
            };
            if !applied {
                return Ok(false);
            }
        }

        let method = if self.is_new() {
            Method::Create
        } else {
            Method::Update
        };
        let url = self.url();
        let payload = Value::Map(self.to_json());
        if let Some(snapshot) = snapshot {
            self.restore_state(snapshot);
        }
        let request = SyncRequest::new(method, url?).with_payload(payload);
        debug!(cid = %self.cid(), method = %method, url = %request.url, "saving model");

        let response = match backend.sync(request) {
            Ok(response) => response,
            Err(error) => {
                self.sync_failed(error, options);
                return Ok(false);
            }
        };

        let mut server = self.parse(response.clone());
        if options.wait {
            let mut merged = attrs.unwrap_or_default();
            merged.append(&mut server);
            server = merged;
        }
        if !self.set(server, &set_options) {
            return Ok(false);
        }
        self.trigger(
            "sync",
            &Event::Synced {
                model: self.clone(),
                response,
            },
        );
        Ok(true)
    }

    /// Deletes the model from `backend`.
    ///
    /// `destroy` fires before the request, or after it succeeds with `wait`;
    /// collections drop the model when they see it. A new model has nothing
    /// to delete: `destroy` fires and the backend is not contacted.
    ///
    /// # Errors
    ///
    /// Returns [`ModelError::MissingUrl`] if a persisted model has no url.
    pub fn destroy(&self, backend: &dyn Backend, options: &SyncOptions) -> ModelResult<bool> {
        if self.is_new() {
            self.fire_destroy();
            return Ok(true);
        }

        let url = self.url()?;
        if !options.wait {
            self.fire_destroy();
        }

        match backend.sync(SyncRequest::new(Method::Delete, url)) {
            Ok(response) => {
                if options.wait {
                    self.fire_destroy();
                }
                self.trigger(
                    "sync",
                    &Event::Synced {
                        model: self.clone(),
                        response,
                    },
                );
                Ok(true)
            }
            Err(error) => {
                self.sync_failed(error, options);
                Ok(false)
            }
        }
    }

    fn fire_destroy(&self) {
        self.trigger(
            "destroy",
            &Event::Destroy {
                model: self.clone(),
                collection: self.collection(),
            },
        );
    }

    fn sync_failed(&self, error: SyncError, options: &SyncOptions) {
        warn!(cid = %self.cid(), error = %error, "backend request failed");
        if let Some(handler) = options.error.as_ref() {
            handler(&error);
        } else {
            self.trigger(
                "error",
                &Event::SyncFailed {
                    model: Some(self.clone()),
                    collection: None,
                    error,
                },
            );
        }
    }
}
