//! Plain configuration for models, collections and history.
//!
//! These structs hold the data half of the options (no closures), so they can
//! be loaded from JSON. Hooks such as validators and comparators are attached
//! through [`ModelOptions`](crate::ModelOptions) and
//! [`CollectionOptions`](crate::CollectionOptions).

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::{ModelError, ModelResult};
use crate::value::Attributes;

/// Default name of the attribute holding a model's external id.
pub const DEFAULT_ID_ATTRIBUTE: &str = "id";

fn parse_json<T: DeserializeOwned>(input: &str) -> ModelResult<T> {
    serde_json::from_str(input).map_err(|e| ModelError::Config {
        message: e.to_string(),
    })
}

/// Model configuration.
///
/// # Examples
///
/// ```
/// use modelkit::ModelConfig;
///
/// let cfg = ModelConfig::from_json(r#"{"id_attribute": "_id", "defaults": {"done": false}}"#).unwrap();
/// assert_eq!(cfg.id_attribute, "_id");
/// assert!(cfg.url_root.is_none());
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    /// Attribute whose value becomes the model's external id.
    pub id_attribute: String,
    /// Endpoint used when the model is not in a collection with a url.
    pub url_root: Option<String>,
    /// Attributes merged under the constructor's attributes.
    pub defaults: Attributes,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            id_attribute: DEFAULT_ID_ATTRIBUTE.to_string(),
            url_root: None,
            defaults: Attributes::new(),
        }
    }
}

impl ModelConfig {
    /// Parses a JSON configuration document.
    ///
    /// # Errors
    ///
    /// Returns [`ModelError::Config`] on malformed input.
    pub fn from_json(input: &str) -> ModelResult<Self> {
        parse_json(input)
    }
}

/// Collection configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CollectionConfig {
    /// Endpoint for the collection; member urls extend it with their id.
    pub url: Option<String>,
    /// Configuration for models built from raw attributes.
    pub model: ModelConfig,
}

impl CollectionConfig {
    /// Parses a JSON configuration document.
    ///
    /// # Errors
    ///
    /// Returns [`ModelError::Config`] on malformed input.
    pub fn from_json(input: &str) -> ModelResult<Self> {
        parse_json(input)
    }
}

/// History configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HistoryConfig {
    /// Prefix stripped from incoming fragments.
    pub root: String,
    /// Skip loading the initial fragment on start.
    pub silent: bool,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            root: "/".to_string(),
            silent: false,
        }
    }
}

impl HistoryConfig {
    /// Parses a JSON configuration document.
    ///
    /// # Errors
    ///
    /// Returns [`ModelError::Config`] on malformed input.
    pub fn from_json(input: &str) -> ModelResult<Self> {
        parse_json(input)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::Value;

    #[test]
    fn test_model_config_defaults() {
        let cfg = ModelConfig::default();
        assert_eq!(cfg.id_attribute, "id");
        assert!(cfg.defaults.is_empty());
    }

    #[test]
    fn test_model_config_from_json() {
        let cfg = ModelConfig::from_json(
            r#"{"url_root": "/books", "defaults": {"title": "untitled", "pages": 0}}"#,
        )
        .unwrap();
        assert_eq!(cfg.id_attribute, "id");
        assert_eq!(cfg.url_root.as_deref(), Some("/books"));
        assert_eq!(cfg.defaults.get("pages"), Some(&Value::Int(0)));
    }

    #[test]
    fn test_collection_config_nested_model() {
        let cfg =
            CollectionConfig::from_json(r#"{"url": "/todos", "model": {"id_attribute": "_id"}}"#)
                .unwrap();
        assert_eq!(cfg.url.as_deref(), Some("/todos"));
        assert_eq!(cfg.model.id_attribute, "_id");
    }

    #[test]
    fn test_history_config() {
        assert_eq!(HistoryConfig::default().root, "/");
        let cfg = HistoryConfig::from_json(r#"{"root": "/app/", "silent": true}"#).unwrap();
        assert!(cfg.silent);
    }

    #[test]
    fn test_malformed_config() {
        let err = ModelConfig::from_json("{not json").unwrap_err();
        assert!(matches!(err, ModelError::Config { .. }));
    }
}
