//! Model metadata consulted by the connector.
//!
//! The connector does not own model definitions; it only needs to know, for a model name,
//! which field acts as the model's logical identifier. [`ModelSchema`] is that seam and
//! [`ModelDefinitions`] is the settings-driven implementation used by default.

use serde::{Deserialize, Serialize};
use std::{collections::HashMap, fmt::Debug};

use crate::engine::DEFAULT_ID_FIELD;

/// Resolves model metadata by model name.
pub trait ModelSchema: Send + Sync + Debug {
    /// Returns the name of the logical identifier field of `model`.
    fn id_name(&self, model: &str) -> String;
}

/// Per-model settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelDefinition {
    /// Identifier field override. `None` means [`DEFAULT_ID_FIELD`].
    #[serde(default)]
    pub id: Option<String>,
}

/// A map of model definitions keyed by model name.
///
/// # Example
///
/// ```ignore
/// use doclink_core::model::{ModelDefinitions, ModelSchema};
///
/// let models = ModelDefinitions::new().with_id("Product", "code");
///
/// assert_eq!(models.id_name("Product"), "code");
/// assert_eq!(models.id_name("User"), "id");
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ModelDefinitions {
    models: HashMap<String, ModelDefinition>,
}

impl ModelDefinitions {
    /// Creates an empty set of definitions; every model uses the default identifier.
    pub fn new() -> Self {
        Self::default()
    }

    /// Declares `field` as the identifier of `model`.
    pub fn with_id(mut self, model: impl Into<String>, field: impl Into<String>) -> Self {
        self.define(model, ModelDefinition { id: Some(field.into()) });
        self
    }

    /// Adds or replaces the definition of `model`.
    pub fn define(&mut self, model: impl Into<String>, definition: ModelDefinition) {
        self.models.insert(model.into(), definition);
    }

    /// Returns the definition of `model`, if any.
    pub fn get(&self, model: &str) -> Option<&ModelDefinition> {
        self.models.get(model)
    }
}

impl ModelSchema for ModelDefinitions {
    fn id_name(&self, model: &str) -> String {
        self.models
            .get(model)
            .and_then(|definition| definition.id.clone())
            .unwrap_or_else(|| DEFAULT_ID_FIELD.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_models_use_the_default_identifier() {
        assert_eq!(ModelDefinitions::new().id_name("User"), "id");
    }

    #[test]
    fn overrides_are_resolved_per_model() {
        let models = ModelDefinitions::new().with_id("Product", "code");

        assert_eq!(models.id_name("Product"), "code");
        assert_eq!(models.id_name("User"), "id");
    }

    #[test]
    fn definitions_deserialize_from_settings() {
        let models: ModelDefinitions = serde_json::from_value(serde_json::json!({
            "Product": { "id": "code" },
            "User": {},
        }))
        .unwrap();

        assert_eq!(models.id_name("Product"), "code");
        assert_eq!(models.id_name("User"), "id");
    }
}
