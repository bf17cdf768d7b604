//! Per-model collection provisioning state.

use std::collections::HashMap;
use tracing::info;

use doclink_core::{
    engine::{CollectionOptions, DEFAULT_ID_FIELD, StoreEngine},
    error::{ConnectorResult, EngineError},
};

/// What the connector knows about one provisioned collection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectionDescriptor {
    /// Collection name, equal to the model name.
    pub name: String,
    /// Fields the engine enforces uniqueness on.
    pub unique: Vec<String>,
}

/// Registry of the collections a connector has provisioned or found in its engine.
///
/// Once a model's collection is known it stays known for the registry's lifetime.
#[derive(Debug, Default)]
pub struct CollectionRegistry {
    collections: HashMap<String, CollectionDescriptor>,
}

impl CollectionRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the cached descriptor of `model`, if any.
    pub fn get(&self, model: &str) -> Option<&CollectionDescriptor> {
        self.collections.get(model)
    }

    /// Number of known collections.
    pub fn len(&self) -> usize {
        self.collections.len()
    }

    /// Returns `true` if no collection is known yet.
    pub fn is_empty(&self) -> bool {
        self.collections.is_empty()
    }

    /// Resolves the descriptor of `model` without creating anything.
    ///
    /// Collections that already exist in the engine (for example, loaded from a snapshot)
    /// are picked up and cached.
    pub async fn lookup<E: StoreEngine>(
        &mut self,
        engine: &E,
        model: &str,
    ) -> ConnectorResult<Option<&CollectionDescriptor>> {
        if !self.collections.contains_key(model) {
            let Some(options) = engine.describe_collection(model).await? else {
                return Ok(None);
            };

            self.collections.insert(
                model.to_string(),
                CollectionDescriptor { name: model.to_string(), unique: options.unique },
            );
        }

        Ok(self.collections.get(model))
    }

    /// Resolves the descriptor of `model`, provisioning its collection if needed.
    ///
    /// A new collection gets a unique constraint on `id_field` unless it is the default
    /// identifier. An existing collection is taken as it is.
    pub async fn ensure<E: StoreEngine>(
        &mut self,
        engine: &E,
        model: &str,
        id_field: &str,
    ) -> ConnectorResult<&CollectionDescriptor> {
        if self.lookup(engine, model).await?.is_none() {
            let options = if id_field == DEFAULT_ID_FIELD {
                CollectionOptions::default()
            } else {
                CollectionOptions::unique([id_field])
            };

            engine.create_collection(model, options.clone()).await?;
            info!(target: "doclink::registry", model, unique = ?options.unique, "Collection provisioned");

            self.collections.insert(
                model.to_string(),
                CollectionDescriptor { name: model.to_string(), unique: options.unique },
            );
        }

        self.lookup(engine, model)
            .await?
            .ok_or_else(|| EngineError::CollectionNotFound(model.to_string()).into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use doclink_memory::MemoryEngine;

    #[tokio::test]
    async fn lookup_does_not_create() {
        let engine = MemoryEngine::new();
        let mut registry = CollectionRegistry::new();

        assert!(registry.lookup(&engine, "User").await.unwrap().is_none());
        assert!(engine.list_collections().await.unwrap().is_empty());
        assert!(registry.is_empty());
    }

    #[tokio::test]
    async fn ensure_adds_a_unique_constraint_for_custom_identifiers() {
        let engine = MemoryEngine::new();
        let mut registry = CollectionRegistry::new();

        let user = registry.ensure(&engine, "User", "id").await.unwrap().clone();
        let product = registry.ensure(&engine, "Product", "code").await.unwrap().clone();

        assert!(user.unique.is_empty());
        assert_eq!(product.unique, vec!["code".to_string()]);
        assert_eq!(
            engine.describe_collection("Product").await.unwrap(),
            Some(CollectionOptions::unique(["code"]))
        );
    }

    #[tokio::test]
    async fn existing_collections_are_not_reconfigured() {
        let engine = MemoryEngine::new();
        engine.create_collection("Product", CollectionOptions::default()).await.unwrap();
        let mut registry = CollectionRegistry::new();

        let product = registry.ensure(&engine, "Product", "code").await.unwrap();

        assert!(product.unique.is_empty());
        assert_eq!(registry.len(), 1);
    }
}
