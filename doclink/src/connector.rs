//! The framework-facing connector.
//!
//! A [`Connector`] owns a storage engine, the registry of provisioned collections and the
//! model schema. Every framework operation runs a [`CollectionAdapter`] while holding the
//! registry lock, so operations of one connector never interleave.

use bson::{Bson, Document};
use mea::mutex::Mutex;
use std::sync::Arc;
use tracing::{debug, info};

use doclink_core::{
    engine::{StoreEngine, StoreEngineBuilder},
    error::ConnectorResult,
    model::{ModelDefinitions, ModelSchema},
    translate::{LessThanMapping, TranslateOptions},
};
use doclink_memory::MemoryEngine;

use crate::{
    adapter::{AffectedCount, CollectionAdapter, FindFilter},
    registry::CollectionRegistry,
    settings::ConnectorSettings,
};

/// Connector type names reported to the framework.
pub const CONNECTOR_TYPES: [&str; 3] = ["db", "nosql", "doclink"];

/// A data-source connector bound to a specific engine.
///
/// # Type Parameters
///
/// * `E` - The engine implementation type
///
/// # Example
///
/// ```ignore
/// let connector = Connector::builder(MemoryEngine::new())
///     .schema(ModelDefinitions::new().with_id("Product", "code"))
///     .build();
/// connector.connect().await?;
///
/// let id = connector.create("User", doc! { "name": "a" }).await?;
/// let users = connector.all("User", &FindFilter::new().order("name")).await?;
/// ```
#[derive(Debug)]
pub struct Connector<E: StoreEngine> {
    name: Option<String>,
    engine: E,
    registry: Mutex<CollectionRegistry>,
    schema: Arc<dyn ModelSchema>,
    options: TranslateOptions,
}

impl<E: StoreEngine> Connector<E> {
    /// Creates a connector over `engine`.
    pub fn new(engine: E, schema: impl ModelSchema + 'static, options: TranslateOptions) -> Self {
        Self {
            name: None,
            engine,
            registry: Mutex::new(CollectionRegistry::new()),
            schema: Arc::new(schema),
            options,
        }
    }

    /// Creates a builder for a connector over `engine`.
    pub fn builder(engine: E) -> ConnectorBuilder<E> {
        ConnectorBuilder::new(engine)
    }

    /// Data source name, if one was configured.
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// The underlying engine.
    pub fn engine(&self) -> &E {
        &self.engine
    }

    /// Connector type names.
    pub fn types(&self) -> &'static [&'static str] {
        &CONNECTOR_TYPES
    }

    /// Picks up the collections already present in the engine.
    pub async fn connect(&self) -> ConnectorResult<()> {
        let mut registry = self.registry.lock().await;

        for collection in self.engine.list_collections().await? {
            registry.lookup(&self.engine, &collection).await?;
        }

        info!(
            target: "doclink::connector",
            name = self.name.as_deref().unwrap_or_default(),
            collections = registry.len(),
            "Connected"
        );

        Ok(())
    }

    /// Writes pending engine state to durable storage.
    pub async fn disconnect(&self) -> ConnectorResult<()> {
        let _registry = self.registry.lock().await;

        self.engine.flush().await?;
        info!(target: "doclink::connector", name = self.name.as_deref().unwrap_or_default(), "Disconnected");

        Ok(())
    }

    /// Shuts the engine down, flushing it first.
    pub async fn shutdown(self) -> ConnectorResult<()> {
        debug!(target: "doclink::connector", name = self.name.as_deref().unwrap_or_default(), "Shutting down");
        Ok(self.engine.shutdown().await?)
    }

    /// Inserts a record and returns its identifier.
    pub async fn create(&self, model: &str, data: Document) -> ConnectorResult<i64> {
        let mut registry = self.registry.lock().await;
        self.adapter(&mut registry).create(model, data).await
    }

    /// Inserts records and returns their identifiers, in input order.
    pub async fn create_many(&self, model: &str, data: Vec<Document>) -> ConnectorResult<Vec<i64>> {
        let mut registry = self.registry.lock().await;
        self.adapter(&mut registry).create_many(model, data).await
    }

    /// Counts the records of `model` matching `filter`.
    pub async fn count(&self, model: &str, filter: Option<&Document>) -> ConnectorResult<usize> {
        let mut registry = self.registry.lock().await;
        self.adapter(&mut registry).count(model, filter).await
    }

    /// Finds records of `model`.
    pub async fn all(&self, model: &str, find: &FindFilter) -> ConnectorResult<Vec<Document>> {
        let mut registry = self.registry.lock().await;
        self.adapter(&mut registry).find_all(model, find).await
    }

    /// Removes the records of `model` matching `filter`; `None` removes all of them.
    pub async fn destroy_all(&self, model: &str, filter: Option<&Document>) -> ConnectorResult<AffectedCount> {
        let mut registry = self.registry.lock().await;
        self.adapter(&mut registry).remove_all(model, filter).await
    }

    /// Removes the record of `model` with identifier `id`.
    pub async fn destroy(&self, model: &str, id: impl Into<Bson>) -> ConnectorResult<AffectedCount> {
        let mut registry = self.registry.lock().await;
        self.adapter(&mut registry).remove_by_id(model, id).await
    }

    /// Shallow-merges `data` into the records matching `filter` and reports how many.
    pub async fn update(
        &self,
        model: &str,
        filter: Option<&Document>,
        data: Document,
    ) -> ConnectorResult<AffectedCount> {
        let mut registry = self.registry.lock().await;
        let updated = self.adapter(&mut registry).update_where(model, filter, data).await?;

        Ok(AffectedCount::new(updated.len()))
    }

    /// Shallow-merges `data` into the record with identifier `id` and returns it.
    pub async fn update_attributes(
        &self,
        model: &str,
        id: impl Into<Bson>,
        data: Document,
    ) -> ConnectorResult<Option<Document>> {
        let mut registry = self.registry.lock().await;
        self.adapter(&mut registry).update_by_id(model, id, data).await
    }

    /// Replaces the record with identifier `id` by `data` and returns it.
    pub async fn replace_by_id(
        &self,
        model: &str,
        id: impl Into<Bson>,
        data: Document,
    ) -> ConnectorResult<Option<Document>> {
        let mut registry = self.registry.lock().await;
        self.adapter(&mut registry).replace_by_id(model, &id.into(), data).await
    }

    fn adapter<'a>(&'a self, registry: &'a mut CollectionRegistry) -> CollectionAdapter<'a, E> {
        CollectionAdapter::new(&self.engine, registry, self.schema.as_ref(), self.options)
    }
}

/// Fluent builder for [`Connector`].
#[derive(Debug)]
pub struct ConnectorBuilder<E: StoreEngine> {
    engine: E,
    name: Option<String>,
    schema: Option<Arc<dyn ModelSchema>>,
    options: TranslateOptions,
}

impl<E: StoreEngine> ConnectorBuilder<E> {
    /// Creates a builder with an empty schema and default translation options.
    pub fn new(engine: E) -> Self {
        Self {
            engine,
            name: None,
            schema: None,
            options: TranslateOptions::default(),
        }
    }

    /// Sets the data source name.
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Sets the model schema. Defaults to empty [`ModelDefinitions`].
    pub fn schema(mut self, schema: impl ModelSchema + 'static) -> Self {
        self.schema = Some(Arc::new(schema));
        self
    }

    /// Sets how the framework's `lt` is mapped.
    pub fn less_than(mut self, mapping: LessThanMapping) -> Self {
        self.options.less_than = mapping;
        self
    }

    /// Replaces all translation options.
    pub fn options(mut self, options: TranslateOptions) -> Self {
        self.options = options;
        self
    }

    /// Builds the connector. Call [`Connector::connect`] before use.
    pub fn build(self) -> Connector<E> {
        Connector {
            name: self.name,
            engine: self.engine,
            registry: Mutex::new(CollectionRegistry::new()),
            schema: self
                .schema
                .unwrap_or_else(|| Arc::new(ModelDefinitions::new()) as Arc<dyn ModelSchema>),
            options: self.options,
        }
    }
}

/// Builds a connector over the embedded engine from framework settings and connects it.
///
/// ```ignore
/// let connector = doclink::initialize(serde_json::json!({ "file": "app.db" })).await?;
/// ```
pub async fn initialize(settings: serde_json::Value) -> ConnectorResult<Connector<MemoryEngine>> {
    let settings = ConnectorSettings::from_value(settings)?;
    let engine = settings.engine_builder().build().await?;

    let mut builder = Connector::builder(engine)
        .schema(settings.models.clone())
        .options(settings.translate_options());
    if let Some(name) = &settings.name {
        builder = builder.name(name);
    }

    let connector = builder.build();
    connector.connect().await?;

    Ok(connector)
}
