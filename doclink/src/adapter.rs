//! Framework operations over one engine collection per model.
//!
//! A [`CollectionAdapter`] borrows the engine, the connector's [`CollectionRegistry`] and
//! the model schema for the duration of one operation. It translates framework filters into
//! native predicates, keeps engine-internal fields away from callers and provisions the
//! model's collection on first insert.
//!
//! Reads, counts, removals and updates against a model whose collection does not exist yet
//! report an empty result rather than an error and never create the collection.

use bson::{Bson, Document};
use serde::{Deserialize, Serialize};
use tracing::debug;

use doclink_core::{
    engine::{KEY_FIELD, NativeQuery, SortDirection, SortKey, StoreEngine},
    error::{ConnectorResult, EngineError},
    filter::Filter,
    identifier::coerce_id,
    model::ModelSchema,
    record::{merge, replace_fields, sanitize, to_logical, to_logical_all},
    translate::{TranslateOptions, translate},
};

use crate::registry::CollectionRegistry;

/// Number of records affected by a bulk operation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AffectedCount {
    /// How many records matched the operation's filter.
    pub count: usize,
}

impl AffectedCount {
    /// Creates a count of `count` affected records.
    pub fn new(count: usize) -> Self {
        Self { count }
    }
}

/// Ordering directive: a single `"field [asc|desc]"` or a list of them, most significant
/// first.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Order {
    /// A single directive, e.g. `"age desc"`.
    One(String),
    /// Several directives, most significant first.
    Many(Vec<String>),
}

impl Order {
    /// Parses the directive into sort keys. The direction is descending only when the
    /// second token is `desc` in any case; a bare field name sorts ascending.
    pub fn sort_keys(&self) -> Vec<SortKey> {
        let directives = match self {
            Order::One(directive) => std::slice::from_ref(directive),
            Order::Many(directives) => directives.as_slice(),
        };

        directives
            .iter()
            .filter_map(|directive| {
                let mut tokens = directive.split_whitespace();
                let field = tokens.next()?;
                let direction = match tokens.next() {
                    Some(token) if token.eq_ignore_ascii_case("desc") => SortDirection::Desc,
                    _ => SortDirection::Asc,
                };

                Some(SortKey { field: field.to_string(), direction })
            })
            .collect()
    }
}

/// Filter of a `find` call as sent by the framework.
///
/// ```ignore
/// let filter: FindFilter = serde_json::from_value(serde_json::json!({
///     "where": { "age": { "gt": 18 } },
///     "order": "age desc",
///     "skip": 1,
///     "limit": 2,
/// }))?;
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FindFilter {
    /// Abstract filter; absent matches every record.
    #[serde(rename = "where", default, skip_serializing_if = "Option::is_none")]
    pub filter: Option<Document>,
    /// Ordering directive; absent keeps collection order.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order: Option<Order>,
    /// Number of records to skip; zero defers to `offset`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub skip: Option<usize>,
    /// Same as `skip`; `skip` wins when both are set.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub offset: Option<usize>,
    /// Maximum number of records; zero means no limit.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<usize>,
}

impl FindFilter {
    /// Creates a filter matching every record, unordered and unbounded.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the `where` filter.
    pub fn filter(mut self, filter: Document) -> Self {
        self.filter = Some(filter);
        self
    }

    /// Sets a single ordering directive.
    pub fn order(mut self, order: impl Into<String>) -> Self {
        self.order = Some(Order::One(order.into()));
        self
    }

    /// Sets the number of records to skip.
    pub fn skip(mut self, skip: usize) -> Self {
        self.skip = Some(skip);
        self
    }

    /// Sets the maximum number of records.
    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Records to skip: the first non-zero of `skip` and `offset`.
    pub fn effective_offset(&self) -> Option<usize> {
        self.skip
            .filter(|skip| *skip > 0)
            .or(self.offset.filter(|offset| *offset > 0))
    }

    /// Records to return at most, if bounded.
    pub fn effective_limit(&self) -> Option<usize> {
        self.limit.filter(|limit| *limit > 0)
    }
}

/// Operations of one connector against its engine, scoped to a single call.
///
/// # Example
///
/// ```ignore
/// let mut registry = CollectionRegistry::new();
/// let schema = ModelDefinitions::new();
/// let mut adapter = CollectionAdapter::new(&engine, &mut registry, &schema, TranslateOptions::default());
///
/// let id = adapter.create("User", doc! { "name": "a" }).await?;
/// let count = adapter.count("User", None).await?;
/// ```
pub struct CollectionAdapter<'a, E: StoreEngine> {
    engine: &'a E,
    registry: &'a mut CollectionRegistry,
    schema: &'a dyn ModelSchema,
    options: TranslateOptions,
}

impl<'a, E: StoreEngine> CollectionAdapter<'a, E> {
    /// Creates an adapter borrowing the connector's engine, registry and schema.
    pub fn new(
        engine: &'a E,
        registry: &'a mut CollectionRegistry,
        schema: &'a dyn ModelSchema,
        options: TranslateOptions,
    ) -> Self {
        Self { engine, registry, schema, options }
    }

    /// Provisions the collection of `model` if it does not exist yet.
    pub async fn ensure_collection(&mut self, model: &str) -> ConnectorResult<()> {
        let id_field = self.schema.id_name(model);
        self.registry.ensure(self.engine, model, &id_field).await?;
        Ok(())
    }

    /// Inserts one record as given and returns its identifier.
    pub async fn create(&mut self, model: &str, record: Document) -> ConnectorResult<i64> {
        self.create_many(model, vec![record])
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| EngineError::InvalidDocument("no key assigned to inserted record".to_string()).into())
    }

    /// Inserts records as given and returns their identifiers, in input order.
    pub async fn create_many(&mut self, model: &str, records: Vec<Document>) -> ConnectorResult<Vec<i64>> {
        self.ensure_collection(model).await?;

        let keys = self.engine.insert_documents(records, model).await?;
        debug!(target: "doclink::adapter", model, keys = ?keys, "Created");

        Ok(keys)
    }

    /// Counts the records matching `filter`.
    pub async fn count(&mut self, model: &str, filter: Option<&Document>) -> ConnectorResult<usize> {
        if !self.exists(model).await? {
            return Ok(0);
        }

        let predicate = self.predicate(model, filter)?;

        Ok(self.engine.count_documents(predicate, model).await?)
    }

    /// Finds records: filter, then order, then offset, then limit.
    pub async fn find_all(&mut self, model: &str, find: &FindFilter) -> ConnectorResult<Vec<Document>> {
        if !self.exists(model).await? {
            return Ok(vec![]);
        }

        let predicate = self.predicate(model, find.filter.as_ref())?;

        let id_field = self.schema.id_name(model);
        let mut query = NativeQuery::builder().predicate(predicate);
        for key in find.order.as_ref().map(Order::sort_keys).unwrap_or_default() {
            // The identifier only exists as the engine key on stored records.
            let field = if key.field == id_field { KEY_FIELD.to_string() } else { key.field };
            query = query.sort(field, key.direction);
        }
        if let Some(offset) = find.effective_offset() {
            query = query.offset(offset);
        }
        if let Some(limit) = find.effective_limit() {
            query = query.limit(limit);
        }

        let records = self.engine.query_documents(query.build(), model).await?;
        debug!(target: "doclink::adapter", model, count = records.len(), "Found");

        Ok(to_logical_all(records, &id_field))
    }

    /// Removes the records matching `filter` and reports how many matched.
    ///
    /// A missing collection reports zero without looking at `filter`.
    pub async fn remove_all(&mut self, model: &str, filter: Option<&Document>) -> ConnectorResult<AffectedCount> {
        if !self.exists(model).await? {
            return Ok(AffectedCount::default());
        }

        let predicate = self.predicate(model, filter)?;

        let matched = self
            .engine
            .query_documents(NativeQuery::builder().predicate(predicate).build(), model)
            .await?;
        let keys = matched
            .iter()
            .filter_map(|record| record.get_i64(KEY_FIELD).ok())
            .collect::<Vec<_>>();
        let count = keys.len();

        if count > 0 {
            self.engine.delete_documents(keys, model).await?;
        }
        debug!(target: "doclink::adapter", model, count, "Removed");

        Ok(AffectedCount::new(count))
    }

    /// Removes the record whose identifier is `id`.
    pub async fn remove_by_id(&mut self, model: &str, id: impl Into<Bson>) -> ConnectorResult<AffectedCount> {
        let filter = self.id_filter(model, id.into());
        self.remove_all(model, Some(&filter)).await
    }

    /// Shallow-merges `payload` into every record matching `filter`.
    ///
    /// The identifier, metadata and engine-reserved fields of `payload` are ignored. Returns
    /// the updated records as stored.
    pub async fn update_where(
        &mut self,
        model: &str,
        filter: Option<&Document>,
        payload: Document,
    ) -> ConnectorResult<Vec<Document>> {
        if !self.exists(model).await? {
            return Ok(vec![]);
        }

        let payload = sanitize(payload, &self.schema.id_name(model));
        let predicate = self.predicate(model, filter)?;

        let merged = self
            .engine
            .query_documents(NativeQuery::builder().predicate(predicate).build(), model)
            .await?
            .into_iter()
            .map(|record| merge(record, &payload))
            .collect::<Vec<_>>();

        if merged.is_empty() {
            return Ok(vec![]);
        }

        let updated = self.engine.update_documents(merged, model).await?;
        debug!(target: "doclink::adapter", model, count = updated.len(), "Updated");

        Ok(updated)
    }

    /// Shallow-merges `payload` into the record whose identifier is `id` and returns it.
    pub async fn update_by_id(
        &mut self,
        model: &str,
        id: impl Into<Bson>,
        payload: Document,
    ) -> ConnectorResult<Option<Document>> {
        let filter = self.id_filter(model, id.into());

        Ok(
            self.update_where(model, Some(&filter), payload)
                .await?
                .into_iter()
                .next()
                .map(|record| to_logical(record, &self.schema.id_name(model)))
        )
    }

    /// Replaces every field of the record whose identifier is `id` with `payload`.
    ///
    /// Unlike [`update_where`](Self::update_where), fields absent from `payload` are
    /// dropped. Returns `None` when there is no such record.
    pub async fn replace_by_id(
        &mut self,
        model: &str,
        id: &Bson,
        payload: Document,
    ) -> ConnectorResult<Option<Document>> {
        if !self.exists(model).await? {
            return Ok(None);
        }

        let key = coerce_id(id)?;
        let id_field = self.schema.id_name(model);
        let payload = sanitize(payload, &id_field);

        let Some(record) = self.engine.get_documents(vec![key], model).await?.into_iter().next() else {
            return Ok(None);
        };

        let replaced = self
            .engine
            .update_documents(vec![replace_fields(record, &payload)], model)
            .await?;
        debug!(target: "doclink::adapter", model, key, "Replaced");

        Ok(replaced.into_iter().next().map(|record| to_logical(record, &id_field)))
    }

    async fn exists(&mut self, model: &str) -> ConnectorResult<bool> {
        Ok(self.registry.lookup(self.engine, model).await?.is_some())
    }

    fn predicate(&self, model: &str, filter: Option<&Document>) -> ConnectorResult<Option<Document>> {
        match filter {
            Some(filter) => translate(&Filter::parse(filter), &self.schema.id_name(model), self.options),
            None => Ok(None),
        }
    }

    fn id_filter(&self, model: &str, id: Bson) -> Document {
        let mut filter = Document::new();
        filter.insert(self.schema.id_name(model), id);
        filter
    }
}
