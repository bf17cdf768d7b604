//! Storage engine abstraction for the connector.
//!
//! This module defines the boundary between the connector and the embedded document
//! engine that actually holds the records. The connector only ever talks to an engine
//! through [`StoreEngine`], which keeps the filter translation and record shaping layers
//! independent from the engine implementation.
//!
//! # Physical records
//!
//! Records handed out by an engine are *physical* records: besides the caller's fields they
//! carry a surrogate key under [`KEY_FIELD`] and a bookkeeping block under [`META_FIELD`].
//! The connector never lets either of those reach its own callers (see [`crate::record`]).
//!
//! # Native queries
//!
//! Engines are queried with a [`NativeQuery`]: an optional native predicate followed by
//! chain-style modifiers (sort, skip, take) applied in that order.
//!
//! ```ignore
//! use doclink_core::engine::{NativeQuery, SortDirection};
//! use bson::doc;
//!
//! let query = NativeQuery::builder()
//!     .predicate(doc! { "age": { "$gt": 18 } })
//!     .sort("age", SortDirection::Desc)
//!     .offset(1)
//!     .limit(2)
//!     .build();
//! ```

use async_trait::async_trait;
use bson::Document;
use serde::{Deserialize, Serialize};
use std::fmt::Debug;

use crate::error::EngineResult;

/// Field holding the engine-assigned surrogate key of a physical record.
pub const KEY_FIELD: &str = "$key";

/// Field holding the engine's revision bookkeeping of a physical record.
pub const META_FIELD: &str = "meta";

/// Prefix the engine reserves for its own field names and predicate operators.
pub const RESERVED_PREFIX: &str = "$";

/// Identifier field name a model uses unless its definition overrides it.
pub const DEFAULT_ID_FIELD: &str = "id";

/// Sort direction for query results.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    /// Ascending order (missing and null values first).
    Asc,
    /// Descending order.
    Desc,
}

/// One key of a (possibly compound) sort.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortKey {
    /// The field name to sort by.
    pub field: String,
    /// The sort direction.
    pub direction: SortDirection,
}

/// A query in the engine's native form.
///
/// The predicate is applied first, then the sort keys in order of significance, then
/// `offset`, then `limit`. An absent predicate matches every record.
#[derive(Debug, Clone, Default)]
pub struct NativeQuery {
    /// Optional native predicate; `None` matches all records.
    pub predicate: Option<Document>,
    /// Sort keys, most significant first.
    pub sort: Vec<SortKey>,
    /// Number of records to skip.
    pub offset: Option<usize>,
    /// Maximum number of records to return.
    pub limit: Option<usize>,
}

impl NativeQuery {
    /// Creates a query matching every record, unsorted and unbounded.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a new query builder for fluent construction.
    pub fn builder() -> NativeQueryBuilder {
        NativeQueryBuilder::new()
    }
}

/// Fluent builder for [`NativeQuery`].
#[derive(Debug, Clone, Default)]
pub struct NativeQueryBuilder {
    query: NativeQuery,
}

impl NativeQueryBuilder {
    /// Creates a new query builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the native predicate. Passing `None` keeps the "match all" behavior.
    pub fn predicate(mut self, predicate: impl Into<Option<Document>>) -> Self {
        self.query.predicate = predicate.into();
        self
    }

    /// Appends a sort key; earlier keys take precedence.
    pub fn sort(mut self, field: impl Into<String>, direction: SortDirection) -> Self {
        self.query.sort.push(SortKey { field: field.into(), direction });
        self
    }

    /// Sets the number of records to skip.
    pub fn offset(mut self, offset: usize) -> Self {
        self.query.offset = Some(offset);
        self
    }

    /// Sets the maximum number of records to return.
    pub fn limit(mut self, limit: usize) -> Self {
        self.query.limit = Some(limit);
        self
    }

    /// Builds and returns the final query.
    pub fn build(self) -> NativeQuery {
        self.query
    }
}

/// Provisioning options of an engine collection.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectionOptions {
    /// Fields whose non-null values must be unique across the collection.
    #[serde(default)]
    pub unique: Vec<String>,
}

impl CollectionOptions {
    /// Options enforcing uniqueness on the given fields.
    pub fn unique<I, S>(fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self { unique: fields.into_iter().map(Into::into).collect() }
    }
}

/// Abstract interface for embedded document engines.
///
/// Implementers hold named collections of physical records. Every record stored in a
/// collection is identified by an engine-assigned integer key stored under [`KEY_FIELD`];
/// the key is immutable once assigned.
///
/// # Error Handling
///
/// Operations return [`EngineResult<T>`](crate::error::EngineResult). Operations addressing
/// a collection that does not exist return
/// [`EngineError::CollectionNotFound`](crate::error::EngineError::CollectionNotFound), except
/// the read-only ones (`get_documents`, `query_documents`, `count_documents`) which treat
/// a missing collection as empty.
#[async_trait]
pub trait StoreEngine: Send + Sync + Debug {
    /// Creates a collection with the given options. Creating an existing collection is a
    /// no-op and leaves its original options untouched.
    async fn create_collection(&self, name: &str, options: CollectionOptions) -> EngineResult<()>;

    /// Returns the options of a collection, or `None` if it does not exist.
    async fn describe_collection(&self, name: &str) -> EngineResult<Option<CollectionOptions>>;

    /// Lists the names of all collections.
    async fn list_collections(&self) -> EngineResult<Vec<String>>;

    /// Inserts new records and returns their assigned keys, in input order.
    ///
    /// The batch is applied atomically: if any record violates a constraint nothing is
    /// inserted.
    async fn insert_documents(
        &self,
        documents: Vec<Document>,
        collection: &str,
    ) -> EngineResult<Vec<i64>>;

    /// Replaces stored records, matched by the key each document carries under
    /// [`KEY_FIELD`], and returns the records as stored.
    async fn update_documents(
        &self,
        documents: Vec<Document>,
        collection: &str,
    ) -> EngineResult<Vec<Document>>;

    /// Deletes the records with the given keys and returns how many were removed.
    /// Unknown keys are skipped.
    async fn delete_documents(&self, keys: Vec<i64>, collection: &str) -> EngineResult<usize>;

    /// Retrieves records by key, in collection order. Unknown keys are omitted.
    async fn get_documents(&self, keys: Vec<i64>, collection: &str) -> EngineResult<Vec<Document>>;

    /// Runs a native query against a collection.
    async fn query_documents(
        &self,
        query: NativeQuery,
        collection: &str,
    ) -> EngineResult<Vec<Document>>;

    /// Counts the records matching a native predicate (`None` counts every record).
    async fn count_documents(
        &self,
        predicate: Option<Document>,
        collection: &str,
    ) -> EngineResult<usize>;

    /// Writes pending in-memory state to durable storage, if the engine has any.
    async fn flush(&self) -> EngineResult<()> {
        Ok(())
    }

    /// Cleanly shuts down the engine, releasing all resources.
    async fn shutdown(self) -> EngineResult<()>
    where
        Self: Sized,
    {
        self.flush().await
    }
}

/// Factory trait for creating engine instances.
#[async_trait]
pub trait StoreEngineBuilder: Send {
    /// The engine produced by this builder.
    type Engine: StoreEngine;

    /// Builds the engine, performing any loading it is configured for.
    async fn build(self) -> EngineResult<Self::Engine>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::doc;

    #[test]
    fn builder_keeps_sort_keys_in_order() {
        let query = NativeQuery::builder()
            .predicate(doc! { "age": { "$gt": 1 } })
            .sort("age", SortDirection::Desc)
            .sort("name", SortDirection::Asc)
            .offset(1)
            .limit(2)
            .build();

        assert_eq!(query.predicate, Some(doc! { "age": { "$gt": 1 } }));
        assert_eq!(query.sort[0].field, "age");
        assert_eq!(query.sort[1].direction, SortDirection::Asc);
        assert_eq!(query.offset, Some(1));
        assert_eq!(query.limit, Some(2));
    }

    #[test]
    fn default_query_matches_everything() {
        let query = NativeQuery::new();

        assert!(query.predicate.is_none());
        assert!(query.sort.is_empty());
        assert!(query.offset.is_none() && query.limit.is_none());
    }
}
