//! Data-source connector between a model-based data-access framework and an embedded
//! document engine.
//!
//! This crate is the primary entry point of the doclink project. It re-exports the core
//! types from `doclink-core`, ships the embedded engine from `doclink-memory` and provides
//! the connector itself.
//!
//! # Features
//!
//! - **Filter translation** - Framework `where` filters become native engine predicates
//! - **Record shaping** - Engine keys surface as the model identifier, internals stay hidden
//! - **Lazy provisioning** - Collections are created on first insert, with unique custom ids
//! - **Snapshot persistence** - Autoload, periodic autosave and flush on disconnect
//!
//! # Quick Start
//!
//! ```ignore
//! use doclink::prelude::*;
//! use bson::doc;
//! use serde_json::json;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), ConnectorError> {
//!     let connector = doclink::initialize(json!({
//!         "file": "app.db",
//!         "models": { "Product": { "id": "code" } },
//!     }))
//!     .await?;
//!
//!     let id = connector.create("User", doc! { "name": "Alice", "age": 30 }).await?;
//!
//!     let adults = connector
//!         .all("User", &FindFilter::new().filter(doc! { "age": { "gte": 18 } }).order("age desc"))
//!         .await?;
//!     println!("{id}: {adults:?}");
//!
//!     connector.update_attributes("User", id, doc! { "age": 31 }).await?;
//!     connector.destroy("User", id).await?;
//!
//!     connector.shutdown().await?;
//!     Ok(())
//! }
//! ```
//!
//! # Engines
//!
//! - [`memory`] - The embedded in-memory engine with optional snapshot file

pub mod adapter;
pub mod connector;
pub mod prelude;
pub mod registry;
pub mod settings;

pub use doclink_core::{engine, error, filter, identifier, model, record, translate};
pub use connector::{Connector, ConnectorBuilder, initialize};

// Re-export BSON types for convenience
pub use bson;

/// Embedded engine implementations.
pub mod memory {
    pub use doclink_memory::{MemoryEngine, MemoryEngineBuilder};
}
