//! Embedded in-memory document engine for doclink.
//!
//! This crate provides a thread-safe implementation of the `StoreEngine` trait. Records live
//! in memory behind async-aware read-write locks; an optional snapshot file gives them
//! durability across restarts.
//!
//! # Features
//!
//! - **Thread-safe access** - Concurrent reads and writes using async-aware RwLock
//! - **Native predicates** - Equality, comparison, set and range operators
//! - **Unique constraints** - Per-collection unique fields, enforced on insert and update
//! - **Snapshot persistence** - Autoload on build, periodic autosave, flush on shutdown
//!
//! # Quick Start
//!
//! ```ignore
//! use doclink_memory::MemoryEngine;
//! use doclink_core::engine::{CollectionOptions, NativeQuery, StoreEngine, StoreEngineBuilder};
//! use bson::doc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let engine = MemoryEngine::builder()
//!         .filename("users.db")
//!         .autoload(true)
//!         .build()
//!         .await?;
//!
//!     engine.create_collection("users", CollectionOptions::default()).await?;
//!     engine.insert_documents(vec![doc! { "name": "Alice" }], "users").await?;
//!
//!     let users = engine
//!         .query_documents(NativeQuery::builder().predicate(doc! { "name": "Alice" }).build(), "users")
//!         .await?;
//!     assert_eq!(users.len(), 1);
//!
//!     engine.shutdown().await?;
//!     Ok(())
//! }
//! ```

#[allow(unused_extern_crates)]
extern crate self as doclink_memory;

pub mod store;
mod evaluator;
mod persistence;

pub use store::{MemoryEngine, MemoryEngineBuilder};
