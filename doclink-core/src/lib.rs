//! Filter translation and record adaptation between a data-access framework and an
//! embedded document engine.
//!
//! This crate is the core of the doclink project and provides:
//!
//! - **Engine boundary** ([`engine`]) - The trait an embedded document engine implements
//! - **Abstract filters** ([`filter`]) - Framework "where" filters parsed into a tagged tree
//! - **Identifier coercion** ([`identifier`]) - Framework identifiers to engine keys
//! - **Filter translation** ([`translate`]) - Framework filters to native engine predicates
//! - **Record shaping** ([`record`]) - Physical records to logical records and back
//! - **Model metadata** ([`model`]) - Identifier field resolution per model
//! - **Error handling** ([`error`]) - Error types and result types
//!
//! # Example
//!
//! ```ignore
//! use doclink_core::{filter::Filter, translate::{translate, TranslateOptions}};
//! use bson::doc;
//!
//! let filter = Filter::parse(&doc! { "id": "42", "age": { "gt": 18 } });
//! let native = translate(&filter, "id", TranslateOptions::default())?;
//!
//! assert_eq!(native, Some(doc! { "$key": 42_i64, "age": { "$gt": 18 } }));
//! ```

#[allow(unused_extern_crates)]
extern crate self as doclink_core;

pub mod engine;
pub mod error;
pub mod filter;
pub mod identifier;
pub mod model;
pub mod record;
pub mod translate;
