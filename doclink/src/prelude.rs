//! Convenient re-exports of commonly used types from doclink.
//!
//! ```ignore
//! use doclink::prelude::*;
//! ```

pub use doclink_core::{
    engine::{CollectionOptions, NativeQuery, SortDirection, StoreEngine, StoreEngineBuilder},
    error::{ConnectorError, ConnectorResult, EngineError, EngineResult},
    filter::{Filter, Operator},
    model::{ModelDefinition, ModelDefinitions, ModelSchema},
    translate::{LessThanMapping, TranslateOptions},
};
pub use doclink_memory::MemoryEngine;

pub use crate::{
    adapter::{AffectedCount, FindFilter, Order},
    connector::{Connector, ConnectorBuilder},
    settings::ConnectorSettings,
};
