//! Error types and result types for connector and engine operations.
//!
//! Two layers of errors exist:
//!
//! - [`EngineError`] is raised by a [`StoreEngine`](crate::engine::StoreEngine) implementation.
//! - [`ConnectorError`] is what every connector operation reports to its caller. Engine
//!   failures are wrapped unchanged in [`ConnectorError::EngineFailure`].
//!
//! Use [`ConnectorResult<T>`] and [`EngineResult<T>`] as the return types for fallible
//! operations.

use bson::error::Error as BsonError;
use serde_json::Error as SerdeJsonError;
use thiserror::Error;

/// Represents all possible errors raised by a storage engine.
#[derive(Error, Debug)]
pub enum EngineError {
    /// A write would store a second record with the same value in a unique field.
    #[error("Duplicate value {value} for unique field {field} in collection {collection}")]
    UniqueViolation {
        /// The collection holding the constraint.
        collection: String,
        /// The unique-constrained field.
        field: String,
        /// The offending value, rendered for display.
        value: String,
    },
    /// The requested collection does not exist in the engine.
    #[error("Collection not found: {0}")]
    CollectionNotFound(String),
    /// No record with the given surrogate key exists in the collection.
    /// The first argument is the key, the second is the collection name.
    #[error("Document {0} not found in collection {1}")]
    DocumentNotFound(i64, String),
    /// The record has an invalid structure for the requested operation.
    #[error("Invalid document: {0}")]
    InvalidDocument(String),
    /// The native predicate cannot be evaluated.
    #[error("Invalid predicate: {0}")]
    InvalidPredicate(String),
    /// Reading or writing the persisted snapshot failed.
    #[error("Persistence error: {0}")]
    Persistence(String),
    /// Serialization/deserialization error when converting between formats.
    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// Represents all possible errors reported by connector operations.
#[derive(Error, Debug)]
pub enum ConnectorError {
    /// A value used as a record identifier is neither an integer nor a digit-only string.
    #[error("Invalid id {0}")]
    InvalidIdentifier(String),
    /// The filter uses an operator the engine has no native equivalent for.
    #[error("Unsupported operator {0} in where filter")]
    UnsupportedOperator(String),
    /// The underlying engine call failed.
    #[error(transparent)]
    EngineFailure(#[from] EngineError),
    /// Connector settings could not be read.
    #[error("Configuration error: {0}")]
    Configuration(String),
}

/// A specialized `Result` type for engine operations.
pub type EngineResult<T> = Result<T, EngineError>;

/// A specialized `Result` type for connector operations.
///
/// This type alias is used throughout the workspace to indicate operations that may fail
/// with a [`ConnectorError`].
pub type ConnectorResult<T> = Result<T, ConnectorError>;

impl From<BsonError> for EngineError {
    fn from(err: BsonError) -> Self {
        EngineError::Serialization(err.to_string())
    }
}

impl From<std::io::Error> for EngineError {
    fn from(err: std::io::Error) -> Self {
        EngineError::Persistence(err.to_string())
    }
}

impl From<SerdeJsonError> for ConnectorError {
    fn from(err: SerdeJsonError) -> Self {
        ConnectorError::Configuration(err.to_string())
    }
}

impl From<BsonError> for ConnectorError {
    fn from(err: BsonError) -> Self {
        ConnectorError::EngineFailure(err.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn engine_failures_pass_through_unchanged() {
        let err: ConnectorError = EngineError::CollectionNotFound("users".into()).into();

        assert!(matches!(
            err,
            ConnectorError::EngineFailure(EngineError::CollectionNotFound(ref name)) if name == "users"
        ));
        assert_eq!(err.to_string(), "Collection not found: users");
    }

    #[test]
    fn unsupported_operator_names_the_operator() {
        let err = ConnectorError::UnsupportedOperator("nor".into());

        assert_eq!(err.to_string(), "Unsupported operator nor in where filter");
    }
}
