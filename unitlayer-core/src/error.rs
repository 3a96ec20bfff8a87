//! Error types and result types for unit store operations.
//!
//! Two layers of errors exist:
//!
//! - [`KindError`] is raised by a single value codec and knows nothing about schemas.
//! - [`UnitStoreError`] is raised by everything above the codecs (record codec, contract,
//!   backends, the orchestration store) and wraps codec failures with the offending
//!   data item.
//!
//! Use [`UnitStoreResult<T>`] as the return type for fallible operations.

use bson::error::Error as BsonError;
use serde_json::Error as SerdeJsonError;
use thiserror::Error;

/// A value did not satisfy the contract of its kind.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum KindError {
    /// The value has the wrong shape for this kind.
    #[error("{kind}: expected {expected}")]
    TypeMismatch {
        kind: &'static str,
        expected: &'static str,
    },
    /// The value has the right shape but lies outside the accepted range.
    #[error("{kind}: {message}")]
    OutOfRange { kind: &'static str, message: String },
    /// The value is a string that does not follow the required format.
    #[error("{kind}: {message}")]
    InvalidFormat { kind: &'static str, message: String },
}

impl KindError {
    pub fn mismatch(kind: &'static str, expected: &'static str) -> Self {
        KindError::TypeMismatch { kind, expected }
    }

    pub fn out_of_range(kind: &'static str, message: impl Into<String>) -> Self {
        KindError::OutOfRange { kind, message: message.into() }
    }

    pub fn invalid_format(kind: &'static str, message: impl Into<String>) -> Self {
        KindError::InvalidFormat { kind, message: message.into() }
    }
}

/// Result type returned by value codecs.
pub type KindResult<T> = Result<T, KindError>;

/// Represents all possible errors that can occur when working with unit types and units.
///
/// Validation and schema-integrity variants are fatal to the single operation and are
/// never retried. Not-found variants are only raised by operations that require the
/// target to exist; plain lookups return `Ok(None)` instead.
#[derive(Error, Debug)]
pub enum UnitStoreError {
    /// Serialization/deserialization error when converting between formats (BSON, JSON).
    #[error("Serialization error: {0}")]
    Serialization(String),
    /// Error during backend initialization or connection setup.
    #[error("Initialization error: {0}")]
    Initialization(String),
    /// A codec rejected the value of a data item.
    #[error("Invalid value for data item \"{item}\": {source}")]
    InvalidValue {
        item: String,
        #[source]
        source: KindError,
    },
    /// A payload is structurally malformed.
    #[error("Validation error: {0}")]
    Validation(String),
    /// A value was keyed by an identifier the unit type does not declare.
    #[error("Unknown data item \"{item}\" for unit type \"{unit_type}\"")]
    UnknownDataItem { item: String, unit_type: String },
    /// A data item flagged `required` has no value.
    #[error("Missing required value for data item \"{0}\"")]
    MissingRequiredValue(String),
    /// Two data items of one unit type share an identifier.
    #[error("Duplicate data item \"{item}\" in unit type \"{unit_type}\"")]
    DuplicateDataItem { item: String, unit_type: String },
    /// A kind with this name is already registered.
    #[error("Kind \"{0}\" is already registered")]
    DuplicateKind(String),
    /// A data item refers to a kind that is not registered.
    #[error("Unknown kind \"{0}\"")]
    UnknownKind(String),
    /// A unit payload names a different unit type than the one it is validated against.
    #[error("Unit type mismatch: expected \"{expected}\", got \"{actual}\"")]
    UnitTypeMismatch { expected: String, actual: String },
    /// The requested unit type does not exist.
    #[error("Unit type not found: {0}")]
    UnitTypeNotFound(String),
    /// The requested unit does not exist.
    #[error("Unit not found: {0}")]
    UnitNotFound(String),
    /// A unit with the given identifier already exists.
    #[error("Unit {0} already exists")]
    UnitAlreadyExists(String),
    /// An error occurred in the underlying storage backend.
    #[error("Backend error: {0}")]
    Backend(String),
}

impl UnitStoreError {
    pub(crate) fn invalid_value(item: &str, source: KindError) -> Self {
        UnitStoreError::InvalidValue { item: item.to_string(), source }
    }

    pub(crate) fn unknown_item(item: &str, unit_type: &str) -> Self {
        UnitStoreError::UnknownDataItem {
            item: item.to_string(),
            unit_type: unit_type.to_string(),
        }
    }
}

/// A specialized `Result` type for unit store operations.
pub type UnitStoreResult<T> = Result<T, UnitStoreError>;

impl From<BsonError> for UnitStoreError {
    fn from(err: BsonError) -> Self {
        UnitStoreError::Serialization(err.to_string())
    }
}

impl From<SerdeJsonError> for UnitStoreError {
    fn from(err: SerdeJsonError) -> Self {
        UnitStoreError::Serialization(err.to_string())
    }
}
