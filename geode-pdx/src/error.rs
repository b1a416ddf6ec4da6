//! Error types for PDX operations.

use thiserror::Error;

use crate::pdx::FieldType;

/// The main error type for PDX operations.
#[derive(Debug, Error)]
pub enum PdxError {
    /// A field name was written twice to the same schema under construction.
    #[error("duplicate field: '{0}'")]
    DuplicateField(String),

    /// An accessor or setter referenced a field absent from the schema.
    #[error("unknown field: '{0}'")]
    UnknownField(String),

    /// The requested logical type disagrees with the schema.
    #[error("field type mismatch for '{field}': expected {expected}, found {actual}")]
    FieldTypeMismatch {
        /// Name of the offending field.
        field: String,
        /// Type the caller asked for or supplied.
        expected: FieldType,
        /// Type recorded in the schema.
        actual: FieldType,
    },

    /// A writer or builder protocol step was called out of order.
    #[error("illegal state: {0}")]
    IllegalState(String),

    /// Deep equality or hashing met a value without a key contract.
    #[error("unsupported key type: {0}")]
    UnsupportedKeyType(String),

    /// The instance only knows a type id that the registry no longer holds.
    #[error("stale type: type id {0} is no longer registered")]
    StaleType(i32),

    /// Malformed or truncated serialized data.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Configuration errors (invalid settings).
    #[error("configuration error: {0}")]
    Configuration(String),
}

impl PdxError {
    pub(crate) fn type_mismatch(field: &str, expected: FieldType, actual: FieldType) -> Self {
        PdxError::FieldTypeMismatch {
            field: field.to_string(),
            expected,
            actual,
        }
    }
}

/// A specialized `Result` type for PDX operations.
pub type Result<T> = std::result::Result<T, PdxError>;
