//! Error types produced by the encode crate.
//!
//! | Error | Raised by | Meaning |
//! |-------|-----------|---------|
//! | [`SchemaDerivationError`] | [`derive_schema`](crate::derive_schema) | template unusable or sample cannot satisfy it |
//! | [`EncodingError`] | [`encode`](crate::encode) | text does not conform to the resolved schema |
use canonical::InterchangeError;
use thiserror::Error;

/// Failure to produce a registrable schema from the template and a sample.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum SchemaDerivationError {
    #[error("schema template is not a valid Avro schema: {0}")]
    InvalidTemplate(String),
    #[error("schema template uses an unsupported construct: {0}")]
    UnsupportedTemplate(String),
    #[error("schema name must not be empty")]
    EmptySchemaName,
    #[error("sample payload is not valid interchange text: {0}")]
    InvalidSample(#[from] InterchangeError),
    #[error("sample payload lacks required field `{field}`")]
    MissingField { field: String },
    #[error("sample value `{value}` for field `{field}` cannot satisfy type {expected}")]
    Unsatisfiable {
        field: String,
        expected: &'static str,
        value: String,
    },
}

/// Failure to encode interchange text under a resolved schema.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum EncodingError {
    #[error("schema `{name}` cannot be used for encoding: {reason}")]
    InvalidSchema { name: String, reason: String },
    #[error("payload is not valid interchange text: {0}")]
    MalformedPayload(#[from] InterchangeError),
    #[error("required field `{field}` is missing")]
    MissingField { field: String },
    #[error("field `{field}` expects {expected}, got `{value}`")]
    TypeMismatch {
        field: String,
        expected: &'static str,
        value: String,
    },
    #[error("avro serialization failed: {0}")]
    Avro(String),
}
