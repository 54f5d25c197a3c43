//! Error types produced by the publish crate.
//!
//! | Error | Raised by | Retryable upstream? |
//! |-------|-----------|---------------------|
//! | [`RegistryError`] | [`RegistryPublisher`](crate::RegistryPublisher) | only `Unavailable` |
//! | [`HeaderError`] | [`decode_header`](crate::decode_header) | no |
//! | [`PublishError`] | [`StreamPublisher`](crate::StreamPublisher) | `Transport`, `Throttled`, `Unacknowledged` |
//!
//! Nothing in this crate retries. The column above is advice for whoever
//! invokes the pipeline again.
use thiserror::Error;
use uuid::Uuid;

/// Registry lookups and registrations that did not yield a schema version.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum RegistryError {
    #[error("schema registry `{registry}` is unavailable: {reason}")]
    Unavailable { registry: String, reason: String },
    #[error("schema `{schema}` is not registered in `{registry}` and auto-registration is disabled")]
    SchemaNotFound { registry: String, schema: String },
    #[error("schema `{schema}` is incompatible with version {latest_version}: {reason}")]
    Incompatible {
        schema: String,
        latest_version: u32,
        reason: String,
    },
    #[error("schema definition for `{schema}` is invalid: {reason}")]
    InvalidDefinition { schema: String, reason: String },
    #[error("registry name must not be empty")]
    EmptyRegistryName,
    #[error("schema version `{0}` does not exist")]
    VersionNotFound(Uuid),
}

/// A wrapped record whose leading bytes are not a registry header.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum HeaderError {
    #[error("record is {len} bytes, shorter than the {expected}-byte header")]
    TooShort { len: usize, expected: usize },
    #[error("unknown header version {0:#04x}")]
    UnknownVersion(u8),
    #[error("unsupported compression byte {0:#04x}")]
    UnsupportedCompression(u8),
}

/// A record that did not reach the stream, or whose delivery is unconfirmed.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum PublishError {
    #[error("stream transport failed: {0}")]
    Transport(String),
    #[error("stream throughput exceeded: {0}")]
    Throttled(String),
    #[error("stream `{stream}` response did not include a {missing}")]
    Unacknowledged { stream: String, missing: &'static str },
    #[error("partition key must be 1..={max} characters, got {len}")]
    InvalidPartitionKey { len: usize, max: usize },
    #[error("record of {size} bytes exceeds the {limit}-byte limit")]
    RecordTooLarge { size: usize, limit: usize },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_name_the_problem() {
        let err = RegistryError::SchemaNotFound {
            registry: "R".into(),
            schema: "s.E".into(),
        };
        assert!(err.to_string().contains("auto-registration is disabled"));
        assert_eq!(
            HeaderError::UnknownVersion(2).to_string(),
            "unknown header version 0x02"
        );
        assert_eq!(
            PublishError::InvalidPartitionKey { len: 0, max: 256 }.to_string(),
            "partition key must be 1..=256 characters, got 0"
        );
    }
}
