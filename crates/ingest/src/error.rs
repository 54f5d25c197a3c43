//! Error types produced by the ingest crate.
//!
//! # Error Categories
//!
//! | Error | Stage | Description |
//! |-------|-------|-------------|
//! | [`EventError`] | Received | Notification JSON unusable or names no object |
//! | [`FetchError`] | Fetched | Object could not be read as UTF-8 text |
//!
//! # Examples
//!
//! ```rust
//! use ingest::{NotificationEvent, EventError};
//!
//! let event = NotificationEvent::from_json(r#"{"Records":[]}"#).unwrap();
//! assert_eq!(event.locations(Default::default()), Err(EventError::NoRecords));
//! ```
use thiserror::Error;

/// A notification that does not identify an object to process.
///
/// The enum is marked `#[non_exhaustive]`; callers should include a
/// catch-all arm when matching.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum EventError {
    /// The event body is not a notification document.
    #[error("notification is not valid JSON: {0}")]
    InvalidJson(String),
    /// The event carries an empty `Records` array.
    #[error("notification contains no records")]
    NoRecords,
    /// A record names an empty bucket.
    #[error("record {index} has an empty bucket name")]
    MissingBucket { index: usize },
    /// A record's object key is empty or cannot be decoded.
    #[error("record {index} has an unusable object key: {reason}")]
    InvalidKey { index: usize, reason: String },
}

/// Failure to read an object as text.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum FetchError {
    #[error("object `{key}` not found in bucket `{bucket}`")]
    NotFound { bucket: String, key: String },
    /// The key cannot be mapped onto the store, e.g. it escapes the root.
    #[error("object key `{key}` is not allowed: {reason}")]
    InvalidKey { key: String, reason: String },
    #[error("object `{bucket}/{key}` is not valid UTF-8 (valid up to byte {valid_up_to})")]
    InvalidUtf8 {
        bucket: String,
        key: String,
        valid_up_to: usize,
    },
    #[error("object store I/O error: {0}")]
    Io(String),
    #[error("object store unavailable: {0}")]
    Unavailable(String),
}
