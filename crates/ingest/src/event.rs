//! Object-created notifications.
//!
//! Only the parts of an S3-style event the pipeline reads are modelled;
//! everything else in the JSON is ignored.
//!
//! ```json
//! {"Records": [{
//!     "eventSource": "aws:s3",
//!     "eventName": "ObjectCreated:Put",
//!     "eventTime": "2024-01-01T00:00:00.000Z",
//!     "s3": {"bucket": {"name": "inbound"}, "object": {"key": "items/a+b.xml", "size": 42}}
//! }]}
//! ```

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::EventError;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationEvent {
    #[serde(rename = "Records", default)]
    pub records: Vec<NotificationRecord>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event_source: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event_time: Option<DateTime<Utc>>,
    pub s3: S3Entity,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct S3Entity {
    pub bucket: BucketEntity,
    pub object: ObjectEntity,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BucketEntity {
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectEntity {
    /// URL-encoded as delivered by the notification service.
    pub key: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
}

/// Which notification records an invocation processes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordSelection {
    /// Only the first record; the rest are reported as skipped.
    #[default]
    First,
    /// Every record, in order.
    All,
}

/// Bucket and decoded key of one object.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ObjectLocation {
    pub bucket: String,
    pub key: String,
}

impl ObjectLocation {
    pub fn new(bucket: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            key: key.into(),
        }
    }
}

impl fmt::Display for ObjectLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.bucket, self.key)
    }
}

impl NotificationEvent {
    pub fn from_json(text: &str) -> Result<Self, EventError> {
        serde_json::from_str(text).map_err(|err| EventError::InvalidJson(err.to_string()))
    }

    pub fn from_value(value: serde_json::Value) -> Result<Self, EventError> {
        serde_json::from_value(value).map_err(|err| EventError::InvalidJson(err.to_string()))
    }

    /// Resolve the objects to process under `selection`.
    ///
    /// Fails with [`EventError::NoRecords`] on an empty event. Every selected
    /// record must name a bucket and a decodable key.
    pub fn locations(&self, selection: RecordSelection) -> Result<Vec<ObjectLocation>, EventError> {
        if self.records.is_empty() {
            return Err(EventError::NoRecords);
        }
        let take = match selection {
            RecordSelection::First => 1,
            RecordSelection::All => self.records.len(),
        };
        self.records
            .iter()
            .take(take)
            .enumerate()
            .map(|(index, record)| record.location(index))
            .collect()
    }
}

impl NotificationRecord {
    fn location(&self, index: usize) -> Result<ObjectLocation, EventError> {
        let bucket = sanitize(&self.s3.bucket.name);
        if bucket.is_empty() {
            return Err(EventError::MissingBucket { index });
        }
        let key = decode_object_key(&self.s3.object.key)
            .map_err(|reason| EventError::InvalidKey { index, reason })?;
        Ok(ObjectLocation { bucket, key })
    }
}

/// Decode a notification key: `+` is a space, `%XX` a UTF-8 byte.
pub fn decode_object_key(raw: &str) -> Result<String, String> {
    let spaced = raw.replace('+', " ");
    let decoded = urlencoding::decode(&spaced).map_err(|err| err.to_string())?;
    if decoded.is_empty() {
        return Err("key is empty".to_string());
    }
    if decoded.chars().any(char::is_control) {
        return Err("key contains control characters".to_string());
    }
    Ok(decoded.into_owned())
}

fn sanitize(value: &str) -> String {
    value
        .chars()
        .filter(|c| !c.is_control())
        .collect::<String>()
        .trim()
        .to_string()
}
