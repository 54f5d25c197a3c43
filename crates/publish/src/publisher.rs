//! Registration, wrapping and the single publish attempt.

use std::sync::Arc;
use std::time::Instant;

use bytes::Bytes;
use encode::SchemaDescriptor;
use serde::Serialize;
use tracing::{info, warn};
use uuid::Uuid;

use crate::error::{PublishError, RegistryError};
use crate::header::wrap_payload;
use crate::registry::{RegistrationRequest, SchemaRegistry};
use crate::stream::{StreamClient, MAX_PARTITION_KEY_CHARS, MAX_RECORD_BYTES};

/// Header plus Avro datum, ready for the stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedRecord {
    pub data: Bytes,
    pub schema_version_id: Uuid,
    pub version_number: u32,
    pub schema_name: String,
}

/// Where the stream placed a record. Used for logging only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PublishResult {
    pub stream_name: String,
    pub shard_id: String,
    pub sequence_number: String,
}

/// Resolves schema versions and frames encoded payloads with their header.
#[derive(Clone)]
pub struct RegistryPublisher {
    registry: Arc<dyn SchemaRegistry>,
    registry_name: String,
    auto_register: bool,
}

impl RegistryPublisher {
    pub fn new(
        registry: Arc<dyn SchemaRegistry>,
        registry_name: impl Into<String>,
        auto_register: bool,
    ) -> Self {
        Self {
            registry,
            registry_name: registry_name.into(),
            auto_register,
        }
    }

    pub fn registry_name(&self) -> &str {
        &self.registry_name
    }

    /// Registry key for `schema` when published on `stream`.
    pub fn schema_key(stream: &str, schema: &SchemaDescriptor) -> String {
        format!("{stream}.{}", schema.name)
    }

    /// Resolve `schema` in the registry and prefix `encoded` with its header.
    pub fn register_and_wrap(
        &self,
        schema: &SchemaDescriptor,
        encoded: &[u8],
        stream: &str,
    ) -> Result<EncodedRecord, RegistryError> {
        let start = Instant::now();
        let request = RegistrationRequest {
            registry_name: self.registry_name.clone(),
            schema_name: Self::schema_key(stream, schema),
            data_format: schema.data_format,
            definition: schema.definition.clone(),
            auto_register: self.auto_register,
        };

        let version = match self.registry.get_or_register(&request) {
            Ok(version) => version,
            Err(err) => {
                let elapsed_micros = start.elapsed().as_micros();
                warn!(
                    registry = %self.registry_name,
                    schema = %request.schema_name,
                    error = %err,
                    elapsed_micros,
                    "registry_failure"
                );
                return Err(err);
            }
        };

        let data = wrap_payload(version.version_id, encoded);
        let elapsed_micros = start.elapsed().as_micros();
        info!(
            registry = %self.registry_name,
            schema = %version.schema_name,
            version = version.version_number,
            version_id = %version.version_id,
            wrapped_len = data.len(),
            elapsed_micros,
            "registry_success"
        );
        Ok(EncodedRecord {
            data,
            schema_version_id: version.version_id,
            version_number: version.version_number,
            schema_name: version.schema_name,
        })
    }
}

/// Sends wrapped records to one named stream, once.
#[derive(Clone)]
pub struct StreamPublisher {
    client: Arc<dyn StreamClient>,
    stream_name: String,
    stream_arn: Option<String>,
}

impl StreamPublisher {
    pub fn new(client: Arc<dyn StreamClient>, stream_name: impl Into<String>) -> Self {
        Self {
            client,
            stream_name: stream_name.into(),
            stream_arn: None,
        }
    }

    /// Send `stream_arn` alongside the stream name on every put.
    pub fn with_stream_arn(mut self, stream_arn: Option<String>) -> Self {
        self.stream_arn = stream_arn;
        self
    }

    pub fn stream_name(&self) -> &str {
        &self.stream_name
    }

    pub fn stream_arn(&self) -> Option<&str> {
        self.stream_arn.as_deref()
    }

    /// Put `record` on the stream under `partition_key`.
    ///
    /// Size and key limits are checked before the transport is called. A
    /// response without a shard id or sequence number is an error because
    /// the write cannot be confirmed.
    pub fn publish(
        &self,
        record: &EncodedRecord,
        partition_key: &str,
    ) -> Result<PublishResult, PublishError> {
        let start = Instant::now();
        let result = self.publish_inner(record, partition_key);
        let elapsed_micros = start.elapsed().as_micros();
        match &result {
            Ok(placed) => info!(
                stream = %placed.stream_name,
                shard_id = %placed.shard_id,
                sequence_number = %placed.sequence_number,
                bytes = record.data.len(),
                elapsed_micros,
                "publish_success"
            ),
            Err(err) => warn!(
                stream = %self.stream_name,
                error = %err,
                elapsed_micros,
                "publish_failure"
            ),
        }
        result
    }

    fn publish_inner(
        &self,
        record: &EncodedRecord,
        partition_key: &str,
    ) -> Result<PublishResult, PublishError> {
        let key_len = partition_key.chars().count();
        if key_len == 0 || key_len > MAX_PARTITION_KEY_CHARS {
            return Err(PublishError::InvalidPartitionKey {
                len: key_len,
                max: MAX_PARTITION_KEY_CHARS,
            });
        }
        if record.data.len() > MAX_RECORD_BYTES {
            return Err(PublishError::RecordTooLarge {
                size: record.data.len(),
                limit: MAX_RECORD_BYTES,
            });
        }

        let output = self.client.put_record(
            &self.stream_name,
            self.stream_arn.as_deref(),
            partition_key,
            record.data.clone(),
        )?;
        let shard_id = output.shard_id.ok_or_else(|| PublishError::Unacknowledged {
            stream: self.stream_name.clone(),
            missing: "shard id",
        })?;
        let sequence_number = output
            .sequence_number
            .ok_or_else(|| PublishError::Unacknowledged {
                stream: self.stream_name.clone(),
                missing: "sequence number",
            })?;
        Ok(PublishResult {
            stream_name: self.stream_name.clone(),
            shard_id,
            sequence_number,
        })
    }
}
