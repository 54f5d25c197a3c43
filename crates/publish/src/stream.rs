//! Stream transport boundary and the in-memory stream.

use std::sync::{Mutex, PoisonError};

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::PublishError;

/// Largest data blob a single record may carry (1 MiB).
pub const MAX_RECORD_BYTES: usize = 1024 * 1024;
/// Longest accepted partition key, in characters.
pub const MAX_PARTITION_KEY_CHARS: usize = 256;

/// What the transport reported back for one `put_record` call.
///
/// Both fields are optional because a transport may answer without them;
/// the publisher treats that as an unacknowledged write.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PutRecordOutput {
    pub shard_id: Option<String>,
    pub sequence_number: Option<String>,
}

/// Stream transport used by [`StreamPublisher`](crate::StreamPublisher).
///
/// One call is one attempt. Implementations must not retry internally.
pub trait StreamClient: Send + Sync {
    /// `stream_arn`, when given, names the same stream as `stream_name`.
    fn put_record(
        &self,
        stream_name: &str,
        stream_arn: Option<&str>,
        partition_key: &str,
        data: Bytes,
    ) -> Result<PutRecordOutput, PublishError>;
}

/// A record accepted by [`InMemoryStream`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredRecord {
    pub stream_name: String,
    pub stream_arn: Option<String>,
    pub partition_key: String,
    pub shard_id: String,
    pub sequence_number: String,
    pub data: Bytes,
}

/// Failure mode an [`InMemoryStream`] can be told to produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InjectedFailure {
    /// Every call fails with [`PublishError::Transport`].
    Transport,
    /// Every call fails with [`PublishError::Throttled`].
    Throttled,
    /// Calls succeed but the response omits the sequence number.
    MissingSequenceNumber,
}

#[derive(Debug, Default)]
struct StreamState {
    next_sequence: u64,
    records: Vec<StoredRecord>,
    failure: Option<InjectedFailure>,
}

/// Single named stream held in memory.
///
/// The shard is chosen from a SHA-256 of the partition key, so one key always
/// lands on one shard. Sequence numbers are zero-padded to 20 digits and
/// increase across all shards.
#[derive(Debug)]
pub struct InMemoryStream {
    stream_name: String,
    shard_count: u32,
    state: Mutex<StreamState>,
}

impl InMemoryStream {
    pub fn new(stream_name: impl Into<String>, shard_count: u32) -> Self {
        Self {
            stream_name: stream_name.into(),
            shard_count: shard_count.max(1),
            state: Mutex::new(StreamState::default()),
        }
    }

    pub fn stream_name(&self) -> &str {
        &self.stream_name
    }

    pub fn inject_failure(&self, failure: Option<InjectedFailure>) {
        self.lock().failure = failure;
    }

    /// Records accepted so far, in arrival order.
    pub fn records(&self) -> Vec<StoredRecord> {
        self.lock().records.clone()
    }

    pub fn shard_for(&self, partition_key: &str) -> String {
        let digest = Sha256::digest(partition_key.as_bytes());
        let mut head = [0u8; 8];
        head.copy_from_slice(&digest[..8]);
        let shard = u64::from_be_bytes(head) % u64::from(self.shard_count);
        format!("shardId-{shard:012}")
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, StreamState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl StreamClient for InMemoryStream {
    fn put_record(
        &self,
        stream_name: &str,
        stream_arn: Option<&str>,
        partition_key: &str,
        data: Bytes,
    ) -> Result<PutRecordOutput, PublishError> {
        if stream_name != self.stream_name {
            return Err(PublishError::Transport(format!(
                "stream `{stream_name}` not found"
            )));
        }
        if let Some(arn) = stream_arn {
            if arn.rsplit_once(":stream/").map(|(_, name)| name) != Some(stream_name) {
                return Err(PublishError::Transport(format!(
                    "stream ARN `{arn}` does not name stream `{stream_name}`"
                )));
            }
        }
        let shard_id = self.shard_for(partition_key);
        let mut state = self.lock();
        match state.failure {
            Some(InjectedFailure::Transport) => {
                return Err(PublishError::Transport("connection reset".to_string()))
            }
            Some(InjectedFailure::Throttled) => {
                return Err(PublishError::Throttled(format!(
                    "rate exceeded for {shard_id}"
                )))
            }
            _ => {}
        }

        state.next_sequence += 1;
        let sequence_number = format!("{:020}", state.next_sequence);
        state.records.push(StoredRecord {
            stream_name: stream_name.to_string(),
            stream_arn: stream_arn.map(str::to_string),
            partition_key: partition_key.to_string(),
            shard_id: shard_id.clone(),
            sequence_number: sequence_number.clone(),
            data,
        });

        let sequence_number = match state.failure {
            Some(InjectedFailure::MissingSequenceNumber) => None,
            _ => Some(sequence_number),
        };
        Ok(PutRecordOutput {
            shard_id: Some(shard_id),
            sequence_number,
        })
    }
}
