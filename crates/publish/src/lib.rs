//! docstream publish layer.
//!
//! The last two pipeline stages:
//!
//! 1. [`RegistryPublisher::register_and_wrap`] resolves the schema version in
//!    a [`SchemaRegistry`] and frames the Avro datum with the 18-byte registry
//!    header ([`wrap_payload`] / [`decode_header`]).
//! 2. [`StreamPublisher::publish`] makes exactly one `put_record` call on a
//!    [`StreamClient`] and reports where the record landed.
//!
//! Neither stage retries. Registry and stream are traits; the in-memory
//! implementations ([`InMemoryRegistry`], [`InMemoryStream`]) back local runs
//! and tests and can be switched into failure modes.
//!
//! ```rust
//! use std::sync::Arc;
//! use encode::{DataFormat, SchemaDescriptor};
//! use publish::{InMemoryRegistry, InMemoryStream, RegistryPublisher, StreamPublisher};
//!
//! let schema = SchemaDescriptor {
//!     name: "InventoryEvent".into(),
//!     data_format: DataFormat::Avro,
//!     definition: r#"{"fields":[{"name":"sku","type":"string"}],"name":"E","type":"record"}"#.into(),
//! };
//! let registry = RegistryPublisher::new(Arc::new(InMemoryRegistry::new()), "InventoryEventSchemas", true);
//! let stream = Arc::new(InMemoryStream::new("inventory", 1));
//! let publisher = StreamPublisher::new(stream.clone(), "inventory");
//!
//! let record = registry.register_and_wrap(&schema, &[0x06, b'A', b'B', b'C'], "inventory")?;
//! let placed = publisher.publish(&record, "partitionKey-1")?;
//! assert_eq!(placed.sequence_number, "00000000000000000001");
//! assert_eq!(stream.records().len(), 1);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

mod error;
mod header;
mod publisher;
mod registry;
mod stream;

pub use crate::error::{HeaderError, PublishError, RegistryError};
pub use crate::header::{
    decode_header, wrap_payload, RecordHeader, COMPRESSION_NONE, HEADER_LEN, HEADER_VERSION,
};
pub use crate::publisher::{EncodedRecord, PublishResult, RegistryPublisher, StreamPublisher};
pub use crate::registry::{
    Compatibility, InMemoryRegistry, RegistrationRequest, SchemaRegistry, SchemaVersion,
};
pub use crate::stream::{
    InMemoryStream, InjectedFailure, PutRecordOutput, StoredRecord, StreamClient,
    MAX_PARTITION_KEY_CHARS, MAX_RECORD_BYTES,
};
