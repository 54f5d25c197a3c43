//! docstream schema encoder.
//!
//! Binds interchange text to an Avro record schema:
//!
//! - [`SchemaTemplate`] / [`derive_schema`] check a sample payload against the
//!   configured template and produce the [`SchemaDescriptor`] to register
//! - [`encode`] writes the Avro binary datum for a payload
//! - [`decode`] reads a datum back, for consumers and tests
//! - [`SchemaFingerprint`] identifies a definition independent of formatting
//!
//! ```rust
//! use encode::{derive_schema, encode};
//!
//! let template = r#"{"type":"record","name":"InventoryEvent",
//!     "fields":[{"name":"sku","type":"string"},{"name":"qty","type":"int"}]}"#;
//! let schema = derive_schema("sku=ABC\nqty=5", template, "InventoryEvent")?;
//! let bytes = encode("sku=ABC\nqty=5", &schema)?;
//! assert_eq!(bytes, [0x06, b'A', b'B', b'C', 0x0a]);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

mod avro;
mod derive;
mod error;
mod fingerprint;
mod schema;

pub use apache_avro::types::Value as AvroValue;

pub use crate::avro::{decode, encode};
pub use crate::derive::{derive_schema, SchemaTemplate};
pub use crate::error::{EncodingError, SchemaDerivationError};
pub use crate::fingerprint::SchemaFingerprint;
pub use crate::schema::{DataFormat, SchemaDescriptor};
