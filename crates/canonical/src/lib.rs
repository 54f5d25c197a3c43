//! docstream canonical layer.
//!
//! Turns a raw XML document into a [`CanonicalRecord`] and renders that
//! record as flat interchange text for the encoder.
//!
//! ## What we do
//!
//! - Read XML with a small strict reader ([`parse_document`])
//! - Map elements and attributes through a declarative [`RecordSpec`]
//! - Drop anything the layout does not mention (forward compatible)
//! - Reject missing required fields, bad scalars and duplicates with a
//!   [`ParseError`] that names the field or the position
//! - Render the record as `key=value` interchange text
//!
//! ## Pure function guarantee
//!
//! No I/O, no clock calls. The same document and layout give the same
//! record, and the same record gives byte-identical interchange text.
//!
//! ```rust
//! use canonical::{parse, to_interchange_text, RecordSpec};
//!
//! let record = parse("<Item><Sku>ABC</Sku><Qty>5</Qty></Item>", &RecordSpec::inventory_item())?;
//! assert_eq!(to_interchange_text(&record), "sku=ABC\nqty=5");
//! # Ok::<(), canonical::ParseError>(())
//! ```

mod document;
mod error;
mod hash;
mod interchange;
mod layout;
mod parse;
mod xml;

pub use crate::document::{CanonicalField, CanonicalRecord, FieldValue};
pub use crate::error::{InterchangeError, LayoutError, ParseError};
pub use crate::hash::{hash_interchange_bytes, hash_text};
pub use crate::interchange::{
    escape_value, parse_interchange_text, to_interchange_text, unescape_value,
    InterchangePayload, INTERCHANGE_VERSION,
};
pub use crate::layout::{FieldSpec, FieldType, RecordSpec};
pub use crate::parse::parse;
pub use crate::xml::{parse_document, Element, MAX_DEPTH};
