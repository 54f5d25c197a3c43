//! The canonical record model.
//!
//! A [`CanonicalRecord`] is the format-independent shape of one inbound
//! document. It mirrors the [`RecordSpec`](crate::RecordSpec) it was parsed
//! with:
//!
//! ```text
//! CanonicalRecord
//! ├── name: String                      # layout record name
//! └── fields: Vec<CanonicalField>       # one per declared field, layout order
//!     ├── name: String
//!     └── value: FieldValue
//!         ├── String | Int | Long | Double | Boolean
//!         ├── Record(CanonicalRecord)
//!         ├── List(Vec<CanonicalRecord>)
//!         └── Absent                    # optional field missing in source
//! ```
//!
//! # Determinism
//!
//! Field order is the layout order, never the document order, so two
//! documents carrying the same values in a different element order produce
//! equal records and byte-identical interchange text.
//!
//! # Serialization
//!
//! Records serialize as a JSON-style map of field name to value (absent
//! fields become `null`). This form is meant for logs, not for transport.
//!
//! ```rust
//! use canonical::{parse, RecordSpec};
//!
//! let record = parse("<Item><Sku>ABC</Sku><Qty>5</Qty></Item>", &RecordSpec::default()).unwrap();
//! assert_eq!(record.get("sku").and_then(|v| v.as_str()), Some("ABC"));
//! assert_eq!(record.get("qty").and_then(|v| v.as_i64()), Some(5));
//! ```

use serde::ser::{SerializeMap, Serializer};
use serde::Serialize;

/// A parsed document, immutable once built.
#[derive(Debug, Clone, PartialEq)]
pub struct CanonicalRecord {
    pub name: String,
    pub fields: Vec<CanonicalField>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CanonicalField {
    pub name: String,
    pub value: FieldValue,
}

/// Value of a canonical field.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum FieldValue {
    String(String),
    Int(i32),
    Long(i64),
    Double(f64),
    Boolean(bool),
    Record(CanonicalRecord),
    List(Vec<CanonicalRecord>),
    /// Declared optional field that the source document did not carry.
    Absent,
}

impl FieldValue {
    pub fn is_absent(&self) -> bool {
        matches!(self, FieldValue::Absent)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            FieldValue::String(s) => Some(s),
            _ => None,
        }
    }

    /// Integer value of an `Int` or `Long` field.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            FieldValue::Int(v) => Some(i64::from(*v)),
            FieldValue::Long(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            FieldValue::Double(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            FieldValue::Boolean(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_record(&self) -> Option<&CanonicalRecord> {
        match self {
            FieldValue::Record(r) => Some(r),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[CanonicalRecord]> {
        match self {
            FieldValue::List(items) => Some(items),
            _ => None,
        }
    }

    /// Text form of a scalar value as written to interchange text.
    /// `None` for records, lists and absent values.
    pub fn scalar_text(&self) -> Option<String> {
        match self {
            FieldValue::String(s) => Some(s.clone()),
            FieldValue::Int(v) => Some(v.to_string()),
            FieldValue::Long(v) => Some(v.to_string()),
            FieldValue::Double(v) => Some(v.to_string()),
            FieldValue::Boolean(v) => Some(v.to_string()),
            FieldValue::Record(_) | FieldValue::List(_) | FieldValue::Absent => None,
        }
    }
}

impl CanonicalRecord {
    pub fn get(&self, name: &str) -> Option<&FieldValue> {
        self.fields
            .iter()
            .find(|field| field.name == name)
            .map(|field| &field.value)
    }

    /// Look up a nested value by dotted path, e.g. `location.aisle` or `lines.0.sku`.
    pub fn get_path(&self, path: &str) -> Option<&FieldValue> {
        let mut segments = path.split('.');
        let mut value = self.get(segments.next()?)?;
        while let Some(segment) = segments.next() {
            value = match value {
                FieldValue::Record(record) => record.get(segment)?,
                FieldValue::List(items) => {
                    let item = items.get(segment.parse::<usize>().ok()?)?;
                    item.get(segments.next()?)?
                }
                _ => return None,
            };
        }
        Some(value)
    }
}

impl Serialize for CanonicalRecord {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.fields.len()))?;
        for field in &self.fields {
            map.serialize_entry(&field.name, &field.value)?;
        }
        map.end()
    }
}
