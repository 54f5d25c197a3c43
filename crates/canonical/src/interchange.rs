//! Flat interchange text.
//!
//! The canonical record is rendered as `key=value` lines, one scalar per
//! line, joined with `\n` and without a trailing newline:
//!
//! ```text
//! sku=ABC
//! qty=5
//! location.aisle=4
//! lines.0.sku=A
//! lines.1.sku=B
//! ```
//!
//! Nested record fields use dotted paths, list items use their index.
//! Absent fields are omitted. In values, `\` becomes `\\`, a newline `\n`
//! and a carriage return `\r`, so every logical entry stays on one line and
//! [`parse_interchange_text`] recovers the exact values.

use std::collections::HashSet;

use crate::document::{CanonicalRecord, FieldValue};
use crate::error::InterchangeError;
use crate::hash::hash_interchange_bytes;
use crate::parse::join_path;

/// Version of the interchange text layout, folded into [`InterchangePayload::sha256_hex`].
pub const INTERCHANGE_VERSION: u32 = 1;

/// Interchange text plus its identity digest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InterchangePayload {
    pub text: String,
    /// SHA-256 over the version and text, see [`hash_interchange_bytes`].
    pub sha256_hex: String,
}

impl InterchangePayload {
    pub fn from_record(record: &CanonicalRecord) -> Self {
        let text = to_interchange_text(record);
        let sha256_hex = hash_interchange_bytes(INTERCHANGE_VERSION, text.as_bytes());
        Self { text, sha256_hex }
    }
}

/// Render `record` as interchange text. Pure and deterministic.
pub fn to_interchange_text(record: &CanonicalRecord) -> String {
    let mut lines = Vec::with_capacity(record.fields.len());
    flatten(record, "", &mut lines);
    lines.join("\n")
}

fn flatten(record: &CanonicalRecord, prefix: &str, lines: &mut Vec<String>) {
    for field in &record.fields {
        let key = join_path(prefix, &field.name);
        match &field.value {
            FieldValue::Absent => {}
            FieldValue::Record(nested) => flatten(nested, &key, lines),
            FieldValue::List(items) => {
                for (idx, item) in items.iter().enumerate() {
                    flatten(item, &format!("{key}.{idx}"), lines);
                }
            }
            scalar => {
                if let Some(text) = scalar.scalar_text() {
                    lines.push(format!("{key}={}", escape_value(&text)));
                }
            }
        }
    }
}

pub fn escape_value(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for ch in value.chars() {
        match ch {
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            other => out.push(other),
        }
    }
    out
}

/// Inverse of [`escape_value`]; `None` on a dangling or unknown escape.
pub fn unescape_value(value: &str) -> Option<String> {
    let mut out = String::with_capacity(value.len());
    let mut chars = value.chars();
    while let Some(ch) = chars.next() {
        if ch != '\\' {
            out.push(ch);
            continue;
        }
        match chars.next()? {
            '\\' => out.push('\\'),
            'n' => out.push('\n'),
            'r' => out.push('\r'),
            _ => return None,
        }
    }
    Some(out)
}

/// Read interchange text back into `(key, value)` pairs in line order.
///
/// Blank lines are skipped. The key ends at the first `=`.
pub fn parse_interchange_text(text: &str) -> Result<Vec<(String, String)>, InterchangeError> {
    let mut entries: Vec<(String, String)> = Vec::new();
    let mut seen: HashSet<&str> = HashSet::new();
    for (idx, line) in text.split('\n').enumerate() {
        let line_no = idx + 1;
        if line.trim().is_empty() {
            continue;
        }
        let Some((key, raw)) = line.split_once('=') else {
            return Err(InterchangeError::MissingSeparator { line: line_no });
        };
        if key.is_empty() {
            return Err(InterchangeError::EmptyKey { line: line_no });
        }
        if !seen.insert(key) {
            return Err(InterchangeError::DuplicateKey {
                key: key.to_string(),
            });
        }
        let value = unescape_value(raw).ok_or(InterchangeError::InvalidEscape { line: line_no })?;
        entries.push((key.to_string(), value));
    }
    Ok(entries)
}
