//! Declarative document layouts.
//!
//! A [`RecordSpec`] describes which XML elements and attributes become which
//! canonical fields. Layouts are plain serde types so they can live in the
//! pipeline configuration file:
//!
//! ```yaml
//! name: item
//! element: Item
//! fields:
//!   - { name: sku, element: Sku, type: string, required: true }
//!   - { name: qty, element: Qty, type: int, required: true }
//!   - { name: warehouse, attribute: warehouse, type: string }
//!   - name: location
//!     element: Location
//!     type: record
//!     fields:
//!       - { name: aisle, element: Aisle, type: int }
//! ```
//!
//! Field names double as interchange-text keys and Avro field names, so they
//! are restricted to `[A-Za-z_][A-Za-z0-9_]*`.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::error::LayoutError;

/// Declared type of a canonical field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    String,
    Int,
    Long,
    Double,
    Boolean,
    /// A single nested element mapped through its own `fields`.
    Record,
    /// Zero or more repeated elements, each mapped through `fields`.
    List,
}

impl FieldType {
    pub fn is_scalar(self) -> bool {
        !matches!(self, FieldType::Record | FieldType::List)
    }

    pub fn describe(self) -> &'static str {
        match self {
            FieldType::String => "a string",
            FieldType::Int => "a 32-bit integer",
            FieldType::Long => "a 64-bit integer",
            FieldType::Double => "a floating point number",
            FieldType::Boolean => "a boolean",
            FieldType::Record => "a record",
            FieldType::List => "a list",
        }
    }
}

/// Mapping of one canonical field to its source in the XML document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldSpec {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub element: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attribute: Option<String>,
    #[serde(rename = "type")]
    pub field_type: FieldType,
    #[serde(default)]
    pub required: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub fields: Vec<FieldSpec>,
}

impl FieldSpec {
    /// A scalar read from the text of a child element.
    pub fn element(name: impl Into<String>, element: impl Into<String>, field_type: FieldType) -> Self {
        Self {
            name: name.into(),
            element: Some(element.into()),
            attribute: None,
            field_type,
            required: false,
            fields: Vec::new(),
        }
    }

    /// A scalar read from an attribute of the enclosing element.
    pub fn attribute(
        name: impl Into<String>,
        attribute: impl Into<String>,
        field_type: FieldType,
    ) -> Self {
        Self {
            name: name.into(),
            element: None,
            attribute: Some(attribute.into()),
            field_type,
            required: false,
            fields: Vec::new(),
        }
    }

    pub fn record(name: impl Into<String>, element: impl Into<String>, fields: Vec<FieldSpec>) -> Self {
        Self {
            fields,
            ..Self::element(name, element, FieldType::Record)
        }
    }

    pub fn list(name: impl Into<String>, element: impl Into<String>, fields: Vec<FieldSpec>) -> Self {
        Self {
            fields,
            ..Self::element(name, element, FieldType::List)
        }
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }
}

/// Layout of a record: its canonical name, source element, and fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordSpec {
    pub name: String,
    pub element: String,
    pub fields: Vec<FieldSpec>,
}

impl RecordSpec {
    pub fn new(name: impl Into<String>, element: impl Into<String>, fields: Vec<FieldSpec>) -> Self {
        Self {
            name: name.into(),
            element: element.into(),
            fields,
        }
    }

    /// `<Item><Sku>..</Sku><Qty>..</Qty></Item>` with both fields required.
    pub fn inventory_item() -> Self {
        Self::new(
            "item",
            "Item",
            vec![
                FieldSpec::element("sku", "Sku", FieldType::String).required(),
                FieldSpec::element("qty", "Qty", FieldType::Int).required(),
            ],
        )
    }

    pub fn validate(&self) -> Result<(), LayoutError> {
        if self.name.trim().is_empty() {
            return Err(LayoutError::EmptyName {
                record: self.element.clone(),
                what: "name",
            });
        }
        if self.element.trim().is_empty() {
            return Err(LayoutError::EmptyName {
                record: self.name.clone(),
                what: "element",
            });
        }
        validate_fields(&self.fields)
    }
}

impl Default for RecordSpec {
    fn default() -> Self {
        Self::inventory_item()
    }
}

fn validate_fields(fields: &[FieldSpec]) -> Result<(), LayoutError> {
    let mut seen = HashSet::with_capacity(fields.len());
    for field in fields {
        if !is_valid_field_name(&field.name) {
            return Err(LayoutError::InvalidFieldName(field.name.clone()));
        }
        if !seen.insert(field.name.as_str()) {
            return Err(LayoutError::DuplicateField(field.name.clone()));
        }
        let source = match (&field.element, &field.attribute) {
            (Some(element), None) => element,
            (None, Some(attribute)) => attribute,
            _ => return Err(LayoutError::AmbiguousSource(field.name.clone())),
        };
        if source.trim().is_empty() {
            return Err(LayoutError::EmptyName {
                record: field.name.clone(),
                what: "source",
            });
        }
        if field.attribute.is_some() && !field.field_type.is_scalar() {
            return Err(LayoutError::NonScalarAttribute(field.name.clone()));
        }
        if field.field_type.is_scalar() {
            if !field.fields.is_empty() {
                return Err(LayoutError::UnexpectedNestedFields(field.name.clone()));
            }
        } else {
            if field.fields.is_empty() {
                return Err(LayoutError::MissingNestedFields(field.name.clone()));
            }
            validate_fields(&field.fields)?;
        }
    }
    Ok(())
}

fn is_valid_field_name(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) if first.is_ascii_alphabetic() || first == '_' => {
            chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        }
        _ => false,
    }
}
