//! Schema descriptors and the internal view of Avro record schemas.
//!
//! [`SchemaDescriptor`] is the value handed to the registry. Encoding needs a
//! little more structure than apache-avro exposes conveniently (which fields
//! are optional, where the `null` branch sits in a union), so the definition
//! is also read into a small [`RecordType`] tree. Supported constructs:
//!
//! - primitives `string`, `int`, `long`, `float`, `double`, `boolean`
//! - nested `record` (inline definitions only)
//! - `array` of any supported type
//! - two-branch unions with `null` (the field becomes optional)
//!
//! Anything else (maps, enums, fixed, named type references) is rejected
//! when the schema is compiled.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use crate::fingerprint::SchemaFingerprint;

/// Serialization format a schema describes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum DataFormat {
    #[default]
    Avro,
}

impl DataFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            DataFormat::Avro => "AVRO",
        }
    }
}

impl fmt::Display for DataFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A named schema definition, ready for registration.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SchemaDescriptor {
    pub name: String,
    pub data_format: DataFormat,
    /// Normalized (compact, key-sorted) JSON text of the schema.
    pub definition: String,
}

impl SchemaDescriptor {
    pub fn fingerprint(&self) -> SchemaFingerprint {
        SchemaFingerprint::compute(&self.definition)
    }
}

/// A schema parsed both by apache-avro and into [`RecordType`].
#[derive(Debug, Clone)]
pub(crate) struct CompiledSchema {
    pub(crate) avro: apache_avro::Schema,
    pub(crate) record: RecordType,
}

impl CompiledSchema {
    /// Parse `definition`; errors carry a human-readable reason.
    pub(crate) fn compile(definition: &str) -> Result<(Self, JsonValue), CompileError> {
        let json: JsonValue = serde_json::from_str(definition)
            .map_err(|err| CompileError::Invalid(format!("not JSON: {err}")))?;
        let avro = apache_avro::Schema::parse_str(definition)
            .map_err(|err| CompileError::Invalid(err.to_string()))?;
        let record = match read_type(&json).map_err(CompileError::Unsupported)? {
            AvroType::Record(record) => record,
            other => {
                return Err(CompileError::Unsupported(format!(
                    "top-level type must be a record, found {}",
                    other.describe()
                )))
            }
        };
        Ok((Self { avro, record }, json))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum CompileError {
    Invalid(String),
    Unsupported(String),
}

impl CompileError {
    pub(crate) fn reason(self) -> String {
        match self {
            CompileError::Invalid(reason) | CompileError::Unsupported(reason) => reason,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct RecordType {
    pub(crate) name: String,
    pub(crate) fields: Vec<RecordField>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct RecordField {
    pub(crate) name: String,
    pub(crate) ty: AvroType,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum AvroType {
    String,
    Int,
    Long,
    Float,
    Double,
    Boolean,
    Record(RecordType),
    Array(Box<AvroType>),
    /// `["null", T]` or `[T, "null"]`; `null_index` is the position of `null`.
    Optional { null_index: u32, inner: Box<AvroType> },
}

impl AvroType {
    pub(crate) fn describe(&self) -> &'static str {
        match self {
            AvroType::String => "string",
            AvroType::Int => "int",
            AvroType::Long => "long",
            AvroType::Float => "float",
            AvroType::Double => "double",
            AvroType::Boolean => "boolean",
            AvroType::Record(_) => "record",
            AvroType::Array(_) => "array",
            AvroType::Optional { .. } => "optional",
        }
    }
}

fn read_type(json: &JsonValue) -> Result<AvroType, String> {
    match json {
        JsonValue::String(name) => primitive(name),
        JsonValue::Array(branches) => read_union(branches),
        JsonValue::Object(obj) => match obj.get("type") {
            Some(JsonValue::String(kind)) if kind == "record" => read_record(obj).map(AvroType::Record),
            Some(JsonValue::String(kind)) if kind == "array" => {
                let items = obj
                    .get("items")
                    .ok_or_else(|| "array without `items`".to_string())?;
                Ok(AvroType::Array(Box::new(read_type(items)?)))
            }
            Some(JsonValue::String(kind)) => primitive(kind),
            Some(nested @ (JsonValue::Array(_) | JsonValue::Object(_))) => read_type(nested),
            _ => Err("type object without a `type` name".to_string()),
        },
        other => Err(format!("unexpected type declaration `{other}`")),
    }
}

fn primitive(name: &str) -> Result<AvroType, String> {
    match name {
        "string" => Ok(AvroType::String),
        "int" => Ok(AvroType::Int),
        "long" => Ok(AvroType::Long),
        "float" => Ok(AvroType::Float),
        "double" => Ok(AvroType::Double),
        "boolean" => Ok(AvroType::Boolean),
        "null" => Err("bare `null` is only supported inside an optional union".to_string()),
        other => Err(format!("type `{other}` is not supported")),
    }
}

fn read_union(branches: &[JsonValue]) -> Result<AvroType, String> {
    let is_null = |v: &JsonValue| v.as_str() == Some("null");
    match branches {
        [first, second] if is_null(first) && !is_null(second) => Ok(AvroType::Optional {
            null_index: 0,
            inner: Box::new(read_type(second)?),
        }),
        [first, second] if !is_null(first) && is_null(second) => Ok(AvroType::Optional {
            null_index: 1,
            inner: Box::new(read_type(first)?),
        }),
        _ => Err("only two-branch unions with `null` are supported".to_string()),
    }
}

fn read_record(obj: &serde_json::Map<String, JsonValue>) -> Result<RecordType, String> {
    let name = obj
        .get("name")
        .and_then(JsonValue::as_str)
        .ok_or_else(|| "record without a name".to_string())?
        .to_string();
    let fields = obj
        .get("fields")
        .and_then(JsonValue::as_array)
        .ok_or_else(|| format!("record `{name}` has no `fields` array"))?;

    let mut out = Vec::with_capacity(fields.len());
    for field in fields {
        let field_name = field
            .get("name")
            .and_then(JsonValue::as_str)
            .ok_or_else(|| format!("record `{name}` has a field without a name"))?;
        let ty = field
            .get("type")
            .ok_or_else(|| format!("field `{field_name}` has no type"))?;
        let ty = read_type(ty).map_err(|reason| format!("field `{field_name}`: {reason}"))?;
        out.push(RecordField {
            name: field_name.to_string(),
            ty,
        });
    }
    Ok(RecordType { name, fields: out })
}

#[cfg(test)]
mod tests {
    use super::*;

    const ORDER: &str = r#"{
        "type": "record",
        "name": "Order",
        "namespace": "docstream.test",
        "fields": [
            {"name": "id", "type": "string"},
            {"name": "note", "type": ["null", "string"], "default": null},
            {"name": "customer", "type": {
                "type": "record", "name": "Customer",
                "fields": [{"name": "tier", "type": {"type": "int"}}]
            }},
            {"name": "lines", "type": {"type": "array", "items": {
                "type": "record", "name": "Line",
                "fields": [{"name": "qty", "type": "long"}, {"name": "price", "type": ["double", "null"]}]
            }}}
        ]
    }"#;

    #[test]
    fn compiles_supported_constructs() {
        let (compiled, _) = CompiledSchema::compile(ORDER).expect("compile");
        let record = compiled.record;
        assert_eq!(record.name, "Order");
        assert_eq!(record.fields.len(), 4);
        assert_eq!(
            record.fields[1].ty,
            AvroType::Optional {
                null_index: 0,
                inner: Box::new(AvroType::String)
            }
        );
        match &record.fields[2].ty {
            AvroType::Record(customer) => assert_eq!(customer.fields[0].ty, AvroType::Int),
            other => panic!("unexpected {other:?}"),
        }
        match &record.fields[3].ty {
            AvroType::Array(items) => match items.as_ref() {
                AvroType::Record(line) => assert!(matches!(
                    line.fields[1].ty,
                    AvroType::Optional { null_index: 1, .. }
                )),
                other => panic!("unexpected {other:?}"),
            },
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn rejects_non_record_and_unsupported_types() {
        assert!(matches!(
            CompiledSchema::compile(r#""string""#),
            Err(CompileError::Unsupported(_))
        ));
        let with_map = r#"{"type":"record","name":"A","fields":[{"name":"m","type":{"type":"map","values":"string"}}]}"#;
        assert!(matches!(
            CompiledSchema::compile(with_map),
            Err(CompileError::Unsupported(reason)) if reason.contains("map")
        ));
        let three_way = r#"{"type":"record","name":"A","fields":[{"name":"u","type":["null","string","int"]}]}"#;
        assert!(matches!(
            CompiledSchema::compile(three_way),
            Err(CompileError::Unsupported(_))
        ));
    }

    #[test]
    fn rejects_invalid_avro() {
        assert!(matches!(
            CompiledSchema::compile("{not json"),
            Err(CompileError::Invalid(_))
        ));
        assert!(matches!(
            CompiledSchema::compile(r#"{"type":"record","fields":[]}"#),
            Err(CompileError::Invalid(_))
        ));
    }

    #[test]
    fn data_format_display() {
        assert_eq!(DataFormat::Avro.to_string(), "AVRO");
        let parsed: DataFormat = serde_json::from_str("\"AVRO\"").expect("deserialize");
        assert_eq!(parsed, DataFormat::Avro);
    }
}
