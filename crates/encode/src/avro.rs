//! Avro binary encoding of interchange text.
//!
//! The interchange entries are looked up by path while walking the schema,
//! so field order in the text never matters and keys the schema does not
//! mention are ignored. Nested records read `parent.child`, array items read
//! `list.0`, `list.1`, ... until the next index is absent.

use std::collections::BTreeMap;
use std::io::Cursor;

use apache_avro::types::Value;
use canonical::parse_interchange_text;
use tracing::debug;

use crate::error::EncodingError;
use crate::schema::{AvroType, CompiledSchema, RecordType, SchemaDescriptor};

/// Interchange entries keyed by their dotted path.
#[derive(Debug, Default)]
pub(crate) struct Entries {
    map: BTreeMap<String, String>,
}

impl Entries {
    pub(crate) fn from_text(text: &str) -> Result<Self, canonical::InterchangeError> {
        let map = parse_interchange_text(text)?.into_iter().collect();
        Ok(Self { map })
    }

    fn get(&self, path: &str) -> Option<&str> {
        self.map.get(path).map(String::as_str)
    }

    /// True when `path` itself or anything below it has an entry.
    fn contains(&self, path: &str) -> bool {
        if self.map.contains_key(path) {
            return true;
        }
        let prefix = format!("{path}.");
        self.map
            .range(prefix.clone()..)
            .next()
            .is_some_and(|(key, _)| key.starts_with(&prefix))
    }
}

/// Encode interchange `text` as an Avro binary datum under `schema`.
///
/// The definition is compiled on every call; keep a
/// [`SchemaTemplate`](crate::SchemaTemplate) to encode many payloads.
pub fn encode(text: &str, schema: &SchemaDescriptor) -> Result<Vec<u8>, EncodingError> {
    let compiled = compile_for(schema)?;
    encode_compiled(&compiled, &schema.name, &Entries::from_text(text)?)
}

pub(crate) fn encode_compiled(
    compiled: &CompiledSchema,
    schema_name: &str,
    entries: &Entries,
) -> Result<Vec<u8>, EncodingError> {
    let value = build_record(&compiled.record, "", entries)?;
    let bytes = apache_avro::to_avro_datum(&compiled.avro, value)
        .map_err(|err| EncodingError::Avro(err.to_string()))?;
    debug!(
        schema = schema_name,
        bytes = bytes.len(),
        "avro_datum_encoded"
    );
    Ok(bytes)
}

/// Read an Avro binary datum written by [`encode`] back into a value tree.
pub fn decode(bytes: &[u8], schema: &SchemaDescriptor) -> Result<Value, EncodingError> {
    let compiled = compile_for(schema)?;
    let mut reader = Cursor::new(bytes);
    apache_avro::from_avro_datum(&compiled.avro, &mut reader, None)
        .map_err(|err| EncodingError::Avro(err.to_string()))
}

fn compile_for(schema: &SchemaDescriptor) -> Result<CompiledSchema, EncodingError> {
    CompiledSchema::compile(&schema.definition)
        .map(|(compiled, _)| compiled)
        .map_err(|err| EncodingError::InvalidSchema {
            name: schema.name.clone(),
            reason: err.reason(),
        })
}

pub(crate) fn build_record(
    record: &RecordType,
    prefix: &str,
    entries: &Entries,
) -> Result<Value, EncodingError> {
    let mut fields = Vec::with_capacity(record.fields.len());
    for field in &record.fields {
        let path = join(prefix, &field.name);
        let value = build_value(&field.ty, &path, entries)?;
        fields.push((field.name.clone(), value));
    }
    Ok(Value::Record(fields))
}

fn build_value(ty: &AvroType, path: &str, entries: &Entries) -> Result<Value, EncodingError> {
    match ty {
        AvroType::Optional { null_index, inner } => {
            if entries.contains(path) {
                let value = build_value(inner, path, entries)?;
                Ok(Value::Union(1 - null_index, Box::new(value)))
            } else {
                Ok(Value::Union(*null_index, Box::new(Value::Null)))
            }
        }
        AvroType::Record(record) => build_record(record, path, entries),
        AvroType::Array(items) => {
            let mut values = Vec::new();
            loop {
                let item_path = join(path, &values.len().to_string());
                if !entries.contains(&item_path) {
                    break;
                }
                values.push(build_value(items, &item_path, entries)?);
            }
            Ok(Value::Array(values))
        }
        scalar => {
            let raw = entries
                .get(path)
                .ok_or_else(|| EncodingError::MissingField {
                    field: path.to_string(),
                })?;
            scalar_value(scalar, path, raw)
        }
    }
}

fn scalar_value(ty: &AvroType, path: &str, raw: &str) -> Result<Value, EncodingError> {
    let mismatch = |expected: &'static str| EncodingError::TypeMismatch {
        field: path.to_string(),
        expected,
        value: raw.to_string(),
    };
    match ty {
        AvroType::String => Ok(Value::String(raw.to_string())),
        AvroType::Int => raw.parse().map(Value::Int).map_err(|_| mismatch("int")),
        AvroType::Long => raw.parse().map(Value::Long).map_err(|_| mismatch("long")),
        AvroType::Float => raw.parse().map(Value::Float).map_err(|_| mismatch("float")),
        AvroType::Double => raw.parse().map(Value::Double).map_err(|_| mismatch("double")),
        AvroType::Boolean => match raw {
            "true" => Ok(Value::Boolean(true)),
            "false" => Ok(Value::Boolean(false)),
            _ => Err(mismatch("boolean")),
        },
        other => Err(mismatch(other.describe())),
    }
}

fn join(prefix: &str, name: &str) -> String {
    if prefix.is_empty() {
        name.to_string()
    } else {
        format!("{prefix}.{name}")
    }
}
