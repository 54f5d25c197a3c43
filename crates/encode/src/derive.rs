//! Schema derivation from the configured template and a sample payload.

use serde_json::Value as JsonValue;
use tracing::debug;

use crate::avro::{build_record, encode_compiled, Entries};
use crate::error::{EncodingError, SchemaDerivationError};
use crate::schema::{CompileError, CompiledSchema, DataFormat, SchemaDescriptor};

/// An Avro record schema loaded once and reused for every invocation.
#[derive(Debug, Clone)]
pub struct SchemaTemplate {
    compiled: CompiledSchema,
    definition: String,
    data_format: DataFormat,
}

impl SchemaTemplate {
    /// Validate `text` as an Avro record schema this crate can encode.
    pub fn parse(text: &str) -> Result<Self, SchemaDerivationError> {
        let (compiled, json) = CompiledSchema::compile(text).map_err(|err| match err {
            CompileError::Invalid(reason) => SchemaDerivationError::InvalidTemplate(reason),
            CompileError::Unsupported(reason) => SchemaDerivationError::UnsupportedTemplate(reason),
        })?;
        Ok(Self {
            compiled,
            definition: normalized(&json, text),
            data_format: DataFormat::Avro,
        })
    }

    /// Data format stamped on derived descriptors.
    pub fn with_data_format(mut self, data_format: DataFormat) -> Self {
        self.data_format = data_format;
        self
    }

    pub fn data_format(&self) -> DataFormat {
        self.data_format
    }

    /// Name of the top-level Avro record.
    pub fn record_name(&self) -> &str {
        &self.compiled.record.name
    }

    /// Normalized JSON text of the template.
    pub fn definition(&self) -> &str {
        &self.definition
    }

    /// Check that `sample` satisfies the template and describe it as `schema_name`.
    ///
    /// Every required field, including those of nested records and array
    /// items present in the sample, must be present and parse as its type.
    pub fn derive(
        &self,
        sample: &str,
        schema_name: &str,
    ) -> Result<SchemaDescriptor, SchemaDerivationError> {
        let schema_name = schema_name.trim();
        if schema_name.is_empty() {
            return Err(SchemaDerivationError::EmptySchemaName);
        }
        let entries = Entries::from_text(sample)?;
        build_record(&self.compiled.record, "", &entries).map_err(|err| match err {
            EncodingError::MissingField { field } => SchemaDerivationError::MissingField { field },
            EncodingError::TypeMismatch {
                field,
                expected,
                value,
            } => SchemaDerivationError::Unsatisfiable {
                field,
                expected,
                value,
            },
            other => SchemaDerivationError::InvalidTemplate(other.to_string()),
        })?;
        debug!(
            schema = schema_name,
            record = %self.compiled.record.name,
            "schema_derived"
        );
        Ok(SchemaDescriptor {
            name: schema_name.to_string(),
            data_format: self.data_format,
            definition: self.definition.clone(),
        })
    }

    /// Encode `text` with the already compiled template.
    ///
    /// Produces the same bytes as [`encode`](crate::encode) with a descriptor
    /// from [`derive`](Self::derive), without compiling the definition again.
    pub fn encode(&self, text: &str) -> Result<Vec<u8>, EncodingError> {
        let entries = Entries::from_text(text)?;
        encode_compiled(&self.compiled, &self.compiled.record.name, &entries)
    }
}

/// Derive a [`SchemaDescriptor`] from a sample payload and a template text.
///
/// Equivalent to [`SchemaTemplate::parse`] followed by
/// [`SchemaTemplate::derive`]; callers handling many payloads should keep
/// the parsed template instead.
pub fn derive_schema(
    sample: &str,
    template: &str,
    schema_name: &str,
) -> Result<SchemaDescriptor, SchemaDerivationError> {
    SchemaTemplate::parse(template)?.derive(sample, schema_name)
}

fn normalized(json: &JsonValue, original: &str) -> String {
    serde_json::to_string(json).unwrap_or_else(|_| original.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    const TEMPLATE: &str = r#"{
        "type": "record",
        "name": "InventoryEvent",
        "fields": [
            {"name": "sku", "type": "string"},
            {"name": "qty", "type": "int"},
            {"name": "bin", "type": ["null", "string"], "default": null}
        ]
    }"#;

    #[test]
    fn derives_descriptor_from_sample() {
        let schema = derive_schema("sku=ABC\nqty=5", TEMPLATE, "InventoryEvent").expect("derive");
        assert_eq!(schema.name, "InventoryEvent");
        assert_eq!(schema.data_format, DataFormat::Avro);
        assert!(!schema.definition.contains('\n'));
        assert!(schema.definition.contains("\"InventoryEvent\""));
    }

    #[test]
    fn definition_is_independent_of_template_formatting() {
        let compact: String = TEMPLATE.split_whitespace().collect::<Vec<_>>().join(" ");
        let a = derive_schema("sku=A\nqty=1", TEMPLATE, "S").expect("a");
        let b = derive_schema("sku=B\nqty=2", &compact, "S").expect("b");
        assert_eq!(a.definition, b.definition);
        assert_eq!(a.fingerprint(), b.fingerprint());
    }

    #[test]
    fn sample_must_satisfy_required_fields() {
        assert_eq!(
            derive_schema("sku=ABC", TEMPLATE, "InventoryEvent"),
            Err(SchemaDerivationError::MissingField { field: "qty".into() })
        );
        assert_eq!(
            derive_schema("sku=ABC\nqty=lots", TEMPLATE, "InventoryEvent"),
            Err(SchemaDerivationError::Unsatisfiable {
                field: "qty".into(),
                expected: "int",
                value: "lots".into()
            })
        );
    }

    #[test]
    fn template_and_name_errors() {
        assert!(matches!(
            derive_schema("sku=A", "not json", "S"),
            Err(SchemaDerivationError::InvalidTemplate(_))
        ));
        assert!(matches!(
            derive_schema(
                "sku=A",
                r#"{"type":"record","name":"A","fields":[{"name":"e","type":{"type":"enum","name":"E","symbols":["X"]}}]}"#,
                "S"
            ),
            Err(SchemaDerivationError::UnsupportedTemplate(_))
        ));
        assert_eq!(
            derive_schema("sku=A\nqty=1", TEMPLATE, "  "),
            Err(SchemaDerivationError::EmptySchemaName)
        );
    }

    #[test]
    fn template_exposes_record_name() {
        let template = SchemaTemplate::parse(TEMPLATE).expect("template");
        assert_eq!(template.record_name(), "InventoryEvent");
    }

    #[test]
    fn template_encode_matches_descriptor_encode() {
        let template = SchemaTemplate::parse(TEMPLATE).expect("template");
        let text = "sku=ABC\nqty=5\nbin=A4";
        let schema = template.derive(text, "InventoryEvent").expect("derive");
        assert_eq!(
            template.encode(text).expect("template encode"),
            crate::encode(text, &schema).expect("descriptor encode")
        );
        assert!(matches!(
            template.encode("sku=ABC"),
            Err(EncodingError::MissingField { .. })
        ));
    }

    #[test]
    fn data_format_is_carried_into_descriptors() {
        let template = SchemaTemplate::parse(TEMPLATE)
            .expect("template")
            .with_data_format(DataFormat::Avro);
        assert_eq!(template.data_format(), DataFormat::Avro);
        let schema = template.derive("sku=A\nqty=1", "InventoryEvent").expect("derive");
        assert_eq!(schema.data_format, template.data_format());
    }
}
