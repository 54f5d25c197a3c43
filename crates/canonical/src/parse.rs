use crate::document::{CanonicalField, CanonicalRecord, FieldValue};
use crate::error::{LayoutError, ParseError};
use crate::layout::{FieldSpec, FieldType, RecordSpec};
use crate::xml::{parse_document, Element};

/// Main entry point. Parses raw XML and maps it through `layout` into a
/// canonical record.
///
/// Elements and attributes the layout does not mention are ignored. Every
/// declared field is present in the output exactly once: with a value, or as
/// [`FieldValue::Absent`] when optional and missing.
///
/// Scalar text is trimmed before it is interpreted, strings included, so an
/// indented `<Sku>\n  ABC\n</Sku>` reads as `ABC`. Whitespace inside the
/// value is kept as written (after line-ending normalization).
pub fn parse(raw: &str, layout: &RecordSpec) -> Result<CanonicalRecord, ParseError> {
    layout.validate()?;
    let root = parse_document(raw)?;
    if root.name != layout.element {
        return Err(ParseError::UnexpectedRoot {
            expected: layout.element.clone(),
            found: root.name,
        });
    }
    build_record(&root, &layout.name, &layout.fields, "")
}

fn build_record(
    element: &Element,
    name: &str,
    specs: &[FieldSpec],
    prefix: &str,
) -> Result<CanonicalRecord, ParseError> {
    let mut fields = Vec::with_capacity(specs.len());
    for spec in specs {
        let path = join_path(prefix, &spec.name);
        let value = match (&spec.element, &spec.attribute) {
            (None, Some(attribute)) => match element.attribute(attribute) {
                Some(raw) => parse_scalar(raw, spec.field_type, &path)?,
                None => absent_or_missing(spec, path)?,
            },
            (Some(child_name), None) => read_child(element, child_name, spec, path)?,
            _ => return Err(LayoutError::AmbiguousSource(spec.name.clone()).into()),
        };
        fields.push(CanonicalField {
            name: spec.name.clone(),
            value,
        });
    }
    Ok(CanonicalRecord {
        name: name.to_string(),
        fields,
    })
}

fn read_child(
    element: &Element,
    child_name: &str,
    spec: &FieldSpec,
    path: String,
) -> Result<FieldValue, ParseError> {
    let mut matches = element.children_named(child_name);

    if spec.field_type == FieldType::List {
        let items = matches
            .enumerate()
            .map(|(idx, child)| {
                build_record(child, &spec.name, &spec.fields, &format!("{path}.{idx}"))
            })
            .collect::<Result<Vec<_>, _>>()?;
        if items.is_empty() && spec.required {
            return Err(ParseError::MissingField { field: path });
        }
        return Ok(FieldValue::List(items));
    }

    let Some(child) = matches.next() else {
        return absent_or_missing(spec, path);
    };
    if matches.next().is_some() {
        return Err(ParseError::DuplicateElement { field: path });
    }
    match spec.field_type {
        FieldType::Record => Ok(FieldValue::Record(build_record(
            child,
            &spec.name,
            &spec.fields,
            &path,
        )?)),
        scalar => parse_scalar(&child.text, scalar, &path),
    }
}

fn absent_or_missing(spec: &FieldSpec, path: String) -> Result<FieldValue, ParseError> {
    if spec.required {
        Err(ParseError::MissingField { field: path })
    } else {
        Ok(FieldValue::Absent)
    }
}

fn parse_scalar(raw: &str, field_type: FieldType, path: &str) -> Result<FieldValue, ParseError> {
    let text = raw.trim();
    let invalid = || ParseError::InvalidValue {
        field: path.to_string(),
        value: text.to_string(),
        expected: field_type.describe(),
    };
    match field_type {
        FieldType::String => Ok(FieldValue::String(text.to_string())),
        FieldType::Int => text.parse().map(FieldValue::Int).map_err(|_| invalid()),
        FieldType::Long => text.parse().map(FieldValue::Long).map_err(|_| invalid()),
        FieldType::Double => text
            .parse::<f64>()
            .ok()
            .filter(|v| v.is_finite())
            .map(FieldValue::Double)
            .ok_or_else(invalid),
        FieldType::Boolean => match text {
            "true" | "1" => Ok(FieldValue::Boolean(true)),
            "false" | "0" => Ok(FieldValue::Boolean(false)),
            _ => Err(invalid()),
        },
        FieldType::Record | FieldType::List => Err(invalid()),
    }
}

pub(crate) fn join_path(prefix: &str, name: &str) -> String {
    if prefix.is_empty() {
        name.to_string()
    } else {
        format!("{prefix}.{name}")
    }
}
