use thiserror::Error;

/// Errors raised while turning a raw XML document into a canonical record.
///
/// Positions are reported as 1-based line/column plus the byte offset into
/// the input, with a short fragment of the input starting at that offset.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ParseError {
    #[error("malformed document at line {line}, column {column}: {reason} (near `{fragment}`)")]
    Malformed {
        line: usize,
        column: usize,
        offset: usize,
        fragment: String,
        reason: String,
    },
    #[error("unexpected root element `{found}`, expected `{expected}`")]
    UnexpectedRoot { expected: String, found: String },
    #[error("missing required field `{field}`")]
    MissingField { field: String },
    #[error("field `{field}` expects {expected}, got `{value}`")]
    InvalidValue {
        field: String,
        value: String,
        expected: &'static str,
    },
    #[error("field `{field}` appears more than once")]
    DuplicateElement { field: String },
    #[error("invalid document layout: {0}")]
    Layout(#[from] LayoutError),
}

/// Problems with a [`RecordSpec`](crate::RecordSpec) itself, detected before
/// any document is read.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LayoutError {
    #[error("record `{record}` has an empty {what}")]
    EmptyName { record: String, what: &'static str },
    #[error("field name `{0}` must match [A-Za-z_][A-Za-z0-9_]*")]
    InvalidFieldName(String),
    #[error("field `{0}` is declared more than once")]
    DuplicateField(String),
    #[error("field `{0}` must name exactly one of `element` or `attribute`")]
    AmbiguousSource(String),
    #[error("field `{0}` reads an attribute but is not a scalar")]
    NonScalarAttribute(String),
    #[error("field `{0}` is a record or list without nested fields")]
    MissingNestedFields(String),
    #[error("scalar field `{0}` declares nested fields")]
    UnexpectedNestedFields(String),
}

/// Errors raised while reading interchange text back into key/value pairs.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum InterchangeError {
    #[error("line {line} has no `=` separator")]
    MissingSeparator { line: usize },
    #[error("line {line} has an empty key")]
    EmptyKey { line: usize },
    #[error("line {line} contains an invalid escape sequence")]
    InvalidEscape { line: usize },
    #[error("key `{key}` appears more than once")]
    DuplicateKey { key: String },
}
