use std::error::Error;
use std::fmt;
use std::path::PathBuf;

use canonical::ParseError;
use encode::{EncodingError, SchemaDerivationError};
use ingest::{EventError, FetchError};
use publish::{PublishError, RegistryError};
use thiserror::Error;

use crate::config::ConfigLoadError;

/// Errors that can stop a notification from reaching the stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PipelineError {
    Event(EventError),
    Fetch(FetchError),
    Parse(ParseError),
    SchemaDerivation(SchemaDerivationError),
    Encoding(EncodingError),
    Registry(RegistryError),
    Publish(PublishError),
}

impl PipelineError {
    /// Stable identifier for reports and log queries.
    pub fn code(&self) -> &'static str {
        match self {
            PipelineError::Event(_) => "EVENT_ERROR",
            PipelineError::Fetch(_) => "FETCH_ERROR",
            PipelineError::Parse(_) => "PARSE_ERROR",
            PipelineError::SchemaDerivation(_) => "SCHEMA_DERIVATION_ERROR",
            PipelineError::Encoding(_) => "ENCODING_ERROR",
            PipelineError::Registry(_) => "REGISTRY_ERROR",
            PipelineError::Publish(_) => "PUBLISH_ERROR",
        }
    }
}

impl fmt::Display for PipelineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PipelineError::Event(err) => write!(f, "unusable notification: {err}"),
            PipelineError::Fetch(err) => write!(f, "fetch failure: {err}"),
            PipelineError::Parse(err) => write!(f, "parse failure: {err}"),
            PipelineError::SchemaDerivation(err) => write!(f, "schema derivation failed: {err}"),
            PipelineError::Encoding(err) => write!(f, "encoding failure: {err}"),
            PipelineError::Registry(err) => write!(f, "registry failure: {err}"),
            PipelineError::Publish(err) => write!(f, "publish failure: {err}"),
        }
    }
}

impl Error for PipelineError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            PipelineError::Event(err) => Some(err),
            PipelineError::Fetch(err) => Some(err),
            PipelineError::Parse(err) => Some(err),
            PipelineError::SchemaDerivation(err) => Some(err),
            PipelineError::Encoding(err) => Some(err),
            PipelineError::Registry(err) => Some(err),
            PipelineError::Publish(err) => Some(err),
        }
    }
}

impl From<EventError> for PipelineError {
    fn from(value: EventError) -> Self {
        PipelineError::Event(value)
    }
}

impl From<FetchError> for PipelineError {
    fn from(value: FetchError) -> Self {
        PipelineError::Fetch(value)
    }
}

impl From<ParseError> for PipelineError {
    fn from(value: ParseError) -> Self {
        PipelineError::Parse(value)
    }
}

impl From<SchemaDerivationError> for PipelineError {
    fn from(value: SchemaDerivationError) -> Self {
        PipelineError::SchemaDerivation(value)
    }
}

impl From<EncodingError> for PipelineError {
    fn from(value: EncodingError) -> Self {
        PipelineError::Encoding(value)
    }
}

impl From<RegistryError> for PipelineError {
    fn from(value: RegistryError) -> Self {
        PipelineError::Registry(value)
    }
}

impl From<PublishError> for PipelineError {
    fn from(value: PublishError) -> Self {
        PipelineError::Publish(value)
    }
}

/// Errors raised while building a [`Pipeline`](crate::Pipeline).
#[derive(Debug, Error)]
pub enum InitError {
    #[error(transparent)]
    Config(#[from] ConfigLoadError),

    #[error("cannot read schema template {path}: {source}")]
    TemplateRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("schema template rejected: {0}")]
    Template(#[source] SchemaDerivationError),

    #[error("the global pipeline is already initialized")]
    AlreadyInitialized,
}
