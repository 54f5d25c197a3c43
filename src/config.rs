//! Pipeline configuration.
//!
//! Settings come from, in increasing priority:
//!
//! 1. built-in defaults (the inventory deployment)
//! 2. an optional `docstream.{yaml,toml,json}` file, or the file passed explicitly
//! 3. `DOCSTREAM__*` environment variables, after `.env` is loaded
//!
//! ## Example YAML Configuration
//!
//! ```yaml
//! region: "ap-south-1"
//! registry_name: "InventoryEventSchemas"
//! schema_name: "InventoryEvent"
//! data_format: "AVRO"
//! auto_register: true
//! stream_name: "inventory-update-kinesis-spike"
//! partition_key: "partitionKey-1"
//! record_selection: "first"
//! log_level: "info"
//! layout:
//!   name: "item"
//!   element: "Item"
//!   fields:
//!     - { name: "sku", element: "Sku", type: "string", required: true }
//!     - { name: "qty", element: "Qty", type: "int", required: true }
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use canonical::RecordSpec;
use encode::DataFormat;
use ingest::RecordSelection;
use publish::MAX_PARTITION_KEY_CHARS;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Avro schema compiled into the binary, used when no template path is set.
pub const BUNDLED_SCHEMA_TEMPLATE: &str = include_str!("../resources/inventory_event.avsc");

/// Errors that can occur when loading or validating configuration
#[derive(Debug, Error)]
pub enum ConfigLoadError {
    #[error("failed to read config file: {0}")]
    FileRead(#[from] std::io::Error),

    #[error("failed to parse YAML: {0}")]
    YamlParse(#[from] serde_yaml::Error),

    #[error("failed to assemble configuration: {0}")]
    Source(#[from] config::ConfigError),

    #[error("validation error: {0}")]
    Validation(String),
}

/// Everything a [`Pipeline`](crate::Pipeline) needs besides its collaborators.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Deployment region, reported in logs.
    pub region: String,

    /// Registry that owns the schema.
    pub registry_name: String,

    /// Schema name; registered under `<stream_name>.<schema_name>`.
    pub schema_name: String,

    pub data_format: DataFormat,

    /// Register unknown definitions instead of failing.
    pub auto_register: bool,

    pub stream_name: String,

    /// Fully qualified stream identifier, when the transport wants one.
    pub stream_arn: Option<String>,

    pub partition_key: String,

    /// Avro template on disk; [`BUNDLED_SCHEMA_TEMPLATE`] when unset.
    pub template_path: Option<PathBuf>,

    pub record_selection: RecordSelection,

    pub log_level: String,

    /// How XML documents map onto canonical records.
    pub layout: RecordSpec,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            region: default_region(),
            registry_name: "InventoryEventSchemas".to_string(),
            schema_name: "InventoryEvent".to_string(),
            data_format: DataFormat::Avro,
            auto_register: true,
            stream_name: "inventory-update-kinesis-spike".to_string(),
            stream_arn: Some(
                "arn:aws:kinesis:ap-south-1:417610864161:stream/inventory-update-kinesis-spike"
                    .to_string(),
            ),
            partition_key: "partitionKey-1".to_string(),
            template_path: None,
            record_selection: RecordSelection::First,
            log_level: "info".to_string(),
            layout: RecordSpec::inventory_item(),
        }
    }
}

impl PipelineConfig {
    /// Load from an optional `docstream` file and `DOCSTREAM__*` variables.
    pub fn load() -> Result<Self, ConfigLoadError> {
        Self::load_from(None)
    }

    /// Like [`load`](Self::load), but with an explicit, required config file.
    pub fn load_from(path: Option<&Path>) -> Result<Self, ConfigLoadError> {
        dotenvy::dotenv().ok();

        let file = match path {
            Some(path) => config::File::from(path).required(true),
            None => config::File::with_name("docstream").required(false),
        };
        let builder = config::Config::builder()
            .add_source(file)
            .add_source(
                config::Environment::with_prefix("DOCSTREAM")
                    .separator("__")
                    .try_parsing(true),
            );

        let config: PipelineConfig = builder.build()?.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Load a YAML configuration file from the given path
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigLoadError> {
        let content = fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// Parse YAML configuration from a string
    pub fn from_yaml(yaml: &str) -> Result<Self, ConfigLoadError> {
        let config: PipelineConfig = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject settings the pipeline cannot run with.
    pub fn validate(&self) -> Result<(), ConfigLoadError> {
        for (field, value) in [
            ("registry_name", &self.registry_name),
            ("schema_name", &self.schema_name),
            ("stream_name", &self.stream_name),
            ("partition_key", &self.partition_key),
        ] {
            if value.trim().is_empty() {
                return Err(ConfigLoadError::Validation(format!("{field} must not be empty")));
            }
        }
        let key_chars = self.partition_key.chars().count();
        if key_chars > MAX_PARTITION_KEY_CHARS {
            return Err(ConfigLoadError::Validation(format!(
                "partition_key is {key_chars} characters, limit is {MAX_PARTITION_KEY_CHARS}"
            )));
        }
        if let Some(arn) = &self.stream_arn {
            let named = arn.rsplit_once(":stream/").map(|(_, name)| name);
            if named != Some(self.stream_name.as_str()) {
                return Err(ConfigLoadError::Validation(format!(
                    "stream_arn `{arn}` does not name stream `{}`",
                    self.stream_name
                )));
            }
        }
        self.layout
            .validate()
            .map_err(|err| ConfigLoadError::Validation(format!("layout: {err}")))?;
        Ok(())
    }

    /// Text of the schema template this configuration selects.
    pub fn template_text(&self) -> Result<String, std::io::Error> {
        match &self.template_path {
            Some(path) => fs::read_to_string(path),
            None => Ok(BUNDLED_SCHEMA_TEMPLATE.to_string()),
        }
    }
}

fn default_region() -> String {
    "ap-south-1".to_string()
}
