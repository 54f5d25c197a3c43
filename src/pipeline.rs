//! The notification handler.
//!
//! ```text
//! Received -> Fetched -> Parsed -> Encoded -> Wrapped -> Published -> Done
//!     \__________\__________\_________\_________\__________\-> Failed
//! ```
//!
//! Each stage either hands its output to the next or stops the invocation.
//! Nothing is written to the stream unless every earlier stage succeeded.

use std::fmt;
use std::sync::Arc;
use std::time::Instant;

use canonical::{InterchangePayload, parse};
use encode::{SchemaDescriptor, SchemaTemplate};
use ingest::{NotificationEvent, ObjectLocation, ObjectStore, fetch};
use publish::{
    EncodedRecord, PublishResult, RegistryPublisher, SchemaRegistry, StreamClient,
    StreamPublisher,
};
use serde::Serialize;
use tracing::{Level, debug, info, warn};
use uuid::Uuid;

use crate::config::PipelineConfig;
use crate::error::{InitError, PipelineError};
use crate::metrics::MetricsSpan;

/// Invocation result as seen by whoever delivered the notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
    Success,
    Failure,
}

impl Outcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Outcome::Success => "success",
            Outcome::Failure => "failure",
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Outcome::Success)
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Progress of one invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Received,
    Fetched,
    Parsed,
    Encoded,
    Wrapped,
    Published,
    Done,
    Failed,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Received => "received",
            Stage::Fetched => "fetched",
            Stage::Parsed => "parsed",
            Stage::Encoded => "encoded",
            Stage::Wrapped => "wrapped",
            Stage::Published => "published",
            Stage::Done => "done",
            Stage::Failed => "failed",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What happened to one published object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RecordReport {
    pub location: ObjectLocation,
    /// SHA-256 of the interchange text.
    pub payload_sha256: String,
    pub schema_version_id: Uuid,
    pub schema_version: u32,
    pub placement: PublishResult,
}

/// Detailed result of [`Pipeline::handle_with_report`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InvocationReport {
    pub outcome: Outcome,
    /// [`Stage::Done`] on success, otherwise the last stage completed before
    /// the failure.
    pub stage: Stage,
    pub records: Vec<RecordReport>,
    /// Notification records left unprocessed by the record selection.
    pub skipped: usize,
    pub error_code: Option<&'static str>,
    pub error: Option<String>,
}

impl InvocationReport {
    fn failed(stage: Stage, records: Vec<RecordReport>, skipped: usize, err: &PipelineError) -> Self {
        Self {
            outcome: Outcome::Failure,
            stage,
            records,
            skipped,
            error_code: Some(err.code()),
            error: Some(err.to_string()),
        }
    }
}

/// Trait objects the pipeline talks to.
#[derive(Clone)]
pub struct Collaborators {
    pub objects: Arc<dyn ObjectStore>,
    pub registry: Arc<dyn SchemaRegistry>,
    pub stream: Arc<dyn StreamClient>,
}

/// A failure together with the last stage that completed.
#[derive(Debug)]
struct StageFailure {
    reached: Stage,
    error: PipelineError,
}

/// Fetch, parse, encode, register and publish objects named by notifications.
///
/// Built once and shared read-only; every call to [`handle`](Self::handle) is
/// independent.
pub struct Pipeline {
    config: PipelineConfig,
    template: SchemaTemplate,
    objects: Arc<dyn ObjectStore>,
    registry: RegistryPublisher,
    stream: StreamPublisher,
}

impl Pipeline {
    /// Validate `config`, load its schema template and wire the collaborators.
    pub fn new(config: PipelineConfig, collaborators: Collaborators) -> Result<Self, InitError> {
        config.validate()?;
        let text = config.template_text().map_err(|source| InitError::TemplateRead {
            path: config.template_path.clone().unwrap_or_default(),
            source,
        })?;
        let template = SchemaTemplate::parse(&text).map_err(InitError::Template)?;
        Ok(Self::with_template(config, template, collaborators))
    }

    /// Build from an already parsed template. `config` is trusted as is.
    pub fn with_template(
        config: PipelineConfig,
        template: SchemaTemplate,
        collaborators: Collaborators,
    ) -> Self {
        let registry = RegistryPublisher::new(
            collaborators.registry,
            config.registry_name.clone(),
            config.auto_register,
        );
        let stream = StreamPublisher::new(collaborators.stream, config.stream_name.clone())
            .with_stream_arn(config.stream_arn.clone());
        Self {
            template: template.with_data_format(config.data_format),
            objects: collaborators.objects,
            registry,
            stream,
            config,
        }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn template(&self) -> &SchemaTemplate {
        &self.template
    }

    /// Process `event` and return the literal outcome.
    pub fn handle(&self, event: &NotificationEvent) -> Outcome {
        self.handle_with_report(event).outcome
    }

    /// Parse a JSON notification and process it.
    pub fn handle_json(&self, event_json: &str) -> InvocationReport {
        match NotificationEvent::from_json(event_json) {
            Ok(event) => self.handle_with_report(&event),
            Err(err) => {
                let err = PipelineError::from(err);
                warn!(error = %err, code = err.code(), "pipeline_failure");
                InvocationReport::failed(Stage::Received, Vec::new(), 0, &err)
            }
        }
    }

    /// Process `event`, reporting per-record results and the failure, if any.
    pub fn handle_with_report(&self, event: &NotificationEvent) -> InvocationReport {
        let start = Instant::now();
        let span = tracing::span!(
            Level::INFO,
            "pipeline.handle",
            records = event.records.len(),
            stream = %self.config.stream_name,
            region = %self.config.region
        );
        let _guard = span.enter();

        let locations = match event.locations(self.config.record_selection) {
            Ok(locations) => locations,
            Err(err) => {
                let err = PipelineError::from(err);
                let elapsed_micros = start.elapsed().as_micros();
                warn!(error = %err, code = err.code(), elapsed_micros, "pipeline_failure");
                return InvocationReport::failed(Stage::Received, Vec::new(), 0, &err);
            }
        };
        let skipped = event.records.len() - locations.len();
        if skipped > 0 {
            info!(skipped, "notification_records_skipped");
        }

        let mut records = Vec::with_capacity(locations.len());
        for location in &locations {
            match self.process(location) {
                Ok(report) => records.push(report),
                Err(failure) => {
                    let elapsed_micros = start.elapsed().as_micros();
                    warn!(
                        bucket = %location.bucket,
                        key = %location.key,
                        stage = %failure.reached,
                        error = %failure.error,
                        code = failure.error.code(),
                        elapsed_micros,
                        "pipeline_failure"
                    );
                    return InvocationReport::failed(failure.reached, records, skipped, &failure.error);
                }
            }
        }

        let elapsed_micros = start.elapsed().as_micros();
        info!(published = records.len(), skipped, elapsed_micros, "pipeline_success");
        InvocationReport {
            outcome: Outcome::Success,
            stage: Stage::Done,
            records,
            skipped,
            error_code: None,
            error: None,
        }
    }

    /// Run one object through every stage.
    fn process(&self, location: &ObjectLocation) -> Result<RecordReport, StageFailure> {
        let fail = |reached: Stage| move |error: PipelineError| StageFailure { reached, error };

        let span = MetricsSpan::start();
        let fetched = fetch(self.objects.as_ref(), location);
        MetricsSpan::finish(span, |s| s.record_fetch(status(&fetched)));
        let document = fetched.map_err(PipelineError::from).map_err(fail(Stage::Received))?;

        let span = MetricsSpan::start();
        let parsed = parse(&document.text, &self.config.layout);
        MetricsSpan::finish(span, |s| s.record_parse(status(&parsed)));
        let record = parsed.map_err(PipelineError::from).map_err(fail(Stage::Fetched))?;

        let payload = InterchangePayload::from_record(&record);
        debug!(payload = %payload.text, sha256 = %payload.sha256_hex, "interchange_payload");

        let span = MetricsSpan::start();
        let encoded = self.encode_payload(&payload);
        MetricsSpan::finish(span, |s| s.record_encode(status(&encoded)));
        let (schema, bytes) = encoded.map_err(fail(Stage::Parsed))?;

        let span = MetricsSpan::start();
        let wrapped = self
            .registry
            .register_and_wrap(&schema, &bytes, &self.config.stream_name);
        MetricsSpan::finish(span, |s| s.record_register(status(&wrapped)));
        let wrapped: EncodedRecord =
            wrapped.map_err(PipelineError::from).map_err(fail(Stage::Encoded))?;

        let span = MetricsSpan::start();
        let published = self.stream.publish(&wrapped, &self.config.partition_key);
        MetricsSpan::finish(span, |s| s.record_publish(status(&published)));
        let placement = published.map_err(PipelineError::from).map_err(fail(Stage::Wrapped))?;

        Ok(RecordReport {
            location: location.clone(),
            payload_sha256: payload.sha256_hex,
            schema_version_id: wrapped.schema_version_id,
            schema_version: wrapped.version_number,
            placement,
        })
    }

    fn encode_payload(
        &self,
        payload: &InterchangePayload,
    ) -> Result<(SchemaDescriptor, Vec<u8>), PipelineError> {
        let schema = self.template.derive(&payload.text, &self.config.schema_name)?;
        let bytes = self.template.encode(&payload.text)?;
        Ok((schema, bytes))
    }
}

fn status<T, E: Clone>(result: &Result<T, E>) -> Result<(), E> {
    result.as_ref().map(|_| ()).map_err(Clone::clone)
}
