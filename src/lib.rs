//! Workspace umbrella crate for docstream.
//!
//! Stitches the stage crates into one handler: a notification names an XML
//! object, which is fetched ([`ingest`]), parsed into a canonical record
//! ([`canonical`]), encoded as Avro against the configured template
//! ([`encode`]), registered and framed with a registry header, then put on a
//! stream ([`publish`]). The caller gets back `"success"` or `"failure"`.
//!
//! ```
//! use std::sync::Arc;
//! use docstream::{Collaborators, Pipeline, PipelineConfig};
//! use ingest::{InMemoryObjectStore, NotificationEvent};
//! use publish::{InMemoryRegistry, InMemoryStream};
//!
//! let config = PipelineConfig::default();
//! let objects = Arc::new(InMemoryObjectStore::new());
//! objects.put_object("inbound", "item.xml", "<Item><Sku>ABC</Sku><Qty>5</Qty></Item>");
//! let stream = Arc::new(InMemoryStream::new(config.stream_name.clone(), 1));
//!
//! let pipeline = Pipeline::new(
//!     config,
//!     Collaborators {
//!         objects,
//!         registry: Arc::new(InMemoryRegistry::new()),
//!         stream: stream.clone(),
//!     },
//! )?;
//! let event = NotificationEvent::from_json(
//!     r#"{"Records":[{"s3":{"bucket":{"name":"inbound"},"object":{"key":"item.xml"}}}]}"#,
//! )?;
//!
//! assert_eq!(pipeline.handle(&event).as_str(), "success");
//! assert_eq!(stream.records().len(), 1);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod config;
mod error;
mod metrics;
mod pipeline;

pub use crate::config::{BUNDLED_SCHEMA_TEMPLATE, ConfigLoadError, PipelineConfig};
pub use crate::error::{InitError, PipelineError};
pub use crate::metrics::{PipelineMetrics, set_pipeline_metrics};
pub use crate::pipeline::{
    Collaborators, InvocationReport, Outcome, Pipeline, RecordReport, Stage,
};

use ingest::NotificationEvent;
use once_cell::sync::OnceCell;
use tracing::warn;

static GLOBAL_PIPELINE: OnceCell<Pipeline> = OnceCell::new();

/// Install the process-wide pipeline used by [`handle_request`].
pub fn init_global(pipeline: Pipeline) -> Result<&'static Pipeline, InitError> {
    GLOBAL_PIPELINE
        .set(pipeline)
        .map_err(|_| InitError::AlreadyInitialized)?;
    GLOBAL_PIPELINE.get().ok_or(InitError::AlreadyInitialized)
}

pub fn global() -> Option<&'static Pipeline> {
    GLOBAL_PIPELINE.get()
}

/// Entry point for a hosted invocation: `"success"` or `"failure"`.
pub fn handle_request(event: &NotificationEvent) -> &'static str {
    match global() {
        Some(pipeline) => pipeline.handle(event).as_str(),
        None => {
            warn!("pipeline_uninitialized");
            Outcome::Failure.as_str()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, RwLock};
    use std::time::Duration;

    use canonical::ParseError;
    use ingest::{FetchError, InMemoryObjectStore};
    use publish::{InMemoryRegistry, InMemoryStream, PublishError, RegistryError};

    fn event(key: &str) -> NotificationEvent {
        NotificationEvent::from_value(serde_json::json!({
            "Records": [{"s3": {"bucket": {"name": "inbound"}, "object": {"key": key}}}]
        }))
        .expect("event")
    }

    fn pipeline(objects: Arc<InMemoryObjectStore>) -> Pipeline {
        let config = PipelineConfig::default();
        let stream = Arc::new(InMemoryStream::new(config.stream_name.clone(), 1));
        Pipeline::new(
            config,
            Collaborators {
                objects,
                registry: Arc::new(InMemoryRegistry::new()),
                stream,
            },
        )
        .expect("pipeline")
    }

    #[derive(Default)]
    struct CountingMetrics {
        events: RwLock<Vec<&'static str>>,
    }

    impl CountingMetrics {
        fn push(&self, label: &'static str) {
            self.events.write().unwrap().push(label);
        }

        fn snapshot(&self) -> Vec<&'static str> {
            self.events.read().unwrap().clone()
        }
    }

    impl PipelineMetrics for CountingMetrics {
        fn record_fetch(&self, _latency: Duration, result: Result<(), FetchError>) {
            self.push(if result.is_ok() { "fetch_ok" } else { "fetch_err" });
        }

        fn record_parse(&self, _latency: Duration, result: Result<(), ParseError>) {
            self.push(if result.is_ok() { "parse_ok" } else { "parse_err" });
        }

        fn record_encode(&self, _latency: Duration, result: Result<(), PipelineError>) {
            self.push(if result.is_ok() { "encode_ok" } else { "encode_err" });
        }

        fn record_register(&self, _latency: Duration, result: Result<(), RegistryError>) {
            self.push(if result.is_ok() { "register_ok" } else { "register_err" });
        }

        fn record_publish(&self, _latency: Duration, result: Result<(), PublishError>) {
            self.push(if result.is_ok() { "publish_ok" } else { "publish_err" });
        }
    }

    #[test]
    fn metrics_recorder_tracks_pipeline_stages() {
        let objects = Arc::new(InMemoryObjectStore::new());
        objects.put_object("inbound", "ok.xml", "<Item><Sku>A</Sku><Qty>1</Qty></Item>");
        objects.put_object("inbound", "bad.xml", "<Item><Sku>A</Sku></Item>");
        let pipeline = pipeline(objects);

        let metrics = Arc::new(CountingMetrics::default());
        set_pipeline_metrics(Some(metrics.clone()));

        assert_eq!(pipeline.handle(&event("ok.xml")), Outcome::Success);
        assert_eq!(pipeline.handle(&event("bad.xml")), Outcome::Failure);

        set_pipeline_metrics(None);

        let events = metrics.snapshot();
        for label in ["fetch_ok", "parse_ok", "encode_ok", "register_ok", "publish_ok", "parse_err"] {
            assert!(events.contains(&label), "missing {label} in {events:?}");
        }
    }

    #[test]
    fn handle_request_uses_global_pipeline() {
        let objects = Arc::new(InMemoryObjectStore::new());
        objects.put_object("inbound", "item.xml", "<Item><Sku>ABC</Sku><Qty>5</Qty></Item>");

        let installed = init_global(pipeline(objects)).expect("first install");
        assert!(std::ptr::eq(installed, global().expect("global")));
        assert_eq!(handle_request(&event("item.xml")), "success");
        assert_eq!(handle_request(&event("missing.xml")), "failure");

        let second = init_global(pipeline(Arc::new(InMemoryObjectStore::new())));
        assert!(matches!(second, Err(InitError::AlreadyInitialized)));
    }
}
