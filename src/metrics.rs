use std::sync::{Arc, OnceLock, RwLock};
use std::time::{Duration, Instant};

use canonical::ParseError;
use ingest::FetchError;
use publish::{PublishError, RegistryError};

use crate::error::PipelineError;

/// Metrics observer for pipeline stages.
pub trait PipelineMetrics: Send + Sync {
    fn record_fetch(&self, latency: Duration, result: Result<(), FetchError>);
    fn record_parse(&self, latency: Duration, result: Result<(), ParseError>);
    /// Schema derivation and Avro encoding together.
    fn record_encode(&self, latency: Duration, result: Result<(), PipelineError>);
    fn record_register(&self, latency: Duration, result: Result<(), RegistryError>);
    fn record_publish(&self, latency: Duration, result: Result<(), PublishError>);
}

/// Install or clear the global pipeline metrics recorder.
pub fn set_pipeline_metrics(recorder: Option<Arc<dyn PipelineMetrics>>) {
    let mut guard = metrics_lock()
        .write()
        .unwrap_or_else(|poisoned| poisoned.into_inner());
    *guard = recorder;
}

fn metrics_lock() -> &'static RwLock<Option<Arc<dyn PipelineMetrics>>> {
    static METRICS: OnceLock<RwLock<Option<Arc<dyn PipelineMetrics>>>> = OnceLock::new();
    METRICS.get_or_init(|| RwLock::new(None))
}

fn metrics_recorder() -> Option<Arc<dyn PipelineMetrics>> {
    let guard = metrics_lock()
        .read()
        .unwrap_or_else(|poisoned| poisoned.into_inner());
    guard.clone()
}

pub(crate) struct MetricsSpan {
    recorder: Arc<dyn PipelineMetrics>,
    start: Instant,
}

impl MetricsSpan {
    pub(crate) fn start() -> Option<Self> {
        metrics_recorder().map(|recorder| Self {
            recorder,
            start: Instant::now(),
        })
    }

    /// Hand a started span to `record`; no-op when no recorder is installed.
    pub(crate) fn finish(span: Option<Self>, record: impl FnOnce(Self)) {
        if let Some(span) = span {
            record(span);
        }
    }

    pub(crate) fn record_fetch(self, result: Result<(), FetchError>) {
        self.recorder.record_fetch(self.start.elapsed(), result);
    }

    pub(crate) fn record_parse(self, result: Result<(), ParseError>) {
        self.recorder.record_parse(self.start.elapsed(), result);
    }

    pub(crate) fn record_encode(self, result: Result<(), PipelineError>) {
        self.recorder.record_encode(self.start.elapsed(), result);
    }

    pub(crate) fn record_register(self, result: Result<(), RegistryError>) {
        self.recorder.record_register(self.start.elapsed(), result);
    }

    pub(crate) fn record_publish(self, result: Result<(), PublishError>) {
        self.recorder.record_publish(self.start.elapsed(), result);
    }
}
