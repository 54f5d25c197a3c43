//! docstream CLI - run one notification through the pipeline locally.
//!
//! Usage:
//!   docstream --event event.json --objects ./buckets
//!   cat event.json | docstream --event - --objects ./buckets --config docstream.yaml
//!
//! Objects are read from `<objects>/<bucket>/<key>`. The schema registry and
//! the stream are in-memory, so the run shows what would be published.

use std::io::Read;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use docstream::{Collaborators, Pipeline, PipelineConfig};
use ingest::FsObjectStore;
use publish::{InMemoryRegistry, InMemoryStream};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "docstream")]
#[command(about = "Publish an XML object named by a storage notification as an Avro record")]
#[command(version)]
struct Args {
    /// Notification JSON file, or `-` for stdin
    #[arg(short, long)]
    event: String,

    /// Directory holding `<bucket>/<key>` objects
    #[arg(short, long, default_value = ".")]
    objects: PathBuf,

    /// Configuration file (YAML, TOML or JSON); defaults to `docstream.*` if present
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Number of shards in the in-memory stream
    #[arg(long, default_value_t = 1)]
    shards: u32,

    /// Print the invocation report as JSON instead of the bare outcome
    #[arg(long)]
    report: bool,
}

fn main() -> Result<ExitCode> {
    let args = Args::parse();

    let config = PipelineConfig::load_from(args.config.as_deref())
        .context("failed to load pipeline configuration")?;

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level)),
        )
        .with_target(false)
        .json()
        .init();

    let event = read_event(&args.event)?;

    let stream = Arc::new(InMemoryStream::new(config.stream_name.clone(), args.shards));
    let pipeline = Pipeline::new(
        config,
        Collaborators {
            objects: Arc::new(FsObjectStore::new(&args.objects)),
            registry: Arc::new(InMemoryRegistry::new()),
            stream: stream.clone(),
        },
    )
    .context("failed to initialize pipeline")?;

    info!(
        region = %pipeline.config().region,
        registry = %pipeline.config().registry_name,
        stream = %pipeline.config().stream_name,
        "pipeline_ready"
    );

    let report = pipeline.handle_json(&event);
    info!(stored = stream.records().len(), "stream_records");
    if args.report {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("{}", report.outcome);
    }

    Ok(if report.outcome.is_success() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

fn read_event(source: &str) -> Result<String> {
    if source == "-" {
        let mut buf = String::new();
        std::io::stdin()
            .read_to_string(&mut buf)
            .context("failed to read event from stdin")?;
        Ok(buf)
    } else {
        std::fs::read_to_string(source).with_context(|| format!("failed to read event file {source}"))
    }
}
