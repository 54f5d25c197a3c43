use std::path::PathBuf;
use std::sync::Arc;

use docstream::{Collaborators, InitError, Outcome, Pipeline, PipelineConfig, Stage};
use encode::SchemaTemplate;
use ingest::{InMemoryObjectStore, NotificationEvent, RecordSelection};
use publish::{InMemoryRegistry, InMemoryStream, InjectedFailure};

const BUCKET: &str = "inventory-inbound";

struct Harness {
    objects: Arc<InMemoryObjectStore>,
    registry: Arc<InMemoryRegistry>,
    stream: Arc<InMemoryStream>,
}

impl Harness {
    fn new() -> Self {
        Self {
            objects: Arc::new(InMemoryObjectStore::new()),
            registry: Arc::new(InMemoryRegistry::new()),
            stream: Arc::new(InMemoryStream::new(
                PipelineConfig::default().stream_name,
                1,
            )),
        }
    }

    fn collaborators(&self) -> Collaborators {
        Collaborators {
            objects: self.objects.clone(),
            registry: self.registry.clone(),
            stream: self.stream.clone(),
        }
    }

    fn pipeline(&self, config: PipelineConfig) -> Pipeline {
        Pipeline::new(config, self.collaborators()).expect("pipeline")
    }

    fn registered_versions(&self) -> usize {
        self.registry
            .versions(
                "InventoryEventSchemas",
                "inventory-update-kinesis-spike.InventoryEvent",
            )
            .len()
    }
}

fn event(keys: &[&str]) -> NotificationEvent {
    let records: Vec<serde_json::Value> = keys
        .iter()
        .map(|key| serde_json::json!({"s3": {"bucket": {"name": BUCKET}, "object": {"key": key}}}))
        .collect();
    NotificationEvent::from_value(serde_json::json!({ "Records": records })).expect("event")
}

#[test]
fn missing_required_element_fails_before_publishing() {
    let h = Harness::new();
    h.objects.put_object(BUCKET, "item.xml", "<Item><Sku>ABC</Sku></Item>");
    let pipeline = h.pipeline(PipelineConfig::default());

    let report = pipeline.handle_with_report(&event(&["item.xml"]));
    assert_eq!(report.outcome, Outcome::Failure);
    assert_eq!(report.outcome.as_str(), "failure");
    assert_eq!(report.error_code, Some("PARSE_ERROR"));
    assert_eq!(report.stage, Stage::Fetched);
    assert!(report.error.as_deref().unwrap_or_default().contains("qty"));
    assert!(h.stream.records().is_empty());
    assert_eq!(h.registered_versions(), 0);
}

#[test]
fn malformed_xml_is_a_parse_failure() {
    let h = Harness::new();
    h.objects.put_object(BUCKET, "item.xml", "<Item><Sku>ABC</Sku><Qty>5</Item>");
    let report = h
        .pipeline(PipelineConfig::default())
        .handle_with_report(&event(&["item.xml"]));
    assert_eq!(report.error_code, Some("PARSE_ERROR"));
    assert!(h.stream.records().is_empty());
}

#[test]
fn stream_transport_failure_is_reported() {
    let h = Harness::new();
    h.objects
        .put_object(BUCKET, "item.xml", "<Item><Sku>ABC</Sku><Qty>5</Qty></Item>");
    h.stream.inject_failure(Some(InjectedFailure::Transport));
    let pipeline = h.pipeline(PipelineConfig::default());

    let report = pipeline.handle_with_report(&event(&["item.xml"]));
    assert_eq!(report.outcome, Outcome::Failure);
    assert_eq!(report.error_code, Some("PUBLISH_ERROR"));
    assert_eq!(report.stage, Stage::Wrapped);
    assert!(report.records.is_empty());
    assert!(h.stream.records().is_empty());
}

#[test]
fn throttled_and_unacknowledged_puts_fail() {
    for failure in [InjectedFailure::Throttled, InjectedFailure::MissingSequenceNumber] {
        let h = Harness::new();
        h.objects
            .put_object(BUCKET, "item.xml", "<Item><Sku>ABC</Sku><Qty>5</Qty></Item>");
        h.stream.inject_failure(Some(failure));

        let report = h
            .pipeline(PipelineConfig::default())
            .handle_with_report(&event(&["item.xml"]));
        assert_eq!(report.outcome, Outcome::Failure, "{failure:?}");
        assert_eq!(report.error_code, Some("PUBLISH_ERROR"), "{failure:?}");
    }
}

#[test]
fn oversized_record_is_rejected_before_the_put() {
    let h = Harness::new();
    let sku = "X".repeat(1_100_000);
    h.objects.put_object(
        BUCKET,
        "big.xml",
        format!("<Item><Sku>{sku}</Sku><Qty>1</Qty></Item>"),
    );

    let report = h
        .pipeline(PipelineConfig::default())
        .handle_with_report(&event(&["big.xml"]));
    assert_eq!(report.error_code, Some("PUBLISH_ERROR"));
    assert_eq!(report.stage, Stage::Wrapped);
    assert!(h.stream.records().is_empty());
}

#[test]
fn registry_outage_stops_the_record() {
    let h = Harness::new();
    h.objects
        .put_object(BUCKET, "item.xml", "<Item><Sku>ABC</Sku><Qty>5</Qty></Item>");
    h.registry.set_available(false);

    let report = h
        .pipeline(PipelineConfig::default())
        .handle_with_report(&event(&["item.xml"]));
    assert_eq!(report.error_code, Some("REGISTRY_ERROR"));
    assert_eq!(report.stage, Stage::Encoded);
    assert!(h.stream.records().is_empty());
}

#[test]
fn unknown_schema_without_auto_registration() {
    let h = Harness::new();
    h.objects
        .put_object(BUCKET, "item.xml", "<Item><Sku>ABC</Sku><Qty>5</Qty></Item>");
    let config = PipelineConfig {
        auto_register: false,
        ..PipelineConfig::default()
    };

    let report = h.pipeline(config).handle_with_report(&event(&["item.xml"]));
    assert_eq!(report.error_code, Some("REGISTRY_ERROR"));
    assert_eq!(h.registered_versions(), 0);
    assert!(h.stream.records().is_empty());
}

#[test]
fn incompatible_schema_change_is_refused() {
    let h = Harness::new();
    h.objects
        .put_object(BUCKET, "item.xml", "<Item><Sku>ABC</Sku><Qty>5</Qty></Item>");
    let first = h.pipeline(PipelineConfig::default());
    assert_eq!(first.handle(&event(&["item.xml"])), Outcome::Success);

    let widened = SchemaTemplate::parse(
        r#"{"type":"record","name":"InventoryEvent","fields":[
            {"name":"sku","type":"string"},{"name":"qty","type":"long"}]}"#,
    )
    .expect("template");
    let second = Pipeline::with_template(PipelineConfig::default(), widened, h.collaborators());

    let report = second.handle_with_report(&event(&["item.xml"]));
    assert_eq!(report.error_code, Some("REGISTRY_ERROR"));
    assert_eq!(h.registered_versions(), 1);
    assert_eq!(h.stream.records().len(), 1);
}

#[test]
fn template_field_missing_from_document() {
    let h = Harness::new();
    h.objects
        .put_object(BUCKET, "item.xml", "<Item><Sku>ABC</Sku><Qty>5</Qty></Item>");
    let template = SchemaTemplate::parse(
        r#"{"type":"record","name":"InventoryEvent","fields":[
            {"name":"sku","type":"string"},{"name":"qty","type":"int"},
            {"name":"site","type":"string"}]}"#,
    )
    .expect("template");
    let pipeline = Pipeline::with_template(PipelineConfig::default(), template, h.collaborators());

    let report = pipeline.handle_with_report(&event(&["item.xml"]));
    assert_eq!(report.error_code, Some("SCHEMA_DERIVATION_ERROR"));
    assert_eq!(report.stage, Stage::Parsed);
    assert_eq!(h.registered_versions(), 0);
}

#[test]
fn template_type_that_cannot_hold_the_value() {
    let h = Harness::new();
    h.objects
        .put_object(BUCKET, "item.xml", "<Item><Sku>ABC</Sku><Qty>5</Qty></Item>");
    let template = SchemaTemplate::parse(
        r#"{"type":"record","name":"InventoryEvent","fields":[
            {"name":"sku","type":"int"},{"name":"qty","type":"int"}]}"#,
    )
    .expect("template");
    let pipeline = Pipeline::with_template(PipelineConfig::default(), template, h.collaborators());

    let report = pipeline.handle_with_report(&event(&["item.xml"]));
    assert_eq!(report.error_code, Some("SCHEMA_DERIVATION_ERROR"));
    assert!(h.stream.records().is_empty());
}

#[test]
fn missing_object_is_a_fetch_failure() {
    let h = Harness::new();
    let report = h
        .pipeline(PipelineConfig::default())
        .handle_with_report(&event(&["nope.xml"]));
    assert_eq!(report.error_code, Some("FETCH_ERROR"));
    assert_eq!(report.stage, Stage::Received);
}

#[test]
fn object_that_is_not_utf8_is_a_fetch_failure() {
    let h = Harness::new();
    h.objects
        .put_object(BUCKET, "item.xml", vec![b'<', b'I', 0xff, 0xfe, b'>']);
    let report = h
        .pipeline(PipelineConfig::default())
        .handle_with_report(&event(&["item.xml"]));
    assert_eq!(report.error_code, Some("FETCH_ERROR"));
}

#[test]
fn object_store_outage_is_a_fetch_failure() {
    let h = Harness::new();
    h.objects
        .put_object(BUCKET, "item.xml", "<Item><Sku>ABC</Sku><Qty>5</Qty></Item>");
    h.objects.set_available(false);
    let outcome = h.pipeline(PipelineConfig::default()).handle(&event(&["item.xml"]));
    assert_eq!(outcome, Outcome::Failure);
}

#[test]
fn notification_without_records_fails() {
    let h = Harness::new();
    let pipeline = h.pipeline(PipelineConfig::default());

    let report = pipeline.handle_with_report(&event(&[]));
    assert_eq!(report.error_code, Some("EVENT_ERROR"));
    assert_eq!(report.stage, Stage::Received);

    let report = pipeline.handle_json("{ not json");
    assert_eq!(report.outcome, Outcome::Failure);
    assert_eq!(report.error_code, Some("EVENT_ERROR"));

    let report = pipeline.handle_json(r#"{"Records":[{"s3":{"bucket":{"name":""},"object":{"key":"a.xml"}}}]}"#);
    assert_eq!(report.error_code, Some("EVENT_ERROR"));
}

#[test]
fn later_record_failure_fails_the_invocation() {
    let h = Harness::new();
    h.objects
        .put_object(BUCKET, "a.xml", "<Item><Sku>A</Sku><Qty>1</Qty></Item>");
    let config = PipelineConfig {
        record_selection: RecordSelection::All,
        ..PipelineConfig::default()
    };

    let report = h
        .pipeline(config)
        .handle_with_report(&event(&["a.xml", "missing.xml", "a.xml"]));
    assert_eq!(report.outcome, Outcome::Failure);
    assert_eq!(report.error_code, Some("FETCH_ERROR"));
    assert_eq!(report.records.len(), 1);
    assert_eq!(h.stream.records().len(), 1);
}

#[test]
fn invalid_configuration_is_refused_at_startup() {
    let h = Harness::new();

    let config = PipelineConfig {
        partition_key: String::new(),
        ..PipelineConfig::default()
    };
    assert!(matches!(
        Pipeline::new(config, h.collaborators()),
        Err(InitError::Config(_))
    ));

    let config = PipelineConfig {
        stream_name: "other-stream".into(),
        ..PipelineConfig::default()
    };
    assert!(matches!(
        Pipeline::new(config, h.collaborators()),
        Err(InitError::Config(_))
    ));
}

#[test]
fn unreadable_or_invalid_template_is_refused_at_startup() {
    let h = Harness::new();

    let config = PipelineConfig {
        template_path: Some(PathBuf::from("/definitely/not/here.avsc")),
        ..PipelineConfig::default()
    };
    match Pipeline::new(config, h.collaborators()) {
        Err(InitError::TemplateRead { path, .. }) => {
            assert_eq!(path, PathBuf::from("/definitely/not/here.avsc"));
        }
        Err(other) => panic!("unexpected error {other}"),
        Ok(_) => panic!("template path should not resolve"),
    }

    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("broken.avsc");
    std::fs::write(&path, r#"{"type": "record", "name": "X"}"#).expect("write");
    let config = PipelineConfig {
        template_path: Some(path),
        ..PipelineConfig::default()
    };
    assert!(matches!(
        Pipeline::new(config, h.collaborators()),
        Err(InitError::Template(_))
    ));
}
