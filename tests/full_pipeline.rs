use std::sync::Arc;

use canonical::{FieldSpec, FieldType, RecordSpec, hash_text};
use docstream::{Collaborators, Outcome, Pipeline, PipelineConfig, Stage};
use encode::{AvroValue, SchemaDescriptor, decode};
use ingest::{FsObjectStore, InMemoryObjectStore, NotificationEvent, RecordSelection};
use publish::{HEADER_LEN, InMemoryRegistry, InMemoryStream, SchemaRegistry, decode_header};

struct Harness {
    objects: Arc<InMemoryObjectStore>,
    registry: Arc<InMemoryRegistry>,
    stream: Arc<InMemoryStream>,
    pipeline: Pipeline,
}

fn harness(config: PipelineConfig) -> Harness {
    let objects = Arc::new(InMemoryObjectStore::new());
    let registry = Arc::new(InMemoryRegistry::new());
    let stream = Arc::new(InMemoryStream::new(config.stream_name.clone(), 2));
    let pipeline = Pipeline::new(
        config,
        Collaborators {
            objects: objects.clone(),
            registry: registry.clone(),
            stream: stream.clone(),
        },
    )
    .expect("pipeline");
    Harness {
        objects,
        registry,
        stream,
        pipeline,
    }
}

fn event(keys: &[&str]) -> NotificationEvent {
    let records: Vec<serde_json::Value> = keys
        .iter()
        .map(|key| {
            serde_json::json!({
                "eventSource": "aws:s3",
                "eventName": "ObjectCreated:Put",
                "eventTime": "2024-05-01T10:00:00.000Z",
                "s3": {"bucket": {"name": "inventory-inbound"}, "object": {"key": key}}
            })
        })
        .collect();
    NotificationEvent::from_value(serde_json::json!({ "Records": records })).expect("event")
}

fn decode_published(registry: &InMemoryRegistry, data: &[u8]) -> AvroValue {
    let (header, payload) = decode_header(data).expect("header");
    let version = registry
        .get_schema_version(header.schema_version_id)
        .expect("registered version");
    let schema = SchemaDescriptor {
        name: version.schema_name,
        data_format: version.data_format,
        definition: version.definition,
    };
    decode(payload, &schema).expect("avro datum")
}

#[test]
fn inventory_item_is_published_with_defaults() {
    let h = harness(PipelineConfig::default());
    h.objects.put_object(
        "inventory-inbound",
        "items/abc.xml",
        "<Item><Sku>ABC</Sku><Qty>5</Qty></Item>",
    );

    let report = h.pipeline.handle_with_report(&event(&["items/abc.xml"]));
    assert_eq!(report.outcome, Outcome::Success);
    assert_eq!(report.outcome.as_str(), "success");
    assert_eq!(report.stage, Stage::Done);
    assert_eq!(report.error_code, None);
    assert_eq!(report.records.len(), 1);
    assert_eq!(report.records[0].payload_sha256, hash_text("sku=ABC\nqty=5"));
    assert_eq!(report.records[0].schema_version, 1);

    let stored = h.stream.records();
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].stream_name, "inventory-update-kinesis-spike");
    assert_eq!(stored[0].partition_key, "partitionKey-1");
    assert_eq!(
        stored[0].stream_arn.as_deref(),
        Some("arn:aws:kinesis:ap-south-1:417610864161:stream/inventory-update-kinesis-spike")
    );
    assert_eq!(stored[0].shard_id, report.records[0].placement.shard_id);
    assert_eq!(
        &stored[0].data[HEADER_LEN..],
        &[0x06, b'A', b'B', b'C', 0x0a]
    );

    let value = decode_published(&h.registry, &stored[0].data);
    assert_eq!(
        value,
        AvroValue::Record(vec![
            ("sku".to_string(), AvroValue::String("ABC".into())),
            ("qty".to_string(), AvroValue::Int(5)),
        ])
    );

    let versions = h.registry.versions(
        "InventoryEventSchemas",
        "inventory-update-kinesis-spike.InventoryEvent",
    );
    assert_eq!(versions.len(), 1);
    assert_eq!(versions[0].version_id, report.records[0].schema_version_id);
    assert_eq!(versions[0].data_format, h.pipeline.config().data_format);
}

#[test]
fn first_selection_skips_remaining_records() {
    let h = harness(PipelineConfig::default());
    h.objects
        .put_object("inventory-inbound", "a.xml", "<Item><Sku>A</Sku><Qty>1</Qty></Item>");
    h.objects
        .put_object("inventory-inbound", "b.xml", "<Item><Sku>B</Sku><Qty>2</Qty></Item>");

    let report = h.pipeline.handle_with_report(&event(&["a.xml", "b.xml"]));
    assert_eq!(report.outcome, Outcome::Success);
    assert_eq!(report.records.len(), 1);
    assert_eq!(report.skipped, 1);
    assert_eq!(h.stream.records().len(), 1);
}

#[test]
fn all_selection_publishes_every_record_in_order() {
    let config = PipelineConfig {
        record_selection: RecordSelection::All,
        ..PipelineConfig::default()
    };
    let h = harness(config);
    for (key, sku) in [("a.xml", "A"), ("b.xml", "B"), ("c.xml", "C")] {
        h.objects.put_object(
            "inventory-inbound",
            key,
            format!("<Item><Sku>{sku}</Sku><Qty>1</Qty></Item>"),
        );
    }

    let report = h.pipeline.handle_with_report(&event(&["a.xml", "b.xml", "c.xml"]));
    assert_eq!(report.outcome, Outcome::Success);
    assert_eq!(report.skipped, 0);

    let stored = h.stream.records();
    assert_eq!(stored.len(), 3);
    let skus: Vec<AvroValue> = stored
        .iter()
        .map(|record| match decode_published(&h.registry, &record.data) {
            AvroValue::Record(fields) => fields[0].1.clone(),
            other => panic!("unexpected {other:?}"),
        })
        .collect();
    assert_eq!(
        skus,
        vec![
            AvroValue::String("A".into()),
            AvroValue::String("B".into()),
            AvroValue::String("C".into()),
        ]
    );
    let sequences: Vec<&str> = stored.iter().map(|r| r.sequence_number.as_str()).collect();
    let mut sorted = sequences.clone();
    sorted.sort();
    assert_eq!(sequences, sorted);
}

#[test]
fn filesystem_objects_with_encoded_keys() {
    let dir = tempfile::tempdir().expect("tempdir");
    let bucket = dir.path().join("inventory-inbound").join("daily drops");
    std::fs::create_dir_all(&bucket).expect("mkdir");
    std::fs::write(
        bucket.join("item 7.xml"),
        "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<Item>\n  <Sku>XYZ-7</Sku>\n  <Qty>12</Qty>\n</Item>\n",
    )
    .expect("write");

    let config = PipelineConfig::default();
    let stream = Arc::new(InMemoryStream::new(config.stream_name.clone(), 1));
    let pipeline = Pipeline::new(
        config,
        Collaborators {
            objects: Arc::new(FsObjectStore::new(dir.path())),
            registry: Arc::new(InMemoryRegistry::new()),
            stream: stream.clone(),
        },
    )
    .expect("pipeline");

    let outcome = pipeline.handle(&event(&["daily+drops/item+7.xml"]));
    assert_eq!(outcome, Outcome::Success);
    assert_eq!(stream.records().len(), 1);
}

#[test]
fn configured_layout_and_template_handle_nested_documents() {
    let dir = tempfile::tempdir().expect("tempdir");
    let template_path = dir.path().join("order.avsc");
    std::fs::write(
        &template_path,
        r#"{
  "type": "record",
  "name": "OrderEvent",
  "fields": [
    {"name": "id", "type": "long"},
    {"name": "location", "type": {"type": "record", "name": "Location",
      "fields": [{"name": "bin", "type": "string"}]}},
    {"name": "lines", "type": {"type": "array", "items": {"type": "record", "name": "Line",
      "fields": [{"name": "sku", "type": "string"}, {"name": "qty", "type": "int"}]}}},
    {"name": "note", "type": ["null", "string"], "default": null}
  ]
}"#,
    )
    .expect("template");

    let config = PipelineConfig {
        schema_name: "OrderEvent".into(),
        stream_name: "orders".into(),
        stream_arn: None,
        template_path: Some(template_path),
        layout: RecordSpec::new(
            "order",
            "Order",
            vec![
                FieldSpec::attribute("id", "id", FieldType::Long).required(),
                FieldSpec::record(
                    "location",
                    "Location",
                    vec![FieldSpec::element("bin", "Bin", FieldType::String).required()],
                )
                .required(),
                FieldSpec::list(
                    "lines",
                    "Line",
                    vec![
                        FieldSpec::element("sku", "Sku", FieldType::String).required(),
                        FieldSpec::element("qty", "Qty", FieldType::Int).required(),
                    ],
                ),
                FieldSpec::element("note", "Note", FieldType::String),
            ],
        ),
        ..PipelineConfig::default()
    };
    let h = harness(config);
    h.objects.put_object(
        "inventory-inbound",
        "order.xml",
        r#"<ns:Order xmlns:ns="urn:orders" id="9001">
  <ns:Location><ns:Bin>A4</ns:Bin></ns:Location>
  <ns:Line><ns:Sku>A</ns:Sku><ns:Qty>2</ns:Qty></ns:Line>
  <ns:Line><ns:Sku>B</ns:Sku><ns:Qty>3</ns:Qty></ns:Line>
  <ns:Ignored>x</ns:Ignored>
</ns:Order>"#,
    );

    let report = h.pipeline.handle_with_report(&event(&["order.xml"]));
    assert_eq!(report.outcome, Outcome::Success, "{:?}", report.error);

    let stored = h.stream.records();
    assert_eq!(stored[0].stream_arn, None);
    let AvroValue::Record(fields) = decode_published(&h.registry, &stored[0].data) else {
        panic!("expected record");
    };
    assert_eq!(fields[0].1, AvroValue::Long(9001));
    assert_eq!(
        fields[1].1,
        AvroValue::Record(vec![("bin".to_string(), AvroValue::String("A4".into()))])
    );
    let AvroValue::Array(lines) = &fields[2].1 else {
        panic!("expected array");
    };
    assert_eq!(lines.len(), 2);
    assert_eq!(fields[3].1, AvroValue::Union(0, Box::new(AvroValue::Null)));
    assert_eq!(
        h.registry.versions("InventoryEventSchemas", "orders.OrderEvent").len(),
        1
    );
}
