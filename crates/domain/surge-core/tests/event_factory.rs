use chrono::{TimeZone, Utc};
use std::collections::HashSet;
use std::sync::Arc;
use surge_core::{EventFactory, EventParams, EventTypeCatalog};

fn pinned_factory() -> EventFactory {
    EventFactory::with_clock(
        Arc::new(EventTypeCatalog::builtin()),
        Box::new(|| Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap()),
    )
}

#[test]
fn defaults_fill_every_missing_field() {
    let factory = pinned_factory();
    let event = factory.build(&EventParams {
        sequence: Some(7),
        ..EventParams::default()
    });

    assert_eq!(event.context.id, "lt-orders-7");
    assert_eq!(event.context.source, "loadtest/surge");
    assert_eq!(
        event.context.event_type,
        "dev.cdevents.service.deployed.0.3.0"
    );
    assert_eq!(event.context.specversion, "0.5.0");
    assert_eq!(event.context.chain_id, None);
    assert_eq!(event.subject.id, "service/orders");
    assert_eq!(event.subject.content.environment.id, "staging");
    assert_eq!(event.subject.content.artifact_id, "pkg:generic/orders@7");
    assert_eq!(event.subject.content.pipeline.run_id, "run-7");
    assert_eq!(event.subject.content.pipeline.url, "");
    assert_eq!(event.subject.content.actor.name, "loadtest-bot");
}

#[test]
fn id_contains_service_and_sequence_and_never_collides() {
    let factory = pinned_factory();
    let mut seen = HashSet::new();
    for n in 0..1000u64 {
        let event = factory.build(&EventParams {
            service: Some("billing".to_string()),
            sequence: Some(n),
            ..EventParams::default()
        });
        assert!(event.context.id.contains("billing"));
        assert!(event.context.id.contains(&n.to_string()));
        assert!(seen.insert(event.context.id), "duplicate id for n={n}");
    }
}

#[test]
fn unknown_short_type_is_embedded_verbatim() {
    let factory = pinned_factory();
    let event = factory.build(&EventParams {
        event_type: Some("dev.cdevents.pipeline.run.started.0.3.0".to_string()),
        sequence: Some(1),
        ..EventParams::default()
    });
    assert_eq!(
        event.context.event_type,
        "dev.cdevents.pipeline.run.started.0.3.0"
    );
}

#[test]
fn chain_id_groups_contiguous_sequences() {
    let factory = pinned_factory();
    // Grouping size 3, as the ingest scenario does.
    for n in 0..30u64 {
        let event = factory.build(&EventParams {
            sequence: Some(n),
            chain_id: Some(format!("lt-chain-{}", n / 3)),
            ..EventParams::default()
        });
        let k = n / 3;
        assert_eq!(event.context.chain_id, Some(format!("lt-chain-{k}")));
    }
}

#[test]
fn wire_format_uses_cdevents_casing() {
    let factory = pinned_factory();
    let event = factory.build(&EventParams {
        sequence: Some(3),
        chain_id: Some("lt-chain-1".to_string()),
        ..EventParams::default()
    });
    let json = serde_json::to_value(&event).unwrap();

    assert_eq!(json["context"]["type"], "dev.cdevents.service.deployed.0.3.0");
    assert_eq!(json["context"]["specversion"], "0.5.0");
    assert_eq!(json["context"]["chainId"], "lt-chain-1");
    assert_eq!(json["context"]["timestamp"], "2025-06-01T12:00:00.000Z");
    assert_eq!(json["subject"]["content"]["artifactId"], "pkg:generic/orders@3");
    assert_eq!(json["subject"]["content"]["pipeline"]["runId"], "run-3");
}

#[test]
fn chain_id_is_omitted_from_the_wire_when_absent() {
    let factory = pinned_factory();
    let event = factory.build(&EventParams {
        sequence: Some(1),
        ..EventParams::default()
    });
    let json = serde_json::to_value(&event).unwrap();
    assert!(json["context"].get("chainId").is_none());
}
