//! Schema registry integration: persistence envelope naming, version
//! activation, dependency cycles, and serialization identity.

use docpipe::infrastructure::schema::{SchemaRegistry, SchemaRegistryConfig};
use docpipe_domain::{
    FieldConstraints, FieldDefinition, FieldType, PipelineError, SchemaDefinition, SchemaKind,
    SchemaVersion,
};

fn registry(dir: &std::path::Path) -> SchemaRegistry {
    SchemaRegistry::new(SchemaRegistryConfig::new(dir)).unwrap()
}

fn document_schema(version: SchemaVersion) -> SchemaDefinition {
    SchemaDefinition::new("document", version, SchemaKind::Document)
        .with_field("title", FieldDefinition::new(FieldType::String).required())
        .with_field(
            "word_count",
            FieldDefinition::new(FieldType::Integer).with_constraints(FieldConstraints {
                min: Some(0.0),
                ..Default::default()
            }),
        )
}

#[test]
fn registered_schema_persists_under_versioned_envelope_name() {
    let dir = tempfile::tempdir().unwrap();
    let registry = registry(dir.path());
    registry
        .register(&document_schema(SchemaVersion::new(2, 1, 3)), true, true)
        .unwrap();

    let path = dir.path().join("document_2.1.3.json");
    assert!(path.exists(), "expected envelope at {}", path.display());

    let raw = std::fs::read_to_string(path).unwrap();
    let envelope: serde_json::Value = serde_json::from_str(&raw).unwrap();
    assert_eq!(envelope["metadata"]["name"], "document");
    assert_eq!(envelope["metadata"]["is_active"], true);
    assert_eq!(envelope["schema"]["name"], "document");
}

#[test]
fn schema_round_trip_through_registry_is_identity() {
    let dir = tempfile::tempdir().unwrap();
    let registry = registry(dir.path());
    let schema = document_schema(SchemaVersion::new(1, 0, 0))
        .with_field(
            "chunks",
            FieldDefinition::new(FieldType::Array).with_items("chunk"),
        )
        .with_validation_ref("metadata_rules");
    registry.register(&schema, true, true).unwrap();

    // a reopened registry reads from disk, not memory
    let reopened = SchemaRegistry::new(SchemaRegistryConfig::new(dir.path())).unwrap();
    let loaded = reopened.get("document", None).unwrap().unwrap();
    assert_eq!(loaded, schema);
}

#[test]
fn activation_deactivates_previous_versions() {
    let dir = tempfile::tempdir().unwrap();
    let registry = registry(dir.path());
    registry
        .register(&document_schema(SchemaVersion::new(1, 0, 0)), true, true)
        .unwrap();
    registry
        .register(&document_schema(SchemaVersion::new(2, 0, 0)), true, true)
        .unwrap();

    let active = registry.get("document", None).unwrap().unwrap();
    assert_eq!(active.version, SchemaVersion::new(2, 0, 0));
    assert!(active.version.is_breaking());

    let listed = registry.list(None, true);
    let v1 = listed
        .iter()
        .find(|m| m.version == SchemaVersion::new(1, 0, 0))
        .unwrap();
    assert!(!v1.is_active);

    // the old version stays retrievable by explicit version
    let pinned = registry
        .get("document", Some(&SchemaVersion::new(1, 0, 0)))
        .unwrap()
        .unwrap();
    assert_eq!(pinned.version, SchemaVersion::new(1, 0, 0));
}

#[test]
fn dependency_cycle_across_registrations_is_rejected_with_path() {
    let dir = tempfile::tempdir().unwrap();
    let registry = registry(dir.path());

    let link = |name: &str, target: &str| {
        SchemaDefinition::new(name, SchemaVersion::new(1, 0, 0), SchemaKind::Reference).with_field(
            "target",
            FieldDefinition::new(FieldType::SchemaRef).with_ref(target),
        )
    };

    registry.register(&link("a", "b"), true, true).unwrap();
    registry.register(&link("b", "c"), true, true).unwrap();
    let err = registry.register(&link("c", "a"), true, true).unwrap_err();

    assert!(matches!(err, PipelineError::CycleDetected(_)));
    assert!(err.to_string().contains("c -> a -> b -> c"));

    // the rejected registration left nothing behind
    assert!(registry.get("c", None).unwrap().is_none());
    assert!(registry.dependencies("c").is_empty());
}

#[test]
fn invalidate_forces_reread_from_storage() {
    let dir = tempfile::tempdir().unwrap();
    let registry = registry(dir.path());
    registry
        .register(&document_schema(SchemaVersion::new(1, 0, 0)), true, true)
        .unwrap();

    registry.invalidate("document");
    // read-through storage still resolves it
    let reloaded = registry.get("document", None).unwrap().unwrap();
    assert_eq!(reloaded.version, SchemaVersion::new(1, 0, 0));
}

#[test]
fn schema_validation_reports_all_violations() {
    let schema = document_schema(SchemaVersion::new(1, 0, 0));
    let violations = schema.validate_value(&serde_json::json!({
        "word_count": -1,
        "unknown": true,
    }));
    // missing title, negative count, unknown field
    assert_eq!(violations.len(), 3);
}
