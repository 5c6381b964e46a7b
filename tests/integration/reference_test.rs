use crate::utils::{test_config, test_portal, write_file};
use portal_ingest::resolver::BundleIndex;
use portal_ingest::{IngestSession, IssueKind, ReferenceResolver, Resolution, SchemaCache, load_table_set};
use serde_json::json;

const TWO_SHEET_BUNDLE: &str = r#"{
    "CellLine": [{"submitted_id": "X1", "uuid": "6a3f2bd4-93cb-4cb4-9dbb-b2c4a4c1f6a1"}],
    "CellSample": [{"submitted_id": "S1", "biosources": ["X1"]}]
}"#;

#[test]
fn test_reference_to_earlier_sheet_resolves_to_canonical_id() -> portal_ingest::Result<()> {
    let dir = tempfile::tempdir()?;
    let path = write_file(dir.path(), "bundle.json", TWO_SHEET_BUNDLE)?;
    let portal = test_portal();
    let tables = load_table_set(&path, &test_config().reader)?;
    let dataset = IngestSession::new(&portal, test_config()).build(&tables)?;

    let sample = &dataset.objects("CellSample")[0];
    assert_eq!(sample.data["biosources"], json!(["6a3f2bd4-93cb-4cb4-9dbb-b2c4a4c1f6a1"]));
    assert_eq!(dataset.resolved_refs, vec!["/CellLine/X1".to_string()]);
    assert!(!dataset.has_errors(), "{:?}", dataset.issues);
    Ok(())
}

#[test]
fn test_bundle_resolution_matches_direct_portal_lookup() -> portal_ingest::Result<()> {
    let dir = tempfile::tempdir()?;
    let path = write_file(dir.path(), "bundle.json", TWO_SHEET_BUNDLE)?;

    // The same cell line, already on the portal
    let portal = test_portal();
    portal.insert_object(
        "CellLine",
        json!({"submitted_id": "X1", "uuid": "6a3f2bd4-93cb-4cb4-9dbb-b2c4a4c1f6a1"}),
    )?;

    let tables = load_table_set(&path, &test_config().reader)?;
    let dataset = IngestSession::new(&portal, test_config()).build(&tables)?;
    let from_bundle = dataset.objects("CellSample")[0].data["biosources"][0].clone();

    let mut schemas = SchemaCache::new(&portal);
    let mut resolver = ReferenceResolver::new(&test_config().lookup);
    let direct = resolver.resolve("CellLine", "X1", &BundleIndex::default(), &mut schemas, &portal)?;
    let Resolution::Resolved { canonical, path } = direct else {
        panic!("X1 should be found on the portal, got {direct:?}");
    };
    assert_eq!(path, "/CellLine/X1");
    assert_eq!(from_bundle, json!(canonical));
    Ok(())
}

#[test]
fn test_forward_reference_in_later_sheet() -> portal_ingest::Result<()> {
    let dir = tempfile::tempdir()?;
    write_file(dir.path(), "CellSample.json", r#"[{"submitted_id": "S1", "biosources": ["X1", "X2"]}]"#)?;
    write_file(dir.path(), "CellLine.json", r#"[{"submitted_id": "X1"}]"#)?;
    let portal = test_portal();

    // CellLine.json sorts first; put the samples first to reference forward
    let config = portal_ingest::IngestConfig {
        sheet_order: vec!["CellSample".to_string(), "CellLine".to_string()],
        ..test_config()
    };
    let tables = load_table_set(dir.path(), &config.reader)?;
    let dataset = IngestSession::new(&portal, config).build(&tables)?;

    let sample = &dataset.objects("CellSample")[0];
    assert_eq!(sample.data["biosources"], json!(["/CellLine/X1", "X2"]));

    let messages: Vec<String> = dataset.issues.of_kind(IssueKind::Reference).map(ToString::to_string).collect();
    assert_eq!(
        messages,
        vec!["CellSample.json:CellSample.biosources [1]: Unable to resolve reference: /CellLine/X2".to_string()]
    );
    Ok(())
}

#[test]
fn test_norefs_passes_tokens_through() -> portal_ingest::Result<()> {
    let dir = tempfile::tempdir()?;
    let path = write_file(
        dir.path(),
        "bundle.json",
        r#"{"CellSample": [{"submitted_id": "S1", "biosources": ["NOWHERE"]}]}"#,
    )?;
    let portal = test_portal();
    let tables = load_table_set(&path, &test_config().reader)?;
    let dataset = IngestSession::new(&portal, test_config().with_norefs(true)).build(&tables)?;

    assert_eq!(dataset.objects("CellSample")[0].data["biosources"], json!(["NOWHERE"]));
    assert_eq!(dataset.issues.of_kind(IssueKind::Reference).count(), 0);
    assert!(dataset.resolved_refs.is_empty());
    assert_eq!(portal.request_count("/CellLine/NOWHERE"), 0);
    Ok(())
}

#[test]
fn test_schema_fetched_once_per_session() -> portal_ingest::Result<()> {
    let dir = tempfile::tempdir()?;
    let path = write_file(
        dir.path(),
        "bundle.json",
        r#"{
            "CellLine": [{"submitted_id": "X1"}, {"submitted_id": "X2"}],
            "CellSample": [
                {"submitted_id": "S1", "biosources": ["X1", "X2"]},
                {"submitted_id": "S2", "biosources": ["X2", "X3"]}
            ]
        }"#,
    )?;
    let portal = test_portal();
    let tables = load_table_set(&path, &test_config().reader)?;
    let mut session = IngestSession::new(&portal, test_config());
    let dataset = session.build(&tables)?;
    session.plan(&dataset)?;

    assert_eq!(portal.schema_request_count("CellLine"), 1);
    assert_eq!(portal.schema_request_count("CellSample"), 1);
    // X3 is unresolved but only looked up once
    assert_eq!(portal.request_count("/CellLine/X3"), 1);
    Ok(())
}

#[test]
fn test_second_bundle_does_not_see_first_bundle_objects() -> portal_ingest::Result<()> {
    let dir = tempfile::tempdir()?;
    let first = write_file(dir.path(), "first.json", TWO_SHEET_BUNDLE)?;
    let second = write_file(
        dir.path(),
        "second.json",
        r#"{"CellSample": [{"submitted_id": "S2", "biosources": ["X1"]}]}"#,
    )?;
    let portal = test_portal();
    let mut session = IngestSession::new(&portal, test_config());

    let dataset = session.build(&load_table_set(&first, &test_config().reader)?)?;
    assert_eq!(dataset.resolved_refs, vec!["/CellLine/X1".to_string()]);

    let dataset = session.build(&load_table_set(&second, &test_config().reader)?)?;
    assert_eq!(dataset.objects("CellSample")[0].data["biosources"], json!(["X1"]));
    assert!(dataset.resolved_refs.is_empty());
    assert!(dataset.issues.has_issue_at(IssueKind::Reference, "CellSample", 1, "biosources"));
    Ok(())
}
