use std::collections::HashMap;

use crate::utils::{test_config, test_portal, write_file};
use portal_ingest::{DiffAction, IngestConfig, IngestSession, MemoryPortal, TableSet, ingest_file, load_table_set};
use serde_json::{Value, json};

const BUNDLE: &str = r#"{
    "CellLine": [
        {"submitted_id": "X1", "title": "HeLa", "aliases": ["lab:hela", "lab:hela-2"]},
        {"submitted_id": "X2", "passages": 4}
    ],
    "CellSample": [{"submitted_id": "S1", "biosources": ["X1", "X2"]}]
}"#;

/// Store every planned object on the portal, as a submission would: each
/// object gets a uuid and links to other bundle objects are stored as uuids
fn apply_creates(portal: &MemoryPortal, tables: &TableSet) -> portal_ingest::Result<()> {
    let mut session = IngestSession::new(portal, test_config());
    let dataset = session.build(tables)?;

    let mut uuids: HashMap<String, String> = HashMap::new();
    for (type_name, candidates) in &dataset.data {
        for candidate in candidates {
            if let Some(Value::String(id)) = candidate.data.get("submitted_id") {
                uuids.insert(format!("/{type_name}/{id}"), format!("uuid-{}", id.to_lowercase()));
            }
        }
    }

    for (type_name, candidates) in &dataset.data {
        for candidate in candidates {
            let mut object = Value::Object(candidate.data.clone());
            link_by_uuid(&mut object, &uuids);
            if let Some(Value::String(id)) = candidate.data.get("submitted_id") {
                object["uuid"] = json!(format!("uuid-{}", id.to_lowercase()));
            }
            portal.insert_object(type_name, object)?;
        }
    }
    Ok(())
}

fn link_by_uuid(value: &mut Value, uuids: &HashMap<String, String>) {
    match value {
        Value::String(s) => {
            if let Some(uuid) = uuids.get(s.as_str()) {
                *s = uuid.clone();
            }
        }
        Value::Array(items) => items.iter_mut().for_each(|item| link_by_uuid(item, uuids)),
        Value::Object(map) => map.values_mut().for_each(|item| link_by_uuid(item, uuids)),
        _ => {}
    }
}

#[test]
fn test_replanning_unchanged_portal_is_noop() -> portal_ingest::Result<()> {
    let dir = tempfile::tempdir()?;
    let path = write_file(dir.path(), "bundle.json", BUNDLE)?;
    let portal = test_portal();
    let tables = load_table_set(&path, &test_config().reader)?;

    let mut session = IngestSession::new(&portal, test_config());
    let dataset = session.build(&tables)?;
    let first = session.plan(&dataset)?;
    assert_eq!((first.creates(), first.updates(), first.noops()), (3, 0, 0));

    apply_creates(&portal, &tables)?;

    for _ in 0..2 {
        let mut session = IngestSession::new(&portal, test_config());
        let dataset = session.build(&tables)?;
        let plan = session.plan(&dataset)?;
        assert_eq!(plan.entries.len(), 3);
        assert!(
            plan.entries.iter().all(|entry| matches!(entry.action, DiffAction::NoOp { .. })),
            "{plan:?}"
        );
    }
    Ok(())
}

#[test]
fn test_changed_property_is_update() -> portal_ingest::Result<()> {
    let dir = tempfile::tempdir()?;
    let path = write_file(dir.path(), "bundle.json", BUNDLE)?;
    let portal = test_portal();
    let tables = load_table_set(&path, &test_config().reader)?;
    apply_creates(&portal, &tables)?;

    let changed = write_file(
        dir.path(),
        "changed.json",
        r#"{"CellLine": [{"submitted_id": "X1", "title": "HeLa S3", "aliases": ["lab:hela-2", "lab:hela"]}]}"#,
    )?;
    let config = IngestConfig {
        plan: true,
        ..test_config()
    };
    let report = ingest_file(&changed, &portal, &config)?;
    let plan = report.plan.as_ref().expect("plan requested");
    assert_eq!(plan.updates(), 1);
    assert_eq!(
        plan.entries[0].describe(),
        "CellLine [1]: update /CellLine/X1\n  title : HeLa => HeLa S3"
    );

    let json = report.to_json()?;
    assert_eq!(json["plan"]["entries"][0]["action"], json!("update"));
    assert_eq!(json["data"]["CellLine"][0]["data"]["title"], json!("HeLa S3"));
    Ok(())
}

#[test]
fn test_links_to_submitted_objects_use_portal_uuids() -> portal_ingest::Result<()> {
    let dir = tempfile::tempdir()?;
    let path = write_file(dir.path(), "bundle.json", BUNDLE)?;
    let portal = test_portal();
    let tables = load_table_set(&path, &test_config().reader)?;
    apply_creates(&portal, &tables)?;

    let mut session = IngestSession::new(&portal, test_config());
    let dataset = session.build(&tables)?;
    assert_eq!(
        dataset.objects("CellSample")[0].data["biosources"],
        json!(["uuid-x1", "uuid-x2"])
    );
    let plan = session.plan(&dataset)?;
    assert_eq!(plan.updates(), 0, "{plan:?}");
    Ok(())
}
