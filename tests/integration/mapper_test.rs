use std::collections::BTreeSet;

use crate::utils::{test_config, test_portal, write_file};
use portal_ingest::{IngestSession, IssueKind, load_table_set};
use serde_json::json;

/// Rows with every cell filled map to exactly the declared properties they name
#[test]
fn test_full_rows_map_to_declared_properties() -> portal_ingest::Result<()> {
    let dir = tempfile::tempdir()?;
    let path = write_file(
        dir.path(),
        "cell_line.csv",
        "submitted_id,title,passages,aliases\nX1,First,3,lab:x1\nX2,Second,5.0,lab:x2|lab:x2b\nX3,Third,12,lab:x3\n",
    )?;
    let portal = test_portal();
    let tables = load_table_set(&path, &test_config().reader)?;
    let dataset = IngestSession::new(&portal, test_config()).build(&tables)?;

    let expected: BTreeSet<&str> = ["submitted_id", "title", "passages", "aliases"].into_iter().collect();
    let objects = dataset.objects("CellLine");
    assert_eq!(objects.len(), 3);
    for object in objects {
        let keys: BTreeSet<&str> = object.data.keys().map(String::as_str).collect();
        assert_eq!(keys, expected, "row {}", object.row);
    }
    assert_eq!(objects[1].data["passages"], json!(5));
    assert_eq!(objects[1].data["aliases"], json!(["lab:x2", "lab:x2b"]));
    assert!(dataset.issues.is_empty(), "{:?}", dataset.issues);
    Ok(())
}

#[test]
fn test_empty_cells_produce_no_property() -> portal_ingest::Result<()> {
    let dir = tempfile::tempdir()?;
    let path = write_file(dir.path(), "cell_line.csv", "submitted_id,title,passages\nX1,,4\nX2,Second,\n")?;
    let portal = test_portal();
    let tables = load_table_set(&path, &test_config().reader)?;
    let dataset = IngestSession::new(&portal, test_config()).build(&tables)?;

    let objects = dataset.objects("CellLine");
    assert_eq!(objects[0].data, *json!({"submitted_id": "X1", "passages": 4}).as_object().expect("object"));
    assert_eq!(objects[1].data, *json!({"submitted_id": "X2", "title": "Second"}).as_object().expect("object"));
    Ok(())
}

#[test]
fn test_non_integral_integer_is_coercion_error() -> portal_ingest::Result<()> {
    let dir = tempfile::tempdir()?;
    let path = write_file(dir.path(), "cell_line.csv", "submitted_id,passages\nX1,1.5\n")?;
    let portal = test_portal();
    let tables = load_table_set(&path, &test_config().reader)?;
    let dataset = IngestSession::new(&portal, test_config()).build(&tables)?;

    assert_eq!(dataset.objects("CellLine")[0].data["passages"], json!("1.5"));
    let coercion: Vec<String> = dataset.issues.of_kind(IssueKind::Coercion).map(ToString::to_string).collect();
    assert_eq!(coercion, vec!["CellLine.passages [1]: invalid integer value: '1.5'".to_string()]);
    // The validator does not report the same cell again
    assert_eq!(dataset.issues.of_kind(IssueKind::Validation).count(), 0);
    Ok(())
}

#[test]
fn test_autoadd_fills_declared_property() -> portal_ingest::Result<()> {
    let dir = tempfile::tempdir()?;
    let path = write_file(dir.path(), "cell_line.csv", "submitted_id\nX1\n")?;
    let portal = test_portal();
    let config = test_config().with_autoadd("title", json!("Untitled"));
    let tables = load_table_set(&path, &config.reader)?;
    let dataset = IngestSession::new(&portal, config).build(&tables)?;

    assert_eq!(dataset.objects("CellLine")[0].data["title"], json!("Untitled"));
    Ok(())
}

#[test]
fn test_huge_array_index_skips_sheet() -> portal_ingest::Result<()> {
    let dir = tempfile::tempdir()?;
    let path = write_file(dir.path(), "cell_line.csv", "submitted_id,steps#100000000.name
X1,typo
")?;
    let portal = test_portal();
    let tables = load_table_set(&path, &test_config().reader)?;
    let dataset = IngestSession::new(&portal, test_config()).build(&tables)?;

    assert!(dataset.objects("CellLine").is_empty());
    let parse: Vec<String> = dataset.issues.of_kind(IssueKind::Parse).map(ToString::to_string).collect();
    assert_eq!(parse.len(), 1);
    assert!(parse[0].contains("exceeds the limit"), "{parse:?}");
    Ok(())
}
