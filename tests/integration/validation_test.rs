use crate::utils::{test_config, test_portal, write_file};
use portal_ingest::{IngestSession, IssueKind, load_table_set};
use serde_json::json;

#[test]
fn test_array_gap_is_error_but_trailing_empty_is_not() -> portal_ingest::Result<()> {
    let dir = tempfile::tempdir()?;
    let path = write_file(
        dir.path(),
        "cell_line.csv",
        "submitted_id,steps#0.name,steps#1.name,steps#2.name\nX1,,second,\nX2,first,,\n",
    )?;
    let portal = test_portal();
    let tables = load_table_set(&path, &test_config().reader)?;
    let dataset = IngestSession::new(&portal, test_config()).build(&tables)?;

    let objects = dataset.objects("CellLine");
    assert_eq!(objects[0].data["steps"], json!([{}, {"name": "second"}]));
    assert_eq!(objects[1].data["steps"], json!([{"name": "first"}]));

    assert!(dataset.issues.has_issue_at(IssueKind::Validation, "CellLine", 1, "steps"));
    assert!(!dataset.issues.has_issue_at(IssueKind::Validation, "CellLine", 2, "steps"));
    assert_eq!(dataset.issues.of_kind(IssueKind::Validation).count(), 1);
    Ok(())
}

#[test]
fn test_malformed_date_reports_literal() -> portal_ingest::Result<()> {
    let dir = tempfile::tempdir()?;
    let path = write_file(
        dir.path(),
        "cell_sample.csv",
        "submitted_id,preservation_date\nS1,6/29/2024\nS2,2024-06-29\n",
    )?;
    let portal = test_portal();
    let tables = load_table_set(&path, &test_config().reader)?;
    let dataset = IngestSession::new(&portal, test_config()).build(&tables)?;

    let messages: Vec<String> = dataset.issues.of_kind(IssueKind::Coercion).map(ToString::to_string).collect();
    assert_eq!(
        messages,
        vec!["CellSample.preservation_date [1]: malformed date: '6/29/2024'".to_string()]
    );
    assert_eq!(dataset.objects("CellSample")[1].data["preservation_date"], json!("2024-06-29"));
    Ok(())
}

#[test]
fn test_missing_required_property() -> portal_ingest::Result<()> {
    let dir = tempfile::tempdir()?;
    let path = write_file(dir.path(), "cell_line.csv", "submitted_id,title\n,Nameless\n")?;
    let portal = test_portal();
    let tables = load_table_set(&path, &test_config().reader)?;
    let dataset = IngestSession::new(&portal, test_config()).build(&tables)?;

    assert!(dataset.issues.has_issue_at(IssueKind::Validation, "CellLine", 1, "submitted_id"));
    assert!(dataset.has_errors());
    Ok(())
}

#[test]
fn test_validation_can_be_disabled() -> portal_ingest::Result<()> {
    let dir = tempfile::tempdir()?;
    let path = write_file(dir.path(), "cell_line.csv", "submitted_id,title\n,Nameless\n")?;
    let portal = test_portal();
    let config = portal_ingest::IngestConfig {
        validate: false,
        ..test_config()
    };
    let tables = load_table_set(&path, &config.reader)?;
    let dataset = IngestSession::new(&portal, config).build(&tables)?;

    assert!(dataset.issues.is_empty());
    Ok(())
}
