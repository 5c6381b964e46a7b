use crate::utils::write_file;
use portal_ingest::reader::InputFormat;
use portal_ingest::{CellValue, IngestError, ReaderOptions, load_table_set};

#[test]
fn test_csv_header_and_rows() -> portal_ingest::Result<()> {
    let dir = tempfile::tempdir()?;
    let path = write_file(
        dir.path(),
        "cell_line.csv",
        "\u{feff}submitted_id, title ,,ignored\nX1,First,,\n,,,\nX2, Second ,extra\n",
    )?;

    let tables = load_table_set(&path, &ReaderOptions::default())?;
    assert_eq!(tables.len(), 1);
    let sheet = tables.get("cell_line").expect("sheet named by file stem");
    assert_eq!(sheet.header, vec!["submitted_id", "title"]);
    assert_eq!(sheet.rows.len(), 2);
    assert_eq!(sheet.rows[0].number, 1);
    assert_eq!(sheet.rows[1].number, 3);
    assert_eq!(sheet.cell(&sheet.rows[1], "title"), Some(&CellValue::String("Second".to_string())));
    assert_eq!(
        sheet.warnings,
        vec![
            "Empty header column encountered; ignoring it and all subsequent columns.".to_string(),
            "Extra column values on row [3]".to_string(),
        ]
    );
    Ok(())
}

#[test]
fn test_tsv_with_escaping() -> portal_ingest::Result<()> {
    let dir = tempfile::tempdir()?;
    let path = write_file(dir.path(), "notes.tsv", "name\tdescription\nA\tline one\\nline two\n")?;

    let tables = load_table_set(&path, &ReaderOptions { escaping: true })?;
    let sheet = tables.get("notes").expect("sheet");
    assert_eq!(
        sheet.cell(&sheet.rows[0], "description"),
        Some(&CellValue::String("line one\nline two".to_string()))
    );
    Ok(())
}

#[test]
fn test_json_object_of_arrays() -> portal_ingest::Result<()> {
    let dir = tempfile::tempdir()?;
    let path = write_file(
        dir.path(),
        "bundle.json",
        r#"{"CellLine": [{"submitted_id": "X1"}], "CellSample": [{"submitted_id": "S1", "biosources": ["X1"]}], "(notes)": []}"#,
    )?;

    let tables = load_table_set(&path, &ReaderOptions::default())?;
    let names: Vec<&str> = tables.sheet_names().collect();
    assert_eq!(names, vec!["CellLine", "CellSample"]);
    let sheet = tables.get("CellSample").expect("sheet");
    assert!(matches!(sheet.cell(&sheet.rows[0], "biosources"), Some(CellValue::Json(_))));
    Ok(())
}

#[test]
fn test_jsonl_and_yaml() -> portal_ingest::Result<()> {
    let dir = tempfile::tempdir()?;
    let jsonl = write_file(dir.path(), "donor.jsonl", "{\"submitted_id\": \"D1\"}\n\n{\"submitted_id\": \"D2\", \"age\": 40}\n")?;
    let tables = load_table_set(&jsonl, &ReaderOptions::default())?;
    let sheet = tables.get("donor").expect("sheet");
    assert_eq!(sheet.rows.len(), 2);
    assert_eq!(sheet.header, vec!["submitted_id", "age"]);

    let yaml = write_file(dir.path(), "bundle.yaml", "CellLine:\n  - submitted_id: X1\n    passages: 3\n")?;
    let tables = load_table_set(&yaml, &ReaderOptions::default())?;
    let sheet = tables.get("CellLine").expect("sheet");
    assert_eq!(sheet.rows.len(), 1);
    Ok(())
}

#[test]
fn test_malformed_jsonl_line_reports_row() -> portal_ingest::Result<()> {
    let dir = tempfile::tempdir()?;
    let path = write_file(dir.path(), "donor.jsonl", "{\"submitted_id\": \"D1\"}\n{oops\n")?;
    let result = load_table_set(&path, &ReaderOptions::default());
    assert!(matches!(result, Err(IngestError::Parse { row: Some(2), .. })));
    Ok(())
}

#[test]
fn test_inserts_directory() -> portal_ingest::Result<()> {
    let dir = tempfile::tempdir()?;
    write_file(dir.path(), "CellLine.json", r#"[{"submitted_id": "X1"}, {"submitted_id": "X2"}]"#)?;
    write_file(dir.path(), "CellSample.json", r#"[{"submitted_id": "S1"}]"#)?;
    write_file(dir.path(), "README.md", "not an insert")?;

    let tables = load_table_set(dir.path(), &ReaderOptions::default())?;
    let names: Vec<&str> = tables.sheet_names().collect();
    assert_eq!(names, vec!["CellLine", "CellSample"]);
    let sheet = tables.get("CellLine").expect("sheet");
    assert_eq!(sheet.rows.len(), 2);
    assert!(sheet.file.as_ref().is_some_and(|file| file.ends_with("CellLine.json")));
    Ok(())
}

#[test]
fn test_unsupported_and_empty_inputs() -> portal_ingest::Result<()> {
    let dir = tempfile::tempdir()?;
    let path = write_file(dir.path(), "bundle.txt", "a,b\n")?;
    assert!(matches!(InputFormat::detect(&path), Err(IngestError::UnsupportedFormat(_))));

    let empty = write_file(dir.path(), "empty.csv", "")?;
    let tables = load_table_set(&empty, &ReaderOptions::default())?;
    assert!(tables.is_empty());
    Ok(())
}

#[test]
fn test_unreadable_worksheet_does_not_stop_workbook() -> portal_ingest::Result<()> {
    // The workbook lists a "Broken" worksheet whose part is missing
    let path = std::path::Path::new(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures/broken_sheet.xlsx");
    assert_eq!(InputFormat::detect(&path)?, InputFormat::Excel);

    let tables = load_table_set(&path, &ReaderOptions::default())?;
    assert!(tables.get("Broken").is_none());
    let sheet = tables.get("CellLine").expect("readable worksheet");
    assert_eq!(sheet.header, vec!["submitted_id", "title", "passages"]);
    assert_eq!(sheet.rows.len(), 2);
    assert_eq!(sheet.cell(&sheet.rows[1], "passages"), Some(&CellValue::Integer(12)));

    let issues: Vec<String> = tables.issues.iter().map(ToString::to_string).collect();
    assert_eq!(issues.len(), 1, "{issues:?}");
    assert!(issues[0].starts_with("Broken"), "{issues:?}");
    assert!(issues[0].contains("Unable to read worksheet"), "{issues:?}");
    Ok(())
}
