//! CSV and TSV reader.

use std::path::Path;

use csv::ReaderBuilder;

use crate::config::ReaderOptions;
use crate::error::util::safe_read_to_string;
use crate::error::{IngestError, Result};
use crate::reader::{CellValue, RowAssembler, Sheet, TableSet, sheet_name_for};

/// Read a delimited file as a single sheet named by the file stem
pub(crate) fn read_delimited(path: &Path, delimiter: u8, options: &ReaderOptions) -> Result<TableSet> {
    let content = safe_read_to_string(path, "reading delimited bundle")?;
    let sheet = parse_delimited(&sheet_name_for(path), &content, delimiter, options)?;

    let mut tables = TableSet::new();
    if !sheet.header.is_empty() {
        tables.push(sheet);
    }
    Ok(tables)
}

/// Parse delimited text into a sheet
pub(crate) fn parse_delimited(name: &str, content: &str, delimiter: u8, options: &ReaderOptions) -> Result<Sheet> {
    let mut reader = ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .delimiter(delimiter)
        .from_reader(content.as_bytes());

    let mut sheet = Sheet::new(name);
    let mut assembler: Option<RowAssembler> = None;

    for (index, record) in reader.records().enumerate() {
        let record = record.map_err(|e| IngestError::parse(name, Some(index), e.to_string()))?;
        let mut fields: Vec<&str> = record.iter().collect();
        while fields.last().is_some_and(|field| field.trim().is_empty()) {
            fields.pop();
        }

        match assembler.as_mut() {
            None => {
                if fields.is_empty() {
                    continue;
                }
                assembler = Some(RowAssembler::new(&fields));
            }
            Some(assembler) => {
                let cells = fields
                    .into_iter()
                    .map(|field| {
                        if options.escaping {
                            CellValue::text(expand_escapes(field))
                        } else {
                            CellValue::text(field)
                        }
                    })
                    .collect();
                let row = assembler.assemble(cells);
                if !row.is_blank() {
                    sheet.rows.push(row);
                }
            }
        }
    }

    if let Some(assembler) = assembler {
        let (header, warnings) = assembler.finish();
        sheet.header = header;
        sheet.warnings = warnings;
    }
    Ok(sheet)
}

/// Expand `\n`, `\t`, `\r` and `\\` escapes
fn expand_escapes(text: &str) -> String {
    let mut result = String::with_capacity(text.len());
    let mut chars = text.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            result.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => result.push('\n'),
            Some('t') => result.push('\t'),
            Some('r') => result.push('\r'),
            Some('\\') => result.push('\\'),
            Some(other) => {
                result.push('\\');
                result.push(other);
            }
            None => result.push('\\'),
        }
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_csv_rows() {
        let sheet = parse_delimited(
            "CellLine",
            "submitted_id,code, title \nX1, c1 ,First\n,,\nX2,c2,Second,extra\n",
            b',',
            &ReaderOptions::default(),
        )
        .unwrap();
        assert_eq!(sheet.header, vec!["submitted_id", "code", "title"]);
        assert_eq!(sheet.rows.len(), 2);
        assert_eq!(sheet.rows[0].cells[1], CellValue::text("c1"));
        assert_eq!(sheet.rows[1].number, 3);
        assert_eq!(sheet.warnings, vec!["Extra column values on row [3]".to_string()]);
    }

    #[test]
    fn test_parse_tsv_with_escapes() {
        let options = ReaderOptions { escaping: true };
        let sheet = parse_delimited("Notes", "id\tnote\n1\tline\\nbreak\n", b'\t', &options).unwrap();
        assert_eq!(sheet.rows[0].cells[1], CellValue::String("line\nbreak".to_string()));
    }

    #[test]
    fn test_expand_escapes() {
        assert_eq!(expand_escapes(r"a\tb\\c\q"), "a\tb\\c\\q");
    }
}
