//! Excel workbook reader.

use std::path::Path;

use calamine::{Data, Range, Reader, open_workbook_auto};
use chrono::Timelike;

use crate::error::{IngestError, Result};
use crate::issues::{Issue, IssueKind, Provenance};
use crate::reader::{CellValue, RowAssembler, Sheet, TableSet};

/// Read every worksheet of a workbook
///
/// A worksheet that cannot be read is recorded as an issue and the remaining
/// worksheets are still read.
pub(crate) fn read_workbook(path: &Path) -> Result<TableSet> {
    if !path.is_file() {
        return Err(IngestError::file_error("Workbook not found", path));
    }
    let mut workbook = open_workbook_auto(path)?;
    let mut tables = TableSet::new();

    for name in workbook.sheet_names() {
        match workbook.worksheet_range(&name) {
            Ok(range) => tables.push(sheet_from_range(&name, &range)),
            Err(e) => {
                log::warn!("Unable to read worksheet '{name}' of {}: {e}", path.display());
                tables.issues.push(Issue::new(
                    IssueKind::Parse,
                    Provenance::sheet(name.trim()),
                    format!("Unable to read worksheet: {e}"),
                ));
            }
        }
    }
    Ok(tables)
}

/// Convert a worksheet range into a sheet
///
/// The first row is the header; the first completely empty row ends the sheet.
pub(crate) fn sheet_from_range(name: &str, range: &Range<Data>) -> Sheet {
    let mut sheet = Sheet::new(name);
    let mut rows = range.rows();

    let Some(header_row) = rows.next() else {
        return sheet;
    };
    let raw_header: Vec<String> = header_row.iter().map(|cell| convert_cell(cell).as_text().into_owned()).collect();
    let mut assembler = RowAssembler::new(&raw_header);

    for raw in rows {
        let cells: Vec<CellValue> = raw.iter().map(convert_cell).collect();
        if cells.iter().all(CellValue::is_empty) {
            break;
        }
        sheet.rows.push(assembler.assemble(cells));
    }

    let (header, warnings) = assembler.finish();
    sheet.header = header;
    sheet.warnings = warnings;
    sheet
}

/// Convert a workbook cell
///
/// Integral floats become integers; dates become ISO text, date-only when the
/// time of day is midnight.
#[allow(clippy::cast_possible_truncation)]
fn convert_cell(cell: &Data) -> CellValue {
    match cell {
        Data::Empty | Data::Error(_) => CellValue::Empty,
        Data::String(s) | Data::DateTimeIso(s) | Data::DurationIso(s) => CellValue::text(s),
        Data::Int(i) => CellValue::Integer(*i),
        Data::Float(f) => {
            if f.is_finite() && f.fract() == 0.0 && f.abs() < 9.0e15 {
                CellValue::Integer(*f as i64)
            } else {
                CellValue::Float(*f)
            }
        }
        Data::Bool(b) => CellValue::Boolean(*b),
        Data::DateTime(dt) => match dt.as_datetime() {
            Some(datetime) if datetime.num_seconds_from_midnight() == 0 => {
                CellValue::String(datetime.format("%Y-%m-%d").to_string())
            }
            Some(datetime) => CellValue::String(datetime.format("%Y-%m-%dT%H:%M:%S").to_string()),
            None => CellValue::Float(dt.as_f64()),
        },
    }
}
