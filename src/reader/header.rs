//! Header handling shared by the row-oriented readers.

use crate::reader::{CellValue, Row};

/// Warning recorded when the header is cut short
pub const EMPTY_HEADER_WARNING: &str =
    "Empty header column encountered; ignoring it and all subsequent columns.";

/// Turns raw row cells into [`Row`]s aligned with a header
///
/// Header cells are trimmed and the first empty one ends the header. Values in
/// columns past the header are dropped with a warning.
#[derive(Debug)]
pub struct RowAssembler {
    header: Vec<String>,
    warnings: Vec<String>,
    next_row: usize,
}

impl RowAssembler {
    /// Create an assembler from the raw header cells
    pub fn new<S: AsRef<str>>(raw_header: &[S]) -> Self {
        let mut header = Vec::with_capacity(raw_header.len());
        let mut warnings = Vec::new();
        for cell in raw_header {
            let name = cell.as_ref().trim();
            if name.is_empty() {
                if raw_header.iter().skip(header.len()).any(|rest| !rest.as_ref().trim().is_empty()) {
                    warnings.push(EMPTY_HEADER_WARNING.to_string());
                }
                break;
            }
            header.push(name.to_string());
        }
        Self {
            header,
            warnings,
            next_row: 1,
        }
    }

    #[must_use]
    pub fn header(&self) -> &[String] {
        &self.header
    }

    /// Align one raw row with the header
    ///
    /// Missing trailing cells become `Empty`.
    pub fn assemble(&mut self, mut cells: Vec<CellValue>) -> Row {
        let number = self.next_row;
        self.next_row += 1;

        if cells.len() > self.header.len() {
            if cells[self.header.len()..].iter().any(|cell| !cell.is_empty()) {
                self.warnings.push(format!("Extra column values on row [{number}]"));
            }
            cells.truncate(self.header.len());
        }
        cells.resize(self.header.len(), CellValue::Empty);
        Row { number, cells }
    }

    /// The header and all warnings collected so far
    #[must_use]
    pub fn finish(self) -> (Vec<String>, Vec<String>) {
        (self.header, self.warnings)
    }
}
