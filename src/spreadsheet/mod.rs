//! # Spreadsheet Reading Module
//!
//! Reads Excel 2007+ workbooks (`.xlsx`) directly from their zip container and exposes
//! sheets as sparse grids of raw cell values. Only the parts the configuration pipeline
//! needs are parsed: the sheet list, the shared string table and worksheet cells.
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use thiserror::Error;

pub mod cell;
pub(crate) mod reference;
pub mod sheet;
pub mod xlsx;

pub use cell::{Cell, CellValue};
pub use sheet::Sheet;
pub use xlsx::Workbook;

/// Extension of the workbook files picked up by discovery.
pub const WORKBOOK_EXTENSION: &str = "xlsx";

#[derive(Error, Debug)]
pub enum SpreadsheetError {
    #[error("Missing part '{0}' in workbook")]
    FileError(String),

    #[error("Workbook '{0}' contains no sheets")]
    SpreadsheetEmptyError(String),

    #[error("Shared string {0} is out of range")]
    SharedStringError(usize),

    #[error("Sheet '{sheet}' not found in '{file}'")]
    SheetNotFound { file: String, sheet: String },
}

/// Parsed workbooks of one validation or export pass, keyed by absolute path.
///
/// A workbook is opened at most once per pass; dropping the cache ends the pass.
#[derive(Default)]
pub struct WorkbookCache {
    workbooks: HashMap<PathBuf, Workbook>,
}

impl WorkbookCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the cached workbook, opening it on first use.
    pub fn workbook(&mut self, path: &Path) -> Result<&mut Workbook, crate::error::RustyCfgError> {
        if !self.workbooks.contains_key(path) {
            let workbook = Workbook::open(path)?;
            self.workbooks.insert(path.to_path_buf(), workbook);
        }
        self.workbooks
            .get_mut(path)
            .ok_or_else(|| SpreadsheetError::FileError(path.display().to_string()).into())
    }

    /// Reads a sheet of a cached workbook.
    pub fn read_sheet(&mut self, path: &Path, sheet_name: &str) -> Result<Option<Sheet>, crate::error::RustyCfgError> {
        self.workbook(path)?.read_sheet(sheet_name)
    }

    pub fn len(&self) -> usize {
        self.workbooks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.workbooks.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::XlsxBuilder;

    #[test]
    fn cache_opens_each_workbook_once() {
        let dir = tempfile::tempdir().unwrap();
        let path = XlsxBuilder::new()
            .sheet("A", &[&["id"]])
            .sheet("B", &[&["key", "1"]])
            .write(dir.path(), "Two.xlsx");

        let mut cache = WorkbookCache::new();
        assert!(cache.read_sheet(&path, "A").unwrap().is_some());
        assert!(cache.read_sheet(&path, "B").unwrap().is_some());
        assert!(cache.read_sheet(&path, "C").unwrap().is_none());
        assert_eq!(cache.len(), 1);
    }
}
