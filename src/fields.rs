//! Field names of a sheet.
//!
//! The single definition of "what is a field": a trimmed, non-empty header (list tables,
//! row 0) or label (constant tables, column 0) that does not start with the comment
//! marker. Ghost-field pruning, extraction and validation all derive their field sets here.

use crate::annotation::TableType;
use crate::error::RustyCfgError;
use crate::spreadsheet::{CellValue, Sheet, SpreadsheetError, WorkbookCache};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Prefix marking comment rows, columns, sheets and excluded workbooks.
pub const COMMENT_MARKER: char = '#';

/// Row holding list table headers.
pub const HEADER_ROW: usize = 0;
/// Column holding constant table labels.
pub const LABEL_COLUMN: usize = 0;
/// Column holding constant table values.
pub const VALUE_COLUMN: usize = 1;

#[derive(Error, Debug)]
pub enum FieldError {
    #[error("Table type must be chosen before reading fields")]
    TableTypeUnset,

    #[error("Workbook '{0}' does not exist")]
    WorkbookNotFound(PathBuf),
}

/// The field name a cell denotes, if any.
pub fn field_label(value: &CellValue) -> Option<String> {
    let label = value.label();
    if label.is_empty() || label.starts_with(COMMENT_MARKER) {
        None
    } else {
        Some(label)
    }
}

/// Header name to column index for a list table; the first occurrence of a name wins.
pub fn header_map(sheet: &Sheet) -> HashMap<String, usize> {
    let mut headers = HashMap::new();
    for col in 0..=sheet.col_upper_bound.unwrap_or(0) {
        if let Some(label) = sheet.get(HEADER_ROW, col).and_then(field_label) {
            headers.entry(label).or_insert(col);
        }
    }
    headers
}

/// Distinct field names of a sheet in sheet order: row 0 for list tables,
/// column 0 for constant tables.
pub fn extract_field_names(sheet: &Sheet, table_type: &TableType) -> Vec<String> {
    let labels: Vec<String> = match table_type {
        TableType::Constant => sheet
            .rows()
            .filter_map(|row| sheet.get(row, LABEL_COLUMN).and_then(field_label))
            .collect(),
        _ => (0..=sheet.col_upper_bound.unwrap_or(0))
            .filter_map(|col| sheet.get(HEADER_ROW, col).and_then(field_label))
            .collect(),
    };
    let mut names: Vec<String> = Vec::with_capacity(labels.len());
    for label in labels {
        if !names.contains(&label) {
            names.push(label);
        }
    }
    names
}

/// Field names of one sheet of a workbook under `config_dir`, for the annotation editor.
pub fn read_sheet_fields(
    config_dir: &Path,
    file_name: &str,
    sheet_name: &str,
    table_type: &TableType,
) -> Result<Vec<String>, RustyCfgError> {
    if *table_type == TableType::Unset {
        Err(FieldError::TableTypeUnset)?
    }
    let path = config_dir.join(file_name);
    if !path.is_file() {
        Err(FieldError::WorkbookNotFound(path.to_path_buf()))?
    }
    let mut cache = WorkbookCache::new();
    let sheet = cache
        .read_sheet(&path, sheet_name)?
        .ok_or_else(|| SpreadsheetError::SheetNotFound {
            file: file_name.to_owned(),
            sheet: sheet_name.to_owned(),
        })?;
    Ok(extract_field_names(&sheet, table_type))
}
