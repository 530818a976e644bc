//! Strict validation of annotations and sheet data.
//!
//! Validation classifies every discovered sheet as missing (no annotation), incomplete
//! (structural or row-level failures) or valid. It also prunes ghost fields: a validation
//! pass rewrites annotation files whose fields reference vanished headers or labels.

use crate::annotation::{is_identifier, Annotation, AnnotationStore, FieldAnnotation, FieldType, TableType};
use crate::discovery::discover;
use crate::error::RustyCfgError;
use crate::fields::{extract_field_names, field_label, header_map, HEADER_ROW, LABEL_COLUMN, VALUE_COLUMN};
use crate::spreadsheet::cell::format_number;
use crate::spreadsheet::reference::index_to_reference;
use crate::spreadsheet::{CellValue, Sheet, WorkbookCache};
use serde::Serialize;
use std::collections::HashMap;
use std::fmt::Display;
use std::path::Path;
use tracing::{debug, info, warn};

/// Upper bound of issues recorded per sheet.
pub const MAX_ISSUES: usize = 50;

/// Export name every list table's primary key field must use.
pub const PRIMARY_KEY: &str = "id";

/// One validation failure with the sheet coordinates it refers to, when it has any.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Issue {
    pub message: String,
    /// 1-based sheet row
    #[serde(skip_serializing_if = "Option::is_none")]
    pub row: Option<usize>,
    /// A1 reference of the offending cell
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cell: Option<String>,
}

impl Issue {
    fn sheet(message: impl Into<String>) -> Self {
        Self { message: message.into(), row: None, cell: None }
    }

    fn at_cell(row: usize, col: usize, message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            row: Some(row + 1),
            cell: Some(index_to_reference(row, col)),
        }
    }
}

impl Display for Issue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.message)
    }
}

/// Issue list that stops growing at [`MAX_ISSUES`].
#[derive(Default)]
struct Issues(Vec<Issue>);

impl Issues {
    fn push(&mut self, issue: Issue) {
        if self.0.len() < MAX_ISSUES {
            self.0.push(issue);
        }
    }

    fn is_full(&self) -> bool {
        self.0.len() >= MAX_ISSUES
    }
}

fn is_empty_value(value: Option<&CellValue>) -> bool {
    value.is_none_or(CellValue::is_blank)
}

/// Nullability, numeric and range checks shared by both table shapes. Returns false
/// when the field type is unknown.
fn check_value(
    issues: &mut Issues,
    (row, col): (usize, usize),
    name: &str,
    field: &FieldAnnotation,
    value: Option<&CellValue>,
) -> bool {
    let Some(value) = value.filter(|value| !value.is_blank()) else {
        if !field.nullable {
            issues.push(Issue::at_cell(
                row,
                col,
                format!("Field '{}' is empty at row {} but not nullable", name, row + 1),
            ));
        }
        return true;
    };
    match &field.field_type {
        FieldType::String => true,
        FieldType::Number => {
            let Some(number) = value.to_number() else {
                issues.push(Issue::at_cell(
                    row,
                    col,
                    format!("Field '{}' at row {} should be a number, got \"{}\"", name, row + 1, value),
                ));
                return true;
            };
            if let Some(min) = field.min.filter(|min| number < *min) {
                issues.push(Issue::at_cell(
                    row,
                    col,
                    format!(
                        "Field '{}' at row {} is less than minimum {}",
                        name,
                        row + 1,
                        format_number(min)
                    ),
                ));
            }
            if let Some(max) = field.max.filter(|max| number > *max) {
                issues.push(Issue::at_cell(
                    row,
                    col,
                    format!(
                        "Field '{}' at row {} is greater than maximum {}",
                        name,
                        row + 1,
                        format_number(max)
                    ),
                ));
            }
            true
        }
        FieldType::Other(other) => {
            issues.push(Issue::at_cell(
                row,
                col,
                format!("Field '{}' uses unknown type '{}'", name, other),
            ));
            false
        }
    }
}

/// Row-level checks of a list table: header presence, the primary key, per-cell rules and
/// primary key uniqueness. At most [`MAX_ISSUES`] issues are returned.
pub fn validate_list_sheet(sheet: &Sheet, fields: &[FieldAnnotation]) -> Vec<Issue> {
    let mut issues = Issues::default();
    if sheet.is_empty() {
        issues.push(Issue::sheet("Sheet has no data"));
        return issues.0;
    }
    if fields.is_empty() {
        issues.push(Issue::sheet("List table has no field annotations"));
        return issues.0;
    }

    let headers = header_map(sheet);
    let mut columns: Vec<(&FieldAnnotation, String, usize)> = Vec::with_capacity(fields.len());
    let mut key_count = 0;
    for field in fields {
        let name = field.name.trim();
        if name.is_empty() {
            issues.push(Issue::sheet("Unnamed field annotation"));
            continue;
        }
        let Some(col) = headers.get(name) else {
            issues.push(Issue::sheet(format!("Field '{}' not found in header", name)));
            continue;
        };
        if field.key() == PRIMARY_KEY {
            key_count += 1;
        }
        columns.push((field, name.to_owned(), *col));
    }
    match key_count {
        0 => issues.push(Issue::sheet(format!(
            "Missing primary key: one field must be exported as \"{}\"",
            PRIMARY_KEY
        ))),
        1 => {}
        n => issues.push(Issue::sheet(format!(
            "Primary key \"{}\" is exported by {} fields",
            PRIMARY_KEY, n
        ))),
    }

    let key_col = columns
        .iter()
        .find(|(field, _, _)| field.key() == PRIMARY_KEY)
        .map(|(_, _, col)| *col);
    let mut seen_ids: HashMap<String, usize> = HashMap::new();
    for row in sheet.rows().filter(|row| *row > HEADER_ROW) {
        if issues.is_full() {
            break;
        }
        let mut row_has_value = false;
        for (field, name, col) in &columns {
            let value = sheet.get(row, *col);
            if !is_empty_value(value) {
                row_has_value = true;
            }
            if !check_value(&mut issues, (row, *col), name, field, value) {
                break;
            }
        }

        let Some(key_col) = key_col.filter(|_| row_has_value) else {
            continue;
        };
        let Some(id) = sheet.get(row, key_col).map(CellValue::label).filter(|id| !id.is_empty()) else {
            continue;
        };
        if let Some(first) = seen_ids.get(&id) {
            issues.push(Issue::at_cell(
                row,
                key_col,
                format!("Duplicate id \"{}\" at row {} (first used at row {})", id, row + 1, first + 1),
            ));
        } else {
            seen_ids.insert(id, row);
        }
    }
    issues.0
}

/// Checks of a constant table: every label row with an annotation gets the value checks of
/// its field. At most [`MAX_ISSUES`] issues are returned.
pub fn validate_constant_sheet(sheet: &Sheet, fields: &[FieldAnnotation]) -> Vec<Issue> {
    let by_name: HashMap<&str, &FieldAnnotation> = fields
        .iter()
        .filter(|field| !field.name.is_empty())
        .map(|field| (field.name.as_str(), field))
        .collect();

    let mut issues = Issues::default();
    for row in sheet.rows() {
        if issues.is_full() {
            break;
        }
        let Some(label) = sheet.get(row, LABEL_COLUMN).and_then(field_label) else {
            continue;
        };
        let Some(field) = by_name.get(label.as_str()) else {
            continue;
        };
        check_value(&mut issues, (row, VALUE_COLUMN), &label, field, sheet.get(row, VALUE_COLUMN));
    }
    issues.0
}

/// Why a sheet is classified as incomplete.
#[derive(Clone, Debug, PartialEq)]
pub enum IncompleteReason {
    WorkbookUnreadable(String),
    MalformedAnnotation(String),
    MissingNameOrType,
    IllegalTableName(String),
    UnknownTableType(String),
    NoFields,
    IllegalFieldKeys(Vec<String>),
    SheetNotFound,
    SheetUnreadable(String),
    DuplicateTableName { table_name: String, first: String },
    FieldChecksFailed(usize),
}

impl Display for IncompleteReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            IncompleteReason::WorkbookUnreadable(e) => write!(f, "workbook could not be read: {}", e),
            IncompleteReason::MalformedAnnotation(e) => write!(f, "malformed annotation: {}", e),
            IncompleteReason::MissingNameOrType => f.write_str("missing tableName or tableType"),
            IncompleteReason::IllegalTableName(name) => {
                write!(f, "tableName \"{}\" is not a legal identifier", name)
            }
            IncompleteReason::UnknownTableType(table_type) => {
                write!(f, "unknown table type \"{}\"", table_type)
            }
            IncompleteReason::NoFields => f.write_str("no field annotations"),
            IncompleteReason::IllegalFieldKeys(keys) => {
                write!(f, "illegal field names or aliases: {}", keys.join(", "))
            }
            IncompleteReason::SheetNotFound => f.write_str("sheet not found in workbook"),
            IncompleteReason::SheetUnreadable(e) => write!(f, "sheet could not be read: {}", e),
            IncompleteReason::DuplicateTableName { table_name, first } => {
                write!(f, "duplicate table name \"{}\", already used by {}", table_name, first)
            }
            IncompleteReason::FieldChecksFailed(count) => write!(f, "field checks failed ({} issues)", count),
        }
    }
}

impl Serialize for IncompleteReason {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Sheet name used for entries that concern a whole workbook.
pub const WHOLE_WORKBOOK: &str = "*";

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MissingEntry {
    pub file_name: String,
    pub sheet_name: String,
    pub reason: String,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IncompleteEntry {
    pub file_name: String,
    pub sheet_name: String,
    pub reason: IncompleteReason,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub details: Vec<Issue>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidEntry {
    pub file_name: String,
    pub sheet_name: String,
    pub table_name: String,
    pub table_type: TableType,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationSummary {
    pub total: usize,
    pub completed: usize,
    pub missing: usize,
    pub incomplete: usize,
    pub all_completed: bool,
}

/// Project-wide classification of every discovered sheet.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationReport {
    pub summary: ValidationSummary,
    pub missing: Vec<MissingEntry>,
    pub incomplete: Vec<IncompleteEntry>,
    pub valid: Vec<ValidEntry>,
}

impl ValidationReport {
    fn push_incomplete(&mut self, file_name: &str, sheet_name: &str, reason: IncompleteReason, details: Vec<Issue>) {
        debug!("{} - {} is incomplete: {}", file_name, sheet_name, reason);
        self.incomplete.push(IncompleteEntry {
            file_name: file_name.to_owned(),
            sheet_name: sheet_name.to_owned(),
            reason,
            details,
        });
    }

    fn summarize(&mut self) {
        let missing = self.missing.len();
        let incomplete = self.incomplete.len();
        let completed = self.valid.len();
        self.summary = ValidationSummary {
            total: missing + incomplete + completed,
            completed,
            missing,
            incomplete,
            all_completed: missing == 0 && incomplete == 0,
        };
    }
}

/// Structural checks run before any sheet data is read.
fn check_structure(annotation: &Annotation) -> Result<(), IncompleteReason> {
    if annotation.table_name.is_empty() || annotation.table_type == TableType::Unset {
        return Err(IncompleteReason::MissingNameOrType);
    }
    if !is_identifier(&annotation.table_name) {
        return Err(IncompleteReason::IllegalTableName(annotation.table_name.to_owned()));
    }
    if let TableType::Other(other) = &annotation.table_type {
        return Err(IncompleteReason::UnknownTableType(other.to_owned()));
    }
    if annotation.fields.is_empty() {
        return Err(IncompleteReason::NoFields);
    }
    let illegal: Vec<String> = annotation
        .fields
        .iter()
        .map(FieldAnnotation::key)
        .filter(|key| !is_identifier(key))
        .map(|key| if key.is_empty() { "(empty)".to_owned() } else { key.to_owned() })
        .collect();
    if !illegal.is_empty() {
        return Err(IncompleteReason::IllegalFieldKeys(illegal));
    }
    Ok(())
}

/// Validates every discovered sheet of a project.
///
/// Side effect: ghost fields are pruned from annotation files before row checks run. A
/// failed rewrite is logged and validation continues with the pruned copy. Only a missing
/// configuration directory is an error; everything else lands in the report.
pub fn validate_project(config_dir: &Path, annotation_dir: &Path) -> Result<ValidationReport, RustyCfgError> {
    let store = AnnotationStore::new(annotation_dir);
    let mut cache = WorkbookCache::new();
    let mut report = ValidationReport::default();
    let mut claimed: HashMap<String, String> = HashMap::new();

    for workbook in discover(config_dir)? {
        let file_name = workbook.file_name.as_str();
        if let Some(error) = &workbook.error {
            report.push_incomplete(
                file_name,
                WHOLE_WORKBOOK,
                IncompleteReason::WorkbookUnreadable(error.to_owned()),
                Vec::new(),
            );
            continue;
        }

        for sheet_name in &workbook.sheets {
            let annotation = match store.load(file_name, sheet_name) {
                Ok(Some(annotation)) => annotation,
                Ok(None) => {
                    report.missing.push(MissingEntry {
                        file_name: file_name.to_owned(),
                        sheet_name: sheet_name.to_owned(),
                        reason: "no annotation file".to_owned(),
                    });
                    continue;
                }
                Err(e) => {
                    report.push_incomplete(
                        file_name,
                        sheet_name,
                        IncompleteReason::MalformedAnnotation(e.to_string()),
                        Vec::new(),
                    );
                    continue;
                }
            };
            if let Err(reason) = check_structure(&annotation) {
                report.push_incomplete(file_name, sheet_name, reason, Vec::new());
                continue;
            }

            let sheet = match cache.read_sheet(&workbook.absolute_path, sheet_name) {
                Ok(Some(sheet)) => sheet,
                Ok(None) => {
                    report.push_incomplete(file_name, sheet_name, IncompleteReason::SheetNotFound, Vec::new());
                    continue;
                }
                Err(e) => {
                    report.push_incomplete(
                        file_name,
                        sheet_name,
                        IncompleteReason::SheetUnreadable(e.to_string()),
                        Vec::new(),
                    );
                    continue;
                }
            };

            let live = extract_field_names(&sheet, &annotation.table_type);
            let annotation = match store.reconcile(file_name, sheet_name, annotation.clone(), &live) {
                Ok(annotation) => annotation,
                Err(e) => {
                    warn!("Failed to persist pruned annotation {} - {}: {}", file_name, sheet_name, e);
                    let mut annotation = annotation;
                    annotation.retain_live_fields(&live);
                    annotation
                }
            };
            if annotation.fields.is_empty() {
                report.push_incomplete(file_name, sheet_name, IncompleteReason::NoFields, Vec::new());
                continue;
            }

            let issues = match annotation.table_type {
                TableType::Constant => validate_constant_sheet(&sheet, &annotation.fields),
                _ => validate_list_sheet(&sheet, &annotation.fields),
            };
            if !issues.is_empty() {
                report.push_incomplete(
                    file_name,
                    sheet_name,
                    IncompleteReason::FieldChecksFailed(issues.len()),
                    issues,
                );
                continue;
            }

            let owner = format!("{} - {}", file_name, sheet_name);
            if let Some(first) = claimed.get(&annotation.table_name) {
                let reason = IncompleteReason::DuplicateTableName {
                    table_name: annotation.table_name.to_owned(),
                    first: first.to_owned(),
                };
                report.push_incomplete(file_name, sheet_name, reason, Vec::new());
                continue;
            }
            claimed.insert(annotation.table_name.to_owned(), owner);
            report.valid.push(ValidEntry {
                file_name: file_name.to_owned(),
                sheet_name: sheet_name.to_owned(),
                table_name: annotation.table_name,
                table_type: annotation.table_type,
            });
        }
    }

    report.summarize();
    info!(
        "Validated {} sheet(s): {} valid, {} missing, {} incomplete",
        report.summary.total, report.summary.completed, report.summary.missing, report.summary.incomplete
    );
    Ok(report)
}
