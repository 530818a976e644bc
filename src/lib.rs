//! # Spreadsheet Config Pipeline
//!
//! Compiles game configuration spreadsheets into one compressed data artifact plus
//! TypeScript declarations for the game runtime.
//!
//! ## Pipeline
//!
//! - **Discovery**: finds `.xlsx` workbooks under a configuration directory and lists
//!   their sheets, skipping names starting with `#` and editor lock files
//! - **Annotations**: one JSON record per sheet binds it to a table name, a table type
//!   (`list` or `constant`) and per-field export rules
//! - **Reconcile**: fields whose header or label vanished from the sheet ("ghost fields")
//!   are pruned and the record rewritten during every validation pass
//! - **Extraction**: lenient conversion of sheet cells into rows or a flat record
//! - **Validation**: strict type, range, nullability, identifier and primary key checks,
//!   rolled up into a project report of missing, incomplete and valid sheets
//! - **Export**: merges every annotated table into `gamedata.bin` (gzip compressed JSON)
//!   and optionally writes the table name enumeration and table interfaces
//!
//! Everything runs synchronously on the calling thread. Workbooks are parsed at most once
//! per validation or export pass.
pub mod annotation;
pub mod codegen;
pub mod config;
pub mod discovery;
pub mod error;
pub mod export;
pub mod extract;
pub mod fields;
pub(crate) mod helpers;
pub mod spreadsheet;
pub mod validate;

#[cfg(test)]
pub(crate) mod testing;

pub use annotation::{Annotation, AnnotationStore, FieldAnnotation, FieldType, TableType};
pub use config::ProjectConfig;
pub use error::{Result, RustyCfgError};
pub use export::{export_project, ExportReport};
pub use validate::{validate_project, ValidationReport};
