//! Workbook discovery under a configuration directory.

use crate::error::RustyCfgError;
use crate::fields::COMMENT_MARKER;
use crate::spreadsheet::{Workbook, WORKBOOK_EXTENSION};
use serde::Serialize;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use walkdir::WalkDir;

/// Prefix of the lock files spreadsheet editors leave next to open workbooks.
const LOCK_FILE_PREFIX: &str = "~$";

/// One discovered workbook. `error` is set, and `sheets` left empty, when it failed to open.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkbookEntry {
    pub file_name: String,
    pub absolute_path: PathBuf,
    /// Path relative to the discovery root, the file name for top-level workbooks
    pub relative_path: PathBuf,
    pub sheets: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// True for workbook files taking part in the pipeline.
pub fn is_workbook_file(file_name: &str) -> bool {
    if file_name.starts_with(COMMENT_MARKER) || file_name.starts_with(LOCK_FILE_PREFIX) {
        return false;
    }
    Path::new(file_name)
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case(WORKBOOK_EXTENSION))
}

/// True for sheets taking part in the pipeline.
pub fn is_live_sheet(sheet_name: &str) -> bool {
    !sheet_name.starts_with(COMMENT_MARKER)
}

/// Recursively lists workbooks under `root` in file name order. A workbook that cannot be
/// opened is reported with its error instead of aborting the walk; unreadable
/// subdirectories are logged and skipped. A missing root is an error.
pub fn discover(root: &Path) -> Result<Vec<WorkbookEntry>, RustyCfgError> {
    if !root.is_dir() {
        Err(io::Error::new(
            io::ErrorKind::NotFound,
            format!("config directory not found: {}", root.display()),
        ))?
    }

    let mut entries = Vec::new();
    for entry in WalkDir::new(root).sort_by_file_name() {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                warn!("Skipping unreadable path: {}", e);
                continue;
            }
        };
        if !entry.file_type().is_file() {
            continue;
        }
        let file_name = entry.file_name().to_string_lossy().into_owned();
        if !is_workbook_file(&file_name) {
            continue;
        }

        let absolute_path = entry.path().to_path_buf();
        let relative_path = absolute_path
            .strip_prefix(root)
            .map(Path::to_path_buf)
            .unwrap_or_else(|_| PathBuf::from(&file_name));
        let (sheets, error) = match Workbook::open(&absolute_path) {
            Ok(workbook) => {
                let sheets: Vec<String> = workbook
                    .sheet_names()
                    .into_iter()
                    .filter(|name| is_live_sheet(name))
                    .collect();
                debug!("Discovered {} with {} sheet(s)", relative_path.display(), sheets.len());
                (sheets, None)
            }
            Err(e) => {
                warn!("Failed to open workbook {}: {}", absolute_path.display(), e);
                (Vec::new(), Some(e.to_string()))
            }
        };
        entries.push(WorkbookEntry {
            file_name,
            absolute_path,
            relative_path,
            sheets,
            error,
        });
    }
    Ok(entries)
}
