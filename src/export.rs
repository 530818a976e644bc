//! Project export: every annotated table merged into one compressed artifact.
//!
//! Export applies only a light gate (table name, table type and at least one field);
//! callers that need validated data run [`crate::validate::validate_project`] first.
//! Per-sheet failures are collected in the report. An unreadable configuration directory
//! exports nothing. Only output directory creation and final file writes abort an export.

use crate::annotation::AnnotationStore;
use crate::codegen::{write_scripts, TableInfo};
use crate::config::ProjectConfig;
use crate::discovery::discover;
use crate::error::RustyCfgError;
use crate::extract::extract_table;
use crate::spreadsheet::WorkbookCache;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info, warn};

/// File name of the compiled artifact inside the JSON directory.
pub const ARTIFACT_FILE: &str = "gamedata.bin";

#[derive(Error, Debug)]
pub enum ExportError {
    #[error("Failed to create output directory '{path}': {source}")]
    CreateDirectory { path: PathBuf, source: io::Error },

    #[error("Failed to write '{path}': {source}")]
    WriteArtifact { path: PathBuf, source: io::Error },
}

/// Outcome of one export.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportReport {
    pub artifact_path: PathBuf,
    /// Exported table names in artifact order
    pub tables: Vec<String>,
    /// Generated script files, empty without a script directory
    pub generated: Vec<PathBuf>,
    /// One message per sheet that could not be exported
    pub errors: Vec<String>,
}

/// Serializes the aggregate to compact JSON and gzips it.
pub fn compress_artifact(data: &Value) -> Result<Vec<u8>, RustyCfgError> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(&serde_json::to_vec(data)?)?;
    Ok(encoder.finish()?)
}

/// Inverse of [`compress_artifact`].
pub fn decode_artifact(bytes: &[u8]) -> Result<Value, RustyCfgError> {
    Ok(serde_json::from_reader(GzDecoder::new(bytes))?)
}

struct ExportTask {
    workbook_path: PathBuf,
    info: TableInfo,
}

fn collect_tasks(config_dir: &Path, store: &AnnotationStore) -> Vec<ExportTask> {
    let workbooks = match discover(config_dir) {
        Ok(workbooks) => workbooks,
        Err(e) => {
            warn!("Failed to scan {}: {}", config_dir.display(), e);
            return Vec::new();
        }
    };
    let mut tasks = Vec::new();
    for workbook in workbooks {
        if workbook.error.is_some() {
            continue;
        }
        for sheet_name in &workbook.sheets {
            match store.load(&workbook.file_name, sheet_name) {
                Ok(Some(annotation)) if annotation.has_minimal_shape() => tasks.push(ExportTask {
                    workbook_path: workbook.absolute_path.to_owned(),
                    info: TableInfo {
                        file_name: workbook.file_name.to_owned(),
                        sheet_name: sheet_name.to_owned(),
                        annotation,
                    },
                }),
                Ok(_) => debug!("Skipping unannotated sheet {} - {}", workbook.file_name, sheet_name),
                Err(e) => warn!(
                    "Failed to read annotation {} - {}: {}",
                    workbook.file_name, sheet_name, e
                ),
            }
        }
    }
    tasks
}

/// Exports a project: writes `gamedata.bin` into the JSON directory and, when a script
/// directory is configured, the generated declarations.
///
/// The first sheet to claim a table name wins; later sheets with the same name are
/// reported as errors and never overwrite it.
pub fn export_project(config: &ProjectConfig) -> Result<ExportReport, RustyCfgError> {
    let config_dir = config.require_config_dir()?;
    let store = AnnotationStore::new(config.require_annotation_dir()?);
    let json_dir = config.require_json_dir()?;
    fs::create_dir_all(json_dir).map_err(|source| ExportError::CreateDirectory {
        path: json_dir.to_path_buf(),
        source,
    })?;

    let tasks = collect_tasks(config_dir, &store);
    let mut cache = WorkbookCache::new();
    let mut aggregate = Map::new();
    let mut owners: HashMap<String, String> = HashMap::new();
    let mut exported = Vec::with_capacity(tasks.len());
    let mut errors = Vec::new();

    for task in tasks {
        let info = task.info;
        let owner = format!("{} - {}", info.file_name, info.sheet_name);
        let table_name = info.annotation.table_name.to_owned();
        if let Some(first) = owners.get(&table_name) {
            errors.push(format!(
                "{}: table name \"{}\" is already exported by {}",
                owner, table_name, first
            ));
            continue;
        }

        let sheet = match cache.read_sheet(&task.workbook_path, &info.sheet_name) {
            Ok(Some(sheet)) => sheet,
            Ok(None) => {
                errors.push(format!("{}: sheet not found", owner));
                continue;
            }
            Err(e) => {
                errors.push(format!("{}: export failed - {}", owner, e));
                continue;
            }
        };
        let Some(data) = extract_table(&sheet, &info.annotation) else {
            warn!(
                "Skipping {} with unknown table type \"{}\"",
                owner, info.annotation.table_type
            );
            continue;
        };

        debug!("Exported {} as {}", owner, table_name);
        aggregate.insert(table_name.to_owned(), data.into());
        owners.insert(table_name, owner);
        exported.push(info);
    }

    let bytes = compress_artifact(&Value::Object(aggregate))?;
    let artifact_path = json_dir.join(ARTIFACT_FILE);
    fs::write(&artifact_path, bytes).map_err(|source| ExportError::WriteArtifact {
        path: artifact_path.to_owned(),
        source,
    })?;
    info!("Wrote {} table(s) to {}", exported.len(), artifact_path.display());

    let generated = match config.script_dir() {
        Some(script_dir) => write_scripts(script_dir, &exported)?,
        None => Vec::new(),
    };
    for error in &errors {
        warn!("{}", error);
    }

    Ok(ExportReport {
        artifact_path,
        tables: exported
            .into_iter()
            .map(|info| info.annotation.table_name)
            .collect(),
        generated,
        errors,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::annotation::{Annotation, FieldAnnotation, FieldType, TableType};
    use crate::codegen::{INTERFACES_FILE, NAME_ENUM_FILE};
    use crate::testing::XlsxBuilder;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use tempfile::TempDir;

    struct Project {
        root: TempDir,
        config: ProjectConfig,
    }

    impl Project {
        fn new() -> Self {
            let root = tempfile::tempdir().unwrap();
            let config = ProjectConfig {
                name: Some("demo".to_owned()),
                config_dir: root.path().join("cfg"),
                annotation_dir: root.path().join("notes"),
                json_dir: root.path().join("out").join("json"),
                script_dir: None,
            };
            fs::create_dir_all(&config.config_dir).unwrap();
            Self { root, config }
        }

        fn store(&self) -> AnnotationStore {
            AnnotationStore::new(&self.config.annotation_dir)
        }
    }

    fn item_annotation() -> Annotation {
        Annotation {
            table_name: "Item".to_owned(),
            table_type: TableType::List,
            fields: vec![
                FieldAnnotation::new("id", FieldType::String).alias("id"),
                FieldAnnotation::new("name", FieldType::String).alias("name"),
                FieldAnnotation::new("price", FieldType::Number)
                    .alias("price")
                    .range(Some(0.0), None),
            ],
        }
    }

    #[test]
    fn artifact_round_trip() {
        let data = json!({"Item": [{"id": "sword", "price": 100}], "Global": {"speed": 2.5, "title": null}});
        let bytes = compress_artifact(&data).unwrap();
        assert_eq!(&bytes[..2], &[0x1f, 0x8b]);
        assert_eq!(decode_artifact(&bytes).unwrap(), data);
    }

    #[test]
    fn exports_item_scenario() {
        let mut project = Project::new();
        XlsxBuilder::new()
            .sheet("Item", &[&["id", "name", "price"], &["sword", "Iron Sword", "100"]])
            .sheet("Global", &[&["初始金币", "500"], &["#note", "x"]])
            .write(&project.config.config_dir, "Items.xlsx");
        let store = project.store();
        store.write("Items.xlsx", "Item", &item_annotation()).unwrap();
        store
            .write(
                "Items.xlsx",
                "Global",
                &Annotation {
                    table_name: "Global".to_owned(),
                    table_type: TableType::Constant,
                    fields: vec![FieldAnnotation::new("初始金币", FieldType::Number).alias("startGold")],
                },
            )
            .unwrap();
        project.config.script_dir = Some(project.root.path().join("ts"));

        let report = export_project(&project.config).unwrap();
        assert_eq!(report.tables, vec!["Item", "Global"]);
        assert!(report.errors.is_empty(), "{:?}", report.errors);

        let artifact = decode_artifact(&fs::read(&report.artifact_path).unwrap()).unwrap();
        assert_eq!(
            artifact,
            json!({
                "Item": [{"id": "sword", "name": "Iron Sword", "price": 100}],
                "Global": {"startGold": 500}
            })
        );
        assert_eq!(
            serde_json::to_string(&artifact["Item"]).unwrap(),
            r#"[{"id":"sword","name":"Iron Sword","price":100}]"#
        );

        let ts = project.root.path().join("ts");
        assert_eq!(report.generated, vec![ts.join(NAME_ENUM_FILE), ts.join(INTERFACES_FILE)]);
        let names = fs::read_to_string(ts.join(NAME_ENUM_FILE)).unwrap();
        assert!(names.contains("_Item = \"Item\""));
        assert!(names.contains("_Global = \"Global\""));
    }

    #[test]
    fn light_gate_and_collisions() {
        let project = Project::new();
        XlsxBuilder::new()
            .sheet("Item", &[&["id"], &["a"]])
            .sheet("ItemCopy", &[&["id"], &["b"]])
            .sheet("Unfinished", &[&["id"], &["c"]])
            .sheet("Odd", &[&["id"], &["d"]])
            .write(&project.config.config_dir, "Items.xlsx");
        let store = project.store();
        let annotation = Annotation {
            table_name: "Item".to_owned(),
            table_type: TableType::List,
            fields: vec![FieldAnnotation::new("id", FieldType::String)],
        };
        store.write("Items.xlsx", "Item", &annotation).unwrap();
        store.write("Items.xlsx", "ItemCopy", &annotation).unwrap();
        store
            .write("Items.xlsx", "Unfinished", &Annotation::new_default("Unfinished"))
            .unwrap();
        store
            .write(
                "Items.xlsx",
                "Odd",
                &Annotation {
                    table_name: "Odd".to_owned(),
                    table_type: TableType::Other("tree".to_owned()),
                    fields: vec![FieldAnnotation::new("id", FieldType::String)],
                },
            )
            .unwrap();

        let report = export_project(&project.config).unwrap();
        assert_eq!(report.tables, vec!["Item"]);
        assert_eq!(report.errors.len(), 1);
        assert!(report.errors[0].contains("ItemCopy"));
        assert!(report.generated.is_empty());

        let artifact = decode_artifact(&fs::read(&report.artifact_path).unwrap()).unwrap();
        assert_eq!(artifact, json!({"Item": [{"id": "a"}]}));
    }

    #[test]
    fn empty_project_writes_empty_artifact() {
        let project = Project::new();
        let report = export_project(&project.config).unwrap();
        assert_eq!(decode_artifact(&fs::read(&report.artifact_path).unwrap()).unwrap(), json!({}));
    }

    #[test]
    fn missing_config_dir_exports_nothing() {
        let mut project = Project::new();
        project.config.config_dir = project.root.path().join("absent");
        let report = export_project(&project.config).unwrap();
        assert!(report.tables.is_empty());
        assert!(report.errors.is_empty());
        assert_eq!(decode_artifact(&fs::read(&report.artifact_path).unwrap()).unwrap(), json!({}));
    }

    #[test]
    fn unwritable_output_is_fatal() {
        let mut project = Project::new();
        let blocker = project.root.path().join("blocker");
        fs::write(&blocker, b"file").unwrap();
        project.config.json_dir = blocker.join("json");
        let error = export_project(&project.config).unwrap_err();
        assert!(matches!(
            error,
            RustyCfgError::ExportError(ExportError::CreateDirectory { .. })
        ));
    }

    #[test]
    fn missing_directories_are_rejected() {
        let config = ProjectConfig::default();
        assert!(matches!(
            export_project(&config).unwrap_err(),
            RustyCfgError::ConfigError(_)
        ));
    }
}
