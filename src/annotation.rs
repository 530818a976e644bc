//! Annotation schema and its file-backed store.
//!
//! One annotation record binds a (workbook file, sheet) pair to an export schema. Records
//! live as pretty-printed JSON files in the annotation directory, one file per sheet, under
//! a name derived from the sanitized file and sheet names.

use crate::error::RustyCfgError;
use regex::Regex;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::collections::HashSet;
use std::fs;
use std::path::PathBuf;
use std::sync::LazyLock;
use tracing::{debug, warn};

static IDENTIFIER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-zA-Z_$][a-zA-Z0-9_$]*$").expect("Hardcode regex pattern"));

/// True if `name` can be used as a variable name in the generated scripts.
pub fn is_identifier(name: &str) -> bool {
    IDENTIFIER.is_match(name)
}

/// Shape of a sheet, selecting extraction and validation strategy.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum TableType {
    /// Not chosen yet (stored as `""`)
    #[default]
    Unset,
    /// Header row plus one record per data row
    List,
    /// Label/value pairs compiled into one flat record
    Constant,
    /// Anything else found in a stored record
    Other(String),
}

impl TableType {
    pub fn as_str(&self) -> &str {
        match self {
            TableType::Unset => "",
            TableType::List => "list",
            TableType::Constant => "constant",
            TableType::Other(other) => other,
        }
    }
}

impl From<String> for TableType {
    fn from(value: String) -> Self {
        match value.as_str() {
            "" => TableType::Unset,
            "list" => TableType::List,
            "constant" => TableType::Constant,
            _ => TableType::Other(value),
        }
    }
}

impl From<TableType> for String {
    fn from(value: TableType) -> Self {
        value.as_str().to_owned()
    }
}

impl std::fmt::Display for TableType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Value type of an exported field.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum FieldType {
    #[default]
    String,
    Number,
    Other(String),
}

impl From<String> for FieldType {
    fn from(value: String) -> Self {
        match value.as_str() {
            "" | "string" => FieldType::String,
            "number" => FieldType::Number,
            _ => FieldType::Other(value),
        }
    }
}

impl From<FieldType> for String {
    fn from(value: FieldType) -> Self {
        match value {
            FieldType::String => "string".to_owned(),
            FieldType::Number => "number".to_owned(),
            FieldType::Other(other) => other,
        }
    }
}

/// Metadata for one header (list tables) or label (constant tables).
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FieldAnnotation {
    /// Literal header or label text, the key into the sheet
    #[serde(deserialize_with = "null_as_default")]
    pub name: String,
    /// Exported property name, `name` when absent
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alias: Option<String>,
    #[serde(rename = "type", deserialize_with = "null_as_default")]
    pub field_type: FieldType,
    #[serde(deserialize_with = "null_as_default")]
    pub nullable: bool,
    #[serde(deserialize_with = "lenient_bound", skip_serializing_if = "Option::is_none")]
    pub min: Option<f64>,
    #[serde(deserialize_with = "lenient_bound", skip_serializing_if = "Option::is_none")]
    pub max: Option<f64>,
}

impl FieldAnnotation {
    pub fn new(name: &str, field_type: FieldType) -> Self {
        Self {
            name: name.to_owned(),
            field_type,
            ..Self::default()
        }
    }

    pub fn alias(mut self, alias: &str) -> Self {
        self.alias = Some(alias.to_owned());
        self
    }

    pub fn nullable(mut self, nullable: bool) -> Self {
        self.nullable = nullable;
        self
    }

    pub fn range(mut self, min: Option<f64>, max: Option<f64>) -> Self {
        self.min = min;
        self.max = max;
        self
    }

    /// The exported property name: the alias, or the field name when no alias is set.
    pub fn key(&self) -> &str {
        match self.alias.as_deref() {
            Some(alias) if !alias.is_empty() => alias,
            _ => &self.name,
        }
    }
}

/// `null` reads as the default value, the same as an absent key.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Bounds that are not JSON numbers are treated as absent.
fn lenient_bound<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<f64>, D::Error> {
    Ok(Value::deserialize(deserializer)?.as_f64())
}

/// `null` field lists and `null` entries are dropped rather than rejected.
fn lenient_fields<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<FieldAnnotation>, D::Error> {
    let fields = Option::<Vec<Option<FieldAnnotation>>>::deserialize(deserializer)?;
    Ok(fields.unwrap_or_default().into_iter().flatten().collect())
}

/// The user-authored schema of one sheet.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Annotation {
    #[serde(deserialize_with = "null_as_default")]
    pub table_name: String,
    #[serde(deserialize_with = "null_as_default")]
    pub table_type: TableType,
    #[serde(deserialize_with = "lenient_fields")]
    pub fields: Vec<FieldAnnotation>,
}

impl Annotation {
    /// The record used for a sheet that has never been annotated.
    pub fn new_default(sheet_name: &str) -> Self {
        Self {
            table_name: sheet_name.to_owned(),
            ..Self::default()
        }
    }

    /// The light gate used by export: a name, a type and at least one field.
    pub fn has_minimal_shape(&self) -> bool {
        !self.table_name.is_empty() && self.table_type != TableType::Unset && !self.fields.is_empty()
    }

    /// Drops fields whose name is not a live field of the sheet and returns the removed names.
    pub fn retain_live_fields(&mut self, live_field_names: &[String]) -> Vec<String> {
        let live: HashSet<&str> = live_field_names.iter().map(String::as_str).collect();
        let mut removed = Vec::new();
        self.fields.retain(|field| {
            let keep = !field.name.is_empty() && live.contains(field.name.as_str());
            if !keep {
                removed.push(field.name.to_owned());
            }
            keep
        });
        removed
    }
}

/// Replaces characters that are illegal in file names on common platforms.
pub fn sanitize_name_segment(name: &str) -> String {
    name.chars()
        .map(|c| match c {
            '\\' | '/' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            _ => c,
        })
        .collect()
}

/// Reads and writes annotation records inside one annotation directory.
#[derive(Clone, Debug)]
pub struct AnnotationStore {
    dir: PathBuf,
}

impl AnnotationStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Location of the record for a (file, sheet) pair: `<file>__<sheet>.json`.
    pub fn path_for(&self, file_name: &str, sheet_name: &str) -> PathBuf {
        let file = if file_name.is_empty() { "unknown" } else { file_name };
        let sheet = if sheet_name.is_empty() { "sheet" } else { sheet_name };
        self.dir.join(format!(
            "{}__{}.json",
            sanitize_name_segment(file),
            sanitize_name_segment(sheet)
        ))
    }

    /// Loads the stored record as-is, absent keys left empty. `None` when no record exists.
    pub fn load(&self, file_name: &str, sheet_name: &str) -> Result<Option<Annotation>, RustyCfgError> {
        let path = self.path_for(file_name, sheet_name);
        if !path.is_file() {
            return Ok(None);
        }
        let content = fs::read_to_string(&path)?;
        Ok(Some(serde_json::from_str(&content)?))
    }

    /// Returns the stored record merged over the default one, or the default when absent.
    pub fn read(&self, file_name: &str, sheet_name: &str) -> Result<Annotation, RustyCfgError> {
        let default = Annotation::new_default(sheet_name);
        let path = self.path_for(file_name, sheet_name);
        if !path.is_file() {
            return Ok(default);
        }
        let stored: Value = serde_json::from_str(&fs::read_to_string(&path)?)?;
        let mut merged = serde_json::to_value(&default)?;
        if let (Value::Object(merged), Value::Object(stored)) = (&mut merged, stored) {
            merged.extend(stored);
        }
        Ok(serde_json::from_value(merged)?)
    }

    /// Overwrites the record with exactly the given annotation.
    pub fn write(&self, file_name: &str, sheet_name: &str, annotation: &Annotation) -> Result<(), RustyCfgError> {
        fs::create_dir_all(&self.dir)?;
        let path = self.path_for(file_name, sheet_name);
        fs::write(&path, serde_json::to_string_pretty(annotation)?)?;
        debug!("Wrote annotation {}", path.display());
        Ok(())
    }

    /// Removes ghost fields (names missing from `live_field_names`) and persists the result
    /// when anything was removed. Running it on a clean annotation writes nothing.
    pub fn reconcile(
        &self,
        file_name: &str,
        sheet_name: &str,
        mut annotation: Annotation,
        live_field_names: &[String],
    ) -> Result<Annotation, RustyCfgError> {
        let removed = annotation.retain_live_fields(live_field_names);
        if !removed.is_empty() {
            self.write(file_name, sheet_name, &annotation)?;
            warn!(
                "Pruned ghost fields [{}] from {} - {}",
                removed.join(", "),
                file_name,
                sheet_name
            );
        }
        Ok(annotation)
    }
}
