//! TypeScript declarations for the exported tables.
//!
//! Two files are produced: a name enumeration mapping `_<sheet name>` to the table name,
//! and one interface per table describing a row (list tables) or the single record
//! (constant tables).

use crate::annotation::{is_identifier, Annotation, FieldType, TableType};
use crate::error::RustyCfgError;
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

pub const NAME_ENUM: &str = "GameConfigName";
pub const NAME_ENUM_FILE: &str = "GameConfigName.ts";
pub const INTERFACES_FILE: &str = "GameConfigInterfaces.ts";

const GENERATED_NOTICE: &str = " * Generated by rusty_cfg, do not edit";

/// One exported table, in export order.
#[derive(Clone, Debug, PartialEq)]
pub struct TableInfo {
    pub file_name: String,
    pub sheet_name: String,
    pub annotation: Annotation,
}

/// `_` followed by the sheet name, every character not allowed in an identifier replaced by `_`.
pub fn enum_member_name(sheet_name: &str) -> String {
    std::iter::once('_')
        .chain(sheet_name.chars().map(|c| {
            if c.is_alphanumeric() || c == '_' || c == '$' {
                c
            } else {
                '_'
            }
        }))
        .collect()
}

fn type_name(field_type: &FieldType) -> &'static str {
    match field_type {
        FieldType::Number => "number",
        _ => "string",
    }
}

fn property_name(key: &str) -> String {
    if is_identifier(key) {
        key.to_owned()
    } else {
        format!("\"{}\"", key.replace('\\', "\\\\").replace('"', "\\\""))
    }
}

fn doc_text(text: &str) -> String {
    text.replace("*/", "* /").replace(['\r', '\n'], " ")
}

/// The name enumeration source. Repeated member names get a numeric suffix.
pub fn generate_name_enum(tables: &[TableInfo]) -> String {
    let mut used = HashSet::new();
    let members: Vec<String> = tables
        .iter()
        .map(|table| {
            let base = enum_member_name(&table.sheet_name);
            let mut member = base.to_owned();
            let mut suffix = 2;
            while !used.insert(member.to_owned()) {
                member = format!("{}_{}", base, suffix);
                suffix += 1;
            }
            format!("    {} = \"{}\"", member, table.annotation.table_name)
        })
        .collect();

    let mut source = format!("/**\n * Config table names\n{}\n */\nexport enum {} {{\n", GENERATED_NOTICE, NAME_ENUM);
    if !members.is_empty() {
        source.push_str(&members.join(",\n"));
        source.push('\n');
    }
    source.push_str("}\n");
    source
}

/// The interface declarations source, one interface per table named after its table name.
pub fn generate_interfaces(tables: &[TableInfo]) -> String {
    let mut source = format!("/**\n * Config table interfaces\n{}\n */\n", GENERATED_NOTICE);
    for table in tables {
        let annotation = &table.annotation;
        let kind = match annotation.table_type {
            TableType::Constant => "constant table",
            _ => "list table",
        };
        source.push_str(&format!(
            "\n/**\n * {} - {}\n * {}\n */\nexport interface {} {{\n",
            doc_text(&table.file_name),
            doc_text(&table.sheet_name),
            kind,
            annotation.table_name
        ));
        for field in &annotation.fields {
            if !field.name.is_empty() {
                source.push_str(&format!("    /** {} */\n", doc_text(&field.name)));
            }
            source.push_str(&format!(
                "    {}{}: {};\n",
                property_name(field.key()),
                if field.nullable { "?" } else { "" },
                type_name(&field.field_type)
            ));
        }
        source.push_str("}\n");
    }
    source
}

/// Writes both generated files into `dir`, creating it when needed.
pub fn write_scripts(dir: &Path, tables: &[TableInfo]) -> Result<Vec<PathBuf>, RustyCfgError> {
    fs::create_dir_all(dir)?;
    let mut written = Vec::with_capacity(2);
    for (file_name, source) in [
        (NAME_ENUM_FILE, generate_name_enum(tables)),
        (INTERFACES_FILE, generate_interfaces(tables)),
    ] {
        let path = dir.join(file_name);
        fs::write(&path, source)?;
        info!("Generated {}", path.display());
        written.push(path);
    }
    Ok(written)
}
