//! Project configuration: the directories one pipeline run works on.

use crate::error::RustyCfgError;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Missing required directory '{0}'")]
    MissingDirectory(&'static str),
}

/// Directories of one project, stored as a JSON record with camelCase keys.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ProjectConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Root of the workbooks
    pub config_dir: PathBuf,
    /// Annotation records, one file per sheet
    pub annotation_dir: PathBuf,
    /// Output directory of `gamedata.bin`
    pub json_dir: PathBuf,
    /// Output directory of the generated scripts, none to skip generation
    #[serde(skip_serializing_if = "Option::is_none")]
    pub script_dir: Option<PathBuf>,
}

fn require<'a>(path: &'a Path, name: &'static str) -> Result<&'a Path, ConfigError> {
    if path.as_os_str().is_empty() {
        Err(ConfigError::MissingDirectory(name))
    } else {
        Ok(path)
    }
}

impl ProjectConfig {
    pub fn from_file(path: &Path) -> Result<Self, RustyCfgError> {
        let content = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }

    pub fn require_config_dir(&self) -> Result<&Path, ConfigError> {
        require(&self.config_dir, "configDir")
    }

    pub fn require_annotation_dir(&self) -> Result<&Path, ConfigError> {
        require(&self.annotation_dir, "annotationDir")
    }

    pub fn require_json_dir(&self) -> Result<&Path, ConfigError> {
        require(&self.json_dir, "jsonDir")
    }

    /// The script directory, treating an empty path as absent.
    pub fn script_dir(&self) -> Option<&Path> {
        self.script_dir
            .as_deref()
            .filter(|path| !path.as_os_str().is_empty())
    }

    /// Checks every required directory at once.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.require_config_dir()?;
        self.require_annotation_dir()?;
        self.require_json_dir()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn loads_project_record() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("project.json");
        fs::write(
            &path,
            r#"{"name":"demo","configDir":"cfg","annotationDir":"notes","jsonDir":"out","scriptDir":""}"#,
        )
        .unwrap();

        let config = ProjectConfig::from_file(&path).unwrap();
        assert_eq!(config.name.as_deref(), Some("demo"));
        assert_eq!(config.require_config_dir().unwrap(), Path::new("cfg"));
        assert_eq!(config.script_dir(), None);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn missing_directories_are_reported() {
        let config = ProjectConfig {
            config_dir: PathBuf::from("cfg"),
            ..ProjectConfig::default()
        };
        let error = config.validate().unwrap_err();
        assert_eq!(error.to_string(), "Missing required directory 'annotationDir'");
    }
}
