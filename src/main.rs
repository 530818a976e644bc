use anyhow::{Context, Result};
use clap::error::ErrorKind;
use clap::Parser;
use rusty_cfg::{export_project, validate_project, ProjectConfig};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

/// Compiles annotated spreadsheets into gamedata.bin and TypeScript declarations.
#[derive(Parser, Debug)]
#[command(name = "rusty_cfg", version, long_about = None)]
struct Cli {
    /// Directory containing the .xlsx workbooks (required)
    #[arg(long = "config-dir", alias = "configDir", value_name = "DIR")]
    config_dir: Option<PathBuf>,

    /// Directory containing the annotation JSON files (required)
    #[arg(long = "annotation-dir", alias = "annotationDir", value_name = "DIR")]
    annotation_dir: Option<PathBuf>,

    /// Output directory of gamedata.bin (required)
    #[arg(long = "json-dir", alias = "jsonDir", value_name = "DIR")]
    json_dir: Option<PathBuf>,

    /// Output directory of the generated TypeScript files
    #[arg(long = "script-dir", alias = "scriptDir", value_name = "DIR")]
    script_dir: Option<PathBuf>,

    /// Project file providing the directories; flags override its values
    #[arg(long, value_name = "FILE")]
    project: Option<PathBuf>,

    /// Validate the whole project first and refuse to export unless every sheet is valid
    #[arg(long)]
    validate: bool,

    /// Print the validation report as JSON
    #[arg(long)]
    report: bool,

    /// Enable debug logging
    #[arg(short, long)]
    verbose: bool,
}

impl Cli {
    fn project_config(&self) -> Result<ProjectConfig> {
        let mut config = match &self.project {
            Some(path) => ProjectConfig::from_file(path)
                .with_context(|| format!("Failed to load project file {}", path.display()))?,
            None => ProjectConfig::default(),
        };
        if let Some(dir) = &self.config_dir {
            config.config_dir = dir.to_owned();
        }
        if let Some(dir) = &self.annotation_dir {
            config.annotation_dir = dir.to_owned();
        }
        if let Some(dir) = &self.json_dir {
            config.json_dir = dir.to_owned();
        }
        if let Some(dir) = &self.script_dir {
            config.script_dir = Some(dir.to_owned());
        }
        Ok(config)
    }
}

fn init_logging(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("rusty_cfg=debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("rusty_cfg=info"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn run(cli: &Cli, config: &ProjectConfig) -> Result<bool> {
    if cli.validate || cli.report {
        let report = validate_project(config.require_config_dir()?, config.require_annotation_dir()?)
            .context("Validation failed")?;
        if cli.report {
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        for entry in &report.incomplete {
            warn!("{} - {}: {}", entry.file_name, entry.sheet_name, entry.reason);
        }
        if cli.validate && !report.summary.all_completed {
            error!(
                "Export refused: {} sheet(s) missing annotations, {} incomplete",
                report.summary.missing, report.summary.incomplete
            );
            return Ok(false);
        }
    }

    let report = export_project(config).context("Export failed")?;
    info!(
        "Export finished: {} table(s), {} error(s)",
        report.tables.len(),
        report.errors.len()
    );
    Ok(true)
}

fn main() -> ExitCode {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            let _ = e.print();
            return match e.kind() {
                ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => ExitCode::SUCCESS,
                _ => ExitCode::FAILURE,
            };
        }
    };
    init_logging(cli.verbose);

    let config = match cli.project_config() {
        Ok(config) => config,
        Err(e) => {
            error!("{:#}", e);
            return ExitCode::FAILURE;
        }
    };
    if let Err(e) = config.validate() {
        error!("{}. Use --help for usage", e);
        return ExitCode::FAILURE;
    }

    match run(&cli, &config) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            error!("{:#}", e);
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_camel_case_flags() {
        let cli = Cli::try_parse_from([
            "rusty_cfg",
            "--configDir",
            "cfg",
            "--annotationDir",
            "notes",
            "--jsonDir",
            "out",
        ])
        .unwrap();
        let config = cli.project_config().unwrap();
        assert_eq!(config.config_dir, PathBuf::from("cfg"));
        assert_eq!(config.script_dir, None);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn flags_override_project_file() {
        let dir = tempfile::tempdir().unwrap();
        let project = dir.path().join("project.json");
        std::fs::write(
            &project,
            r#"{"configDir":"cfg","annotationDir":"notes","jsonDir":"out"}"#,
        )
        .unwrap();
        let cli = Cli::try_parse_from([
            "rusty_cfg",
            "--project",
            project.to_str().unwrap(),
            "--json-dir",
            "elsewhere",
            "--validate",
        ])
        .unwrap();
        let config = cli.project_config().unwrap();
        assert_eq!(config.annotation_dir, PathBuf::from("notes"));
        assert_eq!(config.json_dir, PathBuf::from("elsewhere"));
        assert!(cli.validate);
    }

    #[test]
    fn missing_directories_fail_validation() {
        let cli = Cli::try_parse_from(["rusty_cfg", "--config-dir", "cfg"]).unwrap();
        assert!(cli.project_config().unwrap().validate().is_err());
    }

    fn cli_for(root: &std::path::Path, extra: &[&str]) -> (Cli, ProjectConfig) {
        let dir = |name: &str| root.join(name).to_str().unwrap().to_owned();
        let mut args = vec![
            "rusty_cfg".to_owned(),
            "--config-dir".to_owned(),
            dir("cfg"),
            "--annotation-dir".to_owned(),
            dir("notes"),
            "--json-dir".to_owned(),
            dir("json"),
        ];
        args.extend(extra.iter().map(|arg| arg.to_string()));
        let cli = Cli::try_parse_from(args).unwrap();
        let config = cli.project_config().unwrap();
        (cli, config)
    }

    #[test]
    fn validate_flag_refuses_export_of_incomplete_project() {
        let root = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(root.path().join("cfg")).unwrap();
        std::fs::write(root.path().join("cfg").join("Broken.xlsx"), b"garbage").unwrap();

        let (cli, config) = cli_for(root.path(), &["--validate"]);
        assert!(!run(&cli, &config).unwrap());
        assert!(!root.path().join("json").join("gamedata.bin").exists());

        let (cli, config) = cli_for(root.path(), &[]);
        assert!(run(&cli, &config).unwrap());
        assert!(root.path().join("json").join("gamedata.bin").is_file());
    }

    #[test]
    fn validate_flag_exports_complete_project() {
        let root = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(root.path().join("cfg")).unwrap();

        let (cli, config) = cli_for(root.path(), &["--validate"]);
        assert!(run(&cli, &config).unwrap());
        assert!(root.path().join("json").join("gamedata.bin").is_file());
    }

    #[test]
    fn help_is_not_a_failure() {
        let error = Cli::try_parse_from(["rusty_cfg", "--help"]).unwrap_err();
        assert_eq!(error.kind(), ErrorKind::DisplayHelp);
    }
}
