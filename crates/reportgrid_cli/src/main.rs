//! `reportgrid`: lay out a directory of extracted report JSON files into one
//! hierarchical `.xlsx` workbook.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use reportgrid_io_json::{SpecReadJsonOptions, read_json_documents};
use reportgrid_io_xlsx::{SpecXlsxWriteOptions, write_reports_to_xlsx};
use reportgrid_layout::{
    EnumTitleCollisionPolicy, LogEventSink, SpecLayoutOptions, SpecNormalizeOptions,
    normalize_documents,
};
use serde::Deserialize;

#[derive(Debug, Clone, Copy, ValueEnum)]
enum TitleCollision {
    /// Share one sheet and report a warning
    Merge,
    /// Give later titles a numeric suffix
    Suffix,
    /// Abort the run
    Error,
}

impl From<TitleCollision> for EnumTitleCollisionPolicy {
    fn from(value: TitleCollision) -> Self {
        match value {
            TitleCollision::Merge => Self::Merge,
            TitleCollision::Suffix => Self::Suffix,
            TitleCollision::Error => Self::Error,
        }
    }
}

#[derive(Parser)]
#[command(name = "reportgrid")]
#[command(about = "Lay out extracted report JSON files into an Excel workbook", long_about = None)]
struct Args {
    /// Directory containing report JSON files
    #[arg(value_name = "INPUT_DIR")]
    input_dir: PathBuf,

    /// Output workbook path
    #[arg(short, long, value_name = "OUT.xlsx")]
    output: PathBuf,

    /// Text removed from the identifier column values
    #[arg(long, value_name = "TEXT")]
    filter_text: Option<String>,

    /// Keep unit suffixes such as "Vac" in cell values
    #[arg(long)]
    no_strip_units: bool,

    /// Treat "," as a decimal separator
    #[arg(long)]
    replace_commas: bool,

    /// Skip the upstream field normalization step
    #[arg(long)]
    no_normalize: bool,

    /// What to do when two titles map to the same sheet name
    #[arg(long, value_enum)]
    title_collision: Option<TitleCollision>,

    /// Maximum worker threads for JSON parsing
    #[arg(long, value_name = "N")]
    workers: Option<usize>,

    /// JSON file with `read`, `normalize`, `layout` and `xlsx` option sections
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Enable debug logging (RUST_LOG overrides)
    #[arg(short, long)]
    verbose: bool,
}

/// Options file layout; every section is optional.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct SpecCliConfig {
    read: SpecReadJsonOptions,
    normalize: SpecNormalizeOptions,
    layout: SpecLayoutOptions,
    xlsx: SpecXlsxWriteOptions,
}

impl SpecCliConfig {
    fn load(path: Option<&Path>) -> Result<Self> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        let c_text = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config {}", path.display()))?;
        serde_json::from_str(&c_text)
            .with_context(|| format!("Invalid config {}", path.display()))
    }

    /// Command-line flags override file values.
    fn apply_args(mut self, args: &Args) -> Self {
        if let Some(c_filter_text) = &args.filter_text {
            self.layout.filter_text = c_filter_text.clone();
        }
        if args.no_strip_units {
            self.layout.value_policy.if_strip_units = false;
        }
        if args.replace_commas {
            self.layout.value_policy.if_replace_commas = true;
        }
        if let Some(rule) = args.title_collision {
            self.layout.rule_title_collision = rule.into();
        }
        if args.workers.is_some() {
            self.read.num_workers_max = args.workers;
        }
        self
    }
}

fn init_logging(verbose: bool) {
    let c_filter_default = if verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(c_filter_default))
        .init();
}

fn run(args: &Args) -> Result<()> {
    let config = SpecCliConfig::load(args.config.as_deref())?.apply_args(args);

    let (mut l_documents, report_read) = read_json_documents(&args.input_dir, config.read)
        .with_context(|| format!("Failed to scan {}", args.input_dir.display()))?;
    println!("{report_read}");
    for err in &report_read.errors {
        println!("  failed: {} ({})", err.path.display(), err.exception);
    }

    if !args.no_normalize {
        normalize_documents(&mut l_documents, &config.normalize)
            .context("Failed to normalize documents")?;
    }

    let (report_layout, report_xlsx) = write_reports_to_xlsx(
        &args.output,
        &l_documents,
        &config.layout,
        &config.xlsx,
        &LogEventSink,
    )
    .with_context(|| format!("Failed to generate {}", args.output.display()))?;

    println!("{report_layout}");
    println!("{report_xlsx}");
    Ok(())
}

fn main() -> ExitCode {
    let args = Args::parse();
    init_logging(args.verbose);

    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log::error!("{e:#}");
            eprintln!("Error: {e:?}");
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_args_override_config_values() {
        let args = Args::parse_from([
            "reportgrid",
            "in",
            "-o",
            "out.xlsx",
            "--filter-text",
            "_raw",
            "--no-strip-units",
            "--title-collision",
            "suffix",
            "--workers",
            "2",
        ]);
        let config: SpecCliConfig = serde_json::from_str(
            r#"{"layout": {"filter_text": "x", "value_policy": {"if_replace_commas": true}}}"#,
        )
        .unwrap();
        let config = config.apply_args(&args);

        assert_eq!(config.layout.filter_text, "_raw");
        assert!(!config.layout.value_policy.if_strip_units);
        assert!(config.layout.value_policy.if_replace_commas);
        assert_eq!(
            config.layout.rule_title_collision,
            EnumTitleCollisionPolicy::Suffix
        );
        assert_eq!(config.read.num_workers_max, Some(2));
        assert_eq!(config.layout.identifier_header, "File Name");
    }

    #[test]
    fn test_missing_config_is_default() {
        let config = SpecCliConfig::load(None).unwrap();
        assert!(config.xlsx.if_freeze_header);
        assert_eq!(config.read.patterns_include_files, vec!["*.json"]);
    }
}
