//! Command-line argument definitions using clap

use clap::Parser;
use std::path::PathBuf;

use crate::pipeline::{EstimatorConfig, ModelConfig, RawBasis};

/// poststrat - Re-weight survey answers to a census population
#[derive(Parser, Debug)]
#[command(name = "poststrat")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Survey file (CSV or Parquet): five demographic columns plus one column per question
    #[arg(short, long)]
    pub survey: PathBuf,

    /// Census tabulation file (CSV or Parquet): one row per demographic cell with a count
    #[arg(short, long)]
    pub census: PathBuf,

    /// Additional survey file appended to the main survey (repeatable).
    /// Columns are matched by position after dropping --extra-skip-columns.
    #[arg(long)]
    pub extra_survey: Vec<PathBuf>,

    /// Columns dropped from extra survey files before positional matching (comma-separated)
    #[arg(long, value_delimiter = ',', default_value = "Timestamp")]
    pub extra_skip_columns: Vec<String>,

    /// Study configuration (TOML) listing questions and their answer options
    #[arg(short, long)]
    pub questions: Option<PathBuf>,

    /// Census column holding the population count of each cell
    #[arg(long, default_value = "Count")]
    pub count_column: String,

    /// Census demographics are raw ACS codes (SEX, AGEP_RC1, HINCP_RC1, SCHL_RC1, ucgid)
    #[arg(long, default_value = "false")]
    pub acs_codes: bool,

    /// Denominator of the raw survey distribution.
    /// Options: "complete-case" (default) or "all-responses"
    #[arg(long, default_value = "complete-case")]
    pub raw_basis: RawBasis,

    /// Inverse L2 regularization strength of the per-question models (C)
    #[arg(long, default_value = "1.0", value_parser = validate_regularization)]
    pub regularization: f64,

    /// Maximum optimizer iterations per question model
    #[arg(long, default_value = "100")]
    pub max_iterations: usize,

    /// JSON output path.
    /// Defaults to the survey directory with a '_poststrat.json' suffix.
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Skip writing the JSON export
    #[arg(long, default_value = "false")]
    pub no_export: bool,

    /// Number of rows to use for schema inference (CSV only)
    #[arg(long, default_value = "10000")]
    pub infer_schema_length: usize,

    /// Increase log verbosity (-v info, -vv debug)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,
}

impl Cli {
    /// Get the output path, deriving it from the survey file if not explicitly provided.
    pub fn output_path(&self) -> PathBuf {
        self.output.clone().unwrap_or_else(|| {
            let parent = self
                .survey
                .parent()
                .unwrap_or_else(|| std::path::Path::new("."));
            let stem = self
                .survey
                .file_stem()
                .and_then(|s| s.to_str())
                .unwrap_or("survey");
            parent.join(format!("{}_poststrat.json", stem))
        })
    }

    pub fn estimator_config(&self) -> EstimatorConfig {
        EstimatorConfig {
            model: ModelConfig {
                regularization: self.regularization,
                max_iterations: self.max_iterations,
                ..Default::default()
            },
            raw_basis: self.raw_basis,
        }
    }

    /// Log filter implied by the -v count
    pub fn log_level(&self) -> log::LevelFilter {
        match self.verbose {
            0 => log::LevelFilter::Warn,
            1 => log::LevelFilter::Info,
            _ => log::LevelFilter::Debug,
        }
    }
}

/// Validator for the regularization parameter
fn validate_regularization(s: &str) -> Result<f64, String> {
    let value: f64 = s
        .parse()
        .map_err(|_| format!("'{}' is not a valid number", s))?;

    if !(value > 0.0 && value.is_finite()) {
        Err(format!(
            "regularization must be a positive finite number, got {}",
            value
        ))
    } else {
        Ok(value)
    }
}
