//! Configuration file handling.
//!
//! This module handles loading and merging configuration from
//! `.catagree.toml` files.

use crate::agreement::UndefinedPolicy;
use crate::dataset::{InputFormat, LoadOptions};
use crate::simulate::SimulationConfig;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Default configuration file name, looked up in the working directory.
pub const CONFIG_FILE_NAME: &str = ".catagree.toml";

/// Root configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// General settings.
    #[serde(default)]
    pub general: GeneralConfig,

    /// Input parsing settings.
    #[serde(default)]
    pub input: InputConfig,

    /// Synthetic data settings.
    #[serde(default)]
    pub simulation: SimulationConfig,

    /// Report settings.
    #[serde(default)]
    pub report: ReportConfig,
}

/// General application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneralConfig {
    /// Report output path; the report goes to stdout when unset.
    #[serde(default)]
    pub output: Option<String>,

    /// Worker threads for accumulation (1 = sequential).
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            output: None,
            concurrency: default_concurrency(),
        }
    }
}

fn default_concurrency() -> usize {
    1
}

/// Dataset parsing settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InputConfig {
    /// Input format (auto, json, jsonl, csv).
    #[serde(default)]
    pub format: InputFormat,

    /// CSV delimiter; comma (tab for .tsv) when unset.
    #[serde(default)]
    pub delimiter: Option<char>,

    /// Treat the first CSV record as a header.
    #[serde(default)]
    pub has_headers: bool,
}

/// Report output format.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Markdown format (default)
    #[default]
    Markdown,
    /// JSON format
    Json,
    /// CSV format, one line per category
    Csv,
}

/// Report generation settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportConfig {
    /// Output format.
    #[serde(default)]
    pub format: OutputFormat,

    /// Decimal places for rates in Markdown output.
    #[serde(default = "default_precision")]
    pub precision: usize,

    /// Treatment of categories with an undefined rate.
    #[serde(default)]
    pub undefined: UndefinedPolicy,

    /// Categories listed under "Least Consistent Categories".
    #[serde(default = "default_lowest_count")]
    pub lowest_count: usize,

    /// Include raw pair counts in Markdown tables.
    #[serde(default = "default_true")]
    pub include_counts: bool,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            format: OutputFormat::default(),
            precision: default_precision(),
            undefined: UndefinedPolicy::default(),
            lowest_count: default_lowest_count(),
            include_counts: true,
        }
    }
}

fn default_precision() -> usize {
    4
}

fn default_lowest_count() -> usize {
    5
}

fn default_true() -> bool {
    true
}

impl Config {
    /// Load configuration from a file path.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    /// Try to load configuration from the default location.
    ///
    /// Returns `Ok(None)` if the file doesn't exist, `Err` if it exists but can't be parsed.
    pub fn load_default() -> Result<Option<Self>> {
        let default_path = Path::new(CONFIG_FILE_NAME);

        if default_path.exists() {
            Ok(Some(Self::load(default_path)?))
        } else {
            Ok(None)
        }
    }

    /// Merge this configuration with CLI arguments.
    ///
    /// Only values given explicitly on the command line override the file.
    pub fn merge_with_args(&mut self, args: &crate::cli::Args) {
        if let Some(ref output) = args.output {
            self.general.output = Some(output.display().to_string());
        }
        if let Some(concurrency) = args.concurrency {
            self.general.concurrency = concurrency;
        }

        // Input settings
        if let Some(format) = args.input_format {
            self.input.format = format;
        }
        if let Some(delimiter) = args.delimiter {
            self.input.delimiter = Some(delimiter);
        }
        if args.has_headers {
            self.input.has_headers = true;
        } else if args.no_headers {
            self.input.has_headers = false;
        }

        // Simulation settings
        if let Some(items) = args.items {
            self.simulation.items = items;
        }
        if let Some(annotators) = args.annotators {
            self.simulation.annotators = annotators;
        }
        if let Some(categories) = args.categories {
            self.simulation.categories = categories;
        }
        if let Some(accuracy) = args.accuracy {
            self.simulation.accuracy = accuracy;
        }
        if let Some(missing_rate) = args.missing_rate {
            self.simulation.missing_rate = missing_rate;
        }
        if args.seed.is_some() {
            self.simulation.seed = args.seed;
        }

        // Report settings
        if let Some(format) = args.format {
            self.report.format = format;
        }
        if let Some(precision) = args.precision {
            self.report.precision = precision;
        }
        if let Some(policy) = args.undefined {
            self.report.undefined = policy;
        }
    }

    /// Validate the merged configuration.
    ///
    /// Values from the config file skip the CLI checks, so this runs after
    /// `merge_with_args`.
    pub fn validate(&self) -> Result<()> {
        if self.general.concurrency == 0 {
            anyhow::bail!("Concurrency must be at least 1");
        }
        LoadOptions::try_from(&self.input)?;
        Ok(())
    }

    /// Generate a default configuration file content.
    pub fn default_toml() -> String {
        let config = Config::default();
        toml::to_string_pretty(&config).unwrap_or_else(|_| String::new())
    }
}
