//! Command-line interface argument parsing.
//!
//! This module handles all CLI argument parsing using clap,
//! including validation and default values.

use crate::agreement::UndefinedPolicy;
use crate::config::OutputFormat;
use crate::dataset::InputFormat;
use clap::Parser;
use std::path::PathBuf;

/// catagree - per-category inter-annotator agreement
///
/// For each category, reports how often two annotators who labeled the same
/// item both used the category, given that at least one of them did.
///
/// Examples:
///   catagree --input labels.json
///   catagree --input labels.csv --has-headers --format json -o agreement.json
///   catagree --simulate --items 1000 --accuracy 0.95 --seed 42
///   catagree --input labels.jsonl --min-rate 0.6
///   catagree --init-config
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Args {
    /// Annotation file to analyze (.json, .jsonl, .csv, .tsv)
    #[arg(
        short,
        long,
        value_name = "FILE",
        required_unless_present_any = ["simulate", "init_config"],
        conflicts_with = "simulate"
    )]
    pub input: Option<PathBuf>,

    /// Input format, detected from the extension by default
    #[arg(long, value_name = "FORMAT")]
    pub input_format: Option<InputFormat>,

    /// CSV field delimiter
    #[arg(long, value_name = "CHAR")]
    pub delimiter: Option<char>,

    /// Treat the first CSV record as a header
    #[arg(long)]
    pub has_headers: bool,

    /// Treat the first CSV record as data, overriding `has_headers` in the config
    #[arg(long, conflicts_with = "has_headers")]
    pub no_headers: bool,

    /// Analyze a synthetic dataset instead of a file
    #[arg(long)]
    pub simulate: bool,

    /// Simulated items
    #[arg(long, value_name = "COUNT", conflicts_with = "input")]
    pub items: Option<usize>,

    /// Simulated annotators per item
    #[arg(long, value_name = "COUNT", conflicts_with = "input")]
    pub annotators: Option<usize>,

    /// Simulated number of categories
    #[arg(long, value_name = "COUNT", conflicts_with = "input")]
    pub categories: Option<usize>,

    /// Probability that a simulated annotator picks the true category
    #[arg(long, value_name = "PROB", conflicts_with = "input")]
    pub accuracy: Option<f64>,

    /// Probability that a simulated annotator skips an item
    #[arg(long, value_name = "PROB", conflicts_with = "input")]
    pub missing_rate: Option<f64>,

    /// Seed for the simulation RNG
    #[arg(long, value_name = "SEED", conflicts_with = "input")]
    pub seed: Option<u64>,

    /// Output file for the report (stdout when omitted)
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Output format (markdown, json, csv)
    #[arg(short, long, value_name = "FORMAT")]
    pub format: Option<OutputFormat>,

    /// Decimal places for rates in Markdown output
    #[arg(long, value_name = "DIGITS")]
    pub precision: Option<usize>,

    /// Treatment of categories that only occur on single-label items
    #[arg(long, value_name = "POLICY")]
    pub undefined: Option<UndefinedPolicy>,

    /// Worker threads for accumulation (1 = sequential)
    #[arg(long, value_name = "NUM")]
    pub concurrency: Option<usize>,

    /// Fail if any category's rate is below this value
    ///
    /// Useful for CI pipelines. Exit code 2 when the threshold is not met.
    #[arg(long, value_name = "RATE")]
    pub min_rate: Option<f64>,

    /// Path to configuration file
    ///
    /// If not specified, looks for .catagree.toml in the current directory
    #[arg(short, long, value_name = "FILE", env = "CATAGREE_CONFIG")]
    pub config: Option<PathBuf>,

    /// Enable verbose logging output
    #[arg(short, long)]
    pub verbose: bool,

    /// Run in quiet mode (minimal output)
    #[arg(short, long)]
    pub quiet: bool,

    /// Generate a default .catagree.toml configuration file
    #[arg(long)]
    pub init_config: bool,
}

impl Args {
    /// Parse command-line arguments.
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Validate the parsed arguments.
    pub fn validate(&self) -> Result<(), String> {
        if self.init_config {
            return Ok(());
        }

        if let Some(ref input) = self.input {
            if !input.exists() {
                return Err(format!("Input file does not exist: {}", input.display()));
            }
            if !input.is_file() {
                return Err(format!("Input path is not a file: {}", input.display()));
            }
        }

        if let Some(delimiter) = self.delimiter {
            if !delimiter.is_ascii() {
                return Err("Delimiter must be a single ASCII character".to_string());
            }
        }

        for (name, value) in [
            ("Accuracy", self.accuracy),
            ("Missing rate", self.missing_rate),
            ("Minimum rate", self.min_rate),
        ] {
            if let Some(v) = value {
                if !(0.0..=1.0).contains(&v) {
                    return Err(format!("{} must be between 0.0 and 1.0", name));
                }
            }
        }

        let simulation_flag_given = self.items.is_some()
            || self.annotators.is_some()
            || self.categories.is_some()
            || self.accuracy.is_some()
            || self.missing_rate.is_some()
            || self.seed.is_some();
        if simulation_flag_given && !self.simulate {
            return Err("Simulation options require --simulate".to_string());
        }

        if self.concurrency == Some(0) {
            return Err("Concurrency must be at least 1".to_string());
        }

        if self.annotators == Some(0) {
            return Err("Annotators must be at least 1".to_string());
        }

        if self.categories == Some(0) {
            return Err("Categories must be at least 1".to_string());
        }

        if self.verbose && self.quiet {
            return Err("Cannot use both --verbose and --quiet".to_string());
        }

        Ok(())
    }

    /// Returns the log level based on verbosity settings.
    pub fn log_level(&self) -> tracing::Level {
        if self.quiet {
            tracing::Level::ERROR
        } else if self.verbose {
            tracing::Level::DEBUG
        } else {
            tracing::Level::INFO
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_args() -> Args {
        Args::parse_from(["catagree", "--simulate"])
    }

    #[test]
    fn test_parse_input_args() {
        let args = Args::parse_from([
            "catagree",
            "--input",
            "labels.tsv",
            "--input-format",
            "csv",
            "--delimiter",
            ";",
            "--has-headers",
            "--min-rate",
            "0.5",
        ]);
        assert_eq!(args.input, Some(PathBuf::from("labels.tsv")));
        assert_eq!(args.input_format, Some(InputFormat::Csv));
        assert_eq!(args.delimiter, Some(';'));
        assert!(args.has_headers);
        assert_eq!(args.min_rate, Some(0.5));
    }

    #[test]
    fn test_input_or_simulate_required() {
        assert!(Args::try_parse_from(["catagree"]).is_err());
        assert!(Args::try_parse_from(["catagree", "--init-config"]).is_ok());
        assert!(Args::try_parse_from(["catagree", "-i", "a.json", "--simulate"]).is_err());
    }

    #[test]
    fn test_simulation_flags_require_simulate() {
        assert!(Args::try_parse_from(["catagree", "-i", "a.json", "--seed", "3"]).is_err());
        let args = Args::parse_from(["catagree", "--simulate", "--seed", "3", "--items", "10"]);
        assert_eq!(args.seed, Some(3));
        assert_eq!(args.items, Some(10));
    }

    #[test]
    fn test_simulation_flags_rejected_without_simulate() {
        for flag in ["--items", "--annotators", "--categories", "--seed"] {
            assert!(Args::try_parse_from(["catagree", "-i", "a.json", flag, "3"]).is_err());
        }
        assert!(Args::try_parse_from(["catagree", "-i", "a.json", "--accuracy", "0.5"]).is_err());

        let mut args = make_args();
        args.seed = Some(3);
        assert!(args.validate().is_ok());
        args.simulate = false;
        assert!(args.validate().is_err());
    }

    #[test]
    fn test_header_flags() {
        let args = Args::parse_from(["catagree", "-i", "a.csv", "--no-headers"]);
        assert!(args.no_headers);
        assert!(!args.has_headers);
        assert!(
            Args::try_parse_from(["catagree", "-i", "a.csv", "--has-headers", "--no-headers"])
                .is_err()
        );
    }

    #[test]
    fn test_validation_missing_input() {
        let args = Args::parse_from(["catagree", "-i", "/definitely/not/here.json"]);
        assert!(args.validate().is_err());
    }

    #[test]
    fn test_validation_ranges() {
        let mut args = make_args();
        assert!(args.validate().is_ok());

        args.accuracy = Some(1.2);
        assert!(args.validate().is_err());

        args.accuracy = None;
        args.min_rate = Some(-0.5);
        assert!(args.validate().is_err());

        args.min_rate = None;
        args.concurrency = Some(0);
        assert!(args.validate().is_err());
    }

    #[test]
    fn test_validation_conflicting_options() {
        let mut args = make_args();
        args.verbose = true;
        args.quiet = true;
        assert!(args.validate().is_err());
    }

    #[test]
    fn test_log_level() {
        let mut args = make_args();
        assert_eq!(args.log_level(), tracing::Level::INFO);

        args.verbose = true;
        assert_eq!(args.log_level(), tracing::Level::DEBUG);

        args.verbose = false;
        args.quiet = true;
        assert_eq!(args.log_level(), tracing::Level::ERROR);
    }
}
