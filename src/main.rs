//! catagree - per-category inter-annotator agreement
//!
//! A CLI tool that reads multi-annotator labeling data (or simulates it)
//! and reports an agreement rate for every category.
//!
//! Exit codes:
//!   0 - Success (no category below --min-rate, or no --min-rate set)
//!   1 - Runtime error (unreadable input, invalid label, bad config, etc.)
//!   2 - Some category's rate is below the --min-rate threshold

use anyhow::{Context, Result};
use catagree::agreement::compute_agreement_with_threads;
use catagree::cli::Args;
use catagree::config::{Config, OutputFormat, CONFIG_FILE_NAME};
use catagree::dataset::{self, LoadOptions};
use catagree::models::{AgreementReport, Dataset, EXIT_BELOW_THRESHOLD};
use catagree::report::{self, RenderOptions};
use catagree::simulate;
use indicatif::{ProgressBar, ProgressStyle};
use std::path::Path;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};
use tracing_subscriber::FmtSubscriber;

fn main() -> Result<()> {
    // Parse command-line arguments
    let args = Args::parse_args();

    // Validate arguments
    if let Err(e) = args.validate() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }

    // Handle --init-config early (no logging needed)
    if args.init_config {
        return handle_init_config();
    }

    init_logging(&args);

    info!("catagree v{}", env!("CARGO_PKG_VERSION"));
    debug!("Arguments: {:?}", args);

    match run(args) {
        Ok(exit_code) => {
            std::process::exit(exit_code);
        }
        Err(e) => {
            error!("Analysis failed: {:#}", e);
            eprintln!("\n❌ Error: {:#}", e);
            std::process::exit(1);
        }
    }
}

/// Handle --init-config: generate a default .catagree.toml.
fn handle_init_config() -> Result<()> {
    let path = Path::new(CONFIG_FILE_NAME);

    if path.exists() {
        eprintln!(
            "⚠️  {} already exists. Remove it first or edit it manually.",
            CONFIG_FILE_NAME
        );
        std::process::exit(1);
    }

    let content = Config::default_toml();
    std::fs::write(path, &content)
        .with_context(|| format!("Failed to write {}", CONFIG_FILE_NAME))?;

    println!("✅ Created {} with default settings.", CONFIG_FILE_NAME);
    println!("   Edit it to customize input parsing, simulation and report output.");
    Ok(())
}

/// Initialize logging based on verbosity settings.
///
/// Logs go to stderr so a report printed on stdout stays clean.
fn init_logging(args: &Args) {
    let level = args.log_level();

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact()
        .finish();

    tracing::subscriber::set_global_default(subscriber).expect("Failed to set tracing subscriber");
}

/// Run the complete analysis. Returns exit code (0 or 2).
fn run(args: Args) -> Result<i32> {
    let start_time = Instant::now();

    let mut config = load_config(&args)?;
    config.merge_with_args(&args);
    config.validate()?;

    let output_path = config.general.output.clone();
    let spinner = create_spinner(!args.quiet && output_path.is_some());

    // Step 1: Get the annotations
    spinner.set_message("Loading annotations...");
    let dataset = load_dataset(&args, &config)?;
    let summary = dataset.summary();
    info!(
        "Dataset: {} items, {} annotations, {}-{} annotators per item",
        summary.rows, summary.annotations, summary.min_row_len, summary.max_row_len
    );

    // Step 2: Accumulate pair counts
    spinner.set_message(format!("Computing agreement over {} items...", summary.rows));
    let result = compute_agreement_with_threads(&dataset.rows, config.general.concurrency)?;
    spinner.finish_and_clear();

    let undefined = result.undefined_categories().len();
    if undefined > 0 {
        warn!(
            "{} categories only appear on single-label items; their rate is undefined ({} them)",
            undefined, config.report.undefined
        );
    }
    let result = result.with_policy(config.report.undefined);

    // Step 3: Build and render the report
    let duration = start_time.elapsed().as_secs_f64();
    let report = AgreementReport::from_result(&result, &dataset, config.report.undefined, duration);

    let output = match config.report.format {
        OutputFormat::Markdown => {
            report::generate_markdown_report(&report, &RenderOptions::from(&config.report))
        }
        OutputFormat::Json => report::generate_json_report(&report)?,
        OutputFormat::Csv => report::generate_csv_report(&report)?,
    };

    match output_path {
        Some(ref path) => {
            std::fs::write(path, &output)
                .with_context(|| format!("Failed to write report to {}", path))?;
            if !args.quiet {
                print_summary(&report, path);
            }
        }
        None => print!("{}", output),
    }

    // Check --min-rate threshold
    let exit_code = report.exit_code(args.min_rate);
    if let (Some(threshold), EXIT_BELOW_THRESHOLD) = (args.min_rate, exit_code) {
        let below = report.below_threshold(threshold);
        let names: Vec<&str> = below.iter().map(|c| c.category.as_str()).collect();
        eprintln!(
            "\n⛔ {} categories below rate {}: {}. Failing (exit code {}).",
            below.len(),
            threshold,
            names.join(", "),
            exit_code
        );
    }

    Ok(exit_code)
}

fn print_summary(report: &AgreementReport, path: &str) {
    let metadata = &report.metadata;

    println!("\n📊 Agreement Summary:");
    println!("   Items: {}", metadata.rows);
    println!("   Annotations: {}", metadata.annotations);
    println!("   Categories: {}", metadata.categories);
    if metadata.undefined_categories > 0 {
        println!("   Undefined rates: {}", metadata.undefined_categories);
    }
    if let (Some(highest), Some(lowest)) = (
        report.categories.first(),
        report.least_consistent(1).first(),
    ) {
        println!("   Highest: {} ({:.4})", highest.category, highest.rate);
        println!("   Lowest: {} ({:.4})", lowest.category, lowest.rate);
    }
    println!("   Duration: {:.3}s", metadata.duration_seconds);
    println!("\n✅ Report saved to: {}", path);
}

/// Read the dataset from the input file or generate it.
fn load_dataset(args: &Args, config: &Config) -> Result<Dataset> {
    if args.simulate {
        return simulate::simulate(&config.simulation);
    }

    let path = args
        .input
        .as_deref()
        .context("No input file given (use --input or --simulate)")?;
    let options = LoadOptions::try_from(&config.input)?;
    dataset::load_file(path, &options)
        .with_context(|| format!("Failed to load annotations from {}", path.display()))
}

fn create_spinner(visible: bool) -> ProgressBar {
    if !visible {
        return ProgressBar::hidden();
    }

    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    pb.enable_steady_tick(Duration::from_millis(100));
    pb
}

/// Load configuration from file or use defaults.
fn load_config(args: &Args) -> Result<Config> {
    // Try explicit config path
    if let Some(ref config_path) = args.config {
        info!("Loading config from: {}", config_path.display());
        return Config::load(config_path);
    }

    // Try default location
    match Config::load_default() {
        Ok(Some(config)) => {
            info!("Loaded default config from {}", CONFIG_FILE_NAME);
            Ok(config)
        }
        Ok(None) => {
            debug!("No config file found, using defaults");
            Ok(Config::default())
        }
        Err(e) => {
            warn!("Failed to load config: {}", e);
            Ok(Config::default())
        }
    }
}
