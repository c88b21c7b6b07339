#![warn(missing_docs)]
//! BenchDesign CLI Library
//!
//! The evaluation engine and the `benchdesign` command line. Library users
//! call [`evaluate`] directly; the binary loads a dataset (JSON) and method
//! definitions (TOML), evaluates them and writes the result bundle.
//!
//! # Example
//!
//! ```ignore
//! use benchdesign_cli::{EvaluationOptions, IdAlignment, evaluate};
//!
//! let bundle = evaluate(&registry, &EvaluationOptions::default().concurrent(true))?;
//! println!("{}", benchdesign_cli::format_human_output(&bundle));
//! ```

mod config;
mod evaluate;
mod executor;
mod methods;
mod planner;

pub use config::*;
pub use evaluate::{EvaluationError, EvaluationOptions, GroundTruthSpec, IdAlignment, evaluate};
pub use executor::{
    AssemblyInconsistency, ConfigurationError, EvaluationFailure, ExecutionConfig, FailureStage,
    MethodOutcome, MethodOutput, ParallelExecutor, Preflight, ProvenanceSource, build_metadata,
    check_configuration, column_ids, evaluate_method, format_human_output, render_func,
    resolve_provenance, run_task,
};
pub use methods::{load_methods, parse_methods};
pub use planner::build_plan;

use benchdesign_core::Dataset;
use benchdesign_report::{OutputFormat, generate_csv_report, generate_json_report};
use clap::{Parser, Subcommand};
use regex::Regex;
use std::io::Write;
use std::path::{Path, PathBuf};

/// BenchDesign CLI arguments
#[derive(Parser, Debug)]
#[command(name = "benchdesign")]
#[command(author, version, about = "BenchDesign - evaluate and compare methods over a dataset")]
pub struct Cli {
    /// Subcommand to run
    #[command(subcommand)]
    pub command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

/// CLI subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Evaluate methods against a dataset
    Run(RunArgs),
    /// Describe the methods in a method file
    List {
        /// Method definitions (TOML)
        #[arg(short, long)]
        methods: PathBuf,

        /// Filter methods by regex pattern on their labels
        #[arg(default_value = ".*")]
        filter: String,
    },
    /// Print a default benchdesign.toml
    Init,
}

/// Arguments of `benchdesign run`
#[derive(clap::Args, Debug)]
pub struct RunArgs {
    /// Dataset (JSON object of named fields)
    #[arg(short, long)]
    pub data: PathBuf,

    /// Method definitions (TOML)
    #[arg(short, long)]
    pub methods: PathBuf,

    /// Filter methods by regex pattern on their labels
    #[arg(default_value = ".*")]
    pub filter: String,

    /// Output format: human, json, csv (defaults to benchdesign.toml, then human)
    #[arg(long)]
    pub format: Option<String>,

    /// Output file (stdout if not specified)
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Run methods on a worker pool
    #[arg(long)]
    pub concurrent: bool,

    /// Number of workers in concurrent mode
    #[arg(long, short = 'j')]
    pub jobs: Option<usize>,

    /// Id alignment: off, on, or column:NAME
    #[arg(long)]
    pub align: Option<String>,

    /// Ground-truth column (repeat once per channel, or CHANNEL=COLUMN)
    #[arg(long = "truth")]
    pub truth: Vec<String>,

    /// Feature column to carry into the results (repeatable)
    #[arg(long = "features")]
    pub features: Vec<String>,

    /// One metadata column per parameter
    #[arg(long)]
    pub tabular: bool,
}

/// Run the BenchDesign CLI with the process arguments.
///
/// # Returns
/// Returns `Ok(())` on success, or an error if something goes wrong.
pub fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();
    run_with_cli(cli)
}

/// Run the BenchDesign CLI with pre-parsed arguments.
pub fn run_with_cli(cli: Cli) -> anyhow::Result<()> {
    // Initialize logging
    if cli.verbose {
        tracing_subscriber::fmt()
            .with_env_filter("benchdesign=debug")
            .with_writer(std::io::stderr)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter("benchdesign=info")
            .with_writer(std::io::stderr)
            .init();
    }

    // Discover benchdesign.toml configuration (CLI flags override)
    let config = BenchConfig::discover().unwrap_or_default();

    match cli.command {
        Commands::Run(ref args) => run_methods(args, &config),
        Commands::List {
            ref methods,
            ref filter,
        } => list_methods(methods, filter),
        Commands::Init => {
            print!("{}", BenchConfig::default_toml());
            Ok(())
        }
    }
}

fn list_methods(path: &Path, filter: &str) -> anyhow::Result<()> {
    let registry = load_methods(path)?;
    let filter_re = Regex::new(filter)?;
    let plan = build_plan(&registry, Some(&filter_re));
    print!("{}", plan.describe_all());
    Ok(())
}

/// Build evaluation options by layering: benchdesign.toml defaults → CLI overrides.
pub fn build_evaluation_options(
    args: &RunArgs,
    config: &BenchConfig,
) -> anyhow::Result<EvaluationOptions> {
    let id_alignment = match &args.align {
        Some(text) => text.parse::<IdAlignment>().map_err(|e: String| anyhow::anyhow!(e))?,
        None => config.runner.id_alignment()?,
    };

    let mut options = EvaluationOptions::default()
        .id_alignment(id_alignment)
        .concurrent(args.concurrent || config.runner.concurrent)
        .tabular_parameters(args.tabular || config.runner.tabular_parameters)
        .show_progress(true);
    if let Some(jobs) = args.jobs.or(config.runner.jobs) {
        options = options.pool_size(jobs.max(1));
    }
    if !args.truth.is_empty() {
        options = options.ground_truth(parse_truth(&args.truth)?);
    }
    if !args.features.is_empty() {
        options = options.feature_columns(args.features.iter().cloned());
    }
    Ok(options)
}

/// `--truth` values: all plain column names, or all `CHANNEL=COLUMN` pairs
fn parse_truth(values: &[String]) -> anyhow::Result<GroundTruthSpec> {
    let pairs: Vec<Option<(String, String)>> = values
        .iter()
        .map(|v| {
            v.split_once('=')
                .map(|(c, col)| (c.trim().to_string(), col.trim().to_string()))
        })
        .collect();
    if pairs.iter().all(Option::is_some) {
        Ok(GroundTruthSpec::ByChannel(pairs.into_iter().flatten().collect()))
    } else if pairs.iter().all(Option::is_none) {
        Ok(GroundTruthSpec::Columns(values.to_vec()))
    } else {
        anyhow::bail!("--truth values must be either all COLUMN or all CHANNEL=COLUMN")
    }
}

fn run_methods(args: &RunArgs, config: &BenchConfig) -> anyhow::Result<()> {
    let format: OutputFormat = args
        .format
        .as_deref()
        .unwrap_or(config.output.format.as_str())
        .parse()
        .map_err(|e: String| anyhow::anyhow!(e))?;

    let dataset = Dataset::load(&args.data)?;
    let registry = load_methods(&args.methods)?;
    let filter_re = Regex::new(&args.filter)?;
    let plan = build_plan(&registry, Some(&filter_re));

    if plan.is_empty() {
        println!("No methods found.");
        return Ok(());
    }

    let options = build_evaluation_options(args, config)?.dataset(dataset);
    let bundle = evaluate(&plan, &options)?;

    // Generate output
    let output = match format {
        OutputFormat::Json => generate_json_report(&bundle)?,
        OutputFormat::Csv => generate_csv_report(&bundle),
        OutputFormat::Human => format_human_output(&bundle),
    };

    // Write output
    if let Some(ref path) = args.output {
        let mut file = std::fs::File::create(path)?;
        file.write_all(output.as_bytes())?;
        println!("Report written to: {}", path.display());
    } else {
        print!("{}", output);
    }

    if !bundle.meta.failures.is_empty() {
        eprintln!(
            "\n{} of {} method(s) failed during evaluation",
            bundle.meta.failures.len(),
            bundle.meta.methods.len()
        );
    }

    Ok(())
}
