//! Primarylab CLI — build the master table and evaluate forecast accuracy.
//!
//! Commands:
//! - `build`: run the pipeline described by a TOML config and write the master CSV
//! - `evaluate`: sweep a lag range over a master CSV and report poll vs market accuracy
//!
//! Logging goes to stderr and is controlled with `RUST_LOG` (default `info`).

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use primarylab_core::MasterTable;
use primarylab_runner::{
    build_from_config, contest_snapshots, evaluate_range, export_contests_csv,
    export_warnings_json, save_snapshots, vote_share_error, write_file, EvaluationConfig,
    EvaluationSnapshot, PipelineConfig,
};

#[derive(Parser)]
#[command(
    name = "primarylab",
    about = "Primarylab CLI — polls vs prediction markets in the Democratic primaries"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build the master table from a TOML pipeline config.
    Build {
        /// Path to the pipeline config.
        #[arg(long)]
        config: PathBuf,

        /// Write the master table here instead of the config's `output`.
        #[arg(long)]
        output: Option<PathBuf>,

        /// Also write the build's warnings as JSON.
        #[arg(long)]
        warnings: Option<PathBuf>,
    },
    /// Evaluate poll and market accuracy over a lag range.
    Evaluate {
        /// Master table CSV written by `build`.
        #[arg(long)]
        table: PathBuf,

        /// Take the lag range and eligible contests from this config.
        #[arg(long)]
        config: Option<PathBuf>,

        /// Smallest lag in days. Defaults to 1.
        #[arg(long)]
        min_lag: Option<u32>,

        /// Largest lag in days. Defaults to 30.
        #[arg(long)]
        max_lag: Option<u32>,

        /// Write the snapshot sequence (CSV, or JSON for a .json path).
        #[arg(long)]
        output: Option<PathBuf>,

        /// Write per-contest rankings for every lag as CSV.
        #[arg(long)]
        detail: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Build {
            config,
            output,
            warnings,
        } => run_build(&config, output, warnings),
        Commands::Evaluate {
            table,
            config,
            min_lag,
            max_lag,
            output,
            detail,
        } => run_evaluate(&table, config, min_lag, max_lag, output, detail),
    }
}

fn run_build(config_path: &Path, output: Option<PathBuf>, warnings: Option<PathBuf>) -> Result<()> {
    let config = PipelineConfig::from_file(config_path)
        .with_context(|| format!("failed to load config {}", config_path.display()))?;

    let built = build_from_config(&config).context("build failed")?;
    let output = output.unwrap_or_else(|| config.output.clone());
    built
        .table
        .save_csv(&output)
        .with_context(|| format!("failed to write {}", output.display()))?;
    tracing::info!(path = %output.display(), "master table written");

    println!(
        "Master table: {} rows, {} contests",
        built.table.len(),
        built.table.contests().len()
    );
    println!("Fingerprint:  {}", built.fingerprint);
    println!("Warnings:     {}", built.warnings.len());
    println!("Written to:   {}", output.display());

    if let Some(path) = warnings {
        write_file(&path, &export_warnings_json(&built.warnings)?)?;
        println!("Warnings written to: {}", path.display());
    }
    Ok(())
}

fn run_evaluate(
    table_path: &Path,
    config_path: Option<PathBuf>,
    min_lag: Option<u32>,
    max_lag: Option<u32>,
    output: Option<PathBuf>,
    detail: Option<PathBuf>,
) -> Result<()> {
    let mut evaluation = match config_path {
        Some(path) => {
            PipelineConfig::from_file(&path)
                .with_context(|| format!("failed to load config {}", path.display()))?
                .evaluation
        }
        None => EvaluationConfig::default(),
    };
    if let Some(min) = min_lag {
        evaluation.min_lag = min;
    }
    if let Some(max) = max_lag {
        evaluation.max_lag = max;
    }
    if evaluation.min_lag > evaluation.max_lag {
        bail!(
            "--min-lag {} is greater than --max-lag {}",
            evaluation.min_lag,
            evaluation.max_lag
        );
    }

    let table = MasterTable::load_csv(table_path)
        .with_context(|| format!("failed to read master table {}", table_path.display()))?;
    let eligible = evaluation.eligible();

    let snapshots = evaluate_range(&table, evaluation.lags(), eligible.as_ref());
    print_snapshots(&snapshots);

    let share = vote_share_error(&table);
    println!();
    println!(
        "Vote share MAE over {} eve rows in {} contests: poll {}, market {}",
        share.rows,
        share.contests,
        fmt_opt(share.poll_mae, 4),
        fmt_opt(share.market_mae, 4)
    );

    if let Some(path) = output {
        save_snapshots(&path, &snapshots)?;
        println!("Snapshots written to: {}", path.display());
    }

    if let Some(path) = detail {
        let contests: Vec<_> = evaluation
            .lags()
            .flat_map(|lag| contest_snapshots(&table, lag, eligible.as_ref()))
            .collect();
        write_file(&path, &export_contests_csv(&contests)?)?;
        println!("Contest detail written to: {}", path.display());
    }
    Ok(())
}

fn fmt_opt(value: Option<f64>, places: usize) -> String {
    value
        .map(|v| format!("{v:.places$}"))
        .unwrap_or_else(|| "n/a".into())
}

fn print_snapshots(snapshots: &[EvaluationSnapshot]) {
    println!(
        "{:>4}  {:>10}  {:>10}  {:>8}  {:>8}",
        "lag", "market %", "poll %", "n market", "n poll"
    );
    for s in snapshots {
        println!(
            "{:>4}  {:>10}  {:>10}  {:>8}  {:>8}",
            s.lag_days,
            fmt_opt(s.market_accuracy, 2),
            fmt_opt(s.poll_accuracy, 2),
            s.market_contests,
            s.poll_contests
        );
    }
}
