//! Command-line parsing for the location-quotient tool.
//!
//! The goal of this module is to keep **argument parsing** and **command dispatch**
//! separate from the engine.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::domain::{SmoothingMode, UndefinedPolicy};

pub mod picker;

/// Top-level CLI.
#[derive(Debug, Parser)]
#[command(
    name = "lq",
    version,
    about = "Location quotients with Laplace smoothing and credibility-theory adjustment"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

/// CLI subcommands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Compute quotients and credibility weights, print a summary and tables, optionally export.
    Compute(ComputeArgs),
    /// Print the top-N tables only (useful for scripting).
    Rank(ComputeArgs),
    /// Write a seeded synthetic establishment table.
    Sample(SampleArgs),
    /// Print a previously exported summary JSON.
    Show(ShowArgs),
}

/// Common options for computing and ranking.
#[derive(Debug, Parser, Clone)]
pub struct ComputeArgs {
    /// Input CSV (falls back to `LQ_INPUT`, then an interactive picker).
    #[arg(short = 'f', long = "file", value_name = "CSV")]
    pub file: Option<PathBuf>,

    /// Region key column; repeat to join several columns with `-` (e.g. state + county FIPS).
    #[arg(long = "region-col", default_value = "region")]
    pub region_cols: Vec<String>,

    /// Industry code column.
    #[arg(long, default_value = "industry")]
    pub industry_col: String,

    /// Establishment count column.
    #[arg(long, default_value = "establishments")]
    pub count_col: String,

    /// Keep only County Business Patterns 2-digit sector rows (`NN----`).
    #[arg(long)]
    pub sectors_only: bool,

    /// Fill absent region/industry pairs with zero counts.
    #[arg(long)]
    pub dense: bool,

    /// Pseudo-count added to each region total by the smoothed quotient.
    #[arg(long, value_enum, default_value_t = SmoothingMode::Region)]
    pub smoothing: SmoothingMode,

    /// Pseudo-count used with `--smoothing fixed`.
    #[arg(long, default_value_t = 1)]
    pub pseudo_count: u64,

    /// What to emit for undefined values.
    #[arg(long, value_enum, default_value_t = UndefinedPolicy::Nan)]
    pub undefined: UndefinedPolicy,

    /// Show top-N rows in each table.
    #[arg(long, default_value_t = 20)]
    pub top: usize,

    /// Export per-pair results to CSV.
    #[arg(long)]
    pub export: Option<PathBuf>,

    /// Export the run summary (credibility statistics) to JSON.
    #[arg(long = "export-summary")]
    pub export_summary: Option<PathBuf>,

    /// Write a markdown debug bundle under `debug/`.
    #[arg(long)]
    pub debug: bool,
}

/// Options for synthetic data generation.
#[derive(Debug, Parser, Clone)]
pub struct SampleArgs {
    /// Number of regions.
    #[arg(long, default_value_t = 50)]
    pub regions: usize,

    /// Number of industries (NAICS sectors, at most 19).
    #[arg(long, default_value_t = 19)]
    pub industries: usize,

    /// Random seed.
    #[arg(long, default_value_t = 42)]
    pub seed: u64,

    /// Mean establishments per pair before scaling.
    #[arg(long, default_value_t = 40.0)]
    pub mean: f64,

    /// Probability that a pair is absent from the table.
    #[arg(long, default_value_t = 0.05)]
    pub sparsity: f64,

    /// Output CSV (stdout if omitted).
    #[arg(short = 'o', long)]
    pub output: Option<PathBuf>,
}

/// Options for showing a saved summary.
#[derive(Debug, Parser)]
pub struct ShowArgs {
    /// Summary JSON file produced by `lq compute --export-summary`.
    #[arg(long, value_name = "JSON")]
    pub summary: PathBuf,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compute_defaults() {
        let cli = Cli::parse_from(["lq", "compute", "-f", "data.csv"]);
        let Command::Compute(args) = cli.command else {
            panic!("expected compute");
        };
        assert_eq!(args.file, Some(PathBuf::from("data.csv")));
        assert_eq!(args.region_cols, vec!["region".to_string()]);
        assert_eq!(args.smoothing, SmoothingMode::Region);
        assert_eq!(args.undefined, UndefinedPolicy::Nan);
    }

    #[test]
    fn repeated_region_columns() {
        let cli = Cli::parse_from([
            "lq",
            "rank",
            "--region-col",
            "state_fips",
            "--region-col",
            "cty_fips",
            "--smoothing",
            "fixed",
            "--undefined",
            "omit",
        ]);
        let Command::Rank(args) = cli.command else {
            panic!("expected rank");
        };
        assert_eq!(args.region_cols, vec!["state_fips".to_string(), "cty_fips".to_string()]);
        assert_eq!(args.smoothing, SmoothingMode::Fixed);
        assert_eq!(args.undefined, UndefinedPolicy::Omit);
    }
}
