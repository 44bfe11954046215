//! Top-level application orchestration.
//!
//! `src/main.rs` is intentionally tiny; this module is the "real main" that:
//! - parses CLI arguments
//! - resolves the input CSV
//! - runs the quotient + credibility engine
//! - prints reports and writes optional exports

use std::fs::File;
use std::io::{self, BufWriter};
use std::path::{Path, PathBuf};

use clap::Parser;

use crate::cli::{Command, ComputeArgs, SampleArgs, ShowArgs};
use crate::data::SampleConfig;
use crate::domain::EngineConfig;
use crate::error::AppError;

pub mod pipeline;

/// Environment variable naming the default input CSV (also read from `.env`).
pub const INPUT_ENV: &str = "LQ_INPUT";

/// Entry point for the `lq` binary.
pub fn run() -> Result<(), AppError> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    // `lq` and `lq -f data.csv` behave like `lq compute ...`.
    let argv = rewrite_args(std::env::args().collect());
    let cli = crate::cli::Cli::parse_from(argv);

    match cli.command {
        Command::Compute(args) => handle_compute(args, OutputMode::Full),
        Command::Rank(args) => handle_compute(args, OutputMode::RankOnly),
        Command::Sample(args) => handle_sample(args),
        Command::Show(args) => handle_show(args),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum OutputMode {
    Full,
    RankOnly,
}

fn handle_compute(args: ComputeArgs, mode: OutputMode) -> Result<(), AppError> {
    let csv_path = resolve_input(args.file.as_deref())?;
    let config = engine_config_from_args(&args, csv_path);
    let run = pipeline::run_compute(&config)?;

    if mode == OutputMode::Full {
        println!(
            "{}",
            crate::report::format_run_summary(&run.ingest, &run.output, &config)
        );
    }
    println!("{}", crate::report::format_rankings(&run.rankings));

    if let Some(path) = &config.export_results {
        crate::io::export::write_results_csv(path, &run.output.rows)?;
    }
    if let Some(path) = &config.export_summary {
        let summary = crate::io::summary::build_summary(&run.ingest, &run.output, &config);
        crate::io::summary::write_summary_json(path, &summary)?;
        log::info!("Wrote summary to {}", path.display());
    }
    if config.debug {
        let path = crate::debug::write_debug_bundle(&run.ingest, &run.output, &config)?;
        eprintln!("Debug bundle: {}", path.display());
    }

    Ok(())
}

fn handle_sample(args: SampleArgs) -> Result<(), AppError> {
    let config = SampleConfig {
        regions: args.regions,
        industries: args.industries,
        seed: args.seed,
        mean_count: args.mean,
        sparsity: args.sparsity,
    };
    let dataset = crate::data::generate_sample(&config)?;

    match &args.output {
        Some(path) => {
            let file = File::create(path).map_err(|e| {
                AppError::new(2, format!("Failed to create '{}': {e}", path.display()))
            })?;
            crate::io::export::write_dataset_csv(BufWriter::new(file), &dataset)?;
            log::info!("Wrote {} sample records to {}", dataset.len(), path.display());
        }
        None => crate::io::export::write_dataset_csv(io::stdout().lock(), &dataset)?,
    }

    Ok(())
}

fn handle_show(args: ShowArgs) -> Result<(), AppError> {
    let summary = crate::io::summary::read_summary_json(&args.summary)?;
    println!("{}", crate::report::format_summary_file(&summary));
    Ok(())
}

/// Pick the input CSV: `-f`, then `LQ_INPUT` (environment or `.env`), then the picker.
fn resolve_input(file: Option<&Path>) -> Result<PathBuf, AppError> {
    if let Some(path) = file {
        return crate::cli::picker::validate_csv_path(path);
    }

    dotenvy::dotenv().ok();
    if let Some(path) = std::env::var_os(INPUT_ENV).filter(|v| !v.is_empty()) {
        log::debug!("Using {INPUT_ENV}={}", Path::new(&path).display());
        return crate::cli::picker::validate_csv_path(Path::new(&path));
    }

    crate::cli::picker::prompt_for_csv_path()
}

pub fn engine_config_from_args(args: &ComputeArgs, csv_path: PathBuf) -> EngineConfig {
    EngineConfig {
        csv_path,
        region_cols: args.region_cols.clone(),
        industry_col: args.industry_col.clone(),
        count_col: args.count_col.clone(),
        sectors_only: args.sectors_only,
        dense: args.dense,
        smoothing: args.smoothing.with_pseudo_count(args.pseudo_count),
        undefined: args.undefined,
        top_n: args.top,
        export_results: args.export.clone(),
        export_summary: args.export_summary.clone(),
        debug: args.debug,
    }
}

/// Rewrite argv so `lq` defaults to `lq compute`.
///
/// Rules:
/// - `lq`                      -> `lq compute`
/// - `lq -f data.csv ...`      -> `lq compute -f data.csv ...`
/// - `lq --help/--version/-h`  -> unchanged (show top-level help/version)
fn rewrite_args(mut argv: Vec<String>) -> Vec<String> {
    let Some(arg1) = argv.get(1).cloned() else {
        argv.push("compute".to_string());
        return argv;
    };

    let is_top_level_help_or_version = matches!(
        arg1.as_str(),
        "-h" | "--help" | "-V" | "--version" | "help"
    );
    if is_top_level_help_or_version {
        return argv;
    }

    let is_subcommand = matches!(arg1.as_str(), "compute" | "rank" | "sample" | "show");
    if is_subcommand {
        return argv;
    }

    if arg1.starts_with('-') {
        argv.insert(1, "compute".to_string());
    }
    argv
}
