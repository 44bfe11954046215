//! Debug bundle writer for inspecting intermediate aggregates.

use std::fmt::Write as _;
use std::fs::{create_dir_all, write};
use std::path::{Path, PathBuf};

use chrono::Local;

use crate::domain::{EngineConfig, Quotient};
use crate::engine::EngineOutput;
use crate::error::AppError;
use crate::io::ingest::IngestedData;

pub fn write_debug_bundle(
    ingest: &IngestedData,
    output: &EngineOutput,
    config: &EngineConfig,
) -> Result<PathBuf, AppError> {
    write_debug_bundle_to(Path::new("debug"), ingest, output, config)
}

pub fn write_debug_bundle_to(
    dir: &Path,
    ingest: &IngestedData,
    output: &EngineOutput,
    config: &EngineConfig,
) -> Result<PathBuf, AppError> {
    create_dir_all(dir).map_err(|e| AppError::new(4, format!("Failed to create debug dir: {e}")))?;

    let ts = Local::now().format("%Y%m%d_%H%M%S");
    let stem = config
        .csv_path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("input");
    let path = dir.join(format!("lq_debug_{stem}_{ts}.md"));

    let body = render_debug_bundle(ingest, output, config)
        .map_err(|e| AppError::new(4, format!("Failed to render debug bundle: {e}")))?;
    write(&path, body).map_err(|e| AppError::new(4, format!("Failed to write debug file: {e}")))?;

    Ok(path)
}

fn render_debug_bundle(
    ingest: &IngestedData,
    output: &EngineOutput,
    config: &EngineConfig,
) -> Result<String, std::fmt::Error> {
    let mut out = String::new();
    let agg = &output.aggregates;
    let cred = &output.credibility;

    writeln!(out, "# lq debug bundle")?;
    writeln!(out, "- generated: {}", Local::now().to_rfc3339())?;
    writeln!(out, "- input: {}", config.csv_path.display())?;
    writeln!(out, "- region_cols: {}", config.region_cols.join(", "))?;
    writeln!(out, "- smoothing: {}", config.smoothing)?;
    writeln!(out, "- undefined: {:?}", config.undefined)?;
    writeln!(
        out,
        "- rows: read={} used={} errors={} filtered={} filled={}",
        ingest.rows_read,
        ingest.rows_used,
        ingest.row_errors.len(),
        ingest.rows_filtered,
        ingest.pairs_filled
    )?;
    writeln!(out, "- national_total: {}", agg.national_total())?;
    writeln!(out, "- epv: {}", fmt_quotient(&cred.epv))?;
    writeln!(out, "- vhm: {}", fmt_quotient(&cred.vhm))?;
    writeln!(out, "- k: {}", fmt_quotient(&cred.k))?;

    if !ingest.row_errors.is_empty() {
        writeln!(out, "\n## Row errors")?;
        for err in &ingest.row_errors {
            writeln!(
                out,
                "- line {} [{}]: {}",
                err.line,
                err.key.as_deref().unwrap_or("-"),
                err.message
            )?;
        }
    }

    writeln!(out, "\n## Regions")?;
    writeln!(out, "| region | total | industries | variance | Z |")?;
    writeln!(out, "| - | - | - | - | - |")?;
    for (region, r) in agg.regions() {
        let variance = cred.region_variances.get(region).copied().flatten();
        writeln!(
            out,
            "| {} | {} | {} | {} | {} |",
            region,
            r.total,
            r.industries,
            fmt_opt(variance),
            fmt_quotient(&cred.weight(region))
        )?;
    }

    writeln!(out, "\n## Industries")?;
    writeln!(out, "| industry | total | regions | share | deviation_sum |")?;
    writeln!(out, "| - | - | - | - | - |")?;
    for (industry, i) in agg.industries() {
        let share = if agg.national_total() == 0 {
            f64::NAN
        } else {
            i.total as f64 / agg.national_total() as f64
        };
        let deviation = cred.industry_deviations.get(industry).copied().flatten();
        writeln!(
            out,
            "| {} | {} | {} | {} | {} |",
            industry,
            i.total,
            i.regions,
            fmt_opt(Some(share)),
            fmt_opt(deviation)
        )?;
    }

    let undefined: Vec<_> = output
        .quotients
        .iter()
        .filter_map(|((region, industry), lq)| lq.raw.as_ref().err().map(|e| (region, industry, e)))
        .collect();
    if !undefined.is_empty() {
        writeln!(out, "\n## Undefined raw quotients")?;
        for (region, industry, err) in undefined {
            writeln!(out, "- {region}/{industry}: {err}")?;
        }
    }

    Ok(out)
}

fn fmt_opt(value: Option<f64>) -> String {
    match value {
        Some(v) if v.is_finite() => format!("{v:.6}"),
        _ => "-".to_string(),
    }
}

fn fmt_quotient(value: &Quotient) -> String {
    match value {
        Ok(v) => fmt_opt(Some(*v)),
        Err(e) => format!("- ({e})"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::run_engine;
    use crate::io::ingest::read_dataset;

    #[test]
    fn bundle_lists_regions_industries_and_undefined_pairs() {
        let csv = "region,industry,establishments\nA,1,10\nA,2,0\nB,1,5\nB,2,5\nC,1,0\nC,2,(D)\n";
        let config = EngineConfig::default();
        let ingest = read_dataset(csv.as_bytes(), &config).unwrap();
        let output = run_engine(&ingest.dataset, config.smoothing, config.undefined);

        let body = render_debug_bundle(&ingest, &output, &config).unwrap();
        assert!(body.starts_with("# lq debug bundle"));
        assert!(body.contains("## Row errors"));
        assert!(body.contains("| A | 10 | 2 | 0.250000 |"));
        assert!(body.contains("| 1 | 15 | 3 |"));
        assert!(body.contains("- C/1: undefined ratio"));
    }
}
