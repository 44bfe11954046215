//! Rankings and formatted terminal output.
//!
//! We keep formatting code in one place so:
//! - the engine stays clean and testable
//! - output changes are localized

use std::cmp::Ordering;

use crate::domain::{EngineConfig, LqRow, Quotient, SummaryFile};
use crate::engine::EngineOutput;
use crate::io::ingest::IngestedData;

/// Top-N tables.
#[derive(Debug, Clone)]
pub struct Rankings {
    /// Highest raw location quotients.
    pub concentrated: Vec<LqRow>,
    /// Largest gap between raw and smoothed quotients.
    pub unstable: Vec<LqRow>,
}

/// Rank rows by raw LQ and by stability (descending, undefined last).
pub fn rank_rows(rows: &[LqRow], top_n: usize) -> Rankings {
    let mut concentrated = rows.to_vec();
    concentrated.sort_by(|a, b| desc_defined_first(a.raw_lq, b.raw_lq));
    concentrated.truncate(top_n);

    let mut unstable = rows.to_vec();
    unstable.sort_by(|a, b| desc_defined_first(a.stability, b.stability));
    unstable.truncate(top_n);

    Rankings {
        concentrated,
        unstable,
    }
}

fn desc_defined_first(a: Option<f64>, b: Option<f64>) -> Ordering {
    match (a, b) {
        (Some(x), Some(y)) => y.partial_cmp(&x).unwrap_or(Ordering::Equal),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

/// Format the run summary (dataset stats + credibility statistics).
pub fn format_run_summary(ingest: &IngestedData, output: &EngineOutput, config: &EngineConfig) -> String {
    let mut out = String::new();

    out.push_str("=== lq - Location Quotients with Credibility Adjustment ===\n");
    out.push_str(&format!("Input: {}\n", config.csv_path.display()));
    out.push_str(&format!(
        "Rows: read={} used={} errors={} filtered={} filled={}\n",
        ingest.rows_read,
        ingest.rows_used,
        ingest.row_errors.len(),
        ingest.rows_filtered,
        ingest.pairs_filled
    ));
    out.push_str(&format!(
        "Dataset: regions={} industries={} pairs={} establishments={}\n",
        ingest.stats.n_regions, ingest.stats.n_industries, ingest.stats.n_records, ingest.stats.national_total
    ));
    out.push_str(&format!(
        "Smoothing: {} | undefined: {:?}\n",
        config.smoothing, config.undefined
    ));

    let cred = &output.credibility;
    out.push_str("\nCredibility:\n");
    out.push_str(&format!("- EPV: {}\n", fmt_quotient(&cred.epv)));
    out.push_str(&format!("- VHM: {}\n", fmt_quotient(&cred.vhm)));
    out.push_str(&format!("- k  : {}\n", fmt_quotient(&cred.k)));

    let defined_z: Vec<f64> = cred.weights.values().filter_map(|z| z.as_ref().ok().copied()).collect();
    if let (Some(min), Some(max)) = (
        defined_z.iter().copied().reduce(f64::min),
        defined_z.iter().copied().reduce(f64::max),
    ) {
        out.push_str(&format!("- Z  : [{min:.4}, {max:.4}] over {} regions\n", defined_z.len()));
    }

    let u = &output.undefined;
    out.push_str(&format!(
        "\nUndefined: raw={} smoothed={} credibility={} omitted_rows={}\n",
        u.raw, u.smoothed, u.credibility, u.rows_omitted
    ));
    for err in ingest.row_errors.iter().take(5) {
        out.push_str(&format!("  (line {}) {}\n", err.line, err.message));
    }
    if ingest.row_errors.len() > 5 {
        out.push_str(&format!("  ... and {} more\n", ingest.row_errors.len() - 5));
    }
    out.push('\n');

    out
}

/// Format the top-N tables.
pub fn format_rankings(rankings: &Rankings) -> String {
    let mut out = String::new();

    out.push_str("Most concentrated (highest raw LQ):\n");
    out.push_str(&format_table(&rankings.concentrated));
    out.push('\n');

    out.push_str("Least stable (largest |raw - smoothed|):\n");
    out.push_str(&format_table(&rankings.unstable));

    out
}

/// Format a saved summary file for `lq show`.
pub fn format_summary_file(summary: &SummaryFile) -> String {
    let mut out = String::new();
    out.push_str(&format!("=== {} summary ({}) ===\n", summary.tool, summary.generated_at));
    out.push_str(&format!("Input: {}\n", summary.input));
    out.push_str(&format!(
        "Dataset: regions={} industries={} pairs={} establishments={}\n",
        summary.stats.n_regions, summary.stats.n_industries, summary.stats.n_records, summary.stats.national_total
    ));
    out.push_str(&format!(
        "Smoothing: {} | undefined: {:?}\n",
        summary.smoothing, summary.undefined_policy
    ));
    out.push_str(&format!(
        "EPV={} VHM={} k={}\n\n",
        fmt_opt(summary.epv),
        fmt_opt(summary.vhm),
        fmt_opt(summary.k)
    ));

    out.push_str(&format!(
        "{:<16} {:>12} {:>10} {:>12} {:>8}\n",
        "region", "total", "industries", "variance", "Z"
    ));
    for r in &summary.regions {
        out.push_str(&format!(
            "{:<16} {:>12} {:>10} {:>12} {:>8}\n",
            truncate(r.region.as_str(), 16),
            r.total,
            r.industries,
            fmt_opt(r.variance),
            r.z.map(|z| format!("{z:.4}")).unwrap_or_else(|| "-".to_string()),
        ));
    }
    out
}

fn format_table(rows: &[LqRow]) -> String {
    let mut out = String::new();
    out.push_str(
        format!(
            "{:<16} {:<10} {:>8} {:>10} {:>10} {:>10} {:>8} {:>10}\n",
            "region", "industry", "count", "raw_lq", "smoothed", "stability", "Z", "cred_lq"
        )
        .trim_end(),
    );
    out.push('\n');

    out.push_str(
        format!(
            "{:-<16} {:-<10} {:-<8} {:-<10} {:-<10} {:-<10} {:-<8} {:-<10}\n",
            "", "", "", "", "", "", "", ""
        )
        .trim_end(),
    );
    out.push('\n');

    for r in rows {
        out.push_str(
            format!(
                "{:<16} {:<10} {:>8} {:>10} {:>10} {:>10} {:>8} {:>10}\n",
                truncate(r.region.as_str(), 16),
                truncate(r.industry.as_str(), 10),
                r.count,
                fmt_cell(r.raw_lq),
                fmt_cell(r.smoothed_lq),
                fmt_cell(r.stability),
                fmt_cell(r.credibility_weight),
                fmt_cell(r.credibility_lq),
            )
            .trim_end(),
        );
        out.push('\n');
    }

    out
}

fn fmt_cell(v: Option<f64>) -> String {
    match v {
        Some(x) => format!("{x:.4}"),
        None => "NaN".to_string(),
    }
}

fn fmt_opt(v: Option<f64>) -> String {
    match v {
        Some(x) => format!("{x:.6}"),
        None => "undefined".to_string(),
    }
}

fn fmt_quotient(v: &Quotient) -> String {
    match v {
        Ok(x) => format!("{x:.6}"),
        Err(e) => format!("undefined ({e})"),
    }
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        return s.to_string();
    }
    let mut out = String::new();
    for (i, ch) in s.chars().enumerate() {
        if i + 1 >= max {
            break;
        }
        out.push(ch);
    }
    out.push('.');
    out
}
