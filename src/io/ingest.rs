//! CSV ingest and normalization.
//!
//! This module turns an establishment-count CSV (e.g. a County Business Patterns
//! extract) into a clean `Dataset` keyed by `(region, industry)`.
//!
//! Design goals:
//! - **Strict schema** for required columns (clear errors + exit code 2)
//! - **Row-level validation** (skip bad rows, but report what happened)
//! - **Deterministic behavior** (first occurrence of a key wins)
//! - **Separation of concerns**: no quotient math here

use std::collections::HashMap;
use std::fs::File;
use std::io::Read;
use std::time::Instant;

use csv::StringRecord;

use crate::domain::{Dataset, DatasetStats, EngineConfig, EstablishmentRecord, IndustryCode, RegionId};
use crate::error::AppError;

/// Separator used when the region key is built from several columns.
pub const REGION_KEY_SEPARATOR: &str = "-";

/// A row-level error encountered during ingest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowError {
    pub line: usize,
    pub key: Option<String>,
    pub message: String,
}

/// Ingest output: the dataset + stats + row errors.
#[derive(Debug, Clone)]
pub struct IngestedData {
    pub dataset: Dataset,
    pub stats: DatasetStats,
    pub row_errors: Vec<RowError>,
    pub rows_read: usize,
    pub rows_used: usize,
    /// Rows dropped by `--sectors-only`.
    pub rows_filtered: usize,
    /// Zero-count pairs added by `--dense`.
    pub pairs_filled: usize,
}

/// Resolved column positions for one file.
#[derive(Debug, Clone)]
struct Columns {
    region: Vec<usize>,
    industry: usize,
    count: usize,
}

/// Load the CSV named by `config.csv_path`.
pub fn load_dataset(config: &EngineConfig) -> Result<IngestedData, AppError> {
    let started = Instant::now();
    log::info!("Reading {}", config.csv_path.display());

    let file = File::open(&config.csv_path).map_err(|e| {
        AppError::new(
            2,
            format!("Failed to open CSV '{}': {e}", config.csv_path.display()),
        )
    })?;
    let ingest = read_dataset(file, config)?;

    log::info!(
        "Loaded {} records from {} in {:?}",
        ingest.rows_used,
        config.csv_path.display(),
        started.elapsed()
    );
    Ok(ingest)
}

/// Parse establishment records from any reader.
pub fn read_dataset<R: Read>(input: R, config: &EngineConfig) -> Result<IngestedData, AppError> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(input);

    let headers = reader
        .headers()
        .map_err(|e| AppError::new(2, format!("Failed to read CSV headers: {e}")))?
        .clone();

    let header_map = build_header_map(&headers);
    let columns = resolve_columns(config, &header_map)?;

    let mut dataset = Dataset::new();
    let mut row_errors = Vec::new();
    let mut rows_read = 0usize;
    let mut rows_filtered = 0usize;
    let mut national_total = 0u64;

    for (idx, result) in reader.records().enumerate() {
        // +2: header is line 1 and lines are 1-based.
        let line = idx + 2;
        rows_read += 1;

        let record = match result {
            Ok(r) => r,
            Err(e) => {
                row_errors.push(RowError {
                    line,
                    key: None,
                    message: format!("CSV parse error: {e}"),
                });
                continue;
            }
        };

        match parse_row(&record, &columns, config) {
            Ok(Some(row)) => {
                if dataset.contains(&row.region, &row.industry) {
                    row_errors.push(RowError {
                        line,
                        key: Some(format!("{}/{}", row.region, row.industry)),
                        message: "Duplicate region/industry pair (first occurrence kept).".to_string(),
                    });
                    continue;
                }
                // Every region and industry total is bounded by the national one.
                let Some(total) = national_total.checked_add(row.count) else {
                    row_errors.push(RowError {
                        line,
                        key: Some(format!("{}/{}", row.region, row.industry)),
                        message: format!(
                            "Establishment count {} overflows the national total.",
                            row.count
                        ),
                    });
                    continue;
                };
                national_total = total;
                dataset.insert(row);
            }
            Ok(None) => rows_filtered += 1,
            Err((key, message)) => row_errors.push(RowError { line, key, message }),
        }
    }

    let rows_used = dataset.len();
    if rows_used == 0 {
        return Err(AppError::new(
            3,
            "No valid rows remain after normalization/filtering.",
        ));
    }

    let pairs_filled = if config.dense { dataset.densify() } else { 0 };

    if !row_errors.is_empty() {
        log::warn!("{} row(s) skipped during ingest", row_errors.len());
        for err in row_errors.iter().take(5) {
            log::debug!("line {}: {}", err.line, err.message);
        }
    }
    if pairs_filled > 0 {
        log::info!("Filled {pairs_filled} absent region/industry pairs with zero counts");
    }

    let stats = dataset.stats();
    Ok(IngestedData {
        dataset,
        stats,
        row_errors,
        rows_read,
        rows_used,
        rows_filtered,
        pairs_filled,
    })
}

fn build_header_map(headers: &StringRecord) -> HashMap<String, usize> {
    headers
        .iter()
        .enumerate()
        .map(|(idx, name)| (normalize_header_name(name), idx))
        .collect()
}

fn normalize_header_name(name: &str) -> String {
    // Excel-exported UTF-8 CSVs often carry a BOM on the first header.
    let name = name.trim().trim_start_matches('\u{feff}');
    name.to_ascii_lowercase()
}

fn resolve_columns(config: &EngineConfig, header_map: &HashMap<String, usize>) -> Result<Columns, AppError> {
    if config.region_cols.is_empty() {
        return Err(AppError::new(2, "At least one region column is required."));
    }

    let lookup = |name: &str| {
        header_map
            .get(&normalize_header_name(name))
            .copied()
            .ok_or_else(|| AppError::new(2, format!("Missing required column: `{name}`")))
    };

    let region = config
        .region_cols
        .iter()
        .map(|name| lookup(name.as_str()))
        .collect::<Result<Vec<_>, _>>()?;

    Ok(Columns {
        region,
        industry: lookup(config.industry_col.as_str())?,
        count: lookup(config.count_col.as_str())?,
    })
}

/// Parse one row. `Ok(None)` means the row was filtered out.
fn parse_row(
    record: &StringRecord,
    columns: &Columns,
    config: &EngineConfig,
) -> Result<Option<EstablishmentRecord>, (Option<String>, String)> {
    let mut parts = Vec::with_capacity(columns.region.len());
    for (idx, name) in columns.region.iter().zip(&config.region_cols) {
        let value = get_required(record, *idx, name).map_err(|e| (None, e))?;
        parts.push(value);
    }
    let region = RegionId::new(parts.join(REGION_KEY_SEPARATOR));

    let industry = get_required(record, columns.industry, &config.industry_col)
        .map(IndustryCode::new)
        .map_err(|e| (Some(region.to_string()), e))?;

    if config.sectors_only && !industry.is_cbp_sector() {
        return Ok(None);
    }

    let key = format!("{region}/{industry}");
    let raw_count = get_required(record, columns.count, &config.count_col)
        .map_err(|e| (Some(key.clone()), e))?;
    let count = parse_count(raw_count).map_err(|e| (Some(key), e))?;

    Ok(Some(EstablishmentRecord {
        region,
        industry,
        count,
    }))
}

fn get_required<'a>(record: &'a StringRecord, idx: usize, name: &str) -> Result<&'a str, String> {
    record
        .get(idx)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| format!("Missing required value: `{name}`"))
}

/// Parse an establishment count.
///
/// Accepts thousands separators and integral floats (`1,234`, `12.0`). Suppression
/// flags such as `(D)` and negative values are rejected.
pub fn parse_count(s: &str) -> Result<u64, String> {
    let cleaned: String = s.chars().filter(|c| *c != ',').collect();
    let cleaned = cleaned.trim();

    if let Ok(v) = cleaned.parse::<u64>() {
        return Ok(v);
    }

    // Plain decimal only: no exponents, `inf`, or `nan`.
    if !cleaned
        .chars()
        .all(|c| c.is_ascii_digit() || matches!(c, '.' | '-' | '+'))
    {
        return Err(format!("Non-numeric establishment count '{s}'."));
    }

    // `u64::MAX as f64` rounds up to 2^64, which does not fit.
    match cleaned.parse::<f64>() {
        Ok(v) if v.is_finite() && v < 0.0 => Err(format!("Negative establishment count '{s}'.")),
        Ok(v) if v.is_finite() && v >= u64::MAX as f64 => {
            Err(format!("Establishment count '{s}' is too large."))
        }
        Ok(v) if v.is_finite() && v.fract() == 0.0 => Ok(v as u64),
        Ok(_) => Err(format!("Establishment count '{s}' is not a whole number.")),
        Err(_) => Err(format!("Non-numeric establishment count '{s}'.")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> EngineConfig {
        EngineConfig::default()
    }

    #[test]
    fn parse_count_accepts_common_formats() {
        assert_eq!(parse_count("12"), Ok(12));
        assert_eq!(parse_count("1,234"), Ok(1234));
        assert_eq!(parse_count("12.0"), Ok(12));
        assert!(parse_count("(D)").is_err());
        assert!(parse_count("-3").is_err());
        assert!(parse_count("2.5").is_err());
    }

    #[test]
    fn parse_count_rejects_exponents_and_out_of_range() {
        assert!(parse_count("1e3").is_err());
        assert!(parse_count("1E3").is_err());
        assert!(parse_count("inf").is_err());
        assert_eq!(parse_count("18446744073709551615"), Ok(u64::MAX));
        assert!(parse_count("18446744073709551616").is_err());
        assert!(parse_count("18446744073709551616.0").is_err());
        assert!(parse_count("1e19").is_err());
    }

    #[test]
    fn overflowing_national_total_is_a_row_error() {
        let csv = "region,industry,establishments\n\
                   A,1,10000000000000000000\n\
                   B,1,10000000000000000000\n\
                   B,2,5\n";
        let ingest = read_dataset(csv.as_bytes(), &config()).unwrap();
        assert_eq!(ingest.rows_used, 2);
        assert_eq!(ingest.row_errors.len(), 1);
        assert_eq!(ingest.row_errors[0].line, 3);
        assert_eq!(ingest.row_errors[0].key.as_deref(), Some("B/1"));
        assert!(ingest.row_errors[0].message.contains("overflows"));
        assert_eq!(ingest.stats.national_total, 10_000_000_000_000_000_005);
    }

    #[test]
    fn reads_basic_table() {
        let csv = "region,industry,establishments\nA,1,10\nA,2,0\nB,1,5\nB,2,5\n";
        let ingest = read_dataset(csv.as_bytes(), &config()).unwrap();
        assert_eq!(ingest.rows_read, 4);
        assert_eq!(ingest.rows_used, 4);
        assert!(ingest.row_errors.is_empty());
        assert_eq!(ingest.stats.national_total, 20);
        assert_eq!(ingest.dataset.count(&"A".into(), &"1".into()), Some(10));
    }

    #[test]
    fn headers_are_case_insensitive_and_bom_tolerant() {
        let csv = "\u{feff}Region , INDUSTRY,Establishments\nA,1,3\n";
        let ingest = read_dataset(csv.as_bytes(), &config()).unwrap();
        assert_eq!(ingest.rows_used, 1);
    }

    #[test]
    fn bad_rows_are_reported_not_fatal() {
        let csv = "region,industry,establishments\nA,1,10\nA,2,(D)\nB,1,\nA,1,7\nB,2,4\n";
        let ingest = read_dataset(csv.as_bytes(), &config()).unwrap();
        assert_eq!(ingest.rows_used, 2);
        assert_eq!(ingest.row_errors.len(), 3);
        assert_eq!(ingest.row_errors[0].line, 3);
        assert_eq!(ingest.row_errors[0].key.as_deref(), Some("A/2"));
        assert!(ingest.row_errors[2].message.contains("Duplicate"));
        // First occurrence wins.
        assert_eq!(ingest.dataset.count(&"A".into(), &"1".into()), Some(10));
    }

    #[test]
    fn missing_column_is_a_schema_error() {
        let csv = "region,naics,establishments\nA,1,10\n";
        let err = read_dataset(csv.as_bytes(), &config()).unwrap_err();
        assert_eq!(err.exit_code(), 2);
        assert!(err.to_string().contains("`industry`"));
    }

    #[test]
    fn no_valid_rows_is_exit_code_3() {
        let csv = "region,industry,establishments\nA,1,x\n";
        let err = read_dataset(csv.as_bytes(), &config()).unwrap_err();
        assert_eq!(err.exit_code(), 3);
    }

    #[test]
    fn composite_region_key_and_sector_filter() {
        let csv = "state_fips,cty_fips,naics,establishments\n\
                   06,001,------,100\n\
                   06,001,23----,40\n\
                   06,001,236///,12\n\
                   06,003,23----,9\n";
        let config = EngineConfig {
            region_cols: vec!["state_fips".to_string(), "cty_fips".to_string()],
            industry_col: "naics".to_string(),
            sectors_only: true,
            ..EngineConfig::default()
        };
        let ingest = read_dataset(csv.as_bytes(), &config).unwrap();
        assert_eq!(ingest.rows_used, 2);
        assert_eq!(ingest.rows_filtered, 2);
        assert_eq!(ingest.dataset.count(&"06-001".into(), &"23----".into()), Some(40));
    }

    #[test]
    fn dense_fills_absent_pairs() {
        let csv = "region,industry,establishments\nA,1,10\nB,1,5\nB,2,5\n";
        let config = EngineConfig {
            dense: true,
            ..EngineConfig::default()
        };
        let ingest = read_dataset(csv.as_bytes(), &config).unwrap();
        assert_eq!(ingest.rows_used, 3);
        assert_eq!(ingest.pairs_filled, 1);
        assert_eq!(ingest.dataset.count(&"A".into(), &"2".into()), Some(0));
        assert_eq!(ingest.stats.n_records, 4);
    }
}
