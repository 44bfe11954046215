//! Shared domain types.
//!
//! These types are kept lightweight and serializable so they can be:
//!
//! - used in-memory by the engine
//! - exported to CSV/JSON
//! - reloaded later for display

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::path::PathBuf;

use chrono::NaiveDateTime;
use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::error::EngineError;

/// Geography key (e.g. a county FIPS code, or `state-county` when built from several columns).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RegionId(String);

impl RegionId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RegionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for RegionId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

/// Industry classification code (e.g. a NAICS code such as `23----`).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct IndustryCode(String);

impl IndustryCode {
    pub fn new(code: impl Into<String>) -> Self {
        Self(code.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// County Business Patterns 2-digit sector rows look like `23----`.
    ///
    /// The all-industries total (`------`) and sub-sector rows are excluded.
    pub fn is_cbp_sector(&self) -> bool {
        self.0.ends_with("----") && !self.0.starts_with("--")
    }
}

impl fmt::Display for IndustryCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for IndustryCode {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

/// `(region, industry)` key used by every per-pair mapping.
pub type PairKey = (RegionId, IndustryCode);

/// A per-pair (or scalar) engine value: defined, or the reason it is not.
pub type Quotient = Result<f64, EngineError>;

/// One input row: establishments of an industry within a region.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EstablishmentRecord {
    pub region: RegionId,
    pub industry: IndustryCode,
    pub count: u64,
}

impl EstablishmentRecord {
    pub fn new(region: impl Into<String>, industry: impl Into<String>, count: u64) -> Self {
        Self {
            region: RegionId::new(region),
            industry: IndustryCode::new(industry),
            count,
        }
    }
}

/// Establishment counts keyed by `(region, industry)`.
///
/// Backed by a `BTreeMap` so iteration (and therefore every derived table) is
/// ordered by region, then industry.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Dataset {
    counts: BTreeMap<PairKey, u64>,
}

impl Dataset {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a record, replacing any previous count for the same key.
    ///
    /// Returns the previous count if the key was already present.
    pub fn insert(&mut self, record: EstablishmentRecord) -> Option<u64> {
        self.counts
            .insert((record.region, record.industry), record.count)
    }

    pub fn contains(&self, region: &RegionId, industry: &IndustryCode) -> bool {
        self.counts.contains_key(&(region.clone(), industry.clone()))
    }

    pub fn count(&self, region: &RegionId, industry: &IndustryCode) -> Option<u64> {
        self.counts.get(&(region.clone(), industry.clone())).copied()
    }

    pub fn len(&self) -> usize {
        self.counts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    /// Iterate `(region, industry, count)` in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&RegionId, &IndustryCode, u64)> {
        self.counts.iter().map(|((r, i), c)| (r, i, *c))
    }

    pub fn regions(&self) -> BTreeSet<&RegionId> {
        self.counts.keys().map(|(r, _)| r).collect()
    }

    pub fn industries(&self) -> BTreeSet<&IndustryCode> {
        self.counts.keys().map(|(_, i)| i).collect()
    }

    /// Insert a zero count for every `(region, industry)` pair not listed.
    ///
    /// Returns how many pairs were added.
    pub fn densify(&mut self) -> usize {
        let regions: Vec<RegionId> = self.regions().into_iter().cloned().collect();
        let industries: Vec<IndustryCode> = self.industries().into_iter().cloned().collect();

        let mut added = 0usize;
        for region in &regions {
            for industry in &industries {
                self.counts
                    .entry((region.clone(), industry.clone()))
                    .or_insert_with(|| {
                        added += 1;
                        0
                    });
            }
        }
        added
    }

    pub fn stats(&self) -> DatasetStats {
        DatasetStats {
            n_records: self.len(),
            n_regions: self.regions().len(),
            n_industries: self.industries().len(),
            national_total: self
                .counts
                .values()
                .fold(0u64, |acc, c| acc.saturating_add(*c)),
            zero_records: self.counts.values().filter(|c| **c == 0).count(),
        }
    }
}

impl FromIterator<EstablishmentRecord> for Dataset {
    fn from_iter<T: IntoIterator<Item = EstablishmentRecord>>(iter: T) -> Self {
        let mut dataset = Dataset::new();
        for record in iter {
            dataset.insert(record);
        }
        dataset
    }
}

/// Summary stats about the dataset that was actually fed to the engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatasetStats {
    pub n_records: usize,
    pub n_regions: usize,
    pub n_industries: usize,
    pub national_total: u64,
    pub zero_records: usize,
}

/// Per-region totals.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RegionAggregate {
    /// Establishments across all industries in the region.
    pub total: u64,
    /// Distinct industries listed for the region (zero counts included).
    pub industries: usize,
}

/// Per-industry totals.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct IndustryAggregate {
    /// Establishments across all regions for the industry.
    pub total: u64,
    /// Regions listing the industry.
    pub regions: usize,
}

/// Raw, smoothed, and stability values for one `(region, industry)` pair.
#[derive(Debug, Clone, PartialEq)]
pub struct LocationQuotient {
    pub raw: Quotient,
    pub smoothed: Quotient,
    pub stability: Quotient,
}

/// How many pseudo-establishments the smoothed quotient adds to a region total.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Smoothing {
    /// Number of distinct industries listed in that region.
    Region,
    /// Number of distinct industries across the whole dataset.
    National,
    /// A fixed pseudo-count.
    Fixed(u64),
}

impl fmt::Display for Smoothing {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Smoothing::Region => f.write_str("region"),
            Smoothing::National => f.write_str("national"),
            Smoothing::Fixed(k) => write!(f, "fixed({k})"),
        }
    }
}

/// CLI-facing selector for [`Smoothing`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum SmoothingMode {
    /// Add the region's distinct-industry count to its total.
    Region,
    /// Add the dataset's distinct-industry count to every region total.
    National,
    /// Add `--pseudo-count` to every region total.
    Fixed,
}

impl SmoothingMode {
    pub fn with_pseudo_count(self, k: u64) -> Smoothing {
        match self {
            SmoothingMode::Region => Smoothing::Region,
            SmoothingMode::National => Smoothing::National,
            SmoothingMode::Fixed => Smoothing::Fixed(k),
        }
    }
}

/// What to do with an undefined value when building output rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum UndefinedPolicy {
    /// Keep the row; leave the cell blank (NaN).
    Nan,
    /// Keep the row; write 0.
    Zero,
    /// Drop the row.
    Omit,
}

impl UndefinedPolicy {
    /// Resolve a value into an output cell.
    ///
    /// The outer `None` means the row must be dropped; an inner `None` is a blank cell.
    pub fn resolve(self, value: &Quotient) -> Option<Option<f64>> {
        match (value, self) {
            (Ok(v), _) => Some(Some(*v)),
            (Err(_), UndefinedPolicy::Nan) => Some(None),
            (Err(_), UndefinedPolicy::Zero) => Some(Some(0.0)),
            (Err(_), UndefinedPolicy::Omit) => None,
        }
    }
}

/// One output row per `(region, industry)` pair.
///
/// `None` cells are undefined values kept under `UndefinedPolicy::Nan`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LqRow {
    pub region: RegionId,
    pub industry: IndustryCode,
    pub count: u64,
    pub region_total: u64,
    pub industry_total: u64,
    pub raw_lq: Option<f64>,
    pub smoothed_lq: Option<f64>,
    pub stability: Option<f64>,
    pub diff_sq: Option<f64>,
    pub credibility_weight: Option<f64>,
    pub credibility_lq: Option<f64>,
    pub credibility_stability: Option<f64>,
}

/// How many pairs had an undefined value, and how many rows the policy dropped.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UndefinedCounts {
    pub raw: usize,
    pub smoothed: usize,
    pub credibility: usize,
    pub rows_omitted: usize,
}

/// Per-region line of a summary file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegionSummary {
    pub region: RegionId,
    pub total: u64,
    pub industries: usize,
    /// Within-region variance of industry proportions.
    pub variance: Option<f64>,
    /// Credibility weight `Z`.
    pub z: Option<f64>,
}

/// A saved run summary (JSON).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SummaryFile {
    pub tool: String,
    pub generated_at: NaiveDateTime,
    pub input: String,
    pub smoothing: Smoothing,
    pub undefined_policy: UndefinedPolicy,
    pub stats: DatasetStats,
    pub rows_read: usize,
    pub row_errors: usize,
    pub epv: Option<f64>,
    pub vhm: Option<f64>,
    pub k: Option<f64>,
    pub undefined: UndefinedCounts,
    pub regions: Vec<RegionSummary>,
}

/// A full run's configuration as understood by the pipeline.
///
/// This is derived from CLI flags (plus defaults).
#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub csv_path: PathBuf,

    /// Columns joined with `-` to form the region key.
    pub region_cols: Vec<String>,
    pub industry_col: String,
    pub count_col: String,
    /// Keep only County Business Patterns 2-digit sector rows.
    pub sectors_only: bool,
    /// Fill absent `(region, industry)` pairs with zero counts.
    pub dense: bool,

    pub smoothing: Smoothing,
    pub undefined: UndefinedPolicy,

    pub top_n: usize,
    pub export_results: Option<PathBuf>,
    pub export_summary: Option<PathBuf>,
    pub debug: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            csv_path: PathBuf::new(),
            region_cols: vec!["region".to_string()],
            industry_col: "industry".to_string(),
            count_col: "establishments".to_string(),
            sectors_only: false,
            dense: false,
            smoothing: Smoothing::Region,
            undefined: UndefinedPolicy::Nan,
            top_n: 20,
            export_results: None,
            export_summary: None,
            debug: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_region_dataset() -> Dataset {
        [
            EstablishmentRecord::new("A", "1", 10),
            EstablishmentRecord::new("B", "1", 5),
            EstablishmentRecord::new("B", "2", 5),
        ]
        .into_iter()
        .collect()
    }

    #[test]
    fn cbp_sector_codes() {
        assert!(IndustryCode::from("23----").is_cbp_sector());
        assert!(!IndustryCode::from("------").is_cbp_sector());
        assert!(!IndustryCode::from("236///").is_cbp_sector());
    }

    #[test]
    fn densify_fills_missing_pairs_with_zero() {
        let mut ds = two_region_dataset();
        let added = ds.densify();
        assert_eq!(added, 1);
        assert_eq!(ds.count(&"A".into(), &"2".into()), Some(0));
        assert_eq!(ds.len(), 4);
        assert_eq!(ds.densify(), 0);
    }

    #[test]
    fn stats_totals() {
        let stats = two_region_dataset().stats();
        assert_eq!(stats.n_records, 3);
        assert_eq!(stats.n_regions, 2);
        assert_eq!(stats.n_industries, 2);
        assert_eq!(stats.national_total, 20);
        assert_eq!(stats.zero_records, 0);
    }

    #[test]
    fn policy_resolution() {
        let undefined: Quotient = Err(EngineError::undefined("x"));
        assert_eq!(UndefinedPolicy::Nan.resolve(&undefined), Some(None));
        assert_eq!(UndefinedPolicy::Zero.resolve(&undefined), Some(Some(0.0)));
        assert_eq!(UndefinedPolicy::Omit.resolve(&undefined), None);
        assert_eq!(UndefinedPolicy::Omit.resolve(&Ok(1.5)), Some(Some(1.5)));
    }

    #[test]
    fn smoothing_mode_uses_pseudo_count_only_when_fixed() {
        assert_eq!(SmoothingMode::Fixed.with_pseudo_count(3), Smoothing::Fixed(3));
        assert_eq!(SmoothingMode::Region.with_pseudo_count(3), Smoothing::Region);
    }
}
