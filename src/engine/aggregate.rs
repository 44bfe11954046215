//! Region, industry, and national totals.
//!
//! Every quotient needs the same three denominators, so we compute them once
//! in a single pass over the dataset and index them by key.
//!
//! Ingest rejects rows that would overflow the national total, so sums fit in
//! `u64`; datasets built in memory saturate at `u64::MAX` instead of wrapping.

use std::collections::BTreeMap;

use crate::domain::{Dataset, IndustryAggregate, IndustryCode, RegionAggregate, RegionId};
use crate::error::{EngineError, KeyKind};

/// Precomputed totals for one dataset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Aggregates {
    regions: BTreeMap<RegionId, RegionAggregate>,
    industries: BTreeMap<IndustryCode, IndustryAggregate>,
    national_total: u64,
}

impl Aggregates {
    pub fn from_dataset(dataset: &Dataset) -> Self {
        let mut regions: BTreeMap<RegionId, RegionAggregate> = BTreeMap::new();
        let mut industries: BTreeMap<IndustryCode, IndustryAggregate> = BTreeMap::new();
        let mut national_total = 0u64;

        for (region, industry, count) in dataset.iter() {
            let r = regions.entry(region.clone()).or_default();
            r.total = r.total.saturating_add(count);
            r.industries += 1;

            let i = industries.entry(industry.clone()).or_default();
            i.total = i.total.saturating_add(count);
            i.regions += 1;

            national_total = national_total.saturating_add(count);
        }

        Self {
            regions,
            industries,
            national_total,
        }
    }

    pub fn region(&self, region: &RegionId) -> Result<&RegionAggregate, EngineError> {
        self.regions
            .get(region)
            .ok_or_else(|| EngineError::missing(KeyKind::Region, region))
    }

    pub fn industry(&self, industry: &IndustryCode) -> Result<&IndustryAggregate, EngineError> {
        self.industries
            .get(industry)
            .ok_or_else(|| EngineError::missing(KeyKind::Industry, industry))
    }

    pub fn region_total(&self, region: &RegionId) -> Result<u64, EngineError> {
        self.region(region).map(|r| r.total)
    }

    pub fn industry_total(&self, industry: &IndustryCode) -> Result<u64, EngineError> {
        self.industry(industry).map(|i| i.total)
    }

    pub fn national_total(&self) -> u64 {
        self.national_total
    }

    /// Distinct industries across the whole dataset.
    pub fn distinct_industries(&self) -> usize {
        self.industries.len()
    }

    pub fn regions(&self) -> impl Iterator<Item = (&RegionId, &RegionAggregate)> {
        self.regions.iter()
    }

    pub fn industries(&self) -> impl Iterator<Item = (&IndustryCode, &IndustryAggregate)> {
        self.industries.iter()
    }
}
