//! Bühlmann credibility statistics.
//!
//! Proportions are `p_ir = x_ir / x_r` (the raw LQ numerator).
//!
//! - EPV: mean over regions of the population variance of `p_ir` within the region
//! - VHM: mean over industries of `Σ_r (p_ir - mean_r p_ir)^2`
//! - `k = EPV / VHM`, and per region `Z_r = x_r / (x_r + k)`
//!
//! `Z_r` is the weight on the regional (raw) estimate; `1 - Z_r` goes to the
//! smoothed estimate.
//!
//! Per-region and per-industry components are independent, so they are
//! computed in parallel and collected back in key order. The final averages are
//! sequential, which keeps results bit-for-bit reproducible.

use std::collections::BTreeMap;

use rayon::prelude::*;

use crate::domain::{Dataset, IndustryCode, Quotient, RegionId};
use crate::engine::aggregate::Aggregates;
use crate::error::{EngineError, KeyKind};

/// Credibility statistics for one dataset.
#[derive(Debug, Clone, PartialEq)]
pub struct CredibilityReport {
    /// Within-region variance of proportions (`None` if undefined for that region).
    pub region_variances: BTreeMap<RegionId, Option<f64>>,
    /// Across-region squared-deviation sum per industry (`None` if undefined).
    pub industry_deviations: BTreeMap<IndustryCode, Option<f64>>,
    pub epv: Quotient,
    pub vhm: Quotient,
    pub k: Quotient,
    /// Credibility weight `Z` per region.
    pub weights: BTreeMap<RegionId, Quotient>,
}

impl CredibilityReport {
    pub fn weight(&self, region: &RegionId) -> Quotient {
        self.weights
            .get(region)
            .cloned()
            .unwrap_or_else(|| Err(EngineError::missing(KeyKind::Region, region)))
    }
}

/// Expected process variance of the dataset.
pub fn expected_process_variance(dataset: &Dataset) -> Quotient {
    let aggregates = Aggregates::from_dataset(dataset);
    epv_from(&region_variances(dataset, &aggregates))
}

/// Variance of hypothetical means of the dataset.
pub fn variance_of_hypothetical_means(dataset: &Dataset) -> Quotient {
    let aggregates = Aggregates::from_dataset(dataset);
    vhm_from(&industry_deviations(dataset, &aggregates))
}

/// Bühlmann credibility weight for a region of size `region_total`.
pub fn credibility_weight(epv: f64, vhm: f64, region_total: u64) -> Quotient {
    if vhm == 0.0 || !vhm.is_finite() {
        return Err(EngineError::undefined("variance of hypothetical means is zero"));
    }
    let k = epv / vhm;
    let total = region_total as f64;
    let denom = total + k;
    if denom == 0.0 || !denom.is_finite() {
        return Err(EngineError::undefined(format!(
            "region total + k is {denom} (region total {region_total}, k {k})"
        )));
    }
    Ok(total / denom)
}

/// Blend the raw and smoothed quotients with weight `z` on the raw one.
pub fn credibility_lq(raw: f64, smoothed: f64, z: f64) -> f64 {
    z * raw + (1.0 - z) * smoothed
}

/// Compute every credibility statistic at once.
pub fn credibility_report(dataset: &Dataset, aggregates: &Aggregates) -> CredibilityReport {
    let region_variances = region_variances(dataset, aggregates);
    let industry_deviations = industry_deviations(dataset, aggregates);

    let epv = epv_from(&region_variances);
    let vhm = vhm_from(&industry_deviations);
    let k = match (&epv, &vhm) {
        (Ok(e), Ok(v)) if *v != 0.0 => Ok(e / v),
        (Ok(_), Ok(_)) => Err(EngineError::undefined("variance of hypothetical means is zero")),
        (Err(e), _) | (_, Err(e)) => Err(e.clone()),
    };

    let weights = aggregates
        .regions()
        .map(|(region, agg)| {
            let z = match (&epv, &vhm) {
                (Ok(e), Ok(v)) => credibility_weight(*e, *v, agg.total),
                (Err(e), _) | (_, Err(e)) => Err(e.clone()),
            };
            (region.clone(), z)
        })
        .collect();

    CredibilityReport {
        region_variances,
        industry_deviations,
        epv,
        vhm,
        k,
        weights,
    }
}

/// Population variance of within-region proportions, per region.
///
/// Undefined for a region with a zero total or fewer than two industries.
pub fn region_variances(dataset: &Dataset, aggregates: &Aggregates) -> BTreeMap<RegionId, Option<f64>> {
    let groups = region_proportions(dataset, aggregates);

    groups
        .into_par_iter()
        .map(|(region, proportions)| {
            let variance = proportions
                .filter(|p| p.len() >= 2)
                .map(|p| population_variance(&p));
            (region, variance)
        })
        .collect::<Vec<_>>()
        .into_iter()
        .collect()
}

/// Sum of squared deviations of an industry's proportion from its cross-region mean.
///
/// An industry listed by any region with a zero total has an undefined
/// proportion there, so its deviation sum is undefined too.
pub fn industry_deviations(
    dataset: &Dataset,
    aggregates: &Aggregates,
) -> BTreeMap<IndustryCode, Option<f64>> {
    let mut groups: BTreeMap<IndustryCode, Option<Vec<f64>>> = BTreeMap::new();
    for (region, industry, count) in dataset.iter() {
        let entry = groups
            .entry(industry.clone())
            .or_insert_with(|| Some(Vec::new()));
        match proportion(aggregates, region, count) {
            Some(p) => {
                if let Some(values) = entry {
                    values.push(p);
                }
            }
            None => *entry = None,
        }
    }

    groups
        .into_par_iter()
        .map(|(industry, proportions)| {
            let deviation = proportions.filter(|p| !p.is_empty()).map(|p| {
                let avg = mean(&p);
                p.iter().map(|v| (v - avg).powi(2)).sum::<f64>()
            });
            (industry, deviation)
        })
        .collect::<Vec<_>>()
        .into_iter()
        .collect()
}

fn epv_from(region_variances: &BTreeMap<RegionId, Option<f64>>) -> Quotient {
    mean_of_defined(region_variances.values())
        .ok_or_else(|| EngineError::undefined("no region has a defined within-region variance"))
}

fn vhm_from(industry_deviations: &BTreeMap<IndustryCode, Option<f64>>) -> Quotient {
    mean_of_defined(industry_deviations.values())
        .ok_or_else(|| EngineError::undefined("no industry has a defined across-region deviation"))
}

/// Within-region proportions; a region is `None` if its total is zero.
fn region_proportions(dataset: &Dataset, aggregates: &Aggregates) -> Vec<(RegionId, Option<Vec<f64>>)> {
    let mut groups: BTreeMap<RegionId, Option<Vec<f64>>> = BTreeMap::new();
    for (region, _, count) in dataset.iter() {
        let entry = groups
            .entry(region.clone())
            .or_insert_with(|| Some(Vec::new()));
        match proportion(aggregates, region, count) {
            Some(p) => {
                if let Some(values) = entry {
                    values.push(p);
                }
            }
            None => *entry = None,
        }
    }
    groups.into_iter().collect()
}

fn proportion(aggregates: &Aggregates, region: &RegionId, count: u64) -> Option<f64> {
    let total = aggregates.region_total(region).ok()?;
    if total == 0 {
        return None;
    }
    Some(count as f64 / total as f64)
}

fn mean(values: &[f64]) -> f64 {
    values.iter().sum::<f64>() / values.len() as f64
}

/// Variance dividing by `n` (not `n - 1`).
fn population_variance(values: &[f64]) -> f64 {
    let m = mean(values);
    values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / values.len() as f64
}

fn mean_of_defined<'a>(values: impl Iterator<Item = &'a Option<f64>>) -> Option<f64> {
    let defined: Vec<f64> = values.filter_map(|v| *v).filter(|v| v.is_finite()).collect();
    if defined.is_empty() {
        None
    } else {
        Some(mean(&defined))
    }
}
