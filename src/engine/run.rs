//! Full engine run: quotients, credibility, and output rows.

use std::collections::BTreeMap;

use crate::domain::{
    Dataset, LocationQuotient, LqRow, PairKey, Quotient, Smoothing, UndefinedCounts, UndefinedPolicy,
};
use crate::engine::aggregate::Aggregates;
use crate::engine::credibility::{CredibilityReport, credibility_lq, credibility_report};
use crate::engine::lq::{QuotientTable, raw_lq_with, smoothed_lq_with, squared_difference, stability};

/// Everything computed for one dataset.
#[derive(Debug, Clone)]
pub struct EngineOutput {
    pub aggregates: Aggregates,
    pub quotients: BTreeMap<PairKey, LocationQuotient>,
    pub diff_sq: QuotientTable,
    pub credibility: CredibilityReport,
    /// Blended quotient `Z·raw + (1-Z)·smoothed` per pair.
    pub credibility_lq: QuotientTable,
    /// `|credibility_lq - smoothed|` per pair.
    pub credibility_stability: QuotientTable,
    pub rows: Vec<LqRow>,
    pub undefined: UndefinedCounts,
}

/// Run every computation over `dataset`.
pub fn run_engine(dataset: &Dataset, smoothing: Smoothing, policy: UndefinedPolicy) -> EngineOutput {
    let aggregates = Aggregates::from_dataset(dataset);

    let raw = raw_lq_with(dataset, &aggregates);
    let smoothed = smoothed_lq_with(dataset, &aggregates, smoothing);
    let stab = stability(&raw, &smoothed);
    let diff_sq = squared_difference(&raw, &smoothed);

    let credibility = credibility_report(dataset, &aggregates);

    let blended: QuotientTable = raw
        .iter()
        .map(|(key, raw_value)| {
            let (region, industry) = key;
            let value = raw_value.clone().and_then(|r| {
                let s = smoothed.get(region, industry)?;
                let z = credibility.weight(region)?;
                Ok(credibility_lq(r, s, z))
            });
            (key.clone(), value)
        })
        .collect();
    let blended_stability = stability(&blended, &smoothed);

    let quotients: BTreeMap<PairKey, LocationQuotient> = raw
        .iter()
        .map(|(key, raw_value)| {
            let (region, industry) = key;
            let lq = LocationQuotient {
                raw: raw_value.clone(),
                smoothed: smoothed.get(region, industry),
                stability: stab.get(region, industry),
            };
            (key.clone(), lq)
        })
        .collect();

    let mut undefined = UndefinedCounts {
        raw: raw.undefined_count(),
        smoothed: smoothed.undefined_count(),
        credibility: blended.undefined_count(),
        rows_omitted: 0,
    };

    let mut rows = Vec::with_capacity(dataset.len());
    for (region, industry, count) in dataset.iter() {
        let lq = &quotients[&(region.clone(), industry.clone())];
        let cells: [Quotient; 7] = [
            lq.raw.clone(),
            lq.smoothed.clone(),
            lq.stability.clone(),
            diff_sq.get(region, industry),
            credibility.weight(region),
            blended.get(region, industry),
            blended_stability.get(region, industry),
        ];

        let resolved: Option<Vec<Option<f64>>> = cells.iter().map(|c| policy.resolve(c)).collect();
        let Some(resolved) = resolved else {
            undefined.rows_omitted += 1;
            continue;
        };

        rows.push(LqRow {
            region: region.clone(),
            industry: industry.clone(),
            count,
            region_total: aggregates.region_total(region).unwrap_or_default(),
            industry_total: aggregates.industry_total(industry).unwrap_or_default(),
            raw_lq: resolved[0],
            smoothed_lq: resolved[1],
            stability: resolved[2],
            diff_sq: resolved[3],
            credibility_weight: resolved[4],
            credibility_lq: resolved[5],
            credibility_stability: resolved[6],
        });
    }

    if undefined.raw > 0 {
        log::warn!("{} pair(s) have an undefined raw location quotient", undefined.raw);
    }
    if let Err(err) = &credibility.k {
        log::warn!("credibility adjustment unavailable: {err}");
    }
    log::debug!(
        "engine: {} pairs, {} rows kept, {} omitted",
        dataset.len(),
        rows.len(),
        undefined.rows_omitted
    );

    EngineOutput {
        aggregates,
        quotients,
        diff_sq,
        credibility,
        credibility_lq: blended,
        credibility_stability: blended_stability,
        rows,
        undefined,
    }
}
