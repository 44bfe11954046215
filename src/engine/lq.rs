//! Location quotients.
//!
//! ```text
//! raw LQ(r, i)      = (x_ir / x_r) / (x_i / x_N)
//! smoothed LQ(r, i) = ((x_ir + 1) / (x_r + k_r)) / ((x_i + 1) / (x_N + 1))
//! stability(r, i)   = |raw - smoothed|
//! ```
//!
//! A zero denominator never turns into a silent zero: the pair's value is an
//! `UndefinedRatio` error and the caller's `UndefinedPolicy` decides what to emit.

use std::collections::BTreeMap;

use crate::domain::{Dataset, IndustryCode, PairKey, Quotient, RegionAggregate, RegionId, Smoothing};
use crate::engine::aggregate::Aggregates;
use crate::error::{EngineError, KeyKind};

/// A per-pair mapping of quotients.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QuotientTable {
    values: BTreeMap<PairKey, Quotient>,
}

impl QuotientTable {
    /// Look up one pair; absent pairs are `MissingKey`.
    pub fn get(&self, region: &RegionId, industry: &IndustryCode) -> Quotient {
        self.values
            .get(&(region.clone(), industry.clone()))
            .cloned()
            .unwrap_or_else(|| {
                Err(EngineError::missing(
                    KeyKind::Pair,
                    format!("{region}/{industry}"),
                ))
            })
    }

    pub fn iter(&self) -> impl Iterator<Item = (&PairKey, &Quotient)> {
        self.values.iter()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn undefined_count(&self) -> usize {
        self.values.values().filter(|v| v.is_err()).count()
    }
}

impl FromIterator<(PairKey, Quotient)> for QuotientTable {
    fn from_iter<T: IntoIterator<Item = (PairKey, Quotient)>>(iter: T) -> Self {
        Self {
            values: iter.into_iter().collect(),
        }
    }
}

/// Standard location quotient for every pair in the dataset.
pub fn compute_raw_lq(dataset: &Dataset) -> QuotientTable {
    raw_lq_with(dataset, &Aggregates::from_dataset(dataset))
}

/// Laplace-smoothed location quotient for every pair in the dataset.
pub fn compute_smoothed_lq(dataset: &Dataset, smoothing: Smoothing) -> QuotientTable {
    smoothed_lq_with(dataset, &Aggregates::from_dataset(dataset), smoothing)
}

/// Raw LQ using precomputed aggregates.
pub fn raw_lq_with(dataset: &Dataset, aggregates: &Aggregates) -> QuotientTable {
    dataset
        .iter()
        .map(|(region, industry, count)| {
            let key = (region.clone(), industry.clone());
            (key, raw_lq(aggregates, region, industry, count))
        })
        .collect()
}

/// Smoothed LQ using precomputed aggregates.
pub fn smoothed_lq_with(dataset: &Dataset, aggregates: &Aggregates, smoothing: Smoothing) -> QuotientTable {
    dataset
        .iter()
        .map(|(region, industry, count)| {
            let key = (region.clone(), industry.clone());
            (key, smoothed_lq(aggregates, region, industry, count, smoothing))
        })
        .collect()
}

/// Raw LQ for a single pair.
pub fn raw_lq(aggregates: &Aggregates, region: &RegionId, industry: &IndustryCode, count: u64) -> Quotient {
    let x_r = aggregates.region_total(region)?;
    let x_i = aggregates.industry_total(industry)?;
    let x_n = aggregates.national_total();

    if x_r == 0 {
        return Err(EngineError::undefined(format!(
            "region `{region}` has zero establishments"
        )));
    }
    if x_n == 0 {
        return Err(EngineError::undefined("national total is zero"));
    }
    if x_i == 0 {
        return Err(EngineError::undefined(format!(
            "industry `{industry}` has zero establishments nationally"
        )));
    }

    let local_share = count as f64 / x_r as f64;
    let national_share = x_i as f64 / x_n as f64;
    Ok(local_share / national_share)
}

/// Smoothed LQ for a single pair.
pub fn smoothed_lq(
    aggregates: &Aggregates,
    region: &RegionId,
    industry: &IndustryCode,
    count: u64,
    smoothing: Smoothing,
) -> Quotient {
    let region_agg = aggregates.region(region)?;
    let x_i = aggregates.industry_total(industry)?;
    let x_n = aggregates.national_total();

    let k = pseudo_count(smoothing, region_agg, aggregates);
    if region_agg.total == 0 && k == 0 {
        return Err(EngineError::undefined(format!(
            "region `{region}` has zero establishments and no pseudo-count"
        )));
    }

    // Pseudo-counts are added in f64 so totals near `u64::MAX` cannot overflow.
    let x_r = region_agg.total as f64 + k as f64;
    let local_share = smoothed_numerator(count) / x_r;
    let national_share = (x_i as f64 + 1.0) / (x_n as f64 + 1.0);
    Ok(local_share / national_share)
}

/// Numerator count of the smoothed quotient: one pseudo-establishment per pair.
pub fn smoothed_numerator(count: u64) -> f64 {
    count as f64 + 1.0
}

/// Pseudo-establishments added to a region total under `smoothing`.
pub fn pseudo_count(smoothing: Smoothing, region: &RegionAggregate, aggregates: &Aggregates) -> u64 {
    match smoothing {
        Smoothing::Region => region.industries as u64,
        Smoothing::National => aggregates.distinct_industries() as u64,
        Smoothing::Fixed(k) => k,
    }
}

/// `|raw - smoothed|` per pair.
pub fn stability(raw: &QuotientTable, smoothed: &QuotientTable) -> QuotientTable {
    combine(raw, smoothed, |a, b| (a - b).abs())
}

/// `(raw - smoothed)^2` per pair.
pub fn squared_difference(raw: &QuotientTable, smoothed: &QuotientTable) -> QuotientTable {
    combine(raw, smoothed, |a, b| (a - b).powi(2))
}

/// Combine two tables pairwise.
///
/// Keys present in only one table become `MissingKey`; an undefined input
/// propagates its own error.
fn combine(a: &QuotientTable, b: &QuotientTable, f: impl Fn(f64, f64) -> f64) -> QuotientTable {
    let mut keys: Vec<&PairKey> = a.values.keys().chain(b.values.keys()).collect();
    keys.sort();
    keys.dedup();

    keys.into_iter()
        .map(|key| {
            let (region, industry) = key;
            let value = a
                .get(region, industry)
                .and_then(|x| b.get(region, industry).map(|y| f(x, y)));
            (key.clone(), value)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::EstablishmentRecord;

    fn example() -> Dataset {
        // A {1: 10, 2: 0}, B {1: 5, 2: 5}
        [
            EstablishmentRecord::new("A", "1", 10),
            EstablishmentRecord::new("A", "2", 0),
            EstablishmentRecord::new("B", "1", 5),
            EstablishmentRecord::new("B", "2", 5),
        ]
        .into_iter()
        .collect()
    }

    fn val(table: &QuotientTable, r: &str, i: &str) -> f64 {
        table.get(&r.into(), &i.into()).unwrap()
    }

    #[test]
    fn raw_lq_matches_worked_example() {
        let raw = compute_raw_lq(&example());
        assert!((val(&raw, "A", "1") - 4.0 / 3.0).abs() < 1e-12);
        // A zero numerator is defined.
        assert_eq!(val(&raw, "A", "2"), 0.0);
        // (5/10) / (5/20) = 2
        assert!((val(&raw, "B", "2") - 2.0).abs() < 1e-12);
        assert_eq!(raw.undefined_count(), 0);
    }

    #[test]
    fn zero_region_total_is_undefined_not_zero() {
        let ds: Dataset = [
            EstablishmentRecord::new("A", "1", 0),
            EstablishmentRecord::new("B", "1", 4),
        ]
        .into_iter()
        .collect();
        let raw = compute_raw_lq(&ds);
        let err = raw.get(&"A".into(), &"1".into()).unwrap_err();
        assert!(err.is_undefined());
        assert!((val(&raw, "B", "1") - 1.0).abs() < 1e-12);
    }

    #[test]
    fn zero_national_industry_total_is_undefined() {
        let ds: Dataset = [
            EstablishmentRecord::new("A", "1", 3),
            EstablishmentRecord::new("A", "2", 0),
        ]
        .into_iter()
        .collect();
        let raw = compute_raw_lq(&ds);
        assert!(raw.get(&"A".into(), &"2".into()).is_err());

        // Smoothing rescues it: ((0+1)/(3+2)) / ((0+1)/(3+1)) = 0.8
        let smoothed = compute_smoothed_lq(&ds, Smoothing::Region);
        assert!((val(&smoothed, "A", "2") - 0.8).abs() < 1e-12);
    }

    #[test]
    fn smoothed_lq_adds_region_industry_cardinality() {
        let smoothed = compute_smoothed_lq(&example(), Smoothing::Region);
        // ((10+1)/(10+2)) / ((15+1)/(20+1))
        let expected = (11.0 / 12.0) / (16.0 / 21.0);
        assert!((val(&smoothed, "A", "1") - expected).abs() < 1e-12);
    }

    #[test]
    fn smoothed_lq_fixed_pseudo_count() {
        let smoothed = compute_smoothed_lq(&example(), Smoothing::Fixed(1));
        // ((10+1)/(10+1)) / ((15+1)/(20+1))
        let expected = 21.0 / 16.0;
        assert!((val(&smoothed, "A", "1") - expected).abs() < 1e-12);
    }

    #[test]
    fn smoothed_numerator_is_strictly_greater() {
        let ds = example();
        let agg = Aggregates::from_dataset(&ds);
        for (region, industry, count) in ds.iter() {
            assert_eq!(smoothed_numerator(count), (count + 1) as f64);

            // Recover the numerator from the quotient itself.
            let q = smoothed_lq(&agg, region, industry, count, Smoothing::Region).unwrap();
            let r = agg.region(region).unwrap();
            let x_i = agg.industry_total(industry).unwrap();
            let numerator = q * (x_i + 1) as f64 / (agg.national_total() + 1) as f64
                * (r.total + r.industries as u64) as f64;
            assert!((numerator - (count + 1) as f64).abs() < 1e-9);
        }
    }

    #[test]
    fn smoothed_lq_handles_totals_at_u64_max() {
        let ds: Dataset = [
            EstablishmentRecord::new("A", "1", u64::MAX),
            EstablishmentRecord::new("B", "2", 0),
        ]
        .into_iter()
        .collect();
        let smoothed = compute_smoothed_lq(&ds, Smoothing::Fixed(u64::MAX));
        for (_, v) in smoothed.iter() {
            let v = v.clone().unwrap();
            assert!(v.is_finite() && v > 0.0);
        }
    }

    #[test]
    fn stability_of_table_with_itself_is_zero() {
        let raw = compute_raw_lq(&example());
        let stab = stability(&raw, &raw);
        for (_, v) in stab.iter() {
            assert_eq!(*v, Ok(0.0));
        }
    }

    #[test]
    fn stability_and_squared_difference() {
        let ds = example();
        let raw = compute_raw_lq(&ds);
        let smoothed = compute_smoothed_lq(&ds, Smoothing::Region);
        let stab = stability(&raw, &smoothed);
        let sq = squared_difference(&raw, &smoothed);

        let diff = val(&raw, "A", "1") - val(&smoothed, "A", "1");
        assert!((val(&stab, "A", "1") - diff.abs()).abs() < 1e-12);
        assert!((val(&sq, "A", "1") - diff * diff).abs() < 1e-12);
    }

    #[test]
    fn stability_propagates_undefined_and_missing() {
        let raw: QuotientTable = [
            ((RegionId::from("A"), IndustryCode::from("1")), Err(EngineError::undefined("zero"))),
            ((RegionId::from("B"), IndustryCode::from("1")), Ok(1.0)),
        ]
        .into_iter()
        .collect();
        let smoothed: QuotientTable = [
            ((RegionId::from("A"), IndustryCode::from("1")), Ok(0.5)),
            ((RegionId::from("C"), IndustryCode::from("1")), Ok(0.5)),
        ]
        .into_iter()
        .collect();

        let stab = stability(&raw, &smoothed);
        assert_eq!(stab.len(), 3);
        assert!(stab.get(&"A".into(), &"1".into()).unwrap_err().is_undefined());
        assert!(matches!(
            stab.get(&"B".into(), &"1".into()),
            Err(EngineError::MissingKey { kind: KeyKind::Pair, .. })
        ));
    }

    #[test]
    fn lookup_of_absent_pair_is_missing_key() {
        let raw = compute_raw_lq(&example());
        assert!(matches!(
            raw.get(&"A".into(), &"9".into()),
            Err(EngineError::MissingKey { .. })
        ));
    }

    #[test]
    fn recomputation_is_identical() {
        let ds = example();
        assert_eq!(compute_raw_lq(&ds), compute_raw_lq(&ds));
        assert_eq!(
            compute_smoothed_lq(&ds, Smoothing::National),
            compute_smoothed_lq(&ds, Smoothing::National)
        );
    }
}
