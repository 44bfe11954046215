//! Synthetic establishment tables.
//!
//! Counts are Poisson draws around `mean_count × region size × industry weight ×
//! local specialization`, where the three factors are log-normal. Region sizes
//! vary a lot more than industry weights, which gives the small-region noise
//! that credibility weighting is meant to damp.

use rand::prelude::*;
use rand::rngs::StdRng;
use rand_distr::{LogNormal, Poisson};

use crate::domain::{Dataset, EstablishmentRecord};
use crate::error::AppError;

/// NAICS 2-digit sectors (first code of each range), as County Business Patterns lists them.
pub const NAICS_SECTORS: [&str; 19] = [
    "11", "21", "22", "23", "31", "42", "44", "48", "51", "52", "53", "54", "55", "56", "61", "62",
    "71", "72", "81",
];

/// Log-normal sigma of region size.
const REGION_SIGMA: f64 = 0.9;
/// Log-normal sigma of national industry weight.
const INDUSTRY_SIGMA: f64 = 0.5;
/// Log-normal sigma of a region's specialization in one industry.
const LOCAL_SIGMA: f64 = 0.35;

#[derive(Debug, Clone)]
pub struct SampleConfig {
    pub regions: usize,
    pub industries: usize,
    pub seed: u64,
    /// Mean establishments per pair before scaling.
    pub mean_count: f64,
    /// Probability that a pair is absent from the table.
    pub sparsity: f64,
}

impl Default for SampleConfig {
    fn default() -> Self {
        Self {
            regions: 50,
            industries: NAICS_SECTORS.len(),
            seed: 42,
            mean_count: 40.0,
            sparsity: 0.05,
        }
    }
}

pub fn generate_sample(config: &SampleConfig) -> Result<Dataset, AppError> {
    if config.regions == 0 {
        return Err(AppError::new(2, "Region count must be > 0."));
    }
    if config.industries == 0 || config.industries > NAICS_SECTORS.len() {
        return Err(AppError::new(
            2,
            format!("Industry count must be between 1 and {}.", NAICS_SECTORS.len()),
        ));
    }
    if !(config.mean_count.is_finite() && config.mean_count > 0.0) {
        return Err(AppError::new(2, "Mean count must be finite and > 0."));
    }
    if !(0.0..1.0).contains(&config.sparsity) {
        return Err(AppError::new(2, "Sparsity must be in [0, 1)."));
    }

    let mut rng = StdRng::seed_from_u64(config.seed);
    let region_size = LogNormal::new(0.0, REGION_SIGMA)
        .map_err(|e| AppError::new(4, format!("Region size distribution error: {e}")))?;
    let industry_weight = LogNormal::new(0.0, INDUSTRY_SIGMA)
        .map_err(|e| AppError::new(4, format!("Industry weight distribution error: {e}")))?;
    let local = LogNormal::new(0.0, LOCAL_SIGMA)
        .map_err(|e| AppError::new(4, format!("Specialization distribution error: {e}")))?;

    // Normalize industry weights to mean 1 so `mean_count` keeps its meaning.
    let mut weights: Vec<f64> = (0..config.industries)
        .map(|_| industry_weight.sample(&mut rng))
        .collect();
    let mean_weight = weights.iter().sum::<f64>() / weights.len() as f64;
    for w in &mut weights {
        *w /= mean_weight;
    }

    let mut dataset = Dataset::new();
    for r in 0..config.regions {
        let region = format!("R{:03}", r + 1);
        let size = region_size.sample(&mut rng);

        for (code, weight) in NAICS_SECTORS.iter().zip(&weights) {
            if rng.gen_bool(config.sparsity) {
                continue;
            }
            let lambda = (config.mean_count * size * weight * local.sample(&mut rng)).max(1e-3);
            let poisson = Poisson::new(lambda)
                .map_err(|e| AppError::new(4, format!("Count distribution error: {e}")))?;
            let count = poisson.sample(&mut rng) as u64;
            dataset.insert(EstablishmentRecord::new(region.clone(), format!("{code}----"), count));
        }
    }

    log::debug!(
        "generated {} synthetic records ({} regions x {} industries, seed {})",
        dataset.len(),
        config.regions,
        config.industries,
        config.seed
    );
    Ok(dataset)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_seed_same_table() {
        let config = SampleConfig::default();
        let a = generate_sample(&config).unwrap();
        let b = generate_sample(&config).unwrap();
        assert_eq!(a, b);

        let other = generate_sample(&SampleConfig { seed: 7, ..config }).unwrap();
        assert_ne!(a, other);
    }

    #[test]
    fn full_grid_without_sparsity() {
        let config = SampleConfig {
            regions: 5,
            industries: 4,
            sparsity: 0.0,
            ..SampleConfig::default()
        };
        let ds = generate_sample(&config).unwrap();
        assert_eq!(ds.len(), 20);
        assert_eq!(ds.regions().len(), 5);
        assert!(ds.industries().iter().all(|i| i.is_cbp_sector()));
    }

    #[test]
    fn rejects_bad_settings() {
        let base = SampleConfig::default();
        assert!(generate_sample(&SampleConfig { regions: 0, ..base.clone() }).is_err());
        assert!(generate_sample(&SampleConfig { industries: 20, ..base.clone() }).is_err());
        assert!(generate_sample(&SampleConfig { sparsity: 1.0, ..base.clone() }).is_err());
        assert!(generate_sample(&SampleConfig { mean_count: 0.0, ..base }).is_err());
    }
}
