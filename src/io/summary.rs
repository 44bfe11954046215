//! Read/write run summary JSON files.
//!
//! A summary is the portable record of a run:
//! - run metadata (tool, timestamp, input path, smoothing, undefined policy)
//! - dataset stats and ingest counts
//! - EPV / VHM / k and the per-region credibility weights
//!
//! The schema is defined by `domain::SummaryFile`.

use std::fs::File;
use std::path::Path;

use chrono::Local;

use crate::domain::{EngineConfig, RegionSummary, SummaryFile};
use crate::engine::EngineOutput;
use crate::error::AppError;
use crate::io::ingest::IngestedData;

/// Build the summary for one run.
pub fn build_summary(ingest: &IngestedData, output: &EngineOutput, config: &EngineConfig) -> SummaryFile {
    let credibility = &output.credibility;

    let regions = output
        .aggregates
        .regions()
        .map(|(region, agg)| RegionSummary {
            region: region.clone(),
            total: agg.total,
            industries: agg.industries,
            variance: credibility.region_variances.get(region).copied().flatten(),
            z: credibility.weight(region).ok(),
        })
        .collect();

    SummaryFile {
        tool: "lq".to_string(),
        generated_at: Local::now().naive_local(),
        input: config.csv_path.display().to_string(),
        smoothing: config.smoothing,
        undefined_policy: config.undefined,
        stats: ingest.stats.clone(),
        rows_read: ingest.rows_read,
        row_errors: ingest.row_errors.len(),
        epv: credibility.epv.clone().ok(),
        vhm: credibility.vhm.clone().ok(),
        k: credibility.k.clone().ok(),
        undefined: output.undefined,
        regions,
    }
}

/// Write a summary JSON file.
pub fn write_summary_json(path: &Path, summary: &SummaryFile) -> Result<(), AppError> {
    let file = File::create(path)
        .map_err(|e| AppError::new(2, format!("Failed to create summary JSON '{}': {e}", path.display())))?;

    serde_json::to_writer_pretty(file, summary)
        .map_err(|e| AppError::new(2, format!("Failed to write summary JSON: {e}")))?;

    Ok(())
}

/// Read a summary JSON file.
pub fn read_summary_json(path: &Path) -> Result<SummaryFile, AppError> {
    let file = File::open(path)
        .map_err(|e| AppError::new(2, format!("Failed to open summary JSON '{}': {e}", path.display())))?;
    let summary: SummaryFile =
        serde_json::from_reader(file).map_err(|e| AppError::new(2, format!("Invalid summary JSON: {e}")))?;
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Smoothing, UndefinedPolicy};
    use crate::engine::run_engine;
    use crate::io::ingest::read_dataset;

    #[test]
    fn summary_carries_credibility_and_survives_json() {
        let csv = "region,industry,establishments\nA,1,10\nA,2,0\nB,1,5\nB,2,5\n";
        let config = EngineConfig {
            smoothing: Smoothing::Fixed(1),
            ..EngineConfig::default()
        };
        let ingest = read_dataset(csv.as_bytes(), &config).unwrap();
        let output = run_engine(&ingest.dataset, config.smoothing, UndefinedPolicy::Nan);
        let summary = build_summary(&ingest, &output, &config);

        assert_eq!(summary.regions.len(), 2);
        assert!((summary.epv.unwrap() - 0.125).abs() < 1e-12);
        assert!((summary.k.unwrap() - 1.0).abs() < 1e-12);
        assert!((summary.regions[0].z.unwrap() - 10.0 / 11.0).abs() < 1e-12);

        let json = serde_json::to_string(&summary).unwrap();
        assert!(json.contains("\"smoothing\":{\"fixed\":1}"));
        let back: SummaryFile = serde_json::from_str(&json).unwrap();
        assert_eq!(back.stats, summary.stats);
        assert_eq!(back.smoothing, Smoothing::Fixed(1));
    }
}
