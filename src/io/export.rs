//! Export per-pair results and datasets to CSV.
//!
//! The export is meant to be easy to consume in spreadsheets or downstream scripts.
//! Undefined values kept under `--undefined nan` are written as empty cells.

use std::fs::File;
use std::io::Write;
use std::path::Path;

use crate::domain::{Dataset, LqRow};
use crate::error::AppError;

/// Write per-pair results to a CSV file.
pub fn write_results_csv(path: &Path, rows: &[LqRow]) -> Result<(), AppError> {
    let file = File::create(path)
        .map_err(|e| AppError::new(2, format!("Failed to create export CSV '{}': {e}", path.display())))?;
    write_results(file, rows)?;
    log::info!("Wrote {} rows to {}", rows.len(), path.display());
    Ok(())
}

/// Write per-pair results to any writer (header included).
pub fn write_results<W: Write>(out: W, rows: &[LqRow]) -> Result<(), AppError> {
    let mut writer = csv::Writer::from_writer(out);
    for row in rows {
        writer
            .serialize(row)
            .map_err(|e| AppError::new(2, format!("Failed to write export CSV row: {e}")))?;
    }
    writer
        .flush()
        .map_err(|e| AppError::new(2, format!("Failed to flush export CSV: {e}")))?;
    Ok(())
}

/// Write a dataset as `region,industry,establishments`.
pub fn write_dataset_csv<W: Write>(out: W, dataset: &Dataset) -> Result<(), AppError> {
    let mut writer = csv::Writer::from_writer(out);
    writer
        .write_record(["region", "industry", "establishments"])
        .map_err(|e| AppError::new(2, format!("Failed to write dataset CSV header: {e}")))?;
    for (region, industry, count) in dataset.iter() {
        writer
            .write_record([region.as_str(), industry.as_str(), count.to_string().as_str()])
            .map_err(|e| AppError::new(2, format!("Failed to write dataset CSV row: {e}")))?;
    }
    writer
        .flush()
        .map_err(|e| AppError::new(2, format!("Failed to flush dataset CSV: {e}")))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{EngineConfig, EstablishmentRecord, Smoothing, UndefinedPolicy};
    use crate::engine::run_engine;
    use crate::io::ingest::read_dataset;

    #[test]
    fn results_have_header_and_blank_undefined_cells() {
        let ds: Dataset = [
            EstablishmentRecord::new("A", "1", 0),
            EstablishmentRecord::new("B", "1", 4),
        ]
        .into_iter()
        .collect();
        let out = run_engine(&ds, Smoothing::Region, UndefinedPolicy::Nan);

        let mut buf = Vec::new();
        write_results(&mut buf, &out.rows).unwrap();
        let text = String::from_utf8(buf).unwrap();
        let mut lines = text.lines();

        assert_eq!(
            lines.next().unwrap(),
            "region,industry,count,region_total,industry_total,raw_lq,smoothed_lq,stability,diff_sq,credibility_weight,credibility_lq,credibility_stability"
        );
        let a = lines.next().unwrap();
        assert!(a.starts_with("A,1,0,0,4,,"), "got {a}");
        assert_eq!(lines.count(), 1);
    }

    #[test]
    fn dataset_csv_reads_back() {
        let ds: Dataset = [
            EstablishmentRecord::new("06-001", "23----", 40),
            EstablishmentRecord::new("06-003", "23----", 9),
        ]
        .into_iter()
        .collect();

        let mut buf = Vec::new();
        write_dataset_csv(&mut buf, &ds).unwrap();
        let ingest = read_dataset(buf.as_slice(), &EngineConfig::default()).unwrap();
        assert_eq!(ingest.dataset, ds);
    }
}
