//! Shared "compute pipeline" used by the `compute` and `rank` commands.
//!
//! Keeping this in one place avoids duplicating the core workflow:
//! CSV ingest -> aggregates -> quotients -> credibility -> rows -> rankings

use crate::domain::EngineConfig;
use crate::engine::{EngineOutput, run_engine};
use crate::error::AppError;
use crate::io::ingest::{IngestedData, load_dataset};
use crate::report::{Rankings, rank_rows};

/// All computed outputs of a single `lq compute` run.
#[derive(Debug, Clone)]
pub struct RunOutput {
    pub ingest: IngestedData,
    pub output: EngineOutput,
    pub rankings: Rankings,
}

/// Load the configured CSV and run the engine over it.
pub fn run_compute(config: &EngineConfig) -> Result<RunOutput, AppError> {
    let ingest = load_dataset(config)?;
    Ok(run_with_ingest(config, ingest))
}

/// Run the engine over already-ingested data.
pub fn run_with_ingest(config: &EngineConfig, ingest: IngestedData) -> RunOutput {
    let output = run_engine(&ingest.dataset, config.smoothing, config.undefined);
    let rankings = rank_rows(&output.rows, config.top_n);

    RunOutput {
        ingest,
        output,
        rankings,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::ingest::read_dataset;

    #[test]
    fn rankings_follow_config_top_n() {
        let csv = "region,industry,establishments\nA,1,10\nA,2,0\nB,1,5\nB,2,5\n";
        let config = EngineConfig {
            top_n: 2,
            ..EngineConfig::default()
        };
        let ingest = read_dataset(csv.as_bytes(), &config).unwrap();
        let run = run_with_ingest(&config, ingest);

        assert_eq!(run.output.rows.len(), 4);
        assert_eq!(run.rankings.concentrated.len(), 2);
        let top = &run.rankings.concentrated[0];
        assert_eq!((top.region.as_str(), top.industry.as_str()), ("B", "2"));
    }

    #[test]
    fn missing_file_is_a_config_error() {
        let config = EngineConfig {
            csv_path: "no/such/input.csv".into(),
            ..EngineConfig::default()
        };
        let err = run_compute(&config).unwrap_err();
        assert_eq!(err.exit_code(), 2);
    }
}
