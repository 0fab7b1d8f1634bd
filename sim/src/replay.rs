//! Replay: serialize/deserialize simulation logs for offline analysis.

use serde::{Deserialize, Serialize};
use std::io::{BufReader, BufWriter};
use std::path::Path;
use tracker_core::{metrics::GroundTruth, Epoch};

/// A full recorded simulation log.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ReplayLog {
    pub scenario_name: String,
    pub seed: u64,
    pub step_dt: f64,
    pub duration: f64,
    /// All epochs sent by the detector, in chronological order
    pub epochs: Vec<TimedEpoch>,
    /// Ground truth of the targets the detector could see, every `step_dt`
    pub ground_truth: Vec<GroundTruthFrame>,
}

/// An epoch stamped with the simulation time it was sent at.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TimedEpoch {
    pub time: f64,
    pub epoch: Epoch,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GroundTruthFrame {
    pub time: f64,
    pub targets: Vec<GroundTruth>,
}

/// Save a replay log to a JSON file.
pub fn save_replay(log: &ReplayLog, path: &Path) -> anyhow::Result<()> {
    let file = std::fs::File::create(path)?;
    let writer = BufWriter::new(file);
    serde_json::to_writer_pretty(writer, log)?;
    Ok(())
}

/// Load a replay log from a JSON file.
pub fn load_replay(path: &Path) -> anyhow::Result<ReplayLog> {
    let file = std::fs::File::open(path)?;
    let reader = BufReader::new(file);
    let log: ReplayLog = serde_json::from_reader(reader)?;
    Ok(log)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scenarios::{Scenario, ScenarioKind};

    #[test]
    fn log_survives_a_file() {
        let log = Scenario::build(ScenarioKind::BuoyCourse, 5).record();
        let path = std::env::temp_dir()
            .join(format!("sailtrack-replay-{}.json", std::process::id()));
        save_replay(&log, &path).unwrap();
        let back = load_replay(&path).unwrap();
        std::fs::remove_file(&path).unwrap();

        assert_eq!(back.scenario_name, "buoy_course");
        assert_eq!(back.epochs, log.epochs);
        assert_eq!(back.ground_truth.len(), log.ground_truth.len());
    }

    #[test]
    fn missing_file_is_an_error() {
        assert!(load_replay(Path::new("/nonexistent/replay.json")).is_err());
    }
}
