//! Scenario definitions.
//!
//! Each scenario is a named configuration of targets and a detector.
//! All scenarios are deterministic given the same seed.

use crate::{
    detector::{DetectMode, Detector, DetectorParams},
    replay::{GroundTruthFrame, ReplayLog, TimedEpoch},
    target::{MotionPattern, Target},
};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use tracing::debug;
use tracker_core::ObjectType;

/// Which pre-defined scenario to load.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, clap::ValueEnum)]
pub enum ScenarioKind {
    /// 18 mixed targets around the boat, random detections, panning camera
    Harbor,
    /// Moored buoys along a course plus one boat holding station
    BuoyCourse,
    /// Two boats crossing the bow between buoys
    Crossing,
}

/// A fully configured simulation scenario.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Scenario {
    pub name: String,
    pub seed: u64,
    /// seconds
    pub duration: f64,
    /// simulation step (s)
    pub step_dt: f64,
    pub targets: Vec<Target>,
    pub detector: DetectorParams,
}

impl Scenario {
    /// Build the named scenario. Uses `seed` for repeatability.
    pub fn build(kind: ScenarioKind, seed: u64) -> Self {
        match kind {
            ScenarioKind::Harbor => Self::harbor(seed),
            ScenarioKind::BuoyCourse => Self::buoy_course(seed),
            ScenarioKind::Crossing => Self::crossing(seed),
        }
    }

    /// Step targets and detector for the whole duration and record what was
    /// sent plus the ground truth of every step.
    pub fn record(&self) -> ReplayLog {
        let mut rng = ChaCha8Rng::seed_from_u64(self.seed);
        let mut detector = Detector::new(
            self.detector.clone(),
            ChaCha8Rng::seed_from_u64(self.seed.wrapping_add(1)),
        );
        let mut targets = self.targets.clone();
        let n_steps = (self.duration / self.step_dt).round() as u64;

        let mut epochs = Vec::new();
        let mut ground_truth = Vec::with_capacity(n_steps as usize);
        for step in 0..n_steps {
            let time = step as f64 * self.step_dt;
            ground_truth.push(GroundTruthFrame {
                time,
                targets: targets
                    .iter()
                    .filter(|t| detector.sees(t))
                    .map(Target::ground_truth)
                    .collect(),
            });
            if let Some(epoch) = detector.observe(&targets, self.step_dt) {
                epochs.push(TimedEpoch { time, epoch });
            }
            for target in &mut targets {
                target.step(self.step_dt, &mut rng);
            }
        }
        debug!(
            scenario = %self.name,
            steps = n_steps,
            epochs = epochs.len(),
            "scenario recorded"
        );

        ReplayLog {
            scenario_name: self.name.clone(),
            seed: self.seed,
            step_dt: self.step_dt,
            duration: self.duration,
            epochs,
            ground_truth,
        }
    }

    // -----------------------------------------------------------------------
    // Harbor: 18 targets in three rings of six
    // -----------------------------------------------------------------------
    fn harbor(seed: u64) -> Self {
        let mut rng = ChaCha8Rng::seed_from_u64(seed.wrapping_add(2));
        const RANGE_RATES: [f64; 6] = [0.0, 0.0, 0.0, 0.2, 0.2, 0.3];
        const BEARING_RATES: [f64; 6] = [0.0, 15.0, -15.0, 10.0, -10.0, 0.0];
        const TYPES: [ObjectType; 3] = [ObjectType::Buoy, ObjectType::Boat, ObjectType::None];

        let targets = (0..18)
            .map(|i| {
                let range = rng.gen_range(15.0..140.0);
                let bearing = rng.gen_range(-90.0..90.0);
                let (rr, br) = (RANGE_RATES[i % 6], BEARING_RATES[i % 6]);
                let motion = match (rr != 0.0, br != 0.0) {
                    (false, false) => MotionPattern::Static,
                    (false, true) => MotionPattern::Orbit { bearing_rate: br },
                    (true, false) => MotionPattern::Radial { range_rate: rr },
                    (true, true) => MotionPattern::Spiral {
                        range_rate: rr,
                        bearing_rate: br,
                    },
                };
                Target::new(i as u64, TYPES[i / 6], range, bearing, motion)
            })
            .collect();

        Scenario {
            name: "harbor".into(),
            seed,
            duration: 60.0,
            step_dt: 0.25,
            targets,
            detector: DetectorParams {
                pan_rate: 2.0,
                mode: DetectMode::Random { p_detect: 0.6 },
                ..Default::default()
            },
        }
    }

    // -----------------------------------------------------------------------
    // BuoyCourse: static marks, one boat nearby
    // -----------------------------------------------------------------------
    fn buoy_course(seed: u64) -> Self {
        let mut targets: Vec<Target> = (0..6)
            .map(|i| {
                let side = if i % 2 == 0 { -1.0 } else { 1.0 };
                Target::new(
                    i,
                    ObjectType::Buoy,
                    25.0 + 20.0 * i as f64,
                    side * (12.0 - i as f64),
                    MotionPattern::Static,
                )
            })
            .collect();
        targets.push(Target::new(6, ObjectType::Boat, 70.0, 40.0, MotionPattern::Static));

        Scenario {
            name: "buoy_course".into(),
            seed,
            duration: 30.0,
            step_dt: 0.25,
            targets,
            detector: DetectorParams {
                sweep: tracker_core::Interval::new(0.0, 0.0),
                mode: DetectMode::Regular { every: 4 },
                ..Default::default()
            },
        }
    }

    // -----------------------------------------------------------------------
    // Crossing: two boats crossing ahead, buoys either side
    // -----------------------------------------------------------------------
    fn crossing(seed: u64) -> Self {
        let targets = vec![
            Target::new(
                0,
                ObjectType::Boat,
                60.0,
                -40.0,
                MotionPattern::Orbit { bearing_rate: 60.0 },
            ),
            Target::new(
                1,
                ObjectType::Boat,
                90.0,
                40.0,
                MotionPattern::Orbit { bearing_rate: -60.0 },
            ),
            Target::new(2, ObjectType::Buoy, 40.0, -15.0, MotionPattern::Static),
            Target::new(3, ObjectType::Buoy, 40.0, 15.0, MotionPattern::Static),
            Target::new(4, ObjectType::Buoy, 120.0, 0.0, MotionPattern::Static),
        ];

        Scenario {
            name: "crossing".into(),
            seed,
            duration: 45.0,
            step_dt: 0.25,
            targets,
            detector: DetectorParams {
                mode: DetectMode::Constant,
                ..Default::default()
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn harbor_has_eighteen_mixed_targets() {
        let s = Scenario::build(ScenarioKind::Harbor, 42);
        assert_eq!(s.targets.len(), 18);
        for t in [ObjectType::Buoy, ObjectType::Boat, ObjectType::None] {
            assert_eq!(s.targets.iter().filter(|x| x.object_type == t).count(), 6);
        }
    }

    #[test]
    fn recording_is_deterministic_per_seed() {
        let a = Scenario::build(ScenarioKind::Harbor, 7).record();
        let b = Scenario::build(ScenarioKind::Harbor, 7).record();
        assert_eq!(a.epochs, b.epochs);
        assert_eq!(a.ground_truth.len(), 240);
    }

    #[test]
    fn regular_mode_sends_every_fourth_step() {
        let log = Scenario::build(ScenarioKind::BuoyCourse, 1).record();
        assert_eq!(log.ground_truth.len(), 120);
        assert_eq!(log.epochs.len(), 30);
        assert!(log.epochs.iter().all(|e| e.epoch.detections.len() == 7));
    }

    #[test]
    fn crossing_boats_pass_the_bow() {
        let log = Scenario::build(ScenarioKind::Crossing, 0).record();
        let boat0: Vec<f64> = log
            .ground_truth
            .iter()
            .flat_map(|f| f.targets.iter())
            .filter(|g| g.target_id == 0)
            .map(|g| g.bearing)
            .collect();
        // 60 / 30 = 2 deg/s over 45 s: from -40 to about +50
        assert!(boat0.iter().any(|b| *b < -20.0));
        assert!(boat0.iter().any(|b| *b > 20.0));
    }
}
