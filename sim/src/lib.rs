//! `sim` — Scenario simulator: polar target motion, detector, replay logs.

pub mod detector;
pub mod replay;
pub mod scenarios;
pub mod target;

pub use detector::{DetectMode, Detector, DetectorParams};
pub use replay::{load_replay, save_replay, GroundTruthFrame, ReplayLog, TimedEpoch};
pub use scenarios::{Scenario, ScenarioKind};
pub use target::{Jitter, MotionPattern, Target};
