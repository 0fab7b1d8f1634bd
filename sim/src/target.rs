//! Target motion models in own-boat polar coordinates.
//!
//! Each target carries its true `(range, bearing)` and a `MotionPattern`.
//! Every step adds the pattern's drift plus a small uniform jitter, wraps
//! the bearing and reflects a negative range back through the origin.

use rand::Rng;
use serde::{Deserialize, Serialize};
use tracker_core::{metrics::GroundTruth, types::wrap_degrees, Detection, ObjectType};

/// How a target drifts relative to own boat.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum MotionPattern {
    /// No drift: moored buoy, anchored boat.
    Static,
    /// Circles own boat. `bearing_rate` (deg/s) is divided by half the
    /// current range, so far targets sweep slower.
    Orbit { bearing_rate: f64 },
    /// Closes or opens at `range_rate` (m/s) along a fixed bearing.
    Radial { range_rate: f64 },
    /// Both at once; bearing rate scaled as in `Orbit`.
    Spiral { range_rate: f64, bearing_rate: f64 },
}

impl MotionPattern {
    /// `(range rate m/s, bearing rate deg/s)` at the given range.
    pub fn rates(&self, range: f64) -> (f64, f64) {
        let half_range = (0.5 * range).max(1.0);
        match *self {
            MotionPattern::Static => (0.0, 0.0),
            MotionPattern::Orbit { bearing_rate } => (0.0, bearing_rate / half_range),
            MotionPattern::Radial { range_rate } => (range_rate, 0.0),
            MotionPattern::Spiral {
                range_rate,
                bearing_rate,
            } => (range_rate, bearing_rate / half_range),
        }
    }
}

/// Uniform per-step perturbation half-widths.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Jitter {
    /// meters
    pub range: f64,
    /// degrees
    pub bearing: f64,
}

impl Default for Jitter {
    fn default() -> Self {
        Self {
            range: 0.01,
            bearing: 0.001,
        }
    }
}

/// A simulated object with ground-truth position.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Target {
    /// Unique target ID (used for metrics)
    pub id: u64,
    pub object_type: ObjectType,
    /// True range (m)
    pub range: f64,
    /// True bearing (deg), wrapped
    pub bearing: f64,
    pub motion: MotionPattern,
    #[serde(default)]
    pub jitter: Jitter,
}

impl Target {
    pub fn new(
        id: u64,
        object_type: ObjectType,
        range: f64,
        bearing: f64,
        motion: MotionPattern,
    ) -> Self {
        Self {
            id,
            object_type,
            range,
            bearing: wrap_degrees(bearing),
            motion,
            jitter: Jitter::default(),
        }
    }

    /// Advance by `dt` seconds.
    pub fn step<R: Rng>(&mut self, dt: f64, rng: &mut R) {
        let (range_rate, bearing_rate) = self.motion.rates(self.range);
        let mut range = self.range + range_rate * dt + uniform(rng, self.jitter.range);
        let mut bearing = self.bearing + bearing_rate * dt + uniform(rng, self.jitter.bearing);
        if range < 0.0 {
            // Passed through own boat: comes out the other side.
            range = -range;
            bearing += 180.0;
        }
        self.range = range;
        self.bearing = wrap_degrees(bearing);
    }

    pub fn ground_truth(&self) -> GroundTruth {
        GroundTruth {
            target_id: self.id,
            range: self.range,
            bearing: self.bearing,
            object_type: self.object_type,
        }
    }

    /// Noise-free detection of this target.
    pub fn detection(&self) -> Detection {
        Detection::new(self.range, self.bearing, self.object_type)
    }
}

/// Uniform sample in `[-half_width, half_width]`.
pub(crate) fn uniform<R: Rng>(rng: &mut R, half_width: f64) -> f64 {
    if half_width > 0.0 {
        rng.gen_range(-half_width..=half_width)
    } else {
        0.0
    }
}
