//! Camera-like detector simulator.
//!
//! Generates epochs with:
//! - a fixed frame (everything the sensor could ever see)
//! - a look aperture that pans back and forth across a sweep
//! - uniform range/bearing measurement noise
//! - a detect mode deciding when an epoch (or a target) is reported

use crate::target::{uniform, Target};
use rand::Rng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use tracker_core::{types::wrap_degrees, Detection, Epoch, FrameBounds, Interval};

/// When the detector reports.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub enum DetectMode {
    /// Every step, every visible target.
    Constant,
    /// One epoch every `every` steps.
    Regular { every: u32 },
    /// Every step; each visible target reported with probability `p_detect`.
    Random { p_detect: f64 },
}

/// Static detector settings.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DetectorParams {
    pub frame_bounds: FrameBounds,
    /// Range the aperture sees (m)
    pub look_range: Interval,
    /// Bearing window of the aperture when centred (deg)
    pub look_bearing: Interval,
    /// Limits of the aperture's pan offset (deg)
    pub sweep: Interval,
    /// Pan speed (deg/s)
    pub pan_rate: f64,
    /// Half-width of uniform range noise (m)
    pub range_noise: f64,
    /// Half-width of uniform bearing noise (deg)
    pub bearing_noise: f64,
    pub mode: DetectMode,
}

impl Default for DetectorParams {
    fn default() -> Self {
        Self {
            frame_bounds: FrameBounds::new(
                Interval::new(10.0, 175.0),
                Interval::new(-180.0, 180.0),
            ),
            look_range: Interval::new(0.0, 150.0),
            look_bearing: Interval::new(-70.0, 70.0),
            sweep: Interval::new(-30.0, 30.0),
            pan_rate: 2.0,
            range_noise: 0.2,
            bearing_noise: 0.2,
            mode: DetectMode::Constant,
        }
    }
}

/// Produces detection epochs from a set of targets.
pub struct Detector {
    pub params: DetectorParams,
    /// Current pan offset (deg), inside `params.sweep`
    pan: f64,
    /// +1 or -1
    pan_direction: f64,
    steps: u64,
    rng: ChaCha8Rng,
}

impl Detector {
    pub fn new(params: DetectorParams, rng: ChaCha8Rng) -> Self {
        let pan = params.sweep.lo.max(0.0).min(params.sweep.hi);
        Self {
            params,
            pan,
            pan_direction: 1.0,
            steps: 0,
            rng,
        }
    }

    /// Current pan offset (deg).
    pub fn pan(&self) -> f64 {
        self.pan
    }

    /// Whether the aperture currently covers `target`.
    pub fn sees(&self, target: &Target) -> bool {
        let offset = wrap_degrees(target.bearing - self.pan);
        self.params.frame_bounds.contains(&target.detection())
            && self.params.look_range.contains(target.range)
            && self.params.look_bearing.contains(offset)
    }

    /// Observe the targets, then pan by `dt`. `None` when this step sends
    /// nothing.
    pub fn observe(&mut self, targets: &[Target], dt: f64) -> Option<Epoch> {
        let send = match self.params.mode {
            DetectMode::Regular { every } => self.steps % u64::from(every.max(1)) == 0,
            DetectMode::Constant | DetectMode::Random { .. } => true,
        };
        let epoch = send.then(|| self.measure(targets));
        self.steps += 1;
        self.advance_pan(dt);
        epoch
    }

    fn measure(&mut self, targets: &[Target]) -> Epoch {
        let mut detections = Vec::new();
        for target in targets {
            if !self.sees(target) {
                continue;
            }
            if let DetectMode::Random { p_detect } = self.params.mode {
                if self.rng.gen::<f64>() >= p_detect {
                    continue;
                }
            }
            let range_noise = uniform(&mut self.rng, self.params.range_noise);
            let bearing_noise = uniform(&mut self.rng, self.params.bearing_noise);
            let range = (target.range + range_noise).max(0.0);
            let bearing = wrap_degrees(target.bearing + bearing_noise);
            detections.push(Detection::new(range, bearing, target.object_type));
        }
        Epoch::new(detections, self.params.frame_bounds)
    }

    fn advance_pan(&mut self, dt: f64) {
        let sweep = self.params.sweep;
        if sweep.width() <= 0.0 {
            return;
        }
        self.pan += self.pan_direction * self.params.pan_rate * dt;
        if self.pan >= sweep.hi {
            self.pan = sweep.hi;
            self.pan_direction = -1.0;
        } else if self.pan <= sweep.lo {
            self.pan = sweep.lo;
            self.pan_direction = 1.0;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::target::MotionPattern;
    use rand::SeedableRng;
    use tracker_core::ObjectType;

    fn detector(mode: DetectMode) -> Detector {
        Detector::new(
            DetectorParams {
                mode,
                range_noise: 0.0,
                bearing_noise: 0.0,
                ..Default::default()
            },
            ChaCha8Rng::seed_from_u64(3),
        )
    }

    fn buoy(id: u64, range: f64, bearing: f64) -> Target {
        Target::new(id, ObjectType::Buoy, range, bearing, MotionPattern::Static)
    }

    #[test]
    fn reports_only_targets_in_aperture_and_frame() {
        let mut d = detector(DetectMode::Constant);
        let targets = [
            buoy(0, 50.0, 10.0),
            buoy(1, 5.0, 0.0),    // closer than the frame
            buoy(2, 50.0, 120.0), // outside the look window
            buoy(3, 160.0, 0.0),  // beyond look range
        ];
        let epoch = d.observe(&targets, 0.25).unwrap();
        assert_eq!(epoch.detections.len(), 1);
        assert_eq!(epoch.detections[0].range, 50.0);
        assert_eq!(epoch.frame_bounds, d.params.frame_bounds);
    }

    #[test]
    fn regular_mode_skips_steps() {
        let mut d = detector(DetectMode::Regular { every: 4 });
        let targets = [buoy(0, 50.0, 0.0)];
        let sent: Vec<bool> = (0..8).map(|_| d.observe(&targets, 0.25).is_some()).collect();
        assert_eq!(sent, vec![true, false, false, false, true, false, false, false]);
    }

    #[test]
    fn random_mode_drops_some_targets() {
        let mut d = detector(DetectMode::Random { p_detect: 0.5 });
        let targets: Vec<Target> = (0..40).map(|i| buoy(i, 20.0 + 3.0 * i as f64, 0.0)).collect();
        let n = d.observe(&targets, 0.25).unwrap().detections.len();
        assert!(n > 0 && n < 40);
    }

    #[test]
    fn aperture_pans_and_reverses() {
        let mut d = detector(DetectMode::Constant);
        let mut max_pan: f64 = 0.0;
        let mut min_pan: f64 = 0.0;
        for _ in 0..200 {
            d.observe(&[], 0.5);
            max_pan = max_pan.max(d.pan());
            min_pan = min_pan.min(d.pan());
            assert!(d.params.sweep.contains(d.pan()));
        }
        assert_eq!(max_pan, 30.0);
        assert_eq!(min_pan, -30.0);
    }
}
