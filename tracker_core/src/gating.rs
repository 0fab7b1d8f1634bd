//! Gating: decides which detections are "close enough" to a track to be
//! considered as a potential association.
//!
//! # Gate
//! A fixed rectangle in (range, bearing) around the track, with externally
//! configured half-widths Δr and Δb, plus a type filter: a detection is
//! admissible if its type is `None` (unclassified) or equals the track's.
//! Edges are exclusive. Bearing distance is measured the short way round.
//!
//! A detection may fall inside several gates; nothing here makes the
//! assignment exclusive.
//!
//! # Distance
//! d² = νᵀ S⁻¹ ν over ν = (Δrange, Δbearing) with S⁻¹ = I₂ (no cross-term),
//! i.e. Euclidean in range/bearing space until a real S is plugged in.

use crate::{
    config::GateConfig,
    track::TrackedObject,
    types::{wrap_degrees, Detection, Interval, ObjectType},
};
use nalgebra::{Matrix2, Vector2};

/// Admissibility window of one track.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Gate {
    pub center_range: f64,
    pub center_bearing: f64,
    pub range_half_width: f64,
    pub bearing_half_width: f64,
    /// Type of the owning track
    pub track_type: ObjectType,
}

impl Gate {
    pub fn for_track(track: &TrackedObject, config: &GateConfig) -> Self {
        Self {
            center_range: track.range,
            center_bearing: track.bearing,
            range_half_width: config.range_half_width,
            bearing_half_width: config.bearing_half_width,
            track_type: track.object_type,
        }
    }

    /// `[range − Δr, range + Δr]`
    pub fn range_window(&self) -> Interval {
        Interval::new(
            self.center_range - self.range_half_width,
            self.center_range + self.range_half_width,
        )
    }

    /// `[bearing − Δb, bearing + Δb]`, unwrapped (may extend past ±180).
    pub fn bearing_window(&self) -> Interval {
        Interval::new(
            self.center_bearing - self.bearing_half_width,
            self.center_bearing + self.bearing_half_width,
        )
    }

    pub fn allows_type(&self, object_type: ObjectType) -> bool {
        match object_type {
            ObjectType::None => true,
            other => other == self.track_type,
        }
    }

    pub fn admits(&self, det: &Detection) -> bool {
        (det.range - self.center_range).abs() < self.range_half_width
            && wrap_degrees(det.bearing - self.center_bearing).abs() < self.bearing_half_width
            && self.allows_type(det.object_type)
    }
}

/// Output of [`gate`].
#[derive(Clone, Debug, Default, PartialEq)]
pub struct GateResult {
    /// Detections inside the gate, in input order
    pub candidates: Vec<Detection>,
    /// Per input detection: true if it fell inside this gate
    pub used: Vec<bool>,
}

/// Select the detections admissible for one gate.
pub fn gate(gate: &Gate, detections: &[Detection]) -> GateResult {
    let used: Vec<bool> = detections.iter().map(|d| gate.admits(d)).collect();
    let candidates = detections
        .iter()
        .zip(&used)
        .filter(|(_, inside)| **inside)
        .map(|(d, _)| *d)
        .collect();
    GateResult { candidates, used }
}

/// Distance between a track and a detection over (range, bearing).
pub fn mahalanobis(track: &TrackedObject, detection: &Detection) -> f64 {
    let nu = Vector2::new(
        detection.range - track.range,
        wrap_degrees(detection.bearing - track.bearing),
    );
    // No range/bearing cross-covariance assumed.
    let s_inv = Matrix2::<f64>::identity();
    nu.dot(&(s_inv * nu)).sqrt()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        config::{KalmanConfig, TrackConfig},
        types::TrackId,
    };
    use approx::assert_abs_diff_eq;

    fn track(range: f64, bearing: f64, object_type: ObjectType) -> TrackedObject {
        TrackedObject::spawn(
            TrackId(0),
            &Detection::new(range, bearing, object_type),
            0.0,
            &KalmanConfig::default(),
            &TrackConfig::default(),
        )
    }

    fn gate_cfg() -> GateConfig {
        GateConfig {
            range_half_width: 5.0,
            bearing_half_width: 5.0,
        }
    }

    #[test]
    fn windows_surround_the_track() {
        let g = Gate::for_track(&track(50.0, 5.0, ObjectType::Buoy), &gate_cfg());
        assert_eq!(g.range_window(), Interval::new(45.0, 55.0));
        assert_eq!(g.bearing_window(), Interval::new(0.0, 10.0));
    }

    #[test]
    fn gate_keeps_only_windowed_allowed_types() {
        let g = Gate::for_track(&track(50.0, 5.0, ObjectType::Buoy), &gate_cfg());
        let dets = [
            Detection::new(50.0, 5.1, ObjectType::Buoy),  // inside
            Detection::new(54.0, 1.0, ObjectType::None),  // inside, unclassified
            Detection::new(50.0, 5.0, ObjectType::Boat),  // wrong type
            Detection::new(56.0, 5.0, ObjectType::Buoy),  // range out
            Detection::new(50.0, 10.0, ObjectType::Buoy), // on the edge: out
            Detection::new(50.0, -3.0, ObjectType::Buoy), // bearing out
        ];
        let res = gate(&g, &dets);
        assert_eq!(res.used, vec![true, true, false, false, false, false]);
        assert_eq!(res.candidates, vec![dets[0], dets[1]]);
        for c in &res.candidates {
            assert!(g.range_window().contains(c.range));
            assert!(g.bearing_window().contains(c.bearing));
            assert!(g.allows_type(c.object_type));
        }
    }

    #[test]
    fn unclassified_track_only_takes_unclassified() {
        let g = Gate::for_track(&track(20.0, 0.0, ObjectType::None), &gate_cfg());
        assert!(g.admits(&Detection::new(20.0, 0.0, ObjectType::None)));
        assert!(!g.admits(&Detection::new(20.0, 0.0, ObjectType::Buoy)));
    }

    #[test]
    fn gate_spans_the_wrap() {
        let g = Gate::for_track(&track(40.0, 178.0, ObjectType::Boat), &gate_cfg());
        assert!(g.admits(&Detection::new(40.0, -179.0, ObjectType::Boat)));
        assert!(!g.admits(&Detection::new(40.0, -170.0, ObjectType::Boat)));
    }

    #[test]
    fn empty_batch_gates_nothing() {
        let g = Gate::for_track(&track(20.0, 0.0, ObjectType::None), &gate_cfg());
        assert_eq!(gate(&g, &[]), GateResult::default());
    }

    #[test]
    fn mahalanobis_with_identity_is_euclidean() {
        let t = track(50.0, 5.0, ObjectType::Buoy);
        let d = mahalanobis(&t, &Detection::new(53.0, 9.0, ObjectType::Buoy));
        assert_abs_diff_eq!(d, 5.0, epsilon = 1e-12);
        let wrapped = track(10.0, 179.0, ObjectType::None);
        let d = mahalanobis(&wrapped, &Detection::new(10.0, -179.0, ObjectType::None));
        assert_abs_diff_eq!(d, 2.0, epsilon = 1e-9);
    }
}
