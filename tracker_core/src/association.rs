//! Data association: probabilistic data association (PDAF) fusion of every
//! gated candidate into one pseudo-measurement per track.
//!
//! # Algorithm pipeline (per track)
//! 1. Gate the epoch (see [`crate::gating`]).
//! 2. Distance from the track to each candidate.
//! 3. Turn distances into weights: the closest candidate weighs most, the
//!    farthest weighs nothing; equal distances give a uniform split.
//! 4. Weighted centroid of the candidates → pseudo-measurement.
//!
//! Instead of committing to a single nearest match, every candidate pulls
//! on the estimate in proportion to its weight. The spread of the weights
//! also sets how much the filter trusts the fused value.

use crate::{
    config::GateConfig,
    gating::{gate, mahalanobis, Gate},
    track::{Observation, TrackedObject},
    types::{wrap_degrees, Detection},
};

/// Convert distances into association weights summing to 1.
///
/// `weight_i = (max − d_i) / Σ_j (max − d_j)`. When that denominator is
/// zero (all distances equal, a single candidate, all zero) or not finite,
/// the weights fall back to uniform.
pub fn normalize(distances: &[f64]) -> Vec<f64> {
    if distances.is_empty() {
        return Vec::new();
    }
    let max = distances.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let scores: Vec<f64> = distances.iter().map(|d| max - d).collect();
    let total: f64 = scores.iter().sum();

    if total > 0.0 && total.is_finite() {
        scores.into_iter().map(|s| s / total).collect()
    } else {
        let uniform = 1.0 / distances.len() as f64;
        vec![uniform; distances.len()]
    }
}

/// Weighted centroid `(range, bearing)` of the candidates.
///
/// Bearings are averaged as offsets from the first candidate so the mean is
/// continuous across ±180°. `None` for an empty or mismatched input.
pub fn fuse(candidates: &[Detection], weights: &[f64]) -> Option<(f64, f64)> {
    if candidates.is_empty() || candidates.len() != weights.len() {
        return None;
    }
    let total: f64 = weights.iter().sum();
    if !(total > 0.0 && total.is_finite()) {
        return None;
    }
    let reference = candidates[0].bearing;
    let mut range = 0.0;
    let mut offset = 0.0;
    for (det, w) in candidates.iter().zip(weights) {
        range += w * det.range;
        offset += w * wrap_degrees(det.bearing - reference);
    }
    Some((range / total, wrap_degrees(reference + offset / total)))
}

/// Measurement-noise multiplier for a fused pseudo-measurement.
///
/// 1 when one candidate carries all the weight, up to `n` for a uniform
/// split over `n` candidates.
pub fn fusion_scale(weights: &[f64]) -> f64 {
    let peak = weights.iter().copied().fold(0.0, f64::max);
    if peak > 0.0 {
        1.0 / peak
    } else {
        1.0
    }
}

/// Outcome of associating one track with one epoch.
#[derive(Clone, Debug, PartialEq)]
pub struct Association {
    /// Per input detection: fell inside this track's gate
    pub used: Vec<bool>,
    /// Number of gated candidates
    pub n_candidates: usize,
    /// What the track should be updated with (a miss if nothing gated)
    pub observation: Observation,
}

/// Gate, weigh and fuse an epoch for one track.
pub fn pdaf(track: &TrackedObject, detections: &[Detection], config: &GateConfig) -> Association {
    let gated = gate(&Gate::for_track(track, config), detections);
    let n_candidates = gated.candidates.len();

    let distances: Vec<f64> = gated
        .candidates
        .iter()
        .map(|det| mahalanobis(track, det))
        .collect();
    let weights = normalize(&distances);

    let observation = match fuse(&gated.candidates, &weights) {
        Some((range, bearing)) => Observation::position(range, bearing, fusion_scale(&weights)),
        None => Observation::miss(),
    };

    Association {
        used: gated.used,
        n_candidates,
        observation,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        config::{KalmanConfig, TrackConfig},
        types::{ObjectType, TrackId},
    };
    use approx::assert_abs_diff_eq;

    fn buoy(range: f64, bearing: f64) -> Detection {
        Detection::new(range, bearing, ObjectType::Buoy)
    }

    #[test]
    fn normalize_sums_to_one() {
        for distances in [
            vec![1.0, 3.0],
            vec![0.5, 0.1, 2.0, 0.7],
            vec![0.0, 4.0, 4.0],
            vec![10.0, 0.0],
        ] {
            let w = normalize(&distances);
            assert_eq!(w.len(), distances.len());
            assert_abs_diff_eq!(w.iter().sum::<f64>(), 1.0, epsilon = 1e-12);
            assert!(w.iter().all(|x| (0.0..=1.0).contains(x)));
        }
    }

    #[test]
    fn closer_candidates_weigh_more() {
        let w = normalize(&[0.5, 1.0, 2.0]);
        assert!(w[0] > w[1] && w[1] > w[2]);
        assert_abs_diff_eq!(w[2], 0.0);
    }

    #[test]
    fn degenerate_distances_are_uniform() {
        assert_eq!(normalize(&[0.0, 0.0, 0.0]), vec![1.0 / 3.0; 3]);
        assert_eq!(normalize(&[2.5, 2.5]), vec![0.5, 0.5]);
        assert_eq!(normalize(&[7.0]), vec![1.0]);
        assert!(normalize(&[]).is_empty());
    }

    #[test]
    fn fuse_is_weighted_centroid() {
        let c = [buoy(10.0, 0.0), buoy(20.0, 10.0)];
        let (r, b) = fuse(&c, &[0.75, 0.25]).unwrap();
        assert_abs_diff_eq!(r, 12.5, epsilon = 1e-12);
        assert_abs_diff_eq!(b, 2.5, epsilon = 1e-12);
        assert!(fuse(&[], &[]).is_none());
        assert!(fuse(&c, &[1.0]).is_none());
    }

    #[test]
    fn fuse_across_the_wrap() {
        let (_, b) = fuse(&[buoy(10.0, 179.0), buoy(10.0, -179.0)], &[0.5, 0.5]).unwrap();
        assert_abs_diff_eq!(b.abs(), 180.0, epsilon = 1e-9);
    }

    #[test]
    fn fusion_scale_tracks_ambiguity() {
        assert_abs_diff_eq!(fusion_scale(&[1.0]), 1.0);
        assert_abs_diff_eq!(fusion_scale(&[0.25; 4]), 4.0);
        assert_abs_diff_eq!(fusion_scale(&[]), 1.0);
    }

    #[test]
    fn pdaf_fuses_gated_candidates_and_marks_usage() {
        let track = TrackedObject::spawn(
            TrackId(0),
            &buoy(50.0, 5.0),
            0.0,
            &KalmanConfig::default(),
            &TrackConfig::default(),
        );
        let dets = [buoy(50.0, 5.1), buoy(120.0, 5.0), buoy(51.0, 6.0)];
        let assoc = pdaf(&track, &dets, &GateConfig::default());
        assert_eq!(assoc.used, vec![true, false, true]);
        assert_eq!(assoc.n_candidates, 2);
        // Farther candidate gets zero weight with two candidates.
        assert_abs_diff_eq!(assoc.observation.range.unwrap(), 50.0, epsilon = 1e-12);
        assert_abs_diff_eq!(assoc.observation.bearing.unwrap(), 5.1, epsilon = 1e-12);
        assert_abs_diff_eq!(assoc.observation.covariance_scale, 1.0);
    }

    #[test]
    fn pdaf_without_candidates_is_a_miss() {
        let track = TrackedObject::spawn(
            TrackId(0),
            &buoy(50.0, 5.0),
            0.0,
            &KalmanConfig::default(),
            &TrackConfig::default(),
        );
        let assoc = pdaf(&track, &[buoy(5.0, 90.0)], &GateConfig::default());
        assert_eq!(assoc.n_candidates, 0);
        assert_eq!(assoc.observation, Observation::miss());
    }
}
