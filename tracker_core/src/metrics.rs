//! Tracking metrics: position RMSE, ID switches, precision/recall against
//! simulator ground truth.

use crate::types::{ObjectType, TrackId, TrackSnapshot};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

/// Ground-truth position of one target at a given time.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GroundTruth {
    /// True target ID (from simulator)
    pub target_id: u64,
    pub range: f64,
    pub bearing: f64,
    pub object_type: ObjectType,
}

impl GroundTruth {
    fn position_xy(&self) -> (f64, f64) {
        let b = self.bearing.to_radians();
        (self.range * b.cos(), self.range * b.sin())
    }
}

/// Accumulated metric statistics.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct TrackingMetrics {
    /// Number of frames evaluated
    pub n_frames: u64,
    /// Total number of matched (track, target) pairs evaluated
    pub n_matched: u64,
    /// Sum of squared position errors (m², Cartesian)
    pub sum_sq_pos_err: f64,
    /// Target matched to a track
    pub true_positives: u64,
    /// Track matched to no target
    pub false_positives: u64,
    /// Target matched to no track
    pub false_negatives: u64,
    /// Target matched to a different track than last frame
    pub id_switches: u64,
    #[serde(skip)]
    last_match: HashMap<u64, TrackId>,
}

impl TrackingMetrics {
    /// Root-mean-square position error (meters, 2D).
    pub fn rmse_position(&self) -> f64 {
        if self.n_matched == 0 {
            return 0.0;
        }
        (self.sum_sq_pos_err / self.n_matched as f64).sqrt()
    }

    /// Precision = TP / (TP + FP)
    pub fn precision(&self) -> f64 {
        let denom = (self.true_positives + self.false_positives) as f64;
        if denom == 0.0 { 1.0 } else { self.true_positives as f64 / denom }
    }

    /// Recall = TP / (TP + FN)
    pub fn recall(&self) -> f64 {
        let denom = (self.true_positives + self.false_negatives) as f64;
        if denom == 0.0 { 1.0 } else { self.true_positives as f64 / denom }
    }

    /// Score one frame. Each target takes the nearest still-unmatched track
    /// within `match_radius` meters.
    pub fn accumulate(
        &mut self,
        tracks: &[TrackSnapshot],
        ground_truths: &[GroundTruth],
        match_radius: f64,
    ) {
        self.n_frames += 1;
        let mut taken: HashSet<TrackId> = HashSet::new();

        for gt in ground_truths {
            let (gx, gy) = gt.position_xy();
            let nearest = tracks
                .iter()
                .filter(|t| !taken.contains(&t.id))
                .map(|t| {
                    let (tx, ty) = t.position_xy();
                    (t.id, (tx - gx).powi(2) + (ty - gy).powi(2))
                })
                .filter(|(_, d2)| *d2 <= match_radius * match_radius)
                .min_by(|a, b| a.1.total_cmp(&b.1));

            match nearest {
                Some((id, d2)) => {
                    taken.insert(id);
                    self.sum_sq_pos_err += d2;
                    self.n_matched += 1;
                    self.true_positives += 1;
                    if let Some(prev) = self.last_match.insert(gt.target_id, id) {
                        if prev != id {
                            self.id_switches += 1;
                        }
                    }
                }
                None => self.false_negatives += 1,
            }
        }

        self.false_positives += tracks.iter().filter(|t| !taken.contains(&t.id)).count() as u64;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn snap(id: u64, range: f64, bearing: f64) -> TrackSnapshot {
        TrackSnapshot {
            id: TrackId(id),
            range,
            bearing,
            range_rate: 0.0,
            bearing_rate: 0.0,
            object_type: ObjectType::Buoy,
            confidence: 0.5,
            range_var: 1.0,
            bearing_var: 1.0,
            last_seen: 0.0,
            observed_rates: None,
        }
    }

    fn truth(id: u64, range: f64, bearing: f64) -> GroundTruth {
        GroundTruth {
            target_id: id,
            range,
            bearing,
            object_type: ObjectType::Buoy,
        }
    }

    #[test]
    fn counts_matches_misses_and_clutter() {
        let mut m = TrackingMetrics::default();
        m.accumulate(
            &[snap(0, 10.0, 0.0), snap(1, 100.0, 90.0)],
            &[truth(7, 11.0, 0.0), truth(8, 50.0, -90.0)],
            3.0,
        );
        assert_eq!(m.true_positives, 1);
        assert_eq!(m.false_negatives, 1);
        assert_eq!(m.false_positives, 1);
        assert_abs_diff_eq!(m.rmse_position(), 1.0, epsilon = 1e-9);
        assert_abs_diff_eq!(m.precision(), 0.5);
        assert_abs_diff_eq!(m.recall(), 0.5);
    }

    #[test]
    fn detects_id_switch() {
        let mut m = TrackingMetrics::default();
        m.accumulate(&[snap(0, 10.0, 0.0)], &[truth(1, 10.0, 0.0)], 2.0);
        m.accumulate(&[snap(3, 10.0, 0.0)], &[truth(1, 10.0, 0.0)], 2.0);
        assert_eq!(m.id_switches, 1);
        assert_eq!(m.n_frames, 2);
    }
}
