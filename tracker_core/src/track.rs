//! TrackedObject: one filtered estimate plus hit/miss history and confidence.

use crate::{
    config::{KalmanConfig, TrackConfig},
    error::{Result, TrackerError},
    kf::KalmanFilter,
    types::{
        wrap_degrees, Detection, HistoryEntry, ObjectType, StateVec, TrackId, TrackSnapshot,
        BEARING, BEARING_RATE, RANGE, RANGE_RATE,
    },
};
use std::collections::VecDeque;
use tracing::trace;

/// What a track is told on one association opportunity.
///
/// `range` and `bearing` both absent means "looked, saw nothing" (a miss).
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Observation {
    pub range: Option<f64>,
    pub bearing: Option<f64>,
    pub range_rate: Option<f64>,
    pub bearing_rate: Option<f64>,
    /// Multiplier on the filter's measurement noise
    pub covariance_scale: f64,
}

impl Observation {
    pub fn miss() -> Self {
        Self {
            range: None,
            bearing: None,
            range_rate: None,
            bearing_rate: None,
            covariance_scale: 1.0,
        }
    }

    /// Position-only observation (rates taken from the track).
    pub fn position(range: f64, bearing: f64, covariance_scale: f64) -> Self {
        Self {
            range: Some(range),
            bearing: Some(bearing),
            range_rate: None,
            bearing_rate: None,
            covariance_scale,
        }
    }

    pub fn with_rates(mut self, range_rate: f64, bearing_rate: f64) -> Self {
        self.range_rate = Some(range_rate);
        self.bearing_rate = Some(bearing_rate);
        self
    }
}

/// Result of [`TrackedObject::update`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UpdateOutcome {
    Hit,
    Miss,
}

/// A single tracked object.
#[derive(Clone, Debug)]
pub struct TrackedObject {
    /// Unique identifier
    pub id: TrackId,
    pub object_type: ObjectType,
    filter: KalmanFilter,
    /// Exported state, refreshed from the filter after every predict/update
    pub range: f64,
    pub bearing: f64,
    pub range_rate: f64,
    pub bearing_rate: f64,
    /// Clock time of the last hit (seconds)
    pub last_seen: f64,
    /// Newest entry first, fixed length
    history: VecDeque<HistoryEntry>,
    hist_score: f64,
    confidence: f64,
    covariance_cap: f64,
    /// Range/bearing after the last hit, for the finite-difference rates
    prev_observed: (f64, f64),
    observed_rates: Option<(f64, f64)>,
}

impl TrackedObject {
    /// Spawn a track from a detection: zero velocity, history `[Hit, Unknown…]`.
    pub fn spawn(
        id: TrackId,
        detection: &Detection,
        now: f64,
        kalman: &KalmanConfig,
        track: &TrackConfig,
    ) -> Self {
        let filter = KalmanFilter::new(detection.range, detection.bearing, 0.0, 0.0, now, kalman);
        let len = track.history_len.max(1);
        let mut history = VecDeque::with_capacity(len);
        history.push_back(HistoryEntry::Hit);
        history.extend(std::iter::repeat(HistoryEntry::Unknown).take(len - 1));

        let mut obj = Self {
            id,
            object_type: detection.object_type,
            filter,
            range: 0.0,
            bearing: 0.0,
            range_rate: 0.0,
            bearing_rate: 0.0,
            last_seen: now,
            history,
            hist_score: 0.0,
            confidence: 0.0,
            covariance_cap: track.covariance_cap,
            prev_observed: (0.0, 0.0),
            observed_rates: None,
        };
        obj.refresh_state();
        obj.prev_observed = (obj.range, obj.bearing);
        obj.recompute_scores();
        obj
    }

    pub fn filter(&self) -> &KalmanFilter {
        &self.filter
    }

    pub fn history(&self) -> &VecDeque<HistoryEntry> {
        &self.history
    }

    pub fn hist_score(&self) -> f64 {
        self.hist_score
    }

    pub fn confidence(&self) -> f64 {
        self.confidence
    }

    /// Finite-difference (range rate, bearing rate) between the last two hits.
    pub fn observed_rates(&self) -> Option<(f64, f64)> {
        self.observed_rates
    }

    /// Sum of every covariance entry.
    pub fn covariance_magnitude(&self) -> f64 {
        self.filter.cov().sum()
    }

    /// Propagate the filter to `now` and refresh exported state.
    pub fn predict(&mut self, now: f64) {
        self.filter.predict(now);
        self.refresh_state();
        self.recompute_scores();
    }

    /// Apply one association outcome.
    ///
    /// Both range and bearing absent records a miss and leaves the filter
    /// alone. Exactly one of them absent, or a non-finite value, is rejected
    /// without touching the track.
    pub fn update(&mut self, obs: Observation, now: f64) -> Result<UpdateOutcome> {
        let (range, bearing) = match (obs.range, obs.bearing) {
            (None, None) => {
                self.push_history(HistoryEntry::Miss);
                self.recompute_scores();
                return Ok(UpdateOutcome::Miss);
            }
            (Some(r), Some(b)) => (r, b),
            _ => return Err(TrackerError::IncompleteMeasurement),
        };
        let range_rate = obs.range_rate.unwrap_or(self.range_rate);
        let bearing_rate = obs.bearing_rate.unwrap_or(self.bearing_rate);
        if ![range, bearing, range_rate, bearing_rate, obs.covariance_scale]
            .iter()
            .all(|v| v.is_finite())
        {
            return Err(TrackerError::InvalidDetection { range, bearing });
        }

        let z = StateVec::new(range, bearing, range_rate, bearing_rate);
        let res = self.filter.update(&z, obs.covariance_scale)?;
        trace!(
            track = %self.id,
            nu_range = res.innovation[RANGE],
            nu_bearing = res.innovation[BEARING],
            nis = res.nis,
            "kf update"
        );
        self.refresh_state();

        // Cross-check rates from consecutive hits; never fed back to the filter.
        let elapsed = now - self.last_seen;
        if elapsed > 0.0 {
            let (prev_range, prev_bearing) = self.prev_observed;
            self.observed_rates = Some((
                (self.range - prev_range) / elapsed,
                wrap_degrees(self.bearing - prev_bearing) / elapsed,
            ));
        }
        self.prev_observed = (self.range, self.bearing);

        self.last_seen = self.last_seen.max(now);
        self.push_history(HistoryEntry::Hit);
        self.recompute_scores();
        Ok(UpdateOutcome::Hit)
    }

    /// Copy out the consumer view.
    pub fn snapshot(&self) -> TrackSnapshot {
        TrackSnapshot {
            id: self.id,
            range: self.range,
            bearing: self.bearing,
            range_rate: self.range_rate,
            bearing_rate: self.bearing_rate,
            object_type: self.object_type,
            confidence: self.confidence,
            range_var: self.filter.cov()[(RANGE, RANGE)],
            bearing_var: self.filter.cov()[(BEARING, BEARING)],
            last_seen: self.last_seen,
            observed_rates: self.observed_rates,
        }
    }

    fn refresh_state(&mut self) {
        let s = self.filter.state();
        self.range = s[RANGE];
        self.bearing = s[BEARING];
        self.range_rate = s[RANGE_RATE];
        self.bearing_rate = s[BEARING_RATE];
    }

    fn push_history(&mut self, entry: HistoryEntry) {
        self.history.pop_back();
        self.history.push_front(entry);
    }

    fn recompute_scores(&mut self) {
        let n = self.history.len().max(1) as f64;
        self.hist_score = (self.history.iter().map(HistoryEntry::score).sum::<f64>() / n)
            .clamp(0.0, 1.0);

        let magnitude = self.covariance_magnitude();
        let cov_score = if magnitude.is_finite() {
            ((self.covariance_cap - magnitude) / self.covariance_cap).clamp(0.0, 1.0)
        } else {
            0.0
        };
        self.confidence = ((self.hist_score + cov_score) / 2.0).clamp(0.0, 1.0);
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
