//! Track registry: the one owner of the track collection.
//!
//! # Processing steps per epoch
//! 1. Drop malformed detections (logged, counted)
//! 2. For each track: gate the epoch, fuse candidates (PDAF), update,
//!    or record a miss when nothing gated
//! 3. Spawn a track for every detection no gate claimed
//!
//! Prediction runs separately in [`TrackRegistry::tick`].
//!
//! # Locking
//! The tracks sit behind a single mutex owned by the registry. `ingest`,
//! `tick` and `clear_objects` hold it for their whole run, so they never
//! interleave on a track. Queries hold it only while copying snapshots out.

use crate::{
    association::pdaf,
    clock::{Clock, MonotonicClock},
    config::TrackerConfig,
    error::Result,
    track::{TrackedObject, UpdateOutcome},
    types::{
        Detection, Epoch, FrameBounds, Interval, ObjectType, TrackId, TrackSnapshot, TypeFilter,
    },
};
use parking_lot::Mutex;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::{
    ops::AddAssign,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
};
use tracing::{debug, trace, warn};

// ---------------------------------------------------------------------------
// Queries
// ---------------------------------------------------------------------------

/// Range selection for [`TrackRegistry::return_objects`].
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub enum RangeFilter {
    /// Explicit range window (m)
    Range(Interval),
    /// Time window (s) converted to range with own-boat speed (m/s)
    Time { window: Interval, speed: f64 },
}

impl RangeFilter {
    pub fn to_range(&self) -> Interval {
        match *self {
            RangeFilter::Range(range) => range,
            RangeFilter::Time { window, speed } => {
                Interval::new(speed * window.lo, speed * window.hi)
            }
        }
    }
}

/// Parameters of [`TrackRegistry::return_objects`].
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct ObjectQuery {
    /// Bearing window (deg); compared against wrapped track bearings.
    /// A window across the stern is written past 180, e.g. `[170, 190]`
    /// (see [`Interval::sector`]).
    pub bearing: Interval,
    pub range: RangeFilter,
    pub object_type: TypeFilter,
    /// Overrides the configured result cap
    pub limit: Option<usize>,
}

impl ObjectQuery {
    pub fn new(bearing: Interval, range: RangeFilter) -> Self {
        Self {
            bearing,
            range,
            object_type: TypeFilter::Any,
            limit: None,
        }
    }

    pub fn with_type(mut self, object_type: TypeFilter) -> Self {
        self.object_type = object_type;
        self
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }
}

impl Default for ObjectQuery {
    /// 30° either side of the bow, any range.
    fn default() -> Self {
        Self::new(
            Interval::new(-30.0, 30.0),
            RangeFilter::Range(Interval::new(0.0, f64::MAX)),
        )
    }
}

// ---------------------------------------------------------------------------
// Ingest report
// ---------------------------------------------------------------------------

/// Counters from one [`TrackRegistry::ingest`] call.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngestReport {
    /// Tracks updated with a fused measurement
    pub updated: usize,
    /// Tracks that recorded a miss
    pub missed: usize,
    /// Tracks spawned from unclaimed detections
    pub spawned: usize,
    /// Malformed detections dropped
    pub rejected: usize,
    /// Track updates that failed numerically (track left as it was)
    pub failed: usize,
    /// Valid detections outside the producer's frame bounds (not filtered)
    pub outside_frame: usize,
}

impl AddAssign for IngestReport {
    fn add_assign(&mut self, other: Self) {
        self.updated += other.updated;
        self.missed += other.missed;
        self.spawned += other.spawned;
        self.rejected += other.rejected;
        self.failed += other.failed;
        self.outside_frame += other.outside_frame;
    }
}

// ---------------------------------------------------------------------------
// Registry
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
struct RegistryState {
    tracks: Vec<TrackedObject>,
    next_id: u64,
}

impl RegistryState {
    fn next_track_id(&mut self) -> TrackId {
        let id = TrackId(self.next_id);
        self.next_id += 1;
        id
    }
}

/// Owns every [`TrackedObject`] and serialises all access to them.
///
/// Share it between threads with `Arc<TrackRegistry>`.
pub struct TrackRegistry {
    config: TrackerConfig,
    clock: Arc<dyn Clock>,
    state: Mutex<RegistryState>,
    /// Cleared to pause background prediction
    updates_enabled: AtomicBool,
}

impl TrackRegistry {
    /// Build a registry on the given clock. The config is validated first.
    pub fn new(config: TrackerConfig, clock: Arc<dyn Clock>) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            clock,
            state: Mutex::new(RegistryState::default()),
            updates_enabled: AtomicBool::new(true),
        })
    }

    /// Build a registry on a fresh [`MonotonicClock`].
    pub fn with_monotonic_clock(config: TrackerConfig) -> Result<Self> {
        Self::new(config, Arc::new(MonotonicClock::new()))
    }

    pub fn config(&self) -> &TrackerConfig {
        &self.config
    }

    /// Current time on the registry clock (seconds).
    pub fn now(&self) -> f64 {
        self.clock.now()
    }

    /// Resume background prediction by a [`crate::Ticker`].
    pub fn enable_update(&self) {
        self.updates_enabled.store(true, Ordering::SeqCst);
        debug!("registry updates enabled");
    }

    /// Pause background prediction. `ingest` and queries keep working;
    /// tracks simply stop being propagated until [`Self::enable_update`].
    pub fn disable_update(&self) {
        self.updates_enabled.store(false, Ordering::SeqCst);
        debug!("registry updates disabled");
    }

    pub fn updates_enabled(&self) -> bool {
        self.updates_enabled.load(Ordering::SeqCst)
    }

    pub fn len(&self) -> usize {
        self.state.lock().tracks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Gate, fuse and update every track with one epoch; spawn tracks for
    /// unclaimed detections.
    ///
    /// `frame_bounds` is bookkeeping only: detections outside it are counted
    /// but still processed. An empty epoch changes nothing.
    pub fn ingest(&self, detections: &[Detection], frame_bounds: &FrameBounds) -> IngestReport {
        let mut report = IngestReport::default();
        if detections.is_empty() {
            trace!("empty epoch");
            return report;
        }

        let valid: Vec<Detection> = detections
            .iter()
            .filter(|det| match det.validate() {
                Ok(()) => true,
                Err(err) => {
                    warn!(error = %err, "dropping detection");
                    report.rejected += 1;
                    false
                }
            })
            .copied()
            .collect();
        if valid.is_empty() {
            return report;
        }
        report.outside_frame = valid.iter().filter(|d| !frame_bounds.contains(d)).count();

        let now = self.clock.now();
        let gate_config = &self.config.gate;
        let mut state = self.state.lock();
        let mut claimed = vec![false; valid.len()];

        for track in state.tracks.iter_mut() {
            let assoc = pdaf(track, &valid, gate_config);
            for (c, used) in claimed.iter_mut().zip(&assoc.used) {
                *c |= *used;
            }
            match track.update(assoc.observation, now) {
                Ok(UpdateOutcome::Hit) => {
                    trace!(track = %track.id, candidates = assoc.n_candidates, "track updated");
                    report.updated += 1;
                }
                Ok(UpdateOutcome::Miss) => report.missed += 1,
                Err(err) => {
                    warn!(track = %track.id, error = %err, "track update failed");
                    report.failed += 1;
                }
            }
        }

        for (det, _) in valid.iter().zip(&claimed).filter(|(_, c)| !**c) {
            let id = state.next_track_id();
            debug!(
                track = %id,
                range = det.range,
                bearing = det.bearing,
                object_type = %det.object_type,
                "spawning track"
            );
            state.tracks.push(TrackedObject::spawn(
                id,
                det,
                now,
                &self.config.kalman,
                &self.config.track,
            ));
            report.spawned += 1;
        }

        debug!(
            updated = report.updated,
            missed = report.missed,
            spawned = report.spawned,
            rejected = report.rejected,
            tracks = state.tracks.len(),
            "epoch ingested"
        );
        report
    }

    /// [`ingest`](Self::ingest) for a packaged epoch.
    pub fn ingest_epoch(&self, epoch: &Epoch) -> IngestReport {
        self.ingest(&epoch.detections, &epoch.frame_bounds)
    }

    /// Predict every track to now. Returns the number of tracks predicted.
    pub fn tick(&self) -> usize {
        let now = self.clock.now();
        let mut state = self.state.lock();
        if state.tracks.len() >= self.config.registry.parallel_predict_min {
            state.tracks.par_iter_mut().for_each(|t| t.predict(now));
        } else {
            state.tracks.iter_mut().for_each(|t| t.predict(now));
        }
        trace!(tracks = state.tracks.len(), "tick");
        state.tracks.len()
    }

    /// Tracks inside the query window, in registry order, capped.
    pub fn return_objects(&self, query: &ObjectQuery) -> Vec<TrackSnapshot> {
        let range = query.range.to_range();
        let limit = query.limit.unwrap_or(self.config.registry.max_objects);
        let state = self.state.lock();
        state
            .tracks
            .iter()
            .filter(|t| {
                query.object_type.accepts(t.object_type)
                    && range.contains(t.range)
                    && query.bearing.contains_bearing(t.bearing)
            })
            .take(limit)
            .map(TrackedObject::snapshot)
            .collect()
    }

    /// Buoy tracks, in registry order, capped.
    pub fn get_buoys(&self) -> Vec<TrackSnapshot> {
        let state = self.state.lock();
        state
            .tracks
            .iter()
            .filter(|t| t.object_type == ObjectType::Buoy)
            .take(self.config.registry.max_buoys)
            .map(TrackedObject::snapshot)
            .collect()
    }

    /// Every track, uncapped.
    pub fn snapshots(&self) -> Vec<TrackSnapshot> {
        let state = self.state.lock();
        state.tracks.iter().map(TrackedObject::snapshot).collect()
    }

    /// Remove tracks unseen for more than `max_age` seconds. Returns how many.
    pub fn clear_objects(&self, max_age: f64) -> usize {
        let now = self.clock.now();
        let mut state = self.state.lock();
        let before = state.tracks.len();
        state.tracks.retain(|t| now - t.last_seen <= max_age);
        let removed = before - state.tracks.len();
        if removed > 0 {
            debug!(removed, remaining = state.tracks.len(), "pruned stale tracks");
        }
        removed
    }

    /// Drop every track and restart ids.
    pub fn reset(&self) {
        let mut state = self.state.lock();
        state.tracks.clear();
        state.next_id = 0;
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;

    fn registry() -> (TrackRegistry, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new(0.0));
        let reg = TrackRegistry::new(TrackerConfig::default(), clock.clone()).unwrap();
        (reg, clock)
    }

    #[test]
    fn time_range_converts_with_speed() {
        let f = RangeFilter::Time {
            window: Interval::new(0.0, 5.0),
            speed: 3.0,
        };
        assert_eq!(f.to_range(), Interval::new(0.0, 15.0));
    }

    #[test]
    fn bearing_window_past_180() {
        let w = Interval::new(150.0, 210.0);
        assert!(w.contains_bearing(-170.0));
        assert!(w.contains_bearing(170.0));
        assert!(!w.contains_bearing(0.0));
        assert_eq!(Interval::sector(150.0, -150.0), w);
    }

    #[test]
    fn rejected_detections_do_not_spawn() {
        let (reg, _) = registry();
        let report = reg.ingest(
            &[
                Detection::new(f64::NAN, 0.0, ObjectType::Buoy),
                Detection::new(-4.0, 0.0, ObjectType::Buoy),
                Detection::new(10.0, 0.0, ObjectType::Buoy),
            ],
            &FrameBounds::default(),
        );
        assert_eq!(report.rejected, 2);
        assert_eq!(report.spawned, 1);
        assert_eq!(reg.len(), 1);
    }

    #[test]
    fn outside_frame_is_counted_not_filtered() {
        let (reg, _) = registry();
        let fb = FrameBounds::new(Interval::new(10.0, 100.0), Interval::new(-70.0, 70.0));
        let report = reg.ingest(&[Detection::new(5.0, 0.0, ObjectType::None)], &fb);
        assert_eq!(report.outside_frame, 1);
        assert_eq!(report.spawned, 1);
    }

    #[test]
    fn reset_restarts_ids() {
        let (reg, _) = registry();
        reg.ingest(&[Detection::new(10.0, 0.0, ObjectType::None)], &FrameBounds::default());
        reg.reset();
        assert!(reg.is_empty());
        reg.ingest(&[Detection::new(10.0, 0.0, ObjectType::None)], &FrameBounds::default());
        assert_eq!(reg.snapshots()[0].id, TrackId(0));
    }

    #[test]
    fn parallel_tick_matches_serial() {
        let clock = Arc::new(ManualClock::new(0.0));
        let parallel_cfg = TrackerConfig {
            registry: crate::config::RegistryConfig {
                parallel_predict_min: 1,
                ..Default::default()
            },
            ..Default::default()
        };
        let serial = TrackRegistry::new(TrackerConfig::default(), clock.clone()).unwrap();
        let parallel = TrackRegistry::new(parallel_cfg, clock.clone()).unwrap();
        let dets: Vec<Detection> = (0..20)
            .map(|i| Detection::new(10.0 + i as f64 * 20.0, 0.0, ObjectType::Buoy))
            .collect();
        for reg in [&serial, &parallel] {
            reg.ingest(&dets, &FrameBounds::default());
        }
        clock.advance_secs(1.0);
        for reg in [&serial, &parallel] {
            reg.ingest(
                &dets
                    .iter()
                    .map(|d| Detection::new(d.range + 1.0, d.bearing, d.object_type))
                    .collect::<Vec<_>>(),
                &FrameBounds::default(),
            );
        }
        clock.advance_secs(2.0);
        assert_eq!(serial.tick(), 20);
        assert_eq!(parallel.tick(), 20);
        assert_eq!(serial.snapshots(), parallel.snapshots());
    }
}
