//! `tracker_core` — Polar multi-target tracking for an autonomous sailboat.
//!
//! # Module layout
//! - [`types`]        — Detections, epochs, frame bounds, snapshots, IDs
//! - [`error`]        — Crate error type
//! - [`config`]       — YAML-loadable tuning (filter noise, gate, registry)
//! - [`clock`]        — Time source seam (monotonic / manual)
//! - [`kf`]           — Constant-velocity Kalman filter in (range, bearing)
//! - [`track`]        — Tracked object: filter + hit/miss history + confidence
//! - [`gating`]       — Per-track rectangular gate and distance
//! - [`association`]  — PDAF weighting and fusion
//! - [`registry`]     — Track collection: ingest, tick, queries, pruning
//! - [`workers`]      — Background ticker and ingest threads
//! - [`metrics`]      — RMSE, ID-switch, precision/recall

pub mod association;
pub mod clock;
pub mod config;
pub mod error;
pub mod gating;
pub mod kf;
pub mod metrics;
pub mod registry;
pub mod track;
pub mod types;
pub mod workers;

pub use clock::{Clock, ManualClock, MonotonicClock};
pub use config::TrackerConfig;
pub use error::{Result, TrackerError};
pub use registry::{IngestReport, ObjectQuery, RangeFilter, TrackRegistry};
pub use track::TrackedObject;
pub use types::{
    Detection, Epoch, FrameBounds, Interval, ObjectType, TrackId, TrackSnapshot, TypeFilter,
};
pub use workers::{EpochSender, IngestWorker, Shutdown, Ticker};
