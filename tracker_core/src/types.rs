//! Fundamental types used across the entire workspace.

use crate::error::TrackerError;
use nalgebra::{Matrix4, Vector4};
use serde::{Deserialize, Serialize};
use std::fmt;

// ---------------------------------------------------------------------------
// Filter state: polar, relative to own boat.
// ---------------------------------------------------------------------------

/// 4-element state vector: [range (m), bearing (deg), range rate (m/s), bearing rate (deg/s)]
pub type StateVec = Vector4<f64>;

/// 4×4 state covariance matrix
pub type StateCov = Matrix4<f64>;

/// Index of each component inside [`StateVec`].
pub const RANGE: usize = 0;
pub const BEARING: usize = 1;
pub const RANGE_RATE: usize = 2;
pub const BEARING_RATE: usize = 3;

/// Wrap an angle in degrees into `(-180, 180]`.
///
/// Non-finite input is returned unchanged so callers can detect it.
pub fn wrap_degrees(angle: f64) -> f64 {
    if !angle.is_finite() {
        return angle;
    }
    let mut a = angle % 360.0;
    if a > 180.0 {
        a -= 360.0;
    } else if a <= -180.0 {
        a += 360.0;
    }
    a
}

// ---------------------------------------------------------------------------
// Identifiers
// ---------------------------------------------------------------------------

#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct TrackId(pub u64);

impl fmt::Display for TrackId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "T{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// Classification
// ---------------------------------------------------------------------------

/// Classification reported by the detector.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ObjectType {
    /// Unclassified
    #[default]
    None,
    Buoy,
    Boat,
}

impl fmt::Display for ObjectType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ObjectType::None => "none",
            ObjectType::Buoy => "buoy",
            ObjectType::Boat => "boat",
        };
        f.pad(name)
    }
}

/// Type filter applied by consumer queries.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum TypeFilter {
    #[default]
    Any,
    Only(ObjectType),
}

impl TypeFilter {
    pub fn accepts(&self, object_type: ObjectType) -> bool {
        match self {
            TypeFilter::Any => true,
            TypeFilter::Only(wanted) => *wanted == object_type,
        }
    }
}

// ---------------------------------------------------------------------------
// Intervals and frame bounds
// ---------------------------------------------------------------------------

/// Closed interval `[lo, hi]`.
///
/// Bearing windows may run past ±180: `[170, 190]` is the 20° sector
/// behind the stern. Build those with [`Interval::sector`];
/// `Interval::new(170.0, -170.0)` reorders to the 340° window `[-170, 170]`.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Interval {
    pub lo: f64,
    pub hi: f64,
}

impl Interval {
    /// Build an interval; the bounds are reordered if given backwards.
    pub fn new(a: f64, b: f64) -> Self {
        if a <= b {
            Self { lo: a, hi: b }
        } else {
            Self { lo: b, hi: a }
        }
    }

    /// Bearing sector swept clockwise from `from` to `to` (degrees).
    ///
    /// When `to` lies before `from` the sector crosses ±180 and `hi` is
    /// lifted by 360, so `sector(170.0, -170.0)` is `[170, 190]`.
    pub fn sector(from: f64, to: f64) -> Self {
        let from = wrap_degrees(from);
        let mut to = wrap_degrees(to);
        if to < from {
            to += 360.0;
        }
        Self { lo: from, hi: to }
    }

    pub fn contains(&self, value: f64) -> bool {
        self.lo <= value && value <= self.hi
    }

    /// True if `bearing` (any winding) falls in this bearing window.
    pub fn contains_bearing(&self, bearing: f64) -> bool {
        let b = wrap_degrees(bearing);
        self.contains(b) || self.contains(b + 360.0) || self.contains(b - 360.0)
    }

    pub fn width(&self) -> f64 {
        self.hi - self.lo
    }
}

/// Valid field of view of the sensor that produced an epoch.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct FrameBounds {
    /// Range window (meters)
    pub range: Interval,
    /// Bearing window (degrees)
    pub bearing: Interval,
}

impl FrameBounds {
    pub fn new(range: Interval, bearing: Interval) -> Self {
        Self { range, bearing }
    }

    pub fn contains(&self, det: &Detection) -> bool {
        self.range.contains(det.range) && self.bearing.contains_bearing(det.bearing)
    }
}

impl Default for FrameBounds {
    /// Full circle, any range. Kept finite so it survives JSON.
    fn default() -> Self {
        Self {
            range: Interval::new(0.0, f64::MAX),
            bearing: Interval::new(-180.0, 180.0),
        }
    }
}

// ---------------------------------------------------------------------------
// Detections
// ---------------------------------------------------------------------------

/// A single range/bearing detection relative to own boat.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    /// Range (meters, >= 0)
    pub range: f64,
    /// Bearing from the bow (degrees, + counter-clockwise)
    pub bearing: f64,
    #[serde(default)]
    pub object_type: ObjectType,
}

impl Detection {
    pub fn new(range: f64, bearing: f64, object_type: ObjectType) -> Self {
        Self {
            range,
            bearing,
            object_type,
        }
    }

    /// Build a detection from fields that may be missing in the producer's output.
    pub fn from_parts(
        range: Option<f64>,
        bearing: Option<f64>,
        object_type: ObjectType,
    ) -> Result<Self, TrackerError> {
        match (range, bearing) {
            (Some(range), Some(bearing)) => {
                let det = Self::new(range, bearing, object_type);
                det.validate()?;
                Ok(det)
            }
            _ => Err(TrackerError::IncompleteMeasurement),
        }
    }

    /// Reject non-finite values and negative ranges.
    pub fn validate(&self) -> Result<(), TrackerError> {
        if !self.range.is_finite() || !self.bearing.is_finite() || self.range < 0.0 {
            return Err(TrackerError::InvalidDetection {
                range: self.range,
                bearing: self.bearing,
            });
        }
        Ok(())
    }
}

/// One batch of near-simultaneous detections from one sensor.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Epoch {
    pub detections: Vec<Detection>,
    #[serde(default)]
    pub frame_bounds: FrameBounds,
}

impl Epoch {
    pub fn new(detections: Vec<Detection>, frame_bounds: FrameBounds) -> Self {
        Self {
            detections,
            frame_bounds,
        }
    }
}

// ---------------------------------------------------------------------------
// Confirmation history
// ---------------------------------------------------------------------------

/// Outcome of one association opportunity for a track.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum HistoryEntry {
    Hit,
    Miss,
    /// Slot not yet filled (young track)
    Unknown,
}

impl HistoryEntry {
    pub fn score(&self) -> f64 {
        match self {
            HistoryEntry::Hit => 1.0,
            HistoryEntry::Miss => 0.0,
            HistoryEntry::Unknown => 0.5,
        }
    }
}

// ---------------------------------------------------------------------------
// Consumer view
// ---------------------------------------------------------------------------

/// Read-only copy of a track handed to consumers.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TrackSnapshot {
    pub id: TrackId,
    pub range: f64,
    pub bearing: f64,
    pub range_rate: f64,
    pub bearing_rate: f64,
    pub object_type: ObjectType,
    pub confidence: f64,
    /// Filter variance of range (m²)
    pub range_var: f64,
    /// Filter variance of bearing (deg²)
    pub bearing_var: f64,
    /// Registry clock time of the last confirming detection (seconds)
    pub last_seen: f64,
    /// Finite-difference (range rate, bearing rate) between the last two hits
    pub observed_rates: Option<(f64, f64)>,
}

impl TrackSnapshot {
    /// Cartesian position (x forward, y to port) in meters.
    pub fn position_xy(&self) -> (f64, f64) {
        let b = self.bearing.to_radians();
        (self.range * b.cos(), self.range * b.sin())
    }
}
