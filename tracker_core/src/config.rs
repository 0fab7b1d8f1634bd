//! Tracker configuration.
//!
//! Every tunable is supplied from outside (YAML file or struct literal).
//! Missing keys fall back to the `Default` values, so a config file only
//! needs to list what it overrides:
//!
//! ```yaml
//! kalman:
//!   r_sigma: 1.0
//!   theta_sigma: 1.0
//! gate:
//!   range_half_width: 8.0
//! map:
//!   update_interval: 0.5
//! ```

use crate::error::{Result, TrackerError};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Noise model of the constant-velocity filter.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct KalmanConfig {
    /// Initial range uncertainty (1σ, m)
    pub init_range_std: f64,
    /// Initial bearing uncertainty (1σ, deg)
    pub init_bearing_std: f64,
    /// Initial range-rate uncertainty (1σ, m/s)
    pub init_range_rate_std: f64,
    /// Initial bearing-rate uncertainty (1σ, deg/s)
    pub init_bearing_rate_std: f64,
    /// Measurement noise on range (1σ, m)
    #[serde(alias = "r_sigma")]
    pub meas_range_std: f64,
    /// Measurement noise on bearing (1σ, deg)
    #[serde(alias = "theta_sigma")]
    pub meas_bearing_std: f64,
    /// Measurement noise on range rate (1σ, m/s)
    #[serde(alias = "r_hat_sigma")]
    pub meas_range_rate_std: f64,
    /// Measurement noise on bearing rate (1σ, deg/s)
    #[serde(alias = "theta_hat_sigma")]
    pub meas_bearing_rate_std: f64,
    /// Radial acceleration noise (1σ, m/s²)
    pub process_noise_range: f64,
    /// Angular acceleration noise at 1 m range (1σ, deg/s²); scaled by 1/range
    pub process_noise_bearing: f64,
    /// Floor applied to range before it divides the bearing noise (m)
    pub min_range: f64,
}

impl Default for KalmanConfig {
    fn default() -> Self {
        Self {
            init_range_std: 2.0,
            init_bearing_std: 2.0,
            init_range_rate_std: 3.0,
            init_bearing_rate_std: 3.0,
            meas_range_std: 1.0,
            meas_bearing_std: 1.0,
            meas_range_rate_std: 3.0,
            meas_bearing_rate_std: 3.0,
            process_noise_range: 0.5,
            process_noise_bearing: 5.0,
            min_range: 1.0,
        }
    }
}

/// Fixed gate half-widths around each track.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GateConfig {
    /// Δr (m)
    pub range_half_width: f64,
    /// Δb (deg)
    pub bearing_half_width: f64,
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            range_half_width: 5.0,
            bearing_half_width: 5.0,
        }
    }
}

/// Per-track bookkeeping.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackConfig {
    /// Length of the hit/miss history ring buffer
    pub history_len: usize,
    /// Covariance magnitude at which the covariance half of confidence reaches 0
    pub covariance_cap: f64,
}

impl Default for TrackConfig {
    fn default() -> Self {
        Self {
            history_len: 10,
            covariance_cap: 100.0,
        }
    }
}

/// Registry, query and worker settings.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistryConfig {
    /// Cap on `return_objects` results
    pub max_objects: usize,
    /// Cap on `get_buoys` results
    pub max_buoys: usize,
    /// Seconds between prediction ticks
    #[serde(alias = "update_interval")]
    pub tick_interval: f64,
    /// Tracks unseen for longer than this (seconds) are pruned by the ticker
    pub stale_age: Option<f64>,
    /// Track count above which `tick` predicts in parallel
    pub parallel_predict_min: usize,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            max_objects: 10,
            max_buoys: 5,
            tick_interval: 0.5,
            stale_age: Some(30.0),
            parallel_predict_min: 256,
        }
    }
}

impl RegistryConfig {
    /// `tick_interval` as a [`Duration`]. Fails for values a `Duration`
    /// cannot hold.
    pub fn tick_interval(&self) -> Result<Duration> {
        Duration::try_from_secs_f64(self.tick_interval).map_err(|e| {
            TrackerError::Config(format!(
                "registry.tick_interval {} is not a valid duration: {e}",
                self.tick_interval
            ))
        })
    }
}

/// Complete tracker configuration.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackerConfig {
    pub kalman: KalmanConfig,
    pub gate: GateConfig,
    pub track: TrackConfig,
    #[serde(alias = "map")]
    pub registry: RegistryConfig,
}

impl TrackerConfig {
    /// Parse a YAML document and validate it.
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        let config: TrackerConfig = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Read and validate a YAML config file.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&text)
    }

    pub fn validate(&self) -> Result<()> {
        let k = &self.kalman;
        let stds = [
            ("kalman.init_range_std", k.init_range_std),
            ("kalman.init_bearing_std", k.init_bearing_std),
            ("kalman.init_range_rate_std", k.init_range_rate_std),
            ("kalman.init_bearing_rate_std", k.init_bearing_rate_std),
            ("kalman.meas_range_std", k.meas_range_std),
            ("kalman.meas_bearing_std", k.meas_bearing_std),
            ("kalman.meas_range_rate_std", k.meas_range_rate_std),
            ("kalman.meas_bearing_rate_std", k.meas_bearing_rate_std),
            ("kalman.min_range", k.min_range),
            ("gate.range_half_width", self.gate.range_half_width),
            ("gate.bearing_half_width", self.gate.bearing_half_width),
            ("track.covariance_cap", self.track.covariance_cap),
            ("registry.tick_interval", self.registry.tick_interval),
        ];
        for (name, value) in stds {
            if !(value.is_finite() && value > 0.0) {
                return Err(TrackerError::Config(format!(
                    "{name} must be positive, got {value}"
                )));
            }
        }
        for (name, value) in [
            ("kalman.process_noise_range", k.process_noise_range),
            ("kalman.process_noise_bearing", k.process_noise_bearing),
        ] {
            if !(value.is_finite() && value >= 0.0) {
                return Err(TrackerError::Config(format!(
                    "{name} must be non-negative, got {value}"
                )));
            }
        }
        self.registry.tick_interval()?;
        if self.track.history_len == 0 {
            return Err(TrackerError::Config(
                "track.history_len must be at least 1".into(),
            ));
        }
        if let Some(age) = self.registry.stale_age {
            if !(age.is_finite() && age >= 0.0) {
                return Err(TrackerError::Config(format!(
                    "registry.stale_age must be non-negative, got {age}"
                )));
            }
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
