//! Error type for the tracking library.
//!
//! Ordinary misses and low confidence are not errors. These variants cover
//! malformed input, numerical failure of a single track, and configuration.

pub type Result<T, E = TrackerError> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum TrackerError {
    /// Range or bearing missing from a measurement
    #[error("measurement is missing range or bearing")]
    IncompleteMeasurement,

    #[error("invalid detection: range={range}, bearing={bearing}")]
    InvalidDetection { range: f64, bearing: f64 },

    #[error("innovation covariance is singular")]
    SingularInnovation,

    #[error("filter produced a non-finite estimate")]
    NonFiniteEstimate,

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),
}
