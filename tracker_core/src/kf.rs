//! Kalman filter: predict and update steps.
//!
//! # Design choices
//! - **Linear KF**, constant-velocity (CV) motion model, state kept in polar
//!   coordinates relative to own boat.
//! - All math is done in `f64` via `nalgebra` fixed-size matrices.
//! - Bearing lives on a circle: the innovation and the state are wrapped
//!   into `(-180, 180]` after every step.
//!
//! ## State vector
//! x = [r, θ, ṙ, θ̇]ᵀ  (range m, bearing deg, range rate m/s, bearing rate deg/s)
//!
//! ## CV Transition model
//! F = I₄ + dt * [[0₂ I₂]; [0₂ 0₂]]
//!
//! ## Process noise Q (discrete white-noise acceleration, per axis)
//! Q_axis = q² · [[dt⁴/4, dt³/2]; [dt³/2, dt²]]
//!
//! The bearing axis variance is divided by `max(r, min_range)`: close
//! objects swing through bearing much faster than distant ones.
//!
//! ## Passing the origin
//! A range below zero is not a polar position. When predict or update
//! lands there, the state is reflected: r → −r, ṙ → −ṙ, θ → θ + 180°,
//! and P is transformed with the same sign flips.

use crate::{
    config::KalmanConfig,
    error::{Result, TrackerError},
    types::{wrap_degrees, StateCov, StateVec, BEARING, BEARING_RATE, RANGE, RANGE_RATE},
};
use nalgebra::Matrix4;

/// Result of a KF update step.
#[derive(Clone, Debug)]
pub struct KfUpdateResult {
    /// Innovation ν = z − x (bearing wrapped)
    pub innovation: StateVec,
    /// Innovation covariance S = P + R
    pub innovation_cov: StateCov,
    /// Kalman gain K
    pub kalman_gain: Matrix4<f64>,
    /// Normalised innovation squared νᵀ S⁻¹ ν
    pub nis: f64,
}

/// Constant-velocity Kalman filter over [range, bearing, range rate, bearing rate].
#[derive(Clone, Debug)]
pub struct KalmanFilter {
    state: StateVec,
    cov: StateCov,
    /// Transition matrix of the most recent predict
    transition: Matrix4<f64>,
    /// Clock time of the last predict (seconds)
    last_transition: f64,
    config: KalmanConfig,
}

impl KalmanFilter {
    /// Start a filter at `(range, bearing)` moving at the given rates.
    pub fn new(
        range: f64,
        bearing: f64,
        range_rate: f64,
        bearing_rate: f64,
        now: f64,
        config: &KalmanConfig,
    ) -> Self {
        let state = StateVec::new(range, wrap_degrees(bearing), range_rate, bearing_rate);
        let cov = StateCov::from_diagonal(&StateVec::new(
            config.init_range_std.powi(2),
            config.init_bearing_std.powi(2),
            config.init_range_rate_std.powi(2),
            config.init_bearing_rate_std.powi(2),
        ));
        Self {
            state,
            cov,
            transition: Matrix4::identity(),
            last_transition: now,
            config: config.clone(),
        }
    }

    pub fn state(&self) -> &StateVec {
        &self.state
    }

    pub fn cov(&self) -> &StateCov {
        &self.cov
    }

    pub fn transition(&self) -> &Matrix4<f64> {
        &self.transition
    }

    pub fn last_transition(&self) -> f64 {
        self.last_transition
    }

    /// Build state transition matrix F for timestep dt.
    pub fn transition_matrix(dt: f64) -> Matrix4<f64> {
        let mut f = Matrix4::<f64>::identity();
        f[(RANGE, RANGE_RATE)] = dt;
        f[(BEARING, BEARING_RATE)] = dt;
        f
    }

    /// Build process noise matrix Q for timestep dt at the given range.
    pub fn process_noise(dt: f64, range: f64, config: &KalmanConfig) -> Matrix4<f64> {
        let dt2 = dt * dt;
        let dt3 = dt2 * dt;
        let dt4 = dt3 * dt;

        let range_floor = range.abs().max(config.min_range);
        let q_range = config.process_noise_range.powi(2);
        let q_bearing = config.process_noise_bearing.powi(2) / range_floor;

        let mut qm = Matrix4::<f64>::zeros();
        for (pos, vel, q) in [
            (RANGE, RANGE_RATE, q_range),
            (BEARING, BEARING_RATE, q_bearing),
        ] {
            qm[(pos, pos)] = q * dt4 / 4.0;
            qm[(pos, vel)] = q * dt3 / 2.0;
            qm[(vel, pos)] = q * dt3 / 2.0;
            qm[(vel, vel)] = q * dt2;
        }
        qm
    }

    /// Propagate the state to `now`. Time never runs backwards: an older
    /// `now` is treated as `dt = 0`.
    pub fn predict(&mut self, now: f64) {
        let dt = (now - self.last_transition).max(0.0);
        let f = Self::transition_matrix(dt);
        let q = Self::process_noise(dt, self.state[RANGE], &self.config);

        self.state = f * self.state;
        self.state[BEARING] = wrap_degrees(self.state[BEARING]);
        self.cov = f * self.cov * f.transpose() + q;
        self.reflect_through_origin();
        self.transition = f;
        self.last_transition = self.last_transition.max(now);
    }

    /// Base measurement noise R (before scaling).
    pub fn measurement_noise(&self) -> StateCov {
        let c = &self.config;
        StateCov::from_diagonal(&StateVec::new(
            c.meas_range_std.powi(2),
            c.meas_bearing_std.powi(2),
            c.meas_range_rate_std.powi(2),
            c.meas_bearing_rate_std.powi(2),
        ))
    }

    /// Correct the state with a full-state measurement `z`.
    ///
    /// `covariance_scale` multiplies R; values above 1 make the measurement
    /// count for less. On error the filter is left untouched.
    pub fn update(&mut self, z: &StateVec, covariance_scale: f64) -> Result<KfUpdateResult> {
        let r = self.measurement_noise() * covariance_scale.max(f64::EPSILON);

        // Innovation: ν = z − x  (H = I₄)
        let mut innovation = z - self.state;
        innovation[BEARING] = wrap_degrees(innovation[BEARING]);

        // Innovation covariance: S = P + R
        let s = self.cov + r;
        let s_inv = s.try_inverse().ok_or(TrackerError::SingularInnovation)?;

        // Kalman gain: K = P·S⁻¹
        let k = self.cov * s_inv;

        let mut new_state = self.state + k * innovation;
        new_state[BEARING] = wrap_degrees(new_state[BEARING]);

        // Joseph form P' = (I−K)·P·(I−K)ᵀ + K·R·Kᵀ, then re-symmetrise
        let i_k = Matrix4::<f64>::identity() - k;
        let joseph = i_k * self.cov * i_k.transpose() + k * r * k.transpose();
        let new_cov = (joseph + joseph.transpose()) * 0.5;

        if !new_state.iter().all(|v| v.is_finite()) || !new_cov.iter().all(|v| v.is_finite()) {
            return Err(TrackerError::NonFiniteEstimate);
        }

        self.state = new_state;
        self.cov = new_cov;
        self.reflect_through_origin();

        Ok(KfUpdateResult {
            nis: innovation.dot(&(s_inv * innovation)),
            innovation,
            innovation_cov: s,
            kalman_gain: k,
        })
    }

    /// Map a negative range back onto the opposite bearing.
    fn reflect_through_origin(&mut self) {
        if self.state[RANGE] >= 0.0 {
            return;
        }
        self.state[RANGE] = -self.state[RANGE];
        self.state[RANGE_RATE] = -self.state[RANGE_RATE];
        self.state[BEARING] = wrap_degrees(self.state[BEARING] + 180.0);

        // J = diag(−1, 1, −1, 1); P' = J·P·Jᵀ
        let j = StateCov::from_diagonal(&StateVec::new(-1.0, 1.0, -1.0, 1.0));
        self.cov = j * self.cov * j;
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn filter_at(range: f64, bearing: f64, range_rate: f64, bearing_rate: f64) -> KalmanFilter {
        KalmanFilter::new(
            range,
            bearing,
            range_rate,
            bearing_rate,
            0.0,
            &KalmanConfig::default(),
        )
    }

    #[test]
    fn predict_constant_velocity() {
        let mut kf = filter_at(20.0, 10.0, 2.0, -1.0);
        kf.predict(1.5);
        assert_abs_diff_eq!(kf.state()[RANGE], 23.0, epsilon = 1e-9);
        assert_abs_diff_eq!(kf.state()[BEARING], 8.5, epsilon = 1e-9);
        assert_abs_diff_eq!(kf.state()[RANGE_RATE], 2.0, epsilon = 1e-9);
        assert_abs_diff_eq!(kf.transition()[(RANGE, RANGE_RATE)], 1.5);
        assert_abs_diff_eq!(kf.transition()[(BEARING, BEARING_RATE)], 1.5);
        assert_abs_diff_eq!(kf.last_transition(), 1.5);
    }

    #[test]
    fn predict_uses_time_since_last_transition() {
        let mut kf = filter_at(10.0, 0.0, 1.0, 0.0);
        kf.predict(1.0);
        kf.predict(3.0);
        assert_abs_diff_eq!(kf.transition()[(RANGE, RANGE_RATE)], 2.0);
        assert_abs_diff_eq!(kf.state()[RANGE], 13.0, epsilon = 1e-9);

        // stale timestamp: no motion
        kf.predict(2.0);
        assert_abs_diff_eq!(kf.state()[RANGE], 13.0, epsilon = 1e-9);
        assert_abs_diff_eq!(kf.last_transition(), 3.0);
    }

    #[test]
    fn predict_wraps_bearing() {
        let mut kf = filter_at(30.0, 178.0, 0.0, 4.0);
        kf.predict(1.0);
        assert_abs_diff_eq!(kf.state()[BEARING], -178.0, epsilon = 1e-9);
    }

    #[test]
    fn bearing_noise_grows_as_range_shrinks() {
        let cfg = KalmanConfig::default();
        let near = KalmanFilter::process_noise(1.0, 5.0, &cfg);
        let far = KalmanFilter::process_noise(1.0, 50.0, &cfg);
        assert!(near[(BEARING, BEARING)] > far[(BEARING, BEARING)]);
        assert_abs_diff_eq!(near[(RANGE, RANGE)], far[(RANGE, RANGE)]);
    }

    #[test]
    fn process_noise_is_finite_at_zero_range() {
        let cfg = KalmanConfig::default();
        let q = KalmanFilter::process_noise(1.0, 0.0, &cfg);
        assert!(q.iter().all(|v| v.is_finite()));
        assert_abs_diff_eq!(q, KalmanFilter::process_noise(1.0, cfg.min_range, &cfg));
    }

    #[test]
    fn update_reduces_uncertainty() {
        let mut kf = filter_at(50.0, 5.0, 0.0, 0.0);
        let prior_trace = kf.cov().trace();
        kf.update(&StateVec::new(50.0, 5.1, 0.0, 0.0), 1.0).unwrap();
        assert!(kf.cov().trace() < prior_trace, "Update should reduce uncertainty");
        assert!(kf.state()[BEARING] > 5.0 && kf.state()[BEARING] < 5.1);
        assert_abs_diff_eq!(*kf.cov(), kf.cov().transpose(), epsilon = 1e-12);
    }

    #[test]
    fn larger_scale_means_smaller_correction() {
        let z = StateVec::new(60.0, 0.0, 0.0, 0.0);
        let mut trusted = filter_at(50.0, 0.0, 0.0, 0.0);
        let mut doubtful = filter_at(50.0, 0.0, 0.0, 0.0);
        trusted.update(&z, 1.0).unwrap();
        doubtful.update(&z, 4.0).unwrap();
        assert!(trusted.state()[RANGE] > doubtful.state()[RANGE]);
        assert!(trusted.cov()[(RANGE, RANGE)] < doubtful.cov()[(RANGE, RANGE)]);
    }

    #[test]
    fn update_across_the_wrap_takes_the_short_way() {
        let mut kf = filter_at(40.0, 179.0, 0.0, 0.0);
        kf.update(&StateVec::new(40.0, -179.0, 0.0, 0.0), 1.0).unwrap();
        let b = kf.state()[BEARING];
        assert!(b > 179.0 || b < -179.0, "bearing {b} should sit near ±180");
    }

    #[test]
    fn update_reports_normalised_innovation() {
        let mut kf = filter_at(50.0, 5.0, 0.0, 0.0);
        // S = diag(4 + 1, 4 + 1, 9 + 9, 9 + 9); ν = (0, 0.1, 0, 0)
        let res = kf.update(&StateVec::new(50.0, 5.1, 0.0, 0.0), 1.0).unwrap();
        assert_abs_diff_eq!(res.nis, 0.01 / 5.0, epsilon = 1e-12);
        assert_abs_diff_eq!(res.innovation[BEARING], 0.1, epsilon = 1e-12);
    }

    #[test]
    fn closing_track_is_reflected_through_origin() {
        let mut kf = filter_at(1.0, 10.0, -4.0, 0.5);
        kf.predict(1.0);
        let s = kf.state();
        assert_abs_diff_eq!(s[RANGE], 3.0, epsilon = 1e-9);
        assert_abs_diff_eq!(s[RANGE_RATE], 4.0, epsilon = 1e-9);
        assert_abs_diff_eq!(s[BEARING], -169.5, epsilon = 1e-9);
        assert_abs_diff_eq!(s[BEARING_RATE], 0.5, epsilon = 1e-9);
        assert!(kf.cov().iter().all(|v| v.is_finite()));
        assert_abs_diff_eq!(*kf.cov(), kf.cov().transpose(), epsilon = 1e-12);
        // Variances survive the sign flips unchanged.
        assert!(kf.cov()[(RANGE, RANGE)] > 0.0 && kf.cov()[(BEARING, BEARING)] > 0.0);

        for step in 2..20 {
            kf.predict(step as f64);
            assert!(kf.state()[RANGE] >= 0.0);
        }
    }

    #[test]
    fn non_finite_measurement_leaves_filter_untouched() {
        let mut kf = filter_at(10.0, 0.0, 0.0, 0.0);
        let before = *kf.state();
        let err = kf.update(&StateVec::new(f64::NAN, 0.0, 0.0, 0.0), 1.0);
        assert!(err.is_err());
        assert_eq!(*kf.state(), before);
    }
}
