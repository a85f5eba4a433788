// motion_tracker.rs: pure computation layer for the inertial tracker
//
// Nothing in this module touches sensors, threads, files or the clock of the
// host beyond a monotonic `Instant` used to stamp untimed samples.
// Samples go in one at a time, the public estimate is updated in place.
//
//   raw sample → bias correction / range gate
//     gyro:  direct integration → orientation
//     accel: Kalman → low-pass → step detector + dead reckoning

use std::time::Instant;

use log::{debug, trace, warn};
use serde::{Deserialize, Serialize};

use crate::calibration::BiasCalibrator;
use crate::dead_reckoning::DeadReckoning;
use crate::error::{Result, TrackerError};
use crate::filters::kalman::{KalmanConfig, KalmanFilter};
use crate::orientation::OrientationIntegrator;
use crate::pedometer::StepDetector;
use crate::smoothing::LowPassFilter;
use crate::types::{vec3_tuple, SampleKind, SensorSample, Vec3};

// ─── Configuration ───────────────────────────────────────────────────────────

/// How the integration step is chosen for each sample.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum TimeStep {
    /// Same dt for every sample regardless of arrival time.
    Fixed { dt: f64 },
    /// Time since the previous sample of the same kind. `fallback_dt` covers
    /// the first sample and deltas that are non-positive or longer than
    /// `max_gap_secs`.
    Measured { fallback_dt: f64, max_gap_secs: f64 },
}

impl TimeStep {
    pub fn resolve(&self, previous: Option<f64>, now: f64) -> f64 {
        match *self {
            TimeStep::Fixed { dt } => dt,
            TimeStep::Measured {
                fallback_dt,
                max_gap_secs,
            } => match previous {
                Some(prev) if now - prev > 0.0 && now - prev <= max_gap_secs => now - prev,
                _ => fallback_dt,
            },
        }
    }
}

impl Default for TimeStep {
    fn default() -> Self {
        TimeStep::Fixed { dt: 0.01 }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackerConfig {
    // ── Calibration ──
    pub calibration_samples: usize,
    pub gravity: f64,

    // ── Validity gates ──
    pub max_angular_velocity: f64,
    pub max_acceleration: f64,

    // ── Step detection ──
    pub step_threshold: f64,
    pub step_min_interval_secs: f64,

    // ── Smoothing ──
    pub accel_lpf_alpha: f64,
    pub raw_velocity_alpha: f64,

    // ── Dead reckoning ──
    pub velocity_damping: f64,
    pub velocity_zero_threshold: f64,

    pub time_step: TimeStep,
    pub kalman: KalmanConfig,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            calibration_samples: 100,
            gravity: 9.81,
            max_angular_velocity: 20.0,
            max_acceleration: 50.0,
            step_threshold: 10.0,
            step_min_interval_secs: 0.25,
            accel_lpf_alpha: 0.1,
            raw_velocity_alpha: 0.8,
            velocity_damping: 0.98,
            velocity_zero_threshold: 0.01,
            time_step: TimeStep::default(),
            kalman: KalmanConfig::default(),
        }
    }
}

impl TrackerConfig {
    pub fn validate(&self) -> Result<()> {
        fn invalid(msg: String) -> Result<()> {
            Err(TrackerError::InvalidConfig(msg))
        }

        if self.calibration_samples == 0 {
            return invalid("calibration_samples must be at least 1".into());
        }
        if !self.gravity.is_finite() {
            return invalid(format!("gravity must be finite, got {}", self.gravity));
        }
        for (name, value) in [
            ("max_angular_velocity", self.max_angular_velocity),
            ("max_acceleration", self.max_acceleration),
            ("step_threshold", self.step_threshold),
        ] {
            if !(value > 0.0) {
                return invalid(format!("{} must be positive, got {}", name, value));
            }
        }
        if !(self.step_min_interval_secs >= 0.0) {
            return invalid(format!(
                "step_min_interval_secs must be non-negative, got {}",
                self.step_min_interval_secs
            ));
        }
        for (name, value) in [
            ("accel_lpf_alpha", self.accel_lpf_alpha),
            ("raw_velocity_alpha", self.raw_velocity_alpha),
            ("velocity_damping", self.velocity_damping),
        ] {
            if !(value > 0.0 && value <= 1.0) {
                return invalid(format!("{} must be in (0, 1], got {}", name, value));
            }
        }
        if !(self.velocity_zero_threshold >= 0.0) {
            return invalid(format!(
                "velocity_zero_threshold must be non-negative, got {}",
                self.velocity_zero_threshold
            ));
        }
        match self.time_step {
            TimeStep::Fixed { dt } if !(dt > 0.0) => {
                invalid(format!("fixed dt must be positive, got {}", dt))
            }
            TimeStep::Measured {
                fallback_dt,
                max_gap_secs,
            } if !(fallback_dt > 0.0 && max_gap_secs > 0.0) => invalid(format!(
                "measured time step needs positive fallback_dt and max_gap_secs, got {} / {}",
                fallback_dt, max_gap_secs
            )),
            _ => Ok(()),
        }
    }
}

// ─── Outcomes ────────────────────────────────────────────────────────────────

/// What a single sample did to the tracker.
#[derive(Clone, Debug, PartialEq)]
pub enum SampleOutcome {
    /// Non-finite, not accepted in the current phase, or a magnetometer reading.
    Ignored,
    Calibrating { collected: usize, required: usize },
    CalibrationComplete { accel_bias: Vec3 },
    /// Bias-corrected magnitude above the plausibility limit.
    Rejected {
        kind: SampleKind,
        magnitude: f64,
        limit: f64,
    },
    OrientationUpdated,
    MotionUpdated { step_detected: bool },
    /// Processing failed; velocity and low-pass memory were reset.
    Recovered(TrackerError),
}

// ─── Output snapshot ─────────────────────────────────────────────────────────

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TrackerSnapshot {
    pub step_count: u64,
    pub position: (f64, f64, f64),
    pub velocity: (f64, f64, f64),
    pub orientation: (f64, f64, f64),
    pub accel_bias: (f64, f64, f64),
    pub gyro_bias: (f64, f64, f64),
    pub filtered_accel: (f64, f64, f64),
    pub calibrated: bool,
    pub last_step_time: Option<f64>,
}

// ─── The tracker ─────────────────────────────────────────────────────────────

pub struct MotionTracker {
    config: TrackerConfig,

    kalman: KalmanFilter,
    accel_lpf: LowPassFilter,
    step_detector: StepDetector,
    dead_reckoning: DeadReckoning,
    orientation: OrientationIntegrator,

    // Calibration
    calibrator: BiasCalibrator,
    accel_bias: Vec3,
    gyro_bias: Vec3,
    calibrated: bool,

    // Timing
    clock: Instant,
    last_accel_ts: Option<f64>,
    last_gyro_ts: Option<f64>,
}

impl MotionTracker {
    /// Build a tracker from `config`. Construction does not validate; configs
    /// from untrusted sources should go through [`TrackerConfig::validate`]
    /// first.
    pub fn new(config: TrackerConfig) -> Self {
        debug_assert!(config.validate().is_ok(), "invalid tracker config");
        Self {
            kalman: KalmanFilter::new(config.kalman.clone()),
            accel_lpf: LowPassFilter::new(config.accel_lpf_alpha),
            step_detector: StepDetector::new(config.step_threshold, config.step_min_interval_secs),
            dead_reckoning: DeadReckoning::new(
                config.gravity,
                config.velocity_damping,
                config.velocity_zero_threshold,
            ),
            orientation: OrientationIntegrator::new(),
            calibrator: BiasCalibrator::new(config.calibration_samples, config.gravity),
            accel_bias: Vec3::zeros(),
            // Never estimated from data
            gyro_bias: Vec3::zeros(),
            calibrated: false,
            clock: Instant::now(),
            last_accel_ts: None,
            last_gyro_ts: None,
            config,
        }
    }

    // ── Sample feeds ─────────────────────────────────────────────────────

    /// Feed a sample stamped with the tracker's monotonic clock.
    pub fn process_sample(&mut self, sample: SensorSample) -> SampleOutcome {
        let now = self.clock.elapsed().as_secs_f64();
        self.process_sample_at(sample, now)
    }

    /// Feed a sample with a host-supplied timestamp in seconds.
    pub fn process_sample_at(&mut self, sample: SensorSample, timestamp: f64) -> SampleOutcome {
        if !sample.is_finite() || !timestamp.is_finite() {
            trace!(
                "Dropping non-finite {:?} sample (t={})",
                sample.kind(),
                timestamp
            );
            return SampleOutcome::Ignored;
        }

        match self.dispatch(sample, timestamp) {
            Ok(outcome) => outcome,
            Err(e) => {
                warn!(
                    "{:?} sample at t={:.3}s failed ({}), resetting velocity",
                    sample.kind(),
                    timestamp,
                    e
                );
                self.reset_motion();
                SampleOutcome::Recovered(e)
            }
        }
    }

    /// Drop the bias and start collecting calibration samples again.
    /// Position, orientation and step count are kept.
    pub fn recalibrate(&mut self) {
        debug!(
            "Recalibration requested after {} steps",
            self.step_detector.count()
        );
        self.calibrated = false;
        self.calibrator.reset();
        self.reset_motion();
    }

    fn dispatch(&mut self, sample: SensorSample, timestamp: f64) -> Result<SampleOutcome> {
        match (self.calibrated, sample) {
            (false, SensorSample::Accelerometer(accel)) => Ok(self.calibrate(accel)),
            (false, _) => Ok(SampleOutcome::Ignored),
            (true, SensorSample::Gyroscope(gyro)) => Ok(self.process_gyro(gyro, timestamp)),
            (true, SensorSample::Accelerometer(accel)) => self.process_accel(accel, timestamp),
            // Reserved for heading correction
            (true, SensorSample::Magnetometer(_)) => Ok(SampleOutcome::Ignored),
        }
    }

    fn calibrate(&mut self, accel: Vec3) -> SampleOutcome {
        match self.calibrator.accumulate(accel) {
            Some(bias) => {
                self.accel_bias = bias;
                self.calibrated = true;
                SampleOutcome::CalibrationComplete { accel_bias: bias }
            }
            None => SampleOutcome::Calibrating {
                collected: self.calibrator.collected(),
                required: self.calibrator.required(),
            },
        }
    }

    fn process_gyro(&mut self, gyro: Vec3, timestamp: f64) -> SampleOutcome {
        let dt = self.config.time_step.resolve(self.last_gyro_ts, timestamp);
        self.last_gyro_ts = Some(timestamp);

        let corrected = gyro - self.gyro_bias;
        let magnitude = corrected.norm();
        if magnitude > self.config.max_angular_velocity {
            trace!("Gyro magnitude {:.2} rad/s out of range", magnitude);
            return SampleOutcome::Rejected {
                kind: SampleKind::Gyroscope,
                magnitude,
                limit: self.config.max_angular_velocity,
            };
        }

        self.orientation.integrate(&corrected, dt);
        SampleOutcome::OrientationUpdated
    }

    fn process_accel(&mut self, accel: Vec3, timestamp: f64) -> Result<SampleOutcome> {
        let dt = self.config.time_step.resolve(self.last_accel_ts, timestamp);
        self.last_accel_ts = Some(timestamp);

        let corrected = accel - self.accel_bias;
        let magnitude = corrected.norm();
        if magnitude > self.config.max_acceleration {
            trace!("Accel magnitude {:.2} m/s² out of range", magnitude);
            return Ok(SampleOutcome::Rejected {
                kind: SampleKind::Accelerometer,
                magnitude,
                limit: self.config.max_acceleration,
            });
        }

        let estimate = self.kalman.step(&corrected, dt)?;
        let filtered = self.accel_lpf.update(&estimate);

        let step = self.step_detector.detect(filtered.norm(), timestamp);
        if let Some(ref step) = step {
            debug!(
                "Step {} at t={:.3}s (|a|={:.2})",
                step.count, step.timestamp, step.magnitude
            );
        }

        self.dead_reckoning.integrate(&filtered, dt);

        Ok(SampleOutcome::MotionUpdated {
            step_detected: step.is_some(),
        })
    }

    fn reset_motion(&mut self) {
        self.dead_reckoning.reset_velocity();
        self.accel_lpf.reset();
    }

    // ── Queries ──────────────────────────────────────────────────────────

    pub fn step_count(&self) -> u64 {
        self.step_detector.count()
    }

    pub fn position(&self) -> &Vec3 {
        self.dead_reckoning.position()
    }

    pub fn velocity(&self) -> &Vec3 {
        self.dead_reckoning.velocity()
    }

    /// Mutable velocity for host-side smoothing layered on the tracker's own.
    pub fn velocity_mut(&mut self) -> &mut Vec3 {
        self.dead_reckoning.velocity_mut()
    }

    pub fn orientation(&self) -> &Vec3 {
        self.orientation.angles()
    }

    pub fn is_calibrated(&self) -> bool {
        self.calibrated
    }

    pub fn accel_bias(&self) -> &Vec3 {
        &self.accel_bias
    }

    pub fn gyro_bias(&self) -> &Vec3 {
        &self.gyro_bias
    }

    pub fn filtered_accel(&self) -> &Vec3 {
        self.accel_lpf.output()
    }

    /// (collected, required) calibration samples.
    pub fn calibration_progress(&self) -> (usize, usize) {
        (self.calibrator.collected(), self.calibrator.required())
    }

    pub fn config(&self) -> &TrackerConfig {
        &self.config
    }

    pub fn snapshot(&self) -> TrackerSnapshot {
        TrackerSnapshot {
            step_count: self.step_count(),
            position: vec3_tuple(self.position()),
            velocity: vec3_tuple(self.velocity()),
            orientation: vec3_tuple(self.orientation()),
            accel_bias: vec3_tuple(&self.accel_bias),
            gyro_bias: vec3_tuple(&self.gyro_bias),
            filtered_accel: vec3_tuple(self.filtered_accel()),
            calibrated: self.calibrated,
            last_step_time: self.step_detector.last_step_time(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filters::kalman::OutputChannel;
    use crate::smoothing::RawVelocityBlend;
    use crate::types::Matrix3;
    use approx::assert_abs_diff_eq;
    use std::f64::consts::PI;

    const SAMPLE_PERIOD: f64 = 0.02;

    fn accel(x: f64, y: f64, z: f64) -> SensorSample {
        SensorSample::Accelerometer(Vec3::new(x, y, z))
    }

    fn gyro(x: f64, y: f64, z: f64) -> SensorSample {
        SensorSample::Gyroscope(Vec3::new(x, y, z))
    }

    /// Feed resting samples until calibrated; returns the next free timestamp.
    fn calibrate(tracker: &mut MotionTracker) -> f64 {
        let mut t = 0.0;
        for _ in 0..tracker.config().calibration_samples {
            tracker.process_sample_at(accel(0.0, 0.0, 9.81), t);
            t += SAMPLE_PERIOD;
        }
        assert!(tracker.is_calibrated());
        t
    }

    fn calibrated_tracker(config: TrackerConfig) -> (MotionTracker, f64) {
        let mut tracker = MotionTracker::new(config);
        let t = calibrate(&mut tracker);
        (tracker, t)
    }

    #[test]
    fn test_calibration_with_noise() {
        let mut tracker = MotionTracker::new(TrackerConfig::default());
        for i in 0..99 {
            let noise = 0.05 * ((i % 7) as f64 - 3.0) / 3.0;
            let outcome = tracker.process_sample_at(
                accel(noise, -noise, 9.81 + noise),
                i as f64 * SAMPLE_PERIOD,
            );
            assert_eq!(
                outcome,
                SampleOutcome::Calibrating {
                    collected: i + 1,
                    required: 100
                }
            );
        }
        assert!(!tracker.is_calibrated());

        let outcome = tracker.process_sample_at(accel(0.0, 0.0, 9.81), 2.0);
        assert!(matches!(outcome, SampleOutcome::CalibrationComplete { .. }));
        assert!(tracker.is_calibrated());
        assert_abs_diff_eq!(*tracker.accel_bias(), Vec3::zeros(), epsilon = 0.01);
        assert_eq!(*tracker.gyro_bias(), Vec3::zeros());
        assert_eq!(tracker.calibration_progress(), (0, 100));
    }

    #[test]
    fn test_uncalibrated_ignores_gyro_and_mag() {
        let mut tracker = MotionTracker::new(TrackerConfig::default());
        assert_eq!(
            tracker.process_sample_at(gyro(1.0, 1.0, 1.0), 0.0),
            SampleOutcome::Ignored
        );
        assert_eq!(
            tracker.process_sample_at(SensorSample::Magnetometer(Vec3::new(20.0, 0.0, 40.0)), 0.0),
            SampleOutcome::Ignored
        );
        assert_eq!(*tracker.orientation(), Vec3::zeros());
        assert_eq!(tracker.calibration_progress(), (0, 100));
    }

    #[test]
    fn test_non_finite_is_noop() {
        let mut tracker = MotionTracker::new(TrackerConfig::default());
        assert_eq!(
            tracker.process_sample_at(accel(f64::NAN, 0.0, 9.81), 0.0),
            SampleOutcome::Ignored
        );
        assert_eq!(tracker.calibration_progress().0, 0);

        let (mut tracker, t) = calibrated_tracker(TrackerConfig::default());
        assert_eq!(
            tracker.process_sample_at(gyro(f64::INFINITY, 0.0, 0.0), t),
            SampleOutcome::Ignored
        );
        assert_eq!(*tracker.orientation(), Vec3::zeros());
    }

    #[test]
    fn test_gyro_out_of_range_discarded() {
        let (mut tracker, t) = calibrated_tracker(TrackerConfig::default());
        let outcome = tracker.process_sample_at(gyro(15.0, 15.0, 0.0), t);
        assert!(matches!(
            outcome,
            SampleOutcome::Rejected {
                kind: SampleKind::Gyroscope,
                ..
            }
        ));
        assert_eq!(*tracker.orientation(), Vec3::zeros());
    }

    #[test]
    fn test_accel_out_of_range_discarded() {
        let (mut tracker, t) = calibrated_tracker(TrackerConfig::default());
        let outcome = tracker.process_sample_at(accel(60.0, 0.0, 9.81), t);
        assert!(matches!(
            outcome,
            SampleOutcome::Rejected {
                kind: SampleKind::Accelerometer,
                ..
            }
        ));
        assert_eq!(*tracker.filtered_accel(), Vec3::zeros());
        assert_eq!(*tracker.velocity(), Vec3::zeros());
        assert_eq!(*tracker.kalman.state(), Matrix3::zeros());
    }

    #[test]
    fn test_fixed_dt_ignores_sample_spacing() {
        let (mut tracker, t) = calibrated_tracker(TrackerConfig::default());
        tracker.process_sample_at(gyro(1.0, 0.0, 0.0), t);
        tracker.process_sample_at(gyro(1.0, 0.0, 0.0), t + 1.0);
        assert_abs_diff_eq!(tracker.orientation().x, 0.02, epsilon = 1e-12);
    }

    #[test]
    fn test_measured_dt_uses_sample_spacing() {
        let config = TrackerConfig {
            time_step: TimeStep::Measured {
                fallback_dt: 0.01,
                max_gap_secs: 1.0,
            },
            ..TrackerConfig::default()
        };
        let (mut tracker, t) = calibrated_tracker(config);
        tracker.process_sample_at(gyro(1.0, 0.0, 0.0), t); // fallback
        tracker.process_sample_at(gyro(1.0, 0.0, 0.0), t + 0.05);
        tracker.process_sample_at(gyro(1.0, 0.0, 0.0), t + 5.0); // gap too long
        assert_abs_diff_eq!(tracker.orientation().x, 0.07, epsilon = 1e-9);
    }

    #[test]
    fn test_time_step_resolve() {
        let measured = TimeStep::Measured {
            fallback_dt: 0.01,
            max_gap_secs: 1.0,
        };
        assert_eq!(measured.resolve(None, 3.0), 0.01);
        assert_eq!(measured.resolve(Some(3.0), 3.0), 0.01);
        assert_eq!(measured.resolve(Some(3.5), 3.0), 0.01);
        assert_abs_diff_eq!(measured.resolve(Some(3.0), 3.25), 0.25, epsilon = 1e-12);
        assert_eq!(TimeStep::default().resolve(Some(0.0), 10.0), 0.01);
    }

    #[test]
    fn test_orientation_wraps_through_tracker() {
        let (mut tracker, mut t) = calibrated_tracker(TrackerConfig::default());
        for _ in 0..40 {
            tracker.process_sample_at(gyro(10.0, 0.0, 0.0), t);
            t += SAMPLE_PERIOD;
        }
        let x = tracker.orientation().x;
        assert!((-PI..=PI).contains(&x));
        assert_abs_diff_eq!(x, 4.0 - 2.0 * PI, epsilon = 1e-9);
    }

    #[test]
    fn test_non_finite_timestamp_is_noop() {
        let (mut tracker, mut t) = calibrated_tracker(TrackerConfig::default());
        while tracker.step_count() == 0 {
            tracker.process_sample_at(accel(16.0, 0.0, 9.81), t);
            t += SAMPLE_PERIOD;
            assert!(t < 10.0, "no step detected");
        }
        let before = tracker.snapshot();

        for ts in [f64::NAN, f64::INFINITY, f64::NEG_INFINITY] {
            assert_eq!(
                tracker.process_sample_at(accel(16.0, 0.0, 9.81), ts),
                SampleOutcome::Ignored
            );
            assert_eq!(
                tracker.process_sample_at(gyro(1.0, 0.0, 0.0), ts),
                SampleOutcome::Ignored
            );
        }

        let after = tracker.snapshot();
        assert_eq!(after.step_count, before.step_count);
        assert_eq!(after.last_step_time, before.last_step_time);
        assert_eq!(after.filtered_accel, before.filtered_accel);
        assert_eq!(after.velocity, before.velocity);
        assert_eq!(after.orientation, before.orientation);

        // The refractory window still runs from the last real step
        let last = before.last_step_time.unwrap();
        for i in 1..=10 {
            tracker.process_sample_at(accel(16.0, 0.0, 9.81), last + 0.001 * i as f64);
        }
        assert_eq!(tracker.step_count(), before.step_count);
    }

    #[test]
    fn test_walking_bursts_count_steps() {
        let (mut tracker, mut t) = calibrated_tracker(TrackerConfig::default());
        let mut detected = 0;
        for _ in 0..6 {
            for _ in 0..15 {
                if let SampleOutcome::MotionUpdated { step_detected: true } =
                    tracker.process_sample_at(accel(16.0, 0.0, 9.81), t)
                {
                    detected += 1;
                }
                t += SAMPLE_PERIOD;
            }
            for _ in 0..15 {
                tracker.process_sample_at(accel(0.0, 0.0, 9.81), t);
                t += SAMPLE_PERIOD;
            }
        }
        assert_eq!(tracker.step_count(), 6);
        assert_eq!(detected, 6);
        assert!(tracker.snapshot().last_step_time.is_some());
    }

    #[test]
    fn test_resting_velocity_settles_to_zero() {
        // Per-axis output keeps gravity on z, so the resting residual is tiny
        let mut config = TrackerConfig::default();
        config.kalman.output = OutputChannel::Diagonal;
        let (mut tracker, mut t) = calibrated_tracker(config);
        for _ in 0..1000 {
            tracker.process_sample_at(accel(0.0, 0.0, 9.81), t);
            t += SAMPLE_PERIOD;
        }
        assert_eq!(*tracker.velocity(), Vec3::zeros());
        assert_eq!(tracker.step_count(), 0);
    }

    #[test]
    fn test_recalibrate_keeps_track() {
        let (mut tracker, mut t) = calibrated_tracker(TrackerConfig::default());
        for _ in 0..60 {
            tracker.process_sample_at(gyro(0.0, 0.0, 1.0), t);
            tracker.process_sample_at(accel(15.0, 0.0, 9.81), t);
            t += SAMPLE_PERIOD;
        }
        let position = *tracker.position();
        let orientation = *tracker.orientation();
        let steps = tracker.step_count();
        assert!(position.norm() > 0.0);
        assert!(orientation.z > 0.0);
        assert!(steps > 0);
        assert!(tracker.velocity().norm() > 0.0);

        tracker.recalibrate();

        assert!(!tracker.is_calibrated());
        assert_eq!(*tracker.velocity(), Vec3::zeros());
        assert_eq!(*tracker.filtered_accel(), Vec3::zeros());
        assert_eq!(*tracker.position(), position);
        assert_eq!(*tracker.orientation(), orientation);
        assert_eq!(tracker.step_count(), steps);
        assert_eq!(tracker.calibration_progress(), (0, 100));

        // Gyro is ignored until calibration completes again
        tracker.process_sample_at(gyro(0.0, 0.0, 1.0), t);
        assert_eq!(*tracker.orientation(), orientation);
        calibrate(&mut tracker);
    }

    #[test]
    fn test_singular_gain_recovers() {
        // R = −(F·Fᵀ + Q) makes the first innovation covariance exactly zero
        let f = KalmanFilter::transition_for(0.01).unwrap();
        let q = Matrix3::identity();
        let mut config = TrackerConfig::default();
        config.kalman.process_noise = q;
        config.kalman.measurement_noise =
            Matrix3::zeros().subtract(&f.multiply(&f.transpose()).add(&q));

        let (mut tracker, t) = calibrated_tracker(config);
        tracker.process_sample_at(gyro(0.0, 0.0, 2.0), t);
        *tracker.velocity_mut() = Vec3::new(1.0, 2.0, 0.0);
        let orientation = *tracker.orientation();

        let outcome = tracker.process_sample_at(accel(1.0, 0.0, 9.81), t + SAMPLE_PERIOD);
        assert!(matches!(
            outcome,
            SampleOutcome::Recovered(TrackerError::SingularMatrix { .. })
        ));
        assert_eq!(*tracker.velocity(), Vec3::zeros());
        assert_eq!(*tracker.filtered_accel(), Vec3::zeros());
        assert_eq!(*tracker.orientation(), orientation);
        assert!(tracker.is_calibrated());

        let outcome = tracker.process_sample_at(accel(1.0, 0.0, 9.81), t + 2.0 * SAMPLE_PERIOD);
        assert!(matches!(outcome, SampleOutcome::MotionUpdated { .. }));
    }

    #[test]
    fn test_magnetometer_has_no_effect() {
        let (mut tracker, t) = calibrated_tracker(TrackerConfig::default());
        let before = tracker.snapshot();
        let outcome =
            tracker.process_sample_at(SensorSample::Magnetometer(Vec3::new(22.0, -5.0, 41.0)), t);
        assert_eq!(outcome, SampleOutcome::Ignored);
        let after = tracker.snapshot();
        assert_eq!(before.position, after.position);
        assert_eq!(before.orientation, after.orientation);
        assert_eq!(before.velocity, after.velocity);
    }

    #[test]
    fn test_host_velocity_blend() {
        let (mut tracker, mut t) = calibrated_tracker(TrackerConfig::default());
        let blend = RawVelocityBlend::new(tracker.config().raw_velocity_alpha);
        let raw = Vec3::new(0.5, -0.5, 9.81);
        tracker.process_sample_at(SensorSample::Accelerometer(raw), t);
        t += SAMPLE_PERIOD;

        let prior = *tracker.velocity();
        blend.apply(tracker.velocity_mut(), &raw);
        let v = *tracker.velocity();
        assert_abs_diff_eq!(v.x, 0.5 * 0.8 + prior.x * 0.2, epsilon = 1e-12);
        assert_abs_diff_eq!(v.y, -0.5 * 0.8 + prior.y * 0.2, epsilon = 1e-12);
        assert_abs_diff_eq!(v.z, prior.z, epsilon = 1e-12);

        // The tracker keeps integrating from the blended velocity
        tracker.process_sample_at(SensorSample::Accelerometer(raw), t);
        assert_ne!(*tracker.velocity(), v);
    }

    #[test]
    fn test_process_sample_uses_internal_clock() {
        let mut tracker = MotionTracker::new(TrackerConfig::default());
        for _ in 0..100 {
            tracker.process_sample(accel(0.0, 0.0, 9.81));
        }
        assert!(tracker.is_calibrated());
        assert_eq!(
            tracker.process_sample(gyro(0.0, 1.0, 0.0)),
            SampleOutcome::OrientationUpdated
        );
        assert_abs_diff_eq!(tracker.orientation().y, 0.01, epsilon = 1e-12);
    }

    #[test]
    fn test_config_validation() {
        assert!(TrackerConfig::default().validate().is_ok());

        let bad = TrackerConfig {
            calibration_samples: 0,
            ..TrackerConfig::default()
        };
        assert!(matches!(bad.validate(), Err(TrackerError::InvalidConfig(_))));

        let bad = TrackerConfig {
            accel_lpf_alpha: 1.5,
            ..TrackerConfig::default()
        };
        assert!(bad.validate().is_err());

        let bad = TrackerConfig {
            time_step: TimeStep::Fixed { dt: 0.0 },
            ..TrackerConfig::default()
        };
        assert!(bad.validate().is_err());

        let bad = TrackerConfig {
            step_threshold: f64::NAN,
            ..TrackerConfig::default()
        };
        assert!(bad.validate().is_err());
    }

    #[test]
    #[cfg(debug_assertions)]
    #[should_panic(expected = "invalid tracker config")]
    fn test_new_rejects_invalid_config_in_debug() {
        let config: TrackerConfig = serde_json::from_str(r#"{ "accel_lpf_alpha": 5.0 }"#).unwrap();
        MotionTracker::new(config);
    }

    #[test]
    fn test_config_from_partial_json() {
        let config: TrackerConfig = serde_json::from_str(
            r#"{
                "calibration_samples": 50,
                "time_step": { "mode": "measured", "fallback_dt": 0.02, "max_gap_secs": 0.5 },
                "kalman": { "covariance_update": "contracting" }
            }"#,
        )
        .unwrap();
        assert_eq!(config.calibration_samples, 50);
        assert_eq!(config.step_threshold, 10.0);
        assert_eq!(
            config.time_step,
            TimeStep::Measured {
                fallback_dt: 0.02,
                max_gap_secs: 0.5
            }
        );
        assert_eq!(
            config.kalman.process_noise,
            KalmanConfig::default().process_noise
        );
        assert!(config.validate().is_ok());
    }
}
