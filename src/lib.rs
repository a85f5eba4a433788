pub mod calibration;
pub mod dead_reckoning;
pub mod error;
pub mod filters;
pub mod motion_tracker;
pub mod orientation;
pub mod pedometer;
pub mod smoothing;
pub mod types;

pub use error::{Result, TrackerError};
pub use filters::kalman::{CovarianceUpdate, KalmanConfig, KalmanFilter, OutputChannel};
pub use motion_tracker::{MotionTracker, SampleOutcome, TimeStep, TrackerConfig, TrackerSnapshot};
pub use smoothing::RawVelocityBlend;
pub use types::{Matrix3, SampleKind, SensorSample, Vec3};
