//! State estimation filters
//!
//! A single linear Kalman filter drives the accelerometer path of the tracker.

pub mod kalman;

pub use kalman::{CovarianceUpdate, KalmanConfig, KalmanFilter, OutputChannel};
