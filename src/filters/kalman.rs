//! 3-state constant-acceleration Kalman filter
//!
//! The state is a packed 3×3 matrix rather than three independent 1-D filters.
//! Rows follow the kinematic chain [position, velocity, acceleration]; the
//! measurement matrix is the identity, so each sample enters as diag(x, y, z).
//!
//! Predict:  X = F·X,  P = F·P·Fᵀ + Q
//! Update:   Y = Z − H·X,  S = H·P·Hᵀ + R,  K = P·Hᵀ·S⁻¹,  X = X + K·Y
//!
//! Q and R are fixed at construction. Only F, X and P change per step.

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::types::{Matrix3, Vec3};

/// What happens to the covariance after the state update.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CovarianceUpdate {
    /// Covariance only grows through prediction; measurements never shrink it.
    #[default]
    PredictOnly,
    /// P = (I − K·H)·P after every update.
    Contracting,
}

/// Which entries of the state matrix form the filter output.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputChannel {
    /// (X[0][0], X[1][0], X[2][0])
    #[default]
    FirstColumn,
    /// (X[0][0], X[1][1], X[2][2]), each axis read from its own column
    Diagonal,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct KalmanConfig {
    pub process_noise: Matrix3,
    pub measurement_noise: Matrix3,
    pub covariance_update: CovarianceUpdate,
    pub output: OutputChannel,
}

impl Default for KalmanConfig {
    fn default() -> Self {
        Self {
            process_noise: Matrix3::identity().scale(0.01),
            measurement_noise: Matrix3::identity().scale(0.1),
            covariance_update: CovarianceUpdate::default(),
            output: OutputChannel::default(),
        }
    }
}

pub struct KalmanFilter {
    config: KalmanConfig,
    state: Matrix3,
    covariance: Matrix3,
    transition: Matrix3,
    measurement_matrix: Matrix3,
}

impl KalmanFilter {
    pub fn new(config: KalmanConfig) -> Self {
        Self {
            config,
            state: Matrix3::zeros(),
            covariance: Matrix3::identity(),
            transition: Matrix3::identity(),
            measurement_matrix: Matrix3::identity(),
        }
    }

    /// Constant-acceleration transition for a given time step.
    pub fn transition_for(dt: f64) -> Result<Matrix3> {
        let mut f = Matrix3::identity();
        Self::write_transition(&mut f, dt)?;
        Ok(f)
    }

    fn write_transition(f: &mut Matrix3, dt: f64) -> Result<()> {
        f.set(0, 1, dt)?;
        f.set(0, 2, 0.5 * dt * dt)?;
        f.set(1, 2, dt)?;
        Ok(())
    }

    /// Run one predict + update cycle.
    ///
    /// A singular innovation covariance aborts the update: the predicted
    /// state and covariance are kept and the error goes back to the caller.
    pub fn step(&mut self, measurement: &Vec3, dt: f64) -> Result<Vec3> {
        Self::write_transition(&mut self.transition, dt)?;
        let f = self.transition;
        let f_t = f.transpose();

        // Predict
        self.state = f.multiply(&self.state);
        self.covariance = f
            .multiply(&self.covariance)
            .multiply(&f_t)
            .add(&self.config.process_noise);

        // Update
        let h = self.measurement_matrix;
        let h_t = h.transpose();
        let z = Matrix3::from_diagonal(measurement);
        let innovation = z.subtract(&h.multiply(&self.state));
        let s = h
            .multiply(&self.covariance)
            .multiply(&h_t)
            .add(&self.config.measurement_noise);
        let gain = self.covariance.multiply(&h_t).multiply(&s.inverse()?);

        self.state = self.state.add(&gain.multiply(&innovation));

        if self.config.covariance_update == CovarianceUpdate::Contracting {
            let i_kh = Matrix3::identity().subtract(&gain.multiply(&h));
            self.covariance = i_kh.multiply(&self.covariance);
        }

        self.output()
    }

    fn output(&self) -> Result<Vec3> {
        match self.config.output {
            OutputChannel::FirstColumn => self.state.column(0),
            OutputChannel::Diagonal => Ok(self.state.diagonal()),
        }
    }

    pub fn state(&self) -> &Matrix3 {
        &self.state
    }

    pub fn covariance(&self) -> &Matrix3 {
        &self.covariance
    }

    pub fn transition(&self) -> &Matrix3 {
        &self.transition
    }
}
