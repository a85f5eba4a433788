use std::f64::consts::PI;

use crate::types::Vec3;

/// Wrap an angle into [-π, π].
pub fn wrap_angle(mut angle: f64) -> f64 {
    while angle > PI {
        angle -= 2.0 * PI;
    }
    while angle < -PI {
        angle += 2.0 * PI;
    }
    angle
}

/// Euler angles from direct gyro integration (no accel/mag correction).
#[derive(Clone, Debug, Default)]
pub struct OrientationIntegrator {
    angles: Vec3,
}

impl OrientationIntegrator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn integrate(&mut self, angular_velocity: &Vec3, dt: f64) {
        self.angles += angular_velocity * dt;
        self.angles.apply(|a| *a = wrap_angle(*a));
    }

    pub fn angles(&self) -> &Vec3 {
        &self.angles
    }
}
