use crate::types::Vec3;

/// Velocity and position from filtered acceleration.
///
/// Gravity is removed as a fixed world-frame vector; the device is assumed
/// level. Velocity is damped every update and snapped to zero below
/// `zero_threshold` to stop drift while standing still.
#[derive(Clone, Debug)]
pub struct DeadReckoning {
    position: Vec3,
    velocity: Vec3,
    gravity: Vec3,
    damping: f64,
    zero_threshold: f64,
}

impl DeadReckoning {
    pub fn new(gravity: f64, damping: f64, zero_threshold: f64) -> Self {
        Self {
            position: Vec3::zeros(),
            velocity: Vec3::zeros(),
            gravity: Vec3::new(0.0, 0.0, gravity),
            damping,
            zero_threshold,
        }
    }

    pub fn integrate(&mut self, accel: &Vec3, dt: f64) {
        let linear = accel - self.gravity;
        self.velocity += linear * dt;
        self.velocity *= self.damping;

        // ZUPT-style drift suppression
        if self.velocity.norm() < self.zero_threshold {
            self.velocity = Vec3::zeros();
        }

        self.position += self.velocity * dt;
    }

    pub fn reset_velocity(&mut self) {
        self.velocity = Vec3::zeros();
    }

    pub fn position(&self) -> &Vec3 {
        &self.position
    }

    pub fn velocity(&self) -> &Vec3 {
        &self.velocity
    }

    pub fn velocity_mut(&mut self) -> &mut Vec3 {
        &mut self.velocity
    }
}
