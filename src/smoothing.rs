use crate::types::Vec3;

/// Exponential low-pass over a 3-axis signal.
///
/// `output = output * (1 - alpha) + input * alpha`, starting from zero.
#[derive(Clone, Debug)]
pub struct LowPassFilter {
    alpha: f64,
    last_output: Vec3,
}

impl LowPassFilter {
    pub fn new(alpha: f64) -> Self {
        LowPassFilter {
            alpha,
            last_output: Vec3::zeros(),
        }
    }

    /// Feed one value, return the smoothed output
    pub fn update(&mut self, input: &Vec3) -> Vec3 {
        self.last_output = self.last_output * (1.0 - self.alpha) + input * self.alpha;
        self.last_output
    }

    pub fn output(&self) -> &Vec3 {
        &self.last_output
    }

    pub fn reset(&mut self) {
        self.last_output = Vec3::zeros();
    }
}

/// Consumer-side velocity smoothing from raw accelerometer x/y.
///
/// Layered on top of the tracker's own integration: the raw horizontal
/// components replace velocity x/y, then the result is blended with the
/// prior velocity. z is left alone.
#[derive(Clone, Copy, Debug)]
pub struct RawVelocityBlend {
    alpha: f64,
}

impl RawVelocityBlend {
    pub fn new(alpha: f64) -> Self {
        RawVelocityBlend { alpha }
    }

    pub fn apply(&self, velocity: &mut Vec3, raw_accel: &Vec3) {
        let prior = *velocity;
        let candidate = Vec3::new(raw_accel.x, raw_accel.y, prior.z);
        *velocity = candidate * self.alpha + prior * (1.0 - self.alpha);
    }
}
