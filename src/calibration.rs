use log::info;

use crate::types::Vec3;

/// Static accelerometer bias from a batch of resting samples.
///
/// Assumes the device lies with its z-axis vertical, so gravity is removed
/// from the z component of the mean. Gyro bias is not estimated.
#[derive(Clone, Debug)]
pub struct BiasCalibrator {
    accumulator: Vec<Vec3>,
    required: usize,
    gravity: f64,
}

impl BiasCalibrator {
    pub fn new(required: usize, gravity: f64) -> Self {
        Self {
            accumulator: Vec::with_capacity(required),
            required,
            gravity,
        }
    }

    /// Add a resting sample. Returns the bias once enough samples are in;
    /// the buffer is cleared at that point.
    pub fn accumulate(&mut self, accel: Vec3) -> Option<Vec3> {
        self.accumulator.push(accel);
        if self.accumulator.len() < self.required {
            return None;
        }

        let n = self.accumulator.len() as f64;
        let mean = self.accumulator.iter().fold(Vec3::zeros(), |acc, s| acc + s) / n;
        let bias = Vec3::new(mean.x, mean.y, mean.z - self.gravity);
        self.accumulator.clear();

        info!(
            "Accelerometer bias calibrated from {} samples: ({:.4}, {:.4}, {:.4})",
            n, bias.x, bias.y, bias.z
        );
        Some(bias)
    }

    pub fn reset(&mut self) {
        self.accumulator.clear();
    }

    pub fn collected(&self) -> usize {
        self.accumulator.len()
    }

    pub fn required(&self) -> usize {
        self.required
    }
}
