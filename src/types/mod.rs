pub mod linalg;

pub use linalg::*;

use serde::Deserialize;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SampleKind {
    Gyroscope,
    Accelerometer,
    Magnetometer,
}

/// One 3-axis reading, tagged by the sensor that produced it.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum SensorSample {
    /// Angular velocity (rad/s)
    Gyroscope(Vec3),
    /// Specific force including gravity (m/s²)
    Accelerometer(Vec3),
    /// Magnetic field (µT); accepted but unused
    Magnetometer(Vec3),
}

impl SensorSample {
    pub fn new(kind: SampleKind, x: f64, y: f64, z: f64) -> Self {
        let v = Vec3::new(x, y, z);
        match kind {
            SampleKind::Gyroscope => SensorSample::Gyroscope(v),
            SampleKind::Accelerometer => SensorSample::Accelerometer(v),
            SampleKind::Magnetometer => SensorSample::Magnetometer(v),
        }
    }

    pub fn kind(&self) -> SampleKind {
        match self {
            SensorSample::Gyroscope(_) => SampleKind::Gyroscope,
            SensorSample::Accelerometer(_) => SampleKind::Accelerometer,
            SensorSample::Magnetometer(_) => SampleKind::Magnetometer,
        }
    }

    pub fn vector(&self) -> &Vec3 {
        match self {
            SensorSample::Gyroscope(v)
            | SensorSample::Accelerometer(v)
            | SensorSample::Magnetometer(v) => v,
        }
    }

    pub fn is_finite(&self) -> bool {
        self.vector().iter().all(|c| c.is_finite())
    }
}

// Recorded-session payloads. Timestamps live on the enclosing reading.

#[derive(Clone, Debug, Deserialize)]
pub struct AccelData {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

#[derive(Clone, Debug, Deserialize)]
pub struct GyroData {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

#[derive(Clone, Debug, Deserialize)]
pub struct MagData {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl From<&AccelData> for SensorSample {
    fn from(a: &AccelData) -> Self {
        SensorSample::Accelerometer(Vec3::new(a.x, a.y, a.z))
    }
}

impl From<&GyroData> for SensorSample {
    fn from(g: &GyroData) -> Self {
        SensorSample::Gyroscope(Vec3::new(g.x, g.y, g.z))
    }
}

impl From<&MagData> for SensorSample {
    fn from(m: &MagData) -> Self {
        SensorSample::Magnetometer(Vec3::new(m.x, m.y, m.z))
    }
}
