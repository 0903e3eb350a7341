#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// A single measurement of the T-mini Pro.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct LaserPoint {
    /// Beam angle in degrees, normalized to `0. <= angle < 360.`.
    pub angle: f64,
    /// Distance to the reflecting object in meters. Zero means no return.
    pub distance: f64,
    /// Return strength of the laser pulse (0-255 in 8 bit mode,
    /// 0-1023 in 10 bit mode).
    pub intensity: u16,
}

impl LaserPoint {
    /// Projects the polar measurement onto cartesian `(x, y)` coordinates
    /// in meters.
    pub fn to_cartesian(&self) -> (f64, f64) {
        let angle_radian = self.angle.to_radians();
        let x = self.distance * angle_radian.cos();
        let y = self.distance * angle_radian.sin();
        (x, y)
    }

    /// A point with zero distance is a no-return sample.
    pub fn is_valid(&self) -> bool {
        self.distance > 0.
    }
}

/// One full rotation of assembled lidar measurements.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct LaserScan {
    /// Measurements in acquisition order.
    pub points: Vec<LaserPoint>,
    /// Rotation frequency reported by the sensor in Hz.
    pub scan_frequency: f64,
    /// Seconds since the Unix epoch, captured when the rotation completed.
    pub timestamp: f64,
}

impl LaserScan {
    /// Iterates over the points that carry an actual return.
    pub fn valid_points(&self) -> impl Iterator<Item = &LaserPoint> {
        self.points.iter().filter(|p| p.is_valid())
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}
