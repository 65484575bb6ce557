pub mod messages;
pub use messages::*;

pub mod codec;

pub mod error;
pub use error::{ConfigError, Coordinate, HandshakeFailure, HandshakeField, Result, SessionError};

use serde::{Deserialize, Serialize};

use std::cmp::Ordering;
use std::fmt::Display;

/// Largest axis count a controller may announce.
pub const MAX_AXES: usize = 9;

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq)]
/// Travel limits of a single axis, in the controller's native units.
pub struct AxisLimits {
    pub lower: f64,
    pub upper: f64,
}

impl AxisLimits {
    pub fn new(lower: f64, upper: f64) -> Self {
        Self { lower, upper }
    }

    /// Inclusive on both ends. NaN is never contained.
    pub fn contains(&self, value: f64) -> bool {
        self.lower <= value && value <= self.upper
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(try_from = "Vec<AxisLimits>", into = "Vec<AxisLimits>")]
/// Robot configuration negotiated during the handshake.
///
/// Limits are stored 0-indexed; axis `J1` is `limits()[0]`. The protocol's
/// 1-based numbering only appears on the wire and in error messages.
/// Serialized as the plain list of limits and validated on the way back in.
pub struct RobotConfig {
    limits: Vec<AxisLimits>,
}

impl RobotConfig {
    /// Builds a configuration, checking the axis count and that every lower
    /// limit is at or below its upper limit.
    pub fn new(limits: Vec<AxisLimits>) -> Result<Self, ConfigError> {
        if limits.is_empty() || limits.len() > MAX_AXES {
            return Err(ConfigError::AxisCount(limits.len()));
        }
        for (index, axis) in limits.iter().enumerate() {
            if !matches!(axis.lower.partial_cmp(&axis.upper), Some(Ordering::Less | Ordering::Equal)) {
                return Err(ConfigError::InvertedLimits {
                    axis: index + 1,
                    lower: axis.lower,
                    upper: axis.upper,
                });
            }
        }
        Ok(Self { limits })
    }

    pub fn axis_count(&self) -> usize {
        self.limits.len()
    }

    pub fn limits(&self) -> &[AxisLimits] {
        &self.limits
    }

    pub fn lower_limits(&self) -> Vec<f64> {
        self.limits.iter().map(|l| l.lower).collect()
    }

    pub fn upper_limits(&self) -> Vec<f64> {
        self.limits.iter().map(|l| l.upper).collect()
    }
}

impl TryFrom<Vec<AxisLimits>> for RobotConfig {
    type Error = ConfigError;

    fn try_from(limits: Vec<AxisLimits>) -> Result<Self, Self::Error> {
        Self::new(limits)
    }
}

impl From<RobotConfig> for Vec<AxisLimits> {
    fn from(config: RobotConfig) -> Self {
        config.limits
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
#[serde(try_from = "Vec<f64>")]
/// Joint-space target or readback, one value per axis.
pub struct JointPosition(Vec<f64>);

impl JointPosition {
    pub fn new(values: Vec<f64>) -> Result<Self, ConfigError> {
        if values.len() > MAX_AXES {
            return Err(ConfigError::TooManyJoints(values.len()));
        }
        Ok(Self(values))
    }

    /// All axes at zero.
    pub fn zeros(axis_count: usize) -> Result<Self, ConfigError> {
        Self::new(vec![0.0; axis_count])
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Value of the 0-indexed axis.
    pub fn get(&self, index: usize) -> Option<f64> {
        self.0.get(index).copied()
    }

    /// Mutable access to the 0-indexed axis.
    pub fn get_mut(&mut self, index: usize) -> Option<&mut f64> {
        self.0.get_mut(index)
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.0
    }

    pub fn iter(&self) -> impl Iterator<Item = f64> + '_ {
        self.0.iter().copied()
    }
}

impl TryFrom<Vec<f64>> for JointPosition {
    type Error = ConfigError;

    fn try_from(values: Vec<f64>) -> Result<Self, Self::Error> {
        Self::new(values)
    }
}

impl Display for JointPosition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for (index, value) in self.0.iter().enumerate() {
            if index > 0 {
                f.write_str(" ")?;
            }
            write!(f, "J{}={:.3}", index + 1, value)?;
        }
        Ok(())
    }
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, Default, PartialEq)]
/// Cartesian target: position plus W/P/R orientation in degrees.
pub struct LinearPosition {
    pub x: f64,
    pub y: f64,
    pub z: f64,
    pub w: f64,
    pub p: f64,
    pub r: f64,
}

impl LinearPosition {
    pub fn new(x: f64, y: f64, z: f64, w: f64, p: f64, r: f64) -> Self {
        Self { x, y, z, w, p, r }
    }

    /// Wire order: `[x, y, z, w, p, r]`.
    pub fn to_array(&self) -> [f64; 6] {
        [self.x, self.y, self.z, self.w, self.p, self.r]
    }
}

impl From<[f64; 6]> for LinearPosition {
    fn from([x, y, z, w, p, r]: [f64; 6]) -> Self {
        Self { x, y, z, w, p, r }
    }
}

impl Display for LinearPosition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "X={:.3} Y={:.3} Z={:.3} W={:.3} P={:.3} R={:.3}",
            self.x, self.y, self.z, self.w, self.p, self.r
        )
    }
}
