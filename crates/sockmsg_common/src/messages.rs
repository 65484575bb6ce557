use serde::{Deserialize, Serialize};
use std::fmt;

use crate::{JointPosition, LinearPosition, RobotConfig};

/// Highest termination (blend) percentage accepted for any move.
pub const MAX_TERMINATION: u32 = 100;

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash)]
/// Interpolation used by the controller for a move.
pub enum MoveKind {
    Joint,
    Linear,
}

impl MoveKind {
    /// Single-byte token selecting the motion kind on the wire.
    pub fn token(self) -> &'static str {
        match self {
            MoveKind::Joint => "J",
            MoveKind::Linear => "L",
        }
    }

    /// Highest speed the controller accepts for this kind of move.
    ///
    /// Joint speed is a percentage of the axis maximum; linear speed is in
    /// mm/s.
    pub fn max_speed(self) -> u32 {
        match self {
            MoveKind::Joint => 100,
            MoveKind::Linear => 2000,
        }
    }
}

impl fmt::Display for MoveKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MoveKind::Joint => f.write_str("joint"),
            MoveKind::Linear => f.write_str("linear"),
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
/// One motion request, executed as a single command exchange.
pub enum MoveRequest {
    JointMove {
        target: JointPosition,
        speed: u32,
        term: u32,
    },
    LinearMove {
        target: LinearPosition,
        speed: u32,
        term: u32,
    },
}

impl MoveRequest {
    pub fn joint(target: JointPosition, speed: u32, term: u32) -> Self {
        MoveRequest::JointMove { target, speed, term }
    }

    pub fn linear(target: LinearPosition, speed: u32, term: u32) -> Self {
        MoveRequest::LinearMove { target, speed, term }
    }

    pub fn kind(&self) -> MoveKind {
        match self {
            MoveRequest::JointMove { .. } => MoveKind::Joint,
            MoveRequest::LinearMove { .. } => MoveKind::Linear,
        }
    }

    pub fn speed(&self) -> u32 {
        match self {
            MoveRequest::JointMove { speed, .. } | MoveRequest::LinearMove { speed, .. } => *speed,
        }
    }

    pub fn term(&self) -> u32 {
        match self {
            MoveRequest::JointMove { term, .. } | MoveRequest::LinearMove { term, .. } => *term,
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
/// What the controller reported once a move finished.
///
/// Joint moves read back the resulting joint values. Linear moves end at the
/// end-of-motion marker without a readback.
pub enum FinalPosition {
    Joints(JointPosition),
    NotReported,
}

impl FinalPosition {
    pub fn joints(&self) -> Option<&JointPosition> {
        match self {
            FinalPosition::Joints(joints) => Some(joints),
            FinalPosition::NotReported => None,
        }
    }

    pub fn into_joints(self) -> Option<JointPosition> {
        match self {
            FinalPosition::Joints(joints) => Some(joints),
            FinalPosition::NotReported => None,
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
/// Steps of a motion command exchange, in protocol order.
pub enum MotionPhase {
    Dispatch,
    AwaitReady,
    SendKind,
    SendCoordinates,
    AwaitReachable,
    SendSpeed,
    SendTermination,
    AwaitEndOfMotion,
    ReadBack,
}

impl fmt::Display for MotionPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            MotionPhase::Dispatch => "command dispatch",
            MotionPhase::AwaitReady => "ready wait",
            MotionPhase::SendKind => "motion kind send",
            MotionPhase::SendCoordinates => "coordinate send",
            MotionPhase::AwaitReachable => "reachability check",
            MotionPhase::SendSpeed => "speed send",
            MotionPhase::SendTermination => "termination send",
            MotionPhase::AwaitEndOfMotion => "end-of-motion wait",
            MotionPhase::ReadBack => "position readback",
        };
        f.write_str(name)
    }
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, Default, PartialEq, Eq)]
/// Lifecycle of a session.
pub enum SessionState {
    #[default]
    Disconnected,
    /// Socket open, handshake in progress.
    Connected,
    /// Handshake complete, motion commands accepted.
    Ready,
    Closed,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
/// Everything the controller announced during the handshake.
pub struct RobotInfo {
    /// Free-text identification line, newline stripped.
    pub identification: String,
    pub config: RobotConfig,
    /// Human-readable menu lines, newline stripped.
    pub menu: Vec<String>,
}
