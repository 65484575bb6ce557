use std::fmt;
use std::io;
use std::time::Duration;

use thiserror::Error;

use crate::{MAX_AXES, MotionPhase, MoveKind};

/// Result alias used across the sockmsg crates.
pub type Result<T, E = SessionError> = std::result::Result<T, E>;

/// Errors raised while building robot data types.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ConfigError {
    /// The robot reported (or the caller supplied) an unsupported axis count.
    #[error("axis count {0} is outside 1..={max}", max = MAX_AXES)]
    AxisCount(usize),

    /// A lower limit is greater than its upper limit (or one of them is NaN).
    #[error("axis J{axis}: lower limit {lower} is above upper limit {upper}")]
    InvertedLimits {
        /// 1-based axis number
        axis: usize,
        lower: f64,
        upper: f64,
    },

    /// More joint values than any robot can have.
    #[error("{0} joint values exceed the maximum of {max}", max = MAX_AXES)]
    TooManyJoints(usize),
}

/// A single coordinate slot of a motion request, as named in error messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Coordinate {
    /// Joint axis, numbered from 1 like the controller does.
    Joint(usize),
    /// Position in the `[x, y, z, w, p, r]` array, numbered from 0.
    Linear(usize),
}

impl fmt::Display for Coordinate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        const NAMES: [&str; 6] = ["x", "y", "z", "w", "p", "r"];
        match self {
            Coordinate::Joint(axis) => write!(f, "J{axis}"),
            Coordinate::Linear(index) => match NAMES.get(*index) {
                Some(name) => write!(f, "L{index} ({name})"),
                None => write!(f, "L{index}"),
            },
        }
    }
}

/// Handshake fields, in the order the robot sends them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandshakeField {
    Identification,
    AxisCount,
    /// Lower limit of a 1-based axis.
    LowerLimit(usize),
    /// Upper limit of a 1-based axis.
    UpperLimit(usize),
    MenuRows,
    /// Menu line, numbered from 1.
    MenuLine(usize),
}

impl fmt::Display for HandshakeField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HandshakeField::Identification => f.write_str("robot identification"),
            HandshakeField::AxisCount => f.write_str("axis count"),
            HandshakeField::LowerLimit(axis) => write!(f, "J{axis} lower limit"),
            HandshakeField::UpperLimit(axis) => write!(f, "J{axis} upper limit"),
            HandshakeField::MenuRows => f.write_str("menu row count"),
            HandshakeField::MenuLine(row) => write!(f, "menu line {row}"),
        }
    }
}

/// Why a handshake field could not be acquired.
#[derive(Debug, Error)]
pub enum HandshakeFailure {
    #[error(transparent)]
    Transport(#[from] io::Error),

    #[error("robot closed the connection")]
    Closed,

    #[error("expected a number, got {line:?}")]
    Malformed { line: String },

    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// Every error a session operation can surface to its caller.
///
/// Nothing is retried internally: resending part of a motion command could
/// desynchronize the controller, so the caller decides whether to start a
/// whole new request.
#[derive(Debug, Error)]
pub enum SessionError {
    /// The TCP connection could not be opened.
    #[error("failed to connect to {addr}: {source}")]
    Connect {
        addr: String,
        #[source]
        source: io::Error,
    },

    #[error("timed out connecting to {addr} after {timeout:?}")]
    ConnectTimeout { addr: String, timeout: Duration },

    /// I/O failure while sending or receiving.
    #[error("transport failure: {0}")]
    Transport(#[from] io::Error),

    /// The configuration exchange was malformed or truncated.
    #[error("handshake failed while reading {field}: {cause}")]
    Handshake {
        /// Field being read when the failure happened
        field: HandshakeField,
        /// Last field acquired successfully, if any
        last_acquired: Option<HandshakeField>,
        #[source]
        cause: HandshakeFailure,
    },

    /// The controller answered `FALSE` to a move dispatch.
    #[error("robot is not ready (answered {line:?})")]
    NotReady { line: String },

    #[error("robot did not report ready within {elapsed:?}")]
    ReadyTimeout { elapsed: Duration },

    /// A coordinate failed its bounds check and was not transmitted.
    ///
    /// Coordinates preceding it in the same request have already been sent.
    #[error("invalid coordinate {coordinate} = {value:.3} (allowed {min:.3}..={max:.3})")]
    CoordinateOutOfRange {
        coordinate: Coordinate,
        value: f64,
        min: f64,
        max: f64,
    },

    /// A joint request does not have one value per robot axis.
    #[error("joint request has {actual} values but the robot has {expected} axes")]
    AxisCountMismatch { expected: usize, actual: usize },

    #[error("unreachable position (robot answered {line:?})")]
    UnreachablePosition { line: String },

    #[error("invalid speed {speed} for {kind} move (max {max})")]
    InvalidSpeed { kind: MoveKind, speed: u32, max: u32 },

    #[error("invalid termination {term} (max {max})")]
    InvalidTermination { term: u32, max: u32 },

    #[error("no end-of-motion marker within {elapsed:?}")]
    MotionTimeout { elapsed: Duration },

    /// The robot closed the socket while a response was expected.
    #[error("connection closed by robot during {phase}")]
    ConnectionClosed { phase: MotionPhase },

    #[error("malformed response during {phase}: {line:?}")]
    MalformedResponse { phase: MotionPhase, line: String },

    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl SessionError {
    /// True for errors detected before the offending value left the client.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            SessionError::CoordinateOutOfRange { .. }
                | SessionError::AxisCountMismatch { .. }
                | SessionError::InvalidSpeed { .. }
                | SessionError::InvalidTermination { .. }
        )
    }

    /// True for deadline expiries.
    pub fn is_timeout(&self) -> bool {
        match self {
            SessionError::ConnectTimeout { .. }
            | SessionError::ReadyTimeout { .. }
            | SessionError::MotionTimeout { .. } => true,
            SessionError::Transport(err) => err.kind() == io::ErrorKind::TimedOut,
            _ => false,
        }
    }
}
