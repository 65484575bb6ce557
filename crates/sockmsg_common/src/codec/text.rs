//! Text tokens of the socket messaging protocol.
//!
//! Client to controller: space-terminated ASCII tokens with no newline
//! (`"40 "`, `"J"`, `"12.500 "`). Controller to client: newline-terminated
//! lines of at most [`MAX_LINE_LENGTH`] bytes. Status words are matched as
//! substrings so a controller may wrap them in extra text.

/// Starts a motion command exchange.
pub const MOVE_COMMAND: &str = "40 ";

/// Ends the session; no answer follows.
pub const END_OF_SESSION: &str = "99 ";

/// Readiness / reachability acknowledgement.
pub const TRUE_TOKEN: &str = "TRUE";

/// Negative readiness / reachability answer.
pub const FALSE_TOKEN: &str = "FALSE";

/// End-of-motion marker.
pub const EOM_TOKEN: &str = "EOM";

/// Inbound line cap, including the trailing newline.
pub const MAX_LINE_LENGTH: usize = 126;

/// Command codes as they appear once the separating space is stripped.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CommandCode {
    Move,
    EndOfSession,
}

impl CommandCode {
    pub fn parse(token: &str) -> Option<Self> {
        match token.trim() {
            "40" => Some(CommandCode::Move),
            "99" => Some(CommandCode::EndOfSession),
            _ => None,
        }
    }

    pub fn token(self) -> &'static str {
        match self {
            CommandCode::Move => MOVE_COMMAND,
            CommandCode::EndOfSession => END_OF_SESSION,
        }
    }
}

/// Fixed-point with three fractional digits and a trailing separator.
pub fn format_coordinate(value: f64) -> String {
    format!("{value:.3} ")
}

/// Decimal integer with a trailing separator.
pub fn format_integer(value: u32) -> String {
    format!("{value} ")
}

/// Substring match of a status word within a received line.
pub fn contains_token(line: &str, token: &str) -> bool {
    line.contains(token)
}

/// Strips the line terminator (`\n` or `\r\n`).
pub fn trim_line(line: &str) -> &str {
    line.trim_end_matches(['\n', '\r'])
}

/// Parses a numeric line, ignoring surrounding whitespace.
pub fn parse_value(line: &str) -> Option<f64> {
    line.trim().parse().ok()
}

/// Parses a non-negative count line, ignoring surrounding whitespace.
pub fn parse_count(line: &str) -> Option<usize> {
    line.trim().parse().ok()
}
