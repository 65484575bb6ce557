use std::time::Duration;

use serde::{Deserialize, Serialize};
use sockmsg_common::codec::MAX_LINE_LENGTH;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
/// Settings for one robot session.
pub struct SessionSettings {
    /// Robot controller address.
    ///
    /// ## Default
    /// `127.0.0.1`
    pub host: String,
    /// Robot controller port.
    ///
    /// ## Default
    /// `4000`
    pub port: u16,
    /// Upper bound on opening the TCP connection (default: 5s)
    pub connect_timeout: Duration,
    /// Longest inbound line accepted, including the newline (default: 126)
    ///
    /// Longer lines are returned in pieces of this size.
    pub max_line_length: usize,
    /// How long to wait for the ready answer after a move dispatch (default: 60s)
    pub ready_timeout: Duration,
    /// How long to wait for the end-of-motion marker (default: 300s)
    pub motion_timeout: Duration,
    /// Deadline for single-line reads: handshake fields, reachability and
    /// position readback.
    ///
    /// `None` waits for as long as the controller takes.
    pub response_timeout: Option<Duration>,
    /// Log every outbound token and inbound line at `debug` instead of `trace`.
    pub log_traffic: bool,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 4000,
            connect_timeout: Duration::from_secs(5),
            max_line_length: MAX_LINE_LENGTH,
            ready_timeout: Duration::from_secs(60),
            motion_timeout: Duration::from_secs(300),
            response_timeout: None,
            log_traffic: false,
        }
    }
}

impl SessionSettings {
    /// Default settings pointed at `host:port`.
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            ..Self::default()
        }
    }

    /// `host:port`, as passed to the resolver.
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Overrides the ready-wait deadline.
    pub fn with_ready_timeout(mut self, timeout: Duration) -> Self {
        self.ready_timeout = timeout;
        self
    }

    /// Overrides the end-of-motion deadline.
    pub fn with_motion_timeout(mut self, timeout: Duration) -> Self {
        self.motion_timeout = timeout;
        self
    }

    /// Sets a deadline for single-line reads.
    pub fn with_response_timeout(mut self, timeout: Duration) -> Self {
        self.response_timeout = Some(timeout);
        self
    }

    /// Enables or disables traffic logging at `debug`.
    pub fn with_traffic_logging(mut self, enabled: bool) -> Self {
        self.log_traffic = enabled;
        self
    }
}
