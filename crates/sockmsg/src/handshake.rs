//! Configuration exchange performed right after connecting.
//!
//! The controller sends, one line each: identification, axis count, a
//! lower/upper limit pair per axis, the menu row count and the menu rows.

use std::cmp::Ordering;
use std::time::Duration;

use sockmsg_common::codec::{parse_count, parse_value, trim_line};
use sockmsg_common::{
    AxisLimits, ConfigError, HandshakeFailure, HandshakeField, MAX_AXES, Result, RobotConfig,
    RobotInfo, SessionError,
};
use tokio::io::{AsyncRead, AsyncWrite};
use tracing::{debug, info};

use crate::transport::LineTransport;

struct HandshakeReader<'a, S> {
    transport: &'a mut LineTransport<S>,
    timeout: Option<Duration>,
    last_acquired: Option<HandshakeField>,
}

impl<S> HandshakeReader<'_, S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    fn fail(&self, field: HandshakeField, cause: impl Into<HandshakeFailure>) -> SessionError {
        SessionError::Handshake {
            field,
            last_acquired: self.last_acquired,
            cause: cause.into(),
        }
    }

    async fn raw_line(&mut self, field: HandshakeField) -> Result<String> {
        let line = self
            .transport
            .receive_line_within(self.timeout)
            .await
            .map_err(|err| self.fail(field, err))?;
        if line.is_empty() {
            return Err(self.fail(field, HandshakeFailure::Closed));
        }
        debug!("Received {}: {:?}", field, line);
        Ok(line)
    }

    async fn text(&mut self, field: HandshakeField) -> Result<String> {
        let line = self.raw_line(field).await?;
        self.last_acquired = Some(field);
        Ok(trim_line(&line).to_owned())
    }

    async fn value(&mut self, field: HandshakeField) -> Result<f64> {
        let line = self.raw_line(field).await?;
        match parse_value(&line) {
            Some(value) => {
                self.last_acquired = Some(field);
                Ok(value)
            }
            None => Err(self.fail(field, HandshakeFailure::Malformed { line })),
        }
    }

    async fn count(&mut self, field: HandshakeField) -> Result<usize> {
        let line = self.raw_line(field).await?;
        match parse_count(&line) {
            Some(count) => {
                self.last_acquired = Some(field);
                Ok(count)
            }
            None => Err(self.fail(field, HandshakeFailure::Malformed { line })),
        }
    }
}

/// Reads the controller's self-description and builds the [`RobotConfig`].
///
/// One-shot: any failure aborts the exchange and is reported as
/// [`SessionError::Handshake`].
pub async fn read_robot_info<S>(
    transport: &mut LineTransport<S>,
    timeout: Option<Duration>,
) -> Result<RobotInfo>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let mut reader = HandshakeReader {
        transport,
        timeout,
        last_acquired: None,
    };

    let identification = reader.text(HandshakeField::Identification).await?;
    info!("Robot info: {}", identification);

    let axis_count = reader.count(HandshakeField::AxisCount).await?;
    if axis_count == 0 || axis_count > MAX_AXES {
        return Err(reader.fail(HandshakeField::AxisCount, ConfigError::AxisCount(axis_count)));
    }
    info!("Axis count: {}", axis_count);

    let mut limits = Vec::with_capacity(axis_count);
    for axis in 1..=axis_count {
        let lower = reader.value(HandshakeField::LowerLimit(axis)).await?;
        let upper = reader.value(HandshakeField::UpperLimit(axis)).await?;
        if !matches!(lower.partial_cmp(&upper), Some(Ordering::Less | Ordering::Equal)) {
            return Err(reader.fail(
                HandshakeField::UpperLimit(axis),
                ConfigError::InvertedLimits { axis, lower, upper },
            ));
        }
        info!("J{}: {:8.3}/{:8.3}", axis, lower, upper);
        limits.push(AxisLimits::new(lower, upper));
    }
    let config = RobotConfig::new(limits)
        .map_err(|err| reader.fail(HandshakeField::UpperLimit(axis_count), err))?;

    let rows = reader.count(HandshakeField::MenuRows).await?;
    let mut menu = Vec::with_capacity(rows);
    for row in 1..=rows {
        let line = reader.text(HandshakeField::MenuLine(row)).await?;
        info!("{}", line);
        menu.push(line);
    }

    Ok(RobotInfo {
        identification,
        config,
        menu,
    })
}
