//! One motion command exchange.
//!
//! ```text
//! client  "40 "                      robot  ...  "TRUE"
//! client  "J" | "L"
//! client  "<v> " per coordinate      robot  "TRUE"        (reachable)
//! client  "<speed> " "<term> "       robot  ...  "EOM"
//!                                    robot  "<v>" per axis (joint only)
//! ```
//!
//! Every value is checked before it is written; a rejected value stops the
//! exchange right there, leaving anything already sent on the wire.

use std::ops::RangeInclusive;

use sockmsg_common::codec::{
    EOM_TOKEN, FALSE_TOKEN, MOVE_COMMAND, TRUE_TOKEN, contains_token, format_coordinate,
    format_integer, parse_value,
};
use sockmsg_common::{
    Coordinate, FinalPosition, JointPosition, LinearPosition, MAX_TERMINATION, MotionPhase,
    MoveKind, MoveRequest, Result, RobotConfig, SessionError,
};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::settings::SessionSettings;
use crate::transport::LineTransport;

/// Bounds applied to the `p` and `r` orientation angles of a linear target.
const ORIENTATION_LIMITS: RangeInclusive<f64> = -180.0..=180.0;

/// Array positions of `[x, y, z, w, p, r]` that are bounds-checked.
const CHECKED_ORIENTATION: RangeInclusive<usize> = 4..=5;

/// Runs `request` to completion on `transport`.
pub(crate) async fn execute<S>(
    transport: &mut LineTransport<S>,
    settings: &SessionSettings,
    config: &RobotConfig,
    request: &MoveRequest,
) -> Result<FinalPosition>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let mut exchange = MotionExchange {
        transport,
        settings,
        config,
        phase: MotionPhase::Dispatch,
    };
    match request {
        MoveRequest::JointMove { target, speed, term } => exchange
            .joint_move(target, *speed, *term)
            .await
            .map(FinalPosition::Joints),
        MoveRequest::LinearMove { target, speed, term } => {
            exchange.linear_move(target, *speed, *term).await?;
            Ok(FinalPosition::NotReported)
        }
    }
}

struct MotionExchange<'a, S> {
    transport: &'a mut LineTransport<S>,
    settings: &'a SessionSettings,
    config: &'a RobotConfig,
    phase: MotionPhase,
}

impl<S> MotionExchange<'_, S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    async fn joint_move(
        &mut self,
        target: &JointPosition,
        speed: u32,
        term: u32,
    ) -> Result<JointPosition> {
        let config = self.config;
        if target.len() != config.axis_count() {
            return Err(rejected(SessionError::AxisCountMismatch {
                expected: config.axis_count(),
                actual: target.len(),
            }));
        }

        self.dispatch(MoveKind::Joint).await?;

        self.enter(MotionPhase::SendCoordinates);
        for (index, (value, limits)) in target.iter().zip(config.limits()).enumerate() {
            if !limits.contains(value) {
                return Err(rejected(SessionError::CoordinateOutOfRange {
                    coordinate: Coordinate::Joint(index + 1),
                    value,
                    min: limits.lower,
                    max: limits.upper,
                }));
            }
            self.send(&format_coordinate(value)).await?;
        }

        self.finish(MoveKind::Joint, speed, term).await?;
        self.read_back(config.axis_count()).await
    }

    async fn linear_move(&mut self, target: &LinearPosition, speed: u32, term: u32) -> Result<()> {
        self.dispatch(MoveKind::Linear).await?;

        self.enter(MotionPhase::SendCoordinates);
        for (index, value) in target.to_array().into_iter().enumerate() {
            if CHECKED_ORIENTATION.contains(&index) && !ORIENTATION_LIMITS.contains(&value) {
                return Err(rejected(SessionError::CoordinateOutOfRange {
                    coordinate: Coordinate::Linear(index),
                    value,
                    min: *ORIENTATION_LIMITS.start(),
                    max: *ORIENTATION_LIMITS.end(),
                }));
            }
            self.send(&format_coordinate(value)).await?;
        }

        self.finish(MoveKind::Linear, speed, term).await
    }

    /// Sends the move command, waits for the robot to accept it and selects
    /// the motion kind.
    async fn dispatch(&mut self, kind: MoveKind) -> Result<()> {
        self.enter(MotionPhase::Dispatch);
        self.send(MOVE_COMMAND).await?;

        self.enter(MotionPhase::AwaitReady);
        self.await_ready().await?;

        self.enter(MotionPhase::SendKind);
        self.send(kind.token()).await
    }

    /// Reachability check, motion parameters and the end-of-motion wait.
    async fn finish(&mut self, kind: MoveKind, speed: u32, term: u32) -> Result<()> {
        self.enter(MotionPhase::AwaitReachable);
        let line = self.read_line().await?;
        if !contains_token(&line, TRUE_TOKEN) {
            return Err(rejected(SessionError::UnreachablePosition { line }));
        }

        self.enter(MotionPhase::SendSpeed);
        let max = kind.max_speed();
        if speed > max {
            return Err(rejected(SessionError::InvalidSpeed { kind, speed, max }));
        }
        self.send(&format_integer(speed)).await?;

        self.enter(MotionPhase::SendTermination);
        if term > MAX_TERMINATION {
            return Err(rejected(SessionError::InvalidTermination {
                term,
                max: MAX_TERMINATION,
            }));
        }
        self.send(&format_integer(term)).await?;

        self.enter(MotionPhase::AwaitEndOfMotion);
        self.await_end_of_motion().await
    }

    async fn await_ready(&mut self) -> Result<()> {
        let started = Instant::now();
        let deadline = started + self.settings.ready_timeout;
        loop {
            let Some(line) = self.read_line_until(deadline).await? else {
                return Err(rejected(SessionError::ReadyTimeout {
                    elapsed: started.elapsed(),
                }));
            };
            // FALSE wins over TRUE on the same line.
            if contains_token(&line, FALSE_TOKEN) {
                return Err(rejected(SessionError::NotReady { line }));
            }
            if contains_token(&line, TRUE_TOKEN) {
                return Ok(());
            }
            debug!("Waiting for ready, ignoring {:?}", line);
        }
    }

    async fn await_end_of_motion(&mut self) -> Result<()> {
        let started = Instant::now();
        let deadline = started + self.settings.motion_timeout;
        loop {
            let Some(line) = self.read_line_until(deadline).await? else {
                return Err(rejected(SessionError::MotionTimeout {
                    elapsed: started.elapsed(),
                }));
            };
            if contains_token(&line, EOM_TOKEN) {
                debug!("Motion finished after {:?}", started.elapsed());
                return Ok(());
            }
            debug!("Waiting for end of motion, ignoring {:?}", line);
        }
    }

    async fn read_back(&mut self, axis_count: usize) -> Result<JointPosition> {
        self.enter(MotionPhase::ReadBack);
        let mut values = Vec::with_capacity(axis_count);
        for _ in 0..axis_count {
            let line = self.read_line().await?;
            match parse_value(&line) {
                Some(value) => values.push(value),
                None => {
                    return Err(SessionError::MalformedResponse {
                        phase: self.phase,
                        line,
                    });
                }
            }
        }
        Ok(JointPosition::new(values)?)
    }

    fn enter(&mut self, phase: MotionPhase) {
        debug!("Motion phase: {}", phase);
        self.phase = phase;
    }

    async fn send(&mut self, token: &str) -> Result<()> {
        self.transport.send_all(token.as_bytes()).await?;
        Ok(())
    }

    /// Single-line read bounded by the optional response timeout.
    async fn read_line(&mut self) -> Result<String> {
        let line = self
            .transport
            .receive_line_within(self.settings.response_timeout)
            .await?;
        self.non_empty(line)
    }

    /// Read bounded by `deadline`; `None` once it has passed.
    async fn read_line_until(&mut self, deadline: Instant) -> Result<Option<String>> {
        match self.transport.receive_line_until(deadline).await {
            Ok(line) => self.non_empty(line?).map(Some),
            Err(_) => Ok(None),
        }
    }

    fn non_empty(&self, line: String) -> Result<String> {
        if line.is_empty() {
            return Err(SessionError::ConnectionClosed { phase: self.phase });
        }
        Ok(line)
    }
}

fn rejected(err: SessionError) -> SessionError {
    warn!("{}", err);
    err
}

#[cfg(test)]
mod tests {
    use super::*;
    use sockmsg_common::AxisLimits;
    use std::time::Duration;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio_test::io::Builder;

    fn three_axes() -> RobotConfig {
        RobotConfig::new(vec![AxisLimits::new(-90.0, 90.0); 3]).unwrap()
    }

    fn joints(values: &[f64]) -> JointPosition {
        JointPosition::new(values.to_vec()).unwrap()
    }

    async fn run<S>(transport: S, request: MoveRequest) -> Result<FinalPosition>
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        let mut transport = LineTransport::new(transport, 126);
        execute(&mut transport, &SessionSettings::default(), &three_axes(), &request).await
    }

    /// Script up to and including the coordinate tokens of a linear move.
    fn linear_prelude(coordinates: &[&str]) -> Builder {
        let mut builder = Builder::new();
        builder.write(b"40 ").read(b"TRUE\n").write(b"L");
        for token in coordinates {
            builder.write(token.as_bytes());
        }
        builder
    }

    #[tokio::test]
    async fn test_joint_move_reads_back_position() {
        let mock = Builder::new()
            .write(b"40 ")
            .read(b"TRUE\n")
            .write(b"J")
            .write(b"0.000 ")
            .write(b"0.000 ")
            .write(b"0.000 ")
            .read(b"TRUE\n")
            .write(b"50 ")
            .write(b"50 ")
            .read(b"EOM\n")
            .read(b"0.000\n0.000\n0.000\n")
            .build();

        let result = run(mock, MoveRequest::joint(joints(&[0.0, 0.0, 0.0]), 50, 50))
            .await
            .unwrap();

        assert_eq!(result, FinalPosition::Joints(joints(&[0.0, 0.0, 0.0])));
    }

    #[tokio::test]
    async fn test_joint_limits_are_inclusive() {
        let mock = Builder::new()
            .write(b"40 ")
            .read(b"TRUE\n")
            .write(b"J")
            .write(b"-90.000 ")
            .write(b"90.000 ")
            .write(b"12.346 ")
            .read(b"TRUE\n")
            .write(b"100 ")
            .write(b"0 ")
            .read(b"EOM\n")
            .read(b"-90.000\n90.000\n12.346\n")
            .build();

        let result = run(mock, MoveRequest::joint(joints(&[-90.0, 90.0, 12.3456]), 100, 0))
            .await
            .unwrap();

        assert_eq!(result.joints(), Some(&joints(&[-90.0, 90.0, 12.346])));
    }

    #[tokio::test]
    async fn test_out_of_range_axis_stops_before_speed() {
        // J2 is rejected after J1 went out; speed and termination never do.
        let mock = Builder::new()
            .write(b"40 ")
            .read(b"TRUE\n")
            .write(b"J")
            .write(b"10.000 ")
            .build();

        let err = run(mock, MoveRequest::joint(joints(&[10.0, 95.5, 0.0]), 50, 50))
            .await
            .unwrap_err();

        match err {
            SessionError::CoordinateOutOfRange {
                coordinate,
                value,
                min,
                max,
            } => {
                assert_eq!(coordinate, Coordinate::Joint(2));
                assert_eq!(value, 95.5);
                assert_eq!((min, max), (-90.0, 90.0));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_nan_joint_is_rejected() {
        let mock = Builder::new().write(b"40 ").read(b"TRUE\n").write(b"J").build();

        let err = run(mock, MoveRequest::joint(joints(&[f64::NAN, 0.0, 0.0]), 50, 50))
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            SessionError::CoordinateOutOfRange { coordinate: Coordinate::Joint(1), .. }
        ));
    }

    #[tokio::test]
    async fn test_axis_count_mismatch_sends_nothing() {
        let mock = Builder::new().build();

        let err = run(mock, MoveRequest::joint(joints(&[0.0, 0.0]), 50, 50))
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            SessionError::AxisCountMismatch { expected: 3, actual: 2 }
        ));
        assert!(err.is_validation());
    }

    #[tokio::test]
    async fn test_joint_speed_above_100_rejected() {
        let mock = Builder::new()
            .write(b"40 ")
            .read(b"TRUE\n")
            .write(b"J")
            .write(b"0.000 ")
            .write(b"0.000 ")
            .write(b"0.000 ")
            .read(b"TRUE\n")
            .build();

        let err = run(mock, MoveRequest::joint(joints(&[0.0, 0.0, 0.0]), 101, 50))
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            SessionError::InvalidSpeed { kind: MoveKind::Joint, speed: 101, max: 100 }
        ));
    }

    #[tokio::test]
    async fn test_termination_above_100_rejected() {
        let mock = Builder::new()
            .write(b"40 ")
            .read(b"TRUE\n")
            .write(b"J")
            .write(b"0.000 ")
            .write(b"0.000 ")
            .write(b"0.000 ")
            .read(b"TRUE\n")
            .write(b"20 ")
            .build();

        let err = run(mock, MoveRequest::joint(joints(&[0.0, 0.0, 0.0]), 20, 101))
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            SessionError::InvalidTermination { term: 101, max: 100 }
        ));
    }

    #[tokio::test]
    async fn test_joint_termination_100_is_sent() {
        let mock = Builder::new()
            .write(b"40 ")
            .read(b"TRUE\n")
            .write(b"J")
            .write(b"0.000 ")
            .write(b"0.000 ")
            .write(b"0.000 ")
            .read(b"TRUE\n")
            .write(b"25 ")
            .write(b"100 ")
            .read(b"EOM\n")
            .read(b"0.000\n0.000\n0.000\n")
            .build();

        let result = run(mock, MoveRequest::joint(joints(&[0.0, 0.0, 0.0]), 25, 100)).await;
        assert_eq!(result.unwrap(), FinalPosition::Joints(joints(&[0.0, 0.0, 0.0])));
    }

    #[tokio::test]
    async fn test_linear_termination_100_is_sent() {
        let mock = linear_prelude(&["0.000 "; 6])
            .read(b"TRUE\n")
            .write(b"500 ")
            .write(b"100 ")
            .read(b"EOM\n")
            .build();

        let result = run(mock, MoveRequest::linear(LinearPosition::default(), 500, 100)).await;
        assert_eq!(result.unwrap(), FinalPosition::NotReported);
    }

    #[tokio::test]
    async fn test_linear_move_at_max_speed() {
        let mock = linear_prelude(&[
            "1010.000 ",
            "1000.000 ",
            "0.000 ",
            "180.000 ",
            "0.000 ",
            "0.000 ",
        ])
        .read(b"TRUE\n")
        .write(b"2000 ")
        .write(b"50 ")
        .read(b"EOM\n")
        .build();

        let target = LinearPosition::new(1010.0, 1000.0, 0.0, 180.0, 0.0, 0.0);
        let result = run(mock, MoveRequest::linear(target, 2000, 50)).await.unwrap();

        assert_eq!(result, FinalPosition::NotReported);
    }

    #[tokio::test]
    async fn test_linear_speed_above_2000_rejected() {
        let mock = linear_prelude(&["0.000 "; 6]).read(b"TRUE\n").build();

        let err = run(mock, MoveRequest::linear(LinearPosition::default(), 2001, 50))
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            SessionError::InvalidSpeed { kind: MoveKind::Linear, speed: 2001, max: 2000 }
        ));
    }

    #[tokio::test]
    async fn test_orientation_bounds_are_inclusive() {
        let mock = linear_prelude(&[
            "0.000 ",
            "0.000 ",
            "0.000 ",
            "-999.000 ",
            "180.000 ",
            "-180.000 ",
        ])
        .read(b"TRUE\n")
        .write(b"100 ")
        .write(b"0 ")
        .read(b"EOM\n")
        .build();

        // w is not bounded; p and r sit exactly on the limits.
        let target = LinearPosition::new(0.0, 0.0, 0.0, -999.0, 180.0, -180.0);
        assert!(run(mock, MoveRequest::linear(target, 100, 0)).await.is_ok());
    }

    #[tokio::test]
    async fn test_orientation_out_of_range_rejected() {
        let mock = linear_prelude(&["5000.000 ", "0.000 ", "0.000 ", "0.000 "]).build();

        let target = LinearPosition::new(5000.0, 0.0, 0.0, 0.0, 180.001, 0.0);
        let err = run(mock, MoveRequest::linear(target, 100, 0)).await.unwrap_err();

        match err {
            SessionError::CoordinateOutOfRange { coordinate, value, .. } => {
                assert_eq!(coordinate, Coordinate::Linear(4));
                assert_eq!(value, 180.001);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_roll_out_of_range_rejected() {
        let mock = linear_prelude(&["0.000 "; 5]).build();

        let target = LinearPosition::new(0.0, 0.0, 0.0, 0.0, 0.0, -180.5);
        let err = run(mock, MoveRequest::linear(target, 100, 0)).await.unwrap_err();

        assert!(matches!(
            err,
            SessionError::CoordinateOutOfRange { coordinate: Coordinate::Linear(5), .. }
        ));
    }

    #[tokio::test]
    async fn test_not_ready() {
        let mock = Builder::new().write(b"40 ").read(b"FALSE\n").build();

        let err = run(mock, MoveRequest::joint(joints(&[0.0, 0.0, 0.0]), 50, 50))
            .await
            .unwrap_err();

        assert!(matches!(err, SessionError::NotReady { line } if line == "FALSE\n"));
    }

    #[tokio::test]
    async fn test_ready_wait_skips_chatter_and_false_wins() {
        let mock = Builder::new()
            .write(b"40 ")
            .read(b"busy\nTRUE/FALSE\n")
            .build();

        let err = run(mock, MoveRequest::joint(joints(&[0.0, 0.0, 0.0]), 50, 50))
            .await
            .unwrap_err();

        assert!(matches!(err, SessionError::NotReady { .. }));
    }

    #[tokio::test]
    async fn test_unreachable_position() {
        let mock = Builder::new()
            .write(b"40 ")
            .read(b"TRUE\n")
            .write(b"J")
            .write(b"0.000 ")
            .write(b"0.000 ")
            .write(b"0.000 ")
            .read(b"FALSE\n")
            .build();

        let err = run(mock, MoveRequest::joint(joints(&[0.0, 0.0, 0.0]), 50, 50))
            .await
            .unwrap_err();

        assert!(matches!(err, SessionError::UnreachablePosition { line } if line == "FALSE\n"));
    }

    #[tokio::test]
    async fn test_end_of_motion_skips_chatter() {
        let mock = linear_prelude(&["0.000 "; 6])
            .read(b"TRUE\n")
            .write(b"10 ")
            .write(b"10 ")
            .read(b"moving\n")
            .read(b"still moving\nEOM\n")
            .build();

        let result = run(mock, MoveRequest::linear(LinearPosition::default(), 10, 10)).await;
        assert_eq!(result.unwrap(), FinalPosition::NotReported);
    }

    #[tokio::test]
    async fn test_close_during_motion_is_reported() {
        let mock = linear_prelude(&["0.000 "; 6])
            .read(b"TRUE\n")
            .write(b"10 ")
            .write(b"10 ")
            .build();

        let err = run(mock, MoveRequest::linear(LinearPosition::default(), 10, 10))
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            SessionError::ConnectionClosed { phase: MotionPhase::AwaitEndOfMotion }
        ));
    }

    #[tokio::test]
    async fn test_malformed_readback() {
        let mock = Builder::new()
            .write(b"40 ")
            .read(b"TRUE\n")
            .write(b"J")
            .write(b"0.000 ")
            .write(b"0.000 ")
            .write(b"0.000 ")
            .read(b"TRUE\n")
            .write(b"50 ")
            .write(b"50 ")
            .read(b"EOM\n")
            .read(b"0.000\nerr\n")
            .build();

        let err = run(mock, MoveRequest::joint(joints(&[0.0, 0.0, 0.0]), 50, 50))
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            SessionError::MalformedResponse { phase: MotionPhase::ReadBack, line } if line == "err\n"
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_ready_timeout_sends_nothing_after_dispatch() {
        let (client, mut robot) = tokio::io::duplex(256);

        let err = run(client, MoveRequest::joint(joints(&[0.0, 0.0, 0.0]), 50, 50))
            .await
            .unwrap_err();

        match err {
            SessionError::ReadyTimeout { elapsed } => {
                assert!(elapsed >= Duration::from_secs(60));
            }
            other => panic!("unexpected error: {other:?}"),
        }

        // The client end was dropped by `run`, so this reads to EOF.
        let mut sent = Vec::new();
        robot.read_to_end(&mut sent).await.unwrap();
        assert_eq!(sent, b"40 ");
    }

    #[tokio::test(start_paused = true)]
    async fn test_ready_timeout_is_configurable() {
        let (client, _robot) = tokio::io::duplex(256);
        let mut transport = LineTransport::new(client, 126);
        let settings = SessionSettings::default().with_ready_timeout(Duration::from_secs(2));
        let request = MoveRequest::joint(joints(&[0.0, 0.0, 0.0]), 50, 50);

        let started = Instant::now();
        let err = execute(&mut transport, &settings, &three_axes(), &request)
            .await
            .unwrap_err();

        assert!(err.is_timeout());
        assert!(started.elapsed() < Duration::from_secs(60));
    }

    #[tokio::test(start_paused = true)]
    async fn test_motion_timeout() {
        let (client, mut robot) = tokio::io::duplex(256);
        robot.write_all(b"TRUE\nTRUE\n").await.unwrap();

        let err = run(client, MoveRequest::joint(joints(&[0.0, 0.0, 0.0]), 50, 50))
            .await
            .unwrap_err();

        match err {
            SessionError::MotionTimeout { elapsed } => {
                assert!(elapsed >= Duration::from_secs(300));
            }
            other => panic!("unexpected error: {other:?}"),
        }

        let mut sent = Vec::new();
        robot.read_to_end(&mut sent).await.unwrap();
        assert_eq!(sent, b"40 J0.000 0.000 0.000 50 50 ");
    }
}
