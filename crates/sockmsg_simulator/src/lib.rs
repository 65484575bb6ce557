//! Robot controller simulator for the socket messaging protocol.
//!
//! Plays the controller side of a session: announces its configuration,
//! answers motion commands and reports the new joint values after each joint
//! move. Useful for exercising clients without hardware.
//!
//! The simulator trusts the client to send complete commands. A client that
//! abandons a command halfway (e.g. after a failed bounds check) leaves the
//! simulator waiting for the rest of it, as a real controller would.

use std::io;
use std::net::SocketAddr;

use sockmsg_common::codec::{
    CommandCode, EOM_TOKEN, FALSE_TOKEN, TRUE_TOKEN, format_coordinate, parse_value,
};
use sockmsg_common::{AxisLimits, LinearPosition, MoveKind, RobotConfig};
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, ToSocketAddrs};
use tracing::{debug, info, warn};

/// Longest token accepted from a client.
const MAX_TOKEN_LENGTH: usize = 64;

/// Why a simulated session ended abnormally.
#[derive(Debug, Error)]
pub enum SimulatorError {
    #[error(transparent)]
    Io(#[from] io::Error),

    /// A command code other than `40` or `99`.
    #[error("unknown command {0:?}")]
    UnknownCommand(String),

    #[error("unknown motion kind {0:?}")]
    UnknownKind(char),

    #[error("malformed {what}: {token:?}")]
    Malformed { what: &'static str, token: String },

    #[error("client closed the connection in the middle of a command")]
    Truncated,
}

/// What the simulated controller announces and how it behaves.
#[derive(Clone, Debug)]
pub struct SimulatorConfig {
    /// First handshake line.
    pub identification: String,
    /// One entry per axis; the axis count is its length.
    pub limits: Vec<AxisLimits>,
    /// Menu lines sent at the end of the handshake.
    pub menu: Vec<String>,
    /// Linear targets farther than this from the origin are unreachable.
    pub reach: f64,
    /// Answer `TRUE` to move commands; `FALSE` when unset.
    pub ready: bool,
}

impl Default for SimulatorConfig {
    fn default() -> Self {
        Self {
            identification: "sockmsg simulator 6-axis".to_string(),
            limits: vec![
                AxisLimits::new(-170.0, 170.0),
                AxisLimits::new(-100.0, 145.0),
                AxisLimits::new(-70.0, 190.0),
                AxisLimits::new(-190.0, 190.0),
                AxisLimits::new(-120.0, 120.0),
                AxisLimits::new(-360.0, 360.0),
            ],
            menu: vec![
                "40 - move (J: joint, L: linear)".to_string(),
                "99 - end of session".to_string(),
            ],
            reach: 2000.0,
            ready: true,
        }
    }
}

impl SimulatorConfig {
    /// Default behavior with the given axis limits.
    pub fn with_limits(limits: Vec<AxisLimits>) -> Self {
        Self {
            limits,
            ..Self::default()
        }
    }

    /// Answers `FALSE` to every move command.
    pub fn not_ready(mut self) -> Self {
        self.ready = false;
        self
    }

    /// Checks the limits the same way a client will on receipt.
    pub fn robot_config(&self) -> Result<RobotConfig, sockmsg_common::ConfigError> {
        RobotConfig::new(self.limits.clone())
    }
}

/// Summary of one served session.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SessionReport {
    /// Moves that ran to the end-of-motion marker.
    pub completed_moves: usize,
    /// Move commands answered with `FALSE` (not ready or unreachable).
    pub refused_moves: usize,
    /// Joint values at the end of the session.
    pub joints: Vec<f64>,
    /// Last linear target executed, if any.
    pub last_pose: Option<LinearPosition>,
    /// True when the client sent the end-of-session command, false on EOF.
    pub ended_by_client: bool,
}

/// A listening simulator that serves one client at a time.
#[derive(Debug)]
pub struct Simulator {
    listener: TcpListener,
    config: SimulatorConfig,
}

impl Simulator {
    /// Binds the listener; use port 0 for an ephemeral port.
    pub async fn bind(addr: impl ToSocketAddrs, config: SimulatorConfig) -> io::Result<Self> {
        let listener = TcpListener::bind(addr).await?;
        Ok(Self { listener, config })
    }

    /// Address the listener is bound to.
    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Configuration announced to every client.
    pub fn config(&self) -> &SimulatorConfig {
        &self.config
    }

    /// Accepts one client and serves it until it leaves.
    pub async fn serve_one(&self) -> Result<SessionReport, SimulatorError> {
        let (stream, peer) = self.listener.accept().await?;
        stream.set_nodelay(true)?;
        info!("Client connected: {}", peer);
        let report = serve_session(stream, &self.config).await?;
        info!(
            "Client {} left after {} moves ({} refused)",
            peer, report.completed_moves, report.refused_moves
        );
        Ok(report)
    }

    /// Serves clients one after another, forever.
    pub async fn run(&self) -> Result<(), SimulatorError> {
        loop {
            if let Err(err) = self.serve_one().await {
                warn!("Session ended with error: {}", err);
            }
        }
    }
}

/// Plays one session over `stream`: handshake, then commands until `99` or EOF.
pub async fn serve_session<S>(
    stream: S,
    config: &SimulatorConfig,
) -> Result<SessionReport, SimulatorError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let mut session = SimulatedSession {
        stream: BufReader::new(stream),
        config,
        report: SessionReport {
            joints: vec![0.0; config.limits.len()],
            ..SessionReport::default()
        },
    };
    session.handshake().await?;

    while let Some(token) = session.token().await? {
        match CommandCode::parse(&token) {
            Some(CommandCode::Move) => session.motion().await?,
            Some(CommandCode::EndOfSession) => {
                debug!("End of session requested");
                session.report.ended_by_client = true;
                break;
            }
            None => return Err(SimulatorError::UnknownCommand(token)),
        }
    }
    Ok(session.report)
}

struct SimulatedSession<'a, S> {
    stream: BufReader<S>,
    config: &'a SimulatorConfig,
    report: SessionReport,
}

impl<S> SimulatedSession<'_, S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    async fn handshake(&mut self) -> Result<(), SimulatorError> {
        let config = self.config;
        self.line(&config.identification).await?;
        self.line(&config.limits.len().to_string()).await?;
        for limits in &config.limits {
            self.line(&limits.lower.to_string()).await?;
            self.line(&limits.upper.to_string()).await?;
        }
        self.line(&config.menu.len().to_string()).await?;
        for entry in &config.menu {
            self.line(entry).await?;
        }
        Ok(())
    }

    async fn motion(&mut self) -> Result<(), SimulatorError> {
        if !self.config.ready {
            debug!("Refusing move: not ready");
            self.report.refused_moves += 1;
            return self.line(FALSE_TOKEN).await;
        }
        self.line(TRUE_TOKEN).await?;

        let kind = match self.byte().await? {
            b'J' => MoveKind::Joint,
            b'L' => MoveKind::Linear,
            other => return Err(SimulatorError::UnknownKind(char::from(other))),
        };
        let count = match kind {
            MoveKind::Joint => self.config.limits.len(),
            MoveKind::Linear => 6,
        };
        let mut target = Vec::with_capacity(count);
        for _ in 0..count {
            target.push(self.value("coordinate").await?);
        }

        if !self.reachable(kind, &target) {
            debug!("Refusing {} move: unreachable {:?}", kind, target);
            self.report.refused_moves += 1;
            return self.line(FALSE_TOKEN).await;
        }
        self.line(TRUE_TOKEN).await?;

        let speed = self.value("speed").await?;
        let term = self.value("termination").await?;
        info!("Executing {} move to {:?} at {} (term {})", kind, target, speed, term);

        self.line(EOM_TOKEN).await?;
        self.report.completed_moves += 1;
        match kind {
            MoveKind::Joint => {
                for value in &target {
                    self.line(format_coordinate(*value).trim_end()).await?;
                }
                self.report.joints = target;
            }
            MoveKind::Linear => {
                let pose = [target[0], target[1], target[2], target[3], target[4], target[5]];
                self.report.last_pose = Some(LinearPosition::from(pose));
            }
        }
        Ok(())
    }

    fn reachable(&self, kind: MoveKind, target: &[f64]) -> bool {
        match kind {
            MoveKind::Joint => target
                .iter()
                .zip(&self.config.limits)
                .all(|(value, limits)| limits.contains(*value)),
            MoveKind::Linear => {
                let distance = target[..3].iter().map(|v| v * v).sum::<f64>().sqrt();
                distance <= self.config.reach
            }
        }
    }

    async fn line(&mut self, text: &str) -> Result<(), SimulatorError> {
        let stream = self.stream.get_mut();
        stream.write_all(text.as_bytes()).await?;
        stream.write_all(b"\n").await?;
        stream.flush().await?;
        Ok(())
    }

    async fn byte(&mut self) -> Result<u8, SimulatorError> {
        match self.stream.read_u8().await {
            Ok(byte) => Ok(byte),
            Err(err) if err.kind() == io::ErrorKind::UnexpectedEof => Err(SimulatorError::Truncated),
            Err(err) => Err(err.into()),
        }
    }

    /// Next space-terminated token; `None` on a clean EOF between tokens.
    async fn token(&mut self) -> Result<Option<String>, SimulatorError> {
        let mut token = Vec::new();
        loop {
            let mut byte = [0u8; 1];
            if self.stream.read(&mut byte).await? == 0 {
                if token.is_empty() {
                    return Ok(None);
                }
                return Err(SimulatorError::Truncated);
            }
            match byte[0] {
                b' ' | b'\n' | b'\r' if token.is_empty() => continue,
                b' ' | b'\n' | b'\r' => break,
                other => token.push(other),
            }
            if token.len() > MAX_TOKEN_LENGTH {
                return Err(SimulatorError::Malformed {
                    what: "token",
                    token: String::from_utf8_lossy(&token).into_owned(),
                });
            }
        }
        Ok(Some(String::from_utf8_lossy(&token).into_owned()))
    }

    async fn value(&mut self, what: &'static str) -> Result<f64, SimulatorError> {
        let token = self.token().await?.ok_or(SimulatorError::Truncated)?;
        parse_value(&token).ok_or(SimulatorError::Malformed { what, token })
    }
}
