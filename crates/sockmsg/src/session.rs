//! The client side of a robot connection.

use sockmsg_common::codec::END_OF_SESSION;
use sockmsg_common::{
    FinalPosition, JointPosition, LinearPosition, MotionPhase, MoveRequest, Result, RobotConfig,
    RobotInfo, SessionError, SessionState,
};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;
use tracing::{debug, info, warn};

use crate::handshake::read_robot_info;
use crate::motion;
use crate::settings::SessionSettings;
use crate::transport::LineTransport;

/// An open connection to a robot controller.
///
/// Commands run one at a time; every operation takes `&mut self` and returns
/// only once the controller's side of the exchange is complete.
#[derive(Debug)]
pub struct Session<S = TcpStream> {
    transport: LineTransport<S>,
    settings: SessionSettings,
    info: RobotInfo,
    state: SessionState,
}

impl Session<TcpStream> {
    /// Opens a TCP connection to `settings.addr()` and performs the handshake.
    pub async fn connect(settings: &SessionSettings) -> Result<Self> {
        let addr = settings.addr();
        info!("Beginning connection to {}", addr);

        let stream = match tokio::time::timeout(settings.connect_timeout, TcpStream::connect(&addr))
            .await
        {
            Ok(Ok(stream)) => stream,
            Ok(Err(source)) => return Err(SessionError::Connect { addr, source }),
            Err(_) => {
                return Err(SessionError::ConnectTimeout {
                    addr,
                    timeout: settings.connect_timeout,
                });
            }
        };
        stream.set_nodelay(true)?;
        info!("Connected to {}", addr);

        Self::from_stream(stream, settings.clone()).await
    }
}

impl<S> Session<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Performs the handshake over an already connected stream.
    pub async fn from_stream(stream: S, settings: SessionSettings) -> Result<Self> {
        let mut transport = LineTransport::new(stream, settings.max_line_length)
            .with_traffic_logging(settings.log_traffic);
        debug!("Session state: {:?}", SessionState::Connected);

        let info = read_robot_info(&mut transport, settings.response_timeout).await?;
        debug!("Session state: {:?}", SessionState::Ready);

        Ok(Self {
            transport,
            settings,
            info,
            state: SessionState::Ready,
        })
    }

    /// `Ready` once the handshake is done, `Closed` after the connection is
    /// lost.
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Everything the controller announced during the handshake.
    pub fn info(&self) -> &RobotInfo {
        &self.info
    }

    /// Axis count and joint limits used to validate joint moves.
    pub fn config(&self) -> &RobotConfig {
        &self.info.config
    }

    /// Settings the session was opened with.
    pub fn settings(&self) -> &SessionSettings {
        &self.settings
    }

    /// Runs one motion request to completion.
    ///
    /// Errors are returned as soon as they are detected and nothing is
    /// retried. A transport failure or a closed connection moves the session
    /// to [`SessionState::Closed`]; later requests fail without touching the
    /// socket.
    pub async fn execute_move(&mut self, request: &MoveRequest) -> Result<FinalPosition> {
        if self.state != SessionState::Ready {
            return Err(SessionError::ConnectionClosed {
                phase: MotionPhase::Dispatch,
            });
        }

        debug!("Executing {} move", request.kind());
        let result = motion::execute(
            &mut self.transport,
            &self.settings,
            &self.info.config,
            request,
        )
        .await;

        if let Err(err @ (SessionError::Transport(_) | SessionError::ConnectionClosed { .. })) =
            &result
        {
            warn!("Connection lost: {}", err);
            self.state = SessionState::Closed;
        }
        result
    }

    /// Joint move; returns the joint values the controller reports afterwards.
    pub async fn move_joint(
        &mut self,
        target: JointPosition,
        speed: u32,
        term: u32,
    ) -> Result<JointPosition> {
        let position = self
            .execute_move(&MoveRequest::joint(target, speed, term))
            .await?;
        // Joint moves always read back.
        Ok(position.into_joints().unwrap_or_default())
    }

    /// Linear move. The controller does not report the final pose.
    pub async fn move_linear(&mut self, target: LinearPosition, speed: u32, term: u32) -> Result<()> {
        self.execute_move(&MoveRequest::linear(target, speed, term))
            .await
            .map(|_| ())
    }

    /// Sends the end-of-session command and shuts the connection down.
    ///
    /// The controller does not answer. A session whose connection was already
    /// lost closes without sending anything.
    pub async fn close(mut self) -> Result<()> {
        info!("Closing connection..");
        if self.state == SessionState::Closed {
            return Ok(());
        }
        self.transport.send_all(END_OF_SESSION.as_bytes()).await?;
        self.transport.shutdown().await?;
        self.state = SessionState::Closed;
        debug!("Session state: {:?}", self.state);
        Ok(())
    }
}
