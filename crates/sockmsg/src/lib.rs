#![deny(
    missing_docs,
    trivial_casts,
    trivial_numeric_casts,
    unstable_features,
    unused_import_braces,
    unused_qualifications,
    clippy::unwrap_used
)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

/*!
An async client for robot controllers that speak the socket messaging line
protocol.

A [`Session`] owns one TCP connection. Opening it runs the configuration
handshake, after which joint and linear moves can be issued one at a time.
Every coordinate, speed and termination value is checked against the
negotiated [`RobotConfig`] before it is written to the socket.

## Example
```rust,no_run
use sockmsg::{JointPosition, LinearPosition, Session, SessionSettings};

#[tokio::main]
async fn main() -> sockmsg::Result<()> {
    let mut session = Session::connect(&SessionSettings::default()).await?;
    println!("connected to {}", session.info().identification);

    session
        .move_linear(LinearPosition::new(1010.0, 1000.0, 0.0, 180.0, 0.0, 0.0), 1000, 50)
        .await?;

    let home = JointPosition::zeros(session.config().axis_count())?;
    let reached = session.move_joint(home, 100, 0).await?;
    println!("robot at {reached}");

    session.close().await
}
```

Nothing is retried internally. Every failure surfaces as a [`SessionError`]
and the caller decides whether to issue a new request, see
[`Session::execute_move`].

## Logging
The crate logs through `tracing` and never installs a subscriber. Protocol
phases are logged at `debug`; raw traffic is logged at `trace` under the
`sockmsg::traffic` target, or at `debug` when
[`SessionSettings::log_traffic`] is set.
*/

mod handshake;
mod motion;

pub mod session;
pub use session::Session;

/// Connection and timeout settings
pub mod settings;
pub use settings::SessionSettings;

/// Newline framing over any async byte stream
pub mod transport;
pub use transport::LineTransport;

pub use sockmsg_common::error;
pub use sockmsg_common::*;

/// Connects to `host:port` with default settings and performs the handshake.
///
/// Returns the session together with a copy of the configuration the robot
/// announced.
pub async fn connect(host: impl Into<String>, port: u16) -> Result<(Session, RobotConfig)> {
    let session = Session::connect(&SessionSettings::new(host, port)).await?;
    let config = session.config().clone();
    Ok((session, config))
}
