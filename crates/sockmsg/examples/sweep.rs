//! Drives a robot through a sine sweep, then returns it to a joint pose.
//!
//! Usage:
//!   cargo run -p sockmsg_simulator            # in another terminal
//!   cargo run -p sockmsg --example sweep [host] [port]

use std::process::ExitCode;

use sockmsg::{JointPosition, LinearPosition, Session, SessionSettings};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

async fn sweep(session: &mut Session) -> sockmsg::Result<()> {
    let start = LinearPosition::new(1010.0, 1000.0, 0.0, 180.0, 0.0, 0.0);
    session.move_linear(start, 1000, 50).await?;

    for i in (0..=2000).step_by(10) {
        let i = f64::from(i);
        let target = LinearPosition {
            x: 1010.0 + (i / 100.0).sin() * 200.0,
            y: 1000.0 - i,
            ..start
        };
        session.move_linear(target, 1000, 50).await?;
    }

    let mut park = JointPosition::zeros(session.config().axis_count())?;
    if let Some(j5) = park.get_mut(4) {
        *j5 = -90.0;
    }
    let reached = session.move_joint(park, 100, 50).await?;
    info!("Parked at {}", reached);
    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let mut args = std::env::args().skip(1);
    let mut settings = SessionSettings::default();
    if let Some(host) = args.next() {
        settings.host = host;
    }
    if let Some(port) = args.next() {
        match port.parse() {
            Ok(port) => settings.port = port,
            Err(err) => {
                error!("Invalid port {:?}: {}", port, err);
                return ExitCode::FAILURE;
            }
        }
    }

    let mut session = match Session::connect(&settings).await {
        Ok(session) => session,
        Err(err) => {
            error!("{}", err);
            return ExitCode::FAILURE;
        }
    };

    let result = sweep(&mut session).await;
    if let Err(err) = session.close().await {
        error!("{}", err);
    }
    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!("{}", err);
            ExitCode::FAILURE
        }
    }
}
