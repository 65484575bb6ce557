//! Socket messaging robot simulator
//!
//! Usage:
//!   cargo run -p sockmsg_simulator
//!   # Then connect a client to 127.0.0.1:4000
//!
//! An alternative listen address may be given as the first argument.
//! Log verbosity follows `RUST_LOG` (default `info`).

use sockmsg_simulator::{Simulator, SimulatorConfig, SimulatorError};
use tracing::info;
use tracing_subscriber::EnvFilter;

const DEFAULT_ADDR: &str = "127.0.0.1:4000";

#[tokio::main]
async fn main() -> Result<(), SimulatorError> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let addr = std::env::args().nth(1).unwrap_or_else(|| DEFAULT_ADDR.to_string());
    let simulator = Simulator::bind(addr.as_str(), SimulatorConfig::default()).await?;
    let config = simulator.config();

    info!("Socket messaging simulator v{}", env!("CARGO_PKG_VERSION"));
    info!("Listening on {}", simulator.local_addr()?);
    info!("Robot: {} ({} axes)", config.identification, config.limits.len());
    for (index, limits) in config.limits.iter().enumerate() {
        info!("  J{}: {:8.3}/{:8.3}", index + 1, limits.lower, limits.upper);
    }
    info!("Linear reach: {} mm", config.reach);

    simulator.run().await
}
