//! wireprobe: manual test client for echo, HTTP and reverse proxy servers
//!
//! Probes:
//! - `echo`: length-prefixed frames against a framed echo server
//! - `http`: a hand-built HTTP/1.1 request
//! - `proxy`: raw text through a reverse proxy
//!
//! Configuration via CLI arguments or TOML file.

use tracing::{error, info};
use tracing_subscriber::EnvFilter;
use wireprobe::config::Config;
use wireprobe::probe;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load configuration
    let config = Config::load()?;

    // Initialize logging
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    info!(
        host = %config.host,
        port = config.port,
        probe = config.probe.name(),
        iterations = config.iterations,
        interval_ms = config.interval.as_millis() as u64,
        "Starting wireprobe"
    );

    if let Err(e) = probe::run(&config) {
        error!(error = %e, "Probe failed");
        return Err(e.into());
    }
    Ok(())
}
