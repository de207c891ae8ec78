//! irond - a single-threaded, readiness-based IRC server.

use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use signal_hook::consts::{SIGINT, SIGTERM};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use irond::config::Config;
use irond::network::Server;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(true)
        .init();

    let config = match Config::from_args(std::env::args().skip(1)) {
        Ok(config) => config,
        Err(e) => {
            error!(error = %e, "invalid arguments");
            eprintln!("usage: irond [<port> [<password>]]");
            std::process::exit(1);
        }
    };

    let shutdown = Arc::new(AtomicBool::new(false));
    for signal in [SIGINT, SIGTERM] {
        if let Err(e) = signal_hook::flag::register(signal, Arc::clone(&shutdown)) {
            warn!(signal, error = %e, "failed to install signal handler");
        }
    }

    let mut server = match Server::bind(&config, Arc::clone(&shutdown)) {
        Ok(server) => server,
        Err(e) => {
            error!(port = config.port, error = %e, "failed to bind");
            std::process::exit(2);
        }
    };

    info!(
        port = config.port,
        password = config.password_required(),
        "starting irond"
    );
    if let Err(e) = server.run() {
        error!(error = %e, "event loop failed");
        std::process::exit(2);
    }
}
