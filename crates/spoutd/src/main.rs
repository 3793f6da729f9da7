//! spoutd - container log router daemon.

use clap::Parser;
use spoutd::Cli;
use tracing::error;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // RUST_LOG wins over --debug
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(cli.default_log_level())),
        )
        .init();

    if let Err(e) = spoutd::run(cli).await {
        error!("fatal: {e:#}");
        std::process::exit(1);
    }
}
