//! agentbus CLI entry point.
//!
//! Binary name: `abus`
//!
//! Parses CLI arguments, loads `agentbus.toml`, sets up tracing, then
//! dispatches to the command handler.

mod cli;
mod state;

use clap::Parser;

use agentbus_observe::tracing_setup::{init_tracing, shutdown_tracing, verbosity_filter};
use cli::{Cli, Commands};
use state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Config is loaded before tracing exists, so its own warnings are replayed below.
    let state = AppState::init().await;

    let logging = &state.config().logging;
    init_tracing(
        verbosity_filter(cli.verbose, cli.quiet),
        logging.format,
        logging.otel,
    )
    .map_err(|e| anyhow::anyhow!("failed to initialize tracing: {e}"))?;

    if state.config_is_invalid() {
        tracing::warn!(
            "{} could not be used, running with defaults",
            state.loaded.path.display()
        );
    }
    tracing::debug!(data_dir = %state.data_dir.display(), "agentbus starting");

    let result = match cli.command {
        Commands::Config => cli::config::show_config(&state, cli.json),
        Commands::Demo { pings, steps } => cli::demo::demo(&state, pings, steps, cli.json).await,
    };

    shutdown_tracing();
    result
}
