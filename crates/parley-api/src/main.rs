//! Parley entry point.
//!
//! Binary name: `parley`
//!
//! Loads `.env`, parses CLI arguments, sets up tracing and configuration,
//! then dispatches to the requested command.

use anyhow::Context;
use clap::Parser;

use parley_api::cli::{self, Cli, Commands};
use parley_infra::config::{load_config, resolve_api_key};
use parley_observe::tracing_setup::{init_tracing, shutdown_tracing};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // A missing .env file is fine; the process environment still applies.
    dotenv::dotenv().ok();

    let cli = Cli::parse();

    init_tracing(cli.otel, cli.log_filter())
        .map_err(|e| anyhow::anyhow!("failed to initialise tracing: {e}"))?;

    let result = run(cli).await;
    shutdown_tracing();
    result
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let mut config = load_config(&cli.config)
        .await
        .with_context(|| format!("invalid configuration ({})", cli.config.display()))?;
    let api_key = resolve_api_key(|key| std::env::var(key).ok());

    match cli.command {
        Commands::Serve { port, host } => {
            if let Some(port) = port {
                config.server.port = port;
            }
            if let Some(host) = host {
                config.server.host = host;
            }
            cli::serve::serve(config, api_key).await
        }
        Commands::Config => cli::config::show_config(&config, api_key.is_some()),
    }
}
