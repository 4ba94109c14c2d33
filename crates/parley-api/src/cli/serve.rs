//! `parley serve`: run the HTTP server until Ctrl+C or SIGTERM.

use anyhow::{Context, Result};
use console::style;

use parley_types::config::ServiceConfig;
use secrecy::SecretString;

use crate::http::router::build_router;
use crate::state::AppState;

pub async fn serve(config: ServiceConfig, api_key: Option<SecretString>) -> Result<()> {
    let state = AppState::init(config, api_key)?;
    state.start_background_tasks();

    let addr = format!("{}:{}", state.config.server.host, state.config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;

    println!(
        "  {} Parley listening on {}",
        style("⚡").bold(),
        style(format!("http://{addr}{}", state.config.server.route)).cyan()
    );
    if !state.has_provider() {
        println!(
            "  {} {}",
            style("!").yellow().bold(),
            style("GEMINI_API_KEY not set: chat requests will return 500").yellow()
        );
    }
    println!("  {}", style("Press Ctrl+C to stop").dim());

    tracing::info!(
        addr = %addr,
        route = %state.config.server.route,
        model = %state.config.model.name,
        "Server started"
    );

    let router = build_router(state.clone());
    let result = axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await;

    state.shutdown();
    result?;

    println!("\n  Server stopped.");
    Ok(())
}

/// Wait for Ctrl+C or SIGTERM for graceful shutdown.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received");
}
