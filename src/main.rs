use std::net::SocketAddr;
use std::process::ExitCode;

use tokio::net::TcpListener;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use gateway_integration::config::ServerSettings;
use gateway_integration::{Config, GatewayIntegration, build_router, metrics, utils};

#[tokio::main]
async fn main() -> ExitCode {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(true)
        .with_thread_ids(true)
        .init();

    info!(
        "Starting gateway integration demo v{}",
        env!("CARGO_PKG_VERSION")
    );

    match run().await {
        Ok(()) => ExitCode::from(exitcode::OK as u8),
        Err(exit_code) => ExitCode::from(exit_code as u8),
    }
}

/// Run the application, returning an exit code on error.
async fn run() -> Result<(), exitcode::ExitCode> {
    // Load configuration
    let config = Config::from_env().map_err(|e| {
        error!("Configuration error: {e}");
        exitcode::CONFIG
    })?;
    let settings = ServerSettings::from_env().map_err(|e| {
        error!("Configuration error: {e}");
        exitcode::CONFIG
    })?;
    info!(
        host = %settings.host,
        port = %settings.port,
        gateway = %config.gateway_url,
        require_api_key = config.require_api_key,
        skip_rules = config.skip_rules.len(),
        "Configuration loaded"
    );

    if let Some(metrics_addr) = settings.metrics_addr() {
        metrics::try_init_metrics(metrics_addr);
    }

    let integration = GatewayIntegration::bootstrap(config).await.map_err(|e| {
        error!("Failed to initialize integration: {e}");
        exitcode::CONFIG
    })?;
    let app = build_router(&integration);

    // Start server
    let addr: SocketAddr = settings.server_addr().parse().map_err(|e| {
        error!("Invalid server address: {e}");
        exitcode::CONFIG
    })?;
    let listener = TcpListener::bind(addr).await.map_err(|e| {
        error!("Failed to bind to {addr}: {e}");
        exitcode::UNAVAILABLE
    })?;

    info!("Server listening on http://{addr}");
    info!("API endpoints:");
    info!("  GET  /healthcheck - Health check");
    info!("  ANY  /echo        - Echo the request after validation and injection");

    axum::serve(listener, app)
        .with_graceful_shutdown(utils::shutdown_signal())
        .await
        .map_err(|e| {
            error!("Server error: {e}");
            exitcode::SOFTWARE
        })?;

    info!("Server shutdown complete");
    Ok(())
}
