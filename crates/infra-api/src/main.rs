//! Infra API server entry point.
//!
//! Loads `infra-config.yaml`, connects to the configured feature layers
//! and serves the HTTP API until the process is terminated.

use std::sync::Arc;

use infra_api::{AppState, start_server};
use infra_core::config::InfraConfig;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Application entry point.
///
/// # Errors
///
/// Returns an error if the configuration cannot be loaded or the server
/// fails to bind.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(true)
        .init();

    info!("infra-api starting");

    let config_path = InfraConfig::default_path();
    let config = InfraConfig::from_file(&config_path)?;
    info!(
        config = %config_path.display(),
        layers = config.layers.len(),
        bindings = config.reactions.bindings.len(),
        host = %config.server.host,
        port = config.server.port,
        "configuration loaded"
    );

    let state = Arc::new(AppState::connect(&config).await);
    start_server(&config.server, state).await?;

    Ok(())
}
