//! `innkeeper serve` — Start the HTTP gateway.

use innkeeper_config::AppConfig;
use std::path::Path;

pub async fn run(config_path: &Path, port: Option<u16>) -> Result<(), Box<dyn std::error::Error>> {
    let mut config =
        AppConfig::load(config_path).map_err(|e| format!("Failed to load config: {e}"))?;

    if let Some(port) = port {
        config.gateway.port = port;
    }

    tracing::info!(config = ?config, "Configuration loaded");
    innkeeper_gateway::start(config).await
}
