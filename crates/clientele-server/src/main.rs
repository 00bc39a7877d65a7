//! Clientele Server — application entry point.

use clientele_server::ServerConfig;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .json()
        .init();

    let path = ServerConfig::default_path();
    tracing::info!(config = %path.display(), "Starting Clientele server...");

    let config = ServerConfig::load_from(&path)?;
    if let Err(e) = clientele_server::start(config).await {
        tracing::error!(error = %e, "server failed");
        return Err(e);
    }

    tracing::info!("Clientele server stopped.");
    Ok(())
}
