use std::sync::Arc;

use tracing_subscriber::EnvFilter;

use vitalab::api::{server, ApiContext};
use vitalab::config::{AppConfig, APP_NAME, APP_VERSION};
use vitalab::db;
use vitalab::storage::ReportStore;

#[tokio::main]
async fn main() {
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    tracing::info!("{APP_NAME} starting v{APP_VERSION}");

    let config = Arc::new(AppConfig::from_env());
    if let Err(e) = run(config).await {
        tracing::error!("fatal: {e}");
        std::process::exit(1);
    }
}

async fn run(config: Arc<AppConfig>) -> Result<(), String> {
    // Open once at startup to run migrations; requests open their own
    // connections afterwards.
    db::open_database(&config.database_path)
        .map_err(|e| format!("database initialization failed: {e}"))?;

    let store = Arc::new(
        ReportStore::from_config(&config.storage)
            .map_err(|e| format!("storage initialization failed: {e}"))?,
    );

    let ctx = ApiContext::new(config, store);
    let mut server = server::start_server(ctx).await?;
    tracing::info!(addr = %server.addr, "listening");

    tokio::signal::ctrl_c()
        .await
        .map_err(|e| format!("signal handler failed: {e}"))?;
    tracing::info!("shutdown requested");

    server.shutdown();
    server.join().await;
    Ok(())
}
