pub mod api;
pub mod assistant;
pub mod auth;
pub mod config;
pub mod core_state;
pub mod db;
pub mod intelligence;
pub mod models;
pub mod monitoring;
pub mod realtime;

use std::sync::Arc;

use tracing_subscriber::EnvFilter;

/// Load configuration, open the database and serve until Ctrl-C.
pub async fn run() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config::default_log_filter())),
        )
        .init();

    tracing::info!("{} starting v{}", config::APP_NAME, config::APP_VERSION);

    let config = config::AppConfig::from_env()?;
    tracing::info!(
        environment = ?config.environment,
        database = %config.database_path.display(),
        generator = config.generator.is_some(),
        "configuration loaded"
    );

    let core = Arc::new(core_state::CoreState::new(config)?);
    let mut server = api::server::start(core).await?;
    tracing::info!(addr = %server.addr, "listening");

    tokio::signal::ctrl_c().await?;
    server.shutdown();
    server.stopped().await;
    Ok(())
}
