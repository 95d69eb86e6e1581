use anyhow::Context;
use dotenvy::dotenv;
use log::{error, info};
use std::sync::Arc;

use workly::core::config::AppConfig;
use workly::core::shared::state::AppState;
use workly::core::shared::utils::{create_conn, run_migrations};
use workly::main_module::run_axum_server;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = AppConfig::load().context("failed to load configuration")?;
    info!(
        "Starting workly {} on {}",
        env!("CARGO_PKG_VERSION"),
        config.bind_address()
    );

    let pool = create_conn(&config.database).context("failed to connect to database")?;
    if let Err(e) = run_migrations(&pool) {
        error!("Database migrations failed: {e}");
        return Err(anyhow::anyhow!("migrations failed: {e}"));
    }
    info!("Database migrations applied");

    let state = Arc::new(AppState::new(pool, config));
    run_axum_server(state).await.context("server error")?;
    info!("Server stopped");
    Ok(())
}
