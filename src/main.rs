//! Serves the labor cost API over an in-memory store.
//!
//! `LABOR_COST_CONFIG` selects the configuration directory
//! (default `./config/furniture`).

use std::sync::Arc;

use labor_cost_engine::api::{AppState, create_router};
use labor_cost_engine::config::ConfigLoader;
use labor_cost_engine::logging;
use labor_cost_engine::store::InMemoryStore;
use tracing::info;

const DEFAULT_CONFIG_DIR: &str = "./config/furniture";

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    logging::init();

    let config_dir =
        std::env::var("LABOR_COST_CONFIG").unwrap_or_else(|_| DEFAULT_CONFIG_DIR.to_string());
    let config = ConfigLoader::load(&config_dir)?.into_config();
    info!(
        config = %config.metadata().name,
        version = %config.metadata().version,
        dir = %config_dir,
        "Loaded configuration"
    );

    let bind = config.server().bind.clone();
    let state = AppState::in_memory(Arc::new(InMemoryStore::new()), config);

    let listener = tokio::net::TcpListener::bind(&bind).await?;
    info!(address = %bind, "Labor cost API listening");
    axum::serve(listener, create_router(state)).await?;
    Ok(())
}
