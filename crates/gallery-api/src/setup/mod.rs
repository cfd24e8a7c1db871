//! Application setup and initialization

pub mod database;
pub mod routes;
pub mod server;
pub mod services;
pub mod storage;

use crate::state::AppState;
use anyhow::{Context, Result};
use gallery_core::Config;
use std::sync::Arc;

/// Connect the backends, wire the services and build the router.
pub async fn initialize_app(config: &Config) -> Result<(Arc<AppState>, axum::Router)> {
    config
        .validate()
        .context("Configuration validation failed")?;
    tracing::info!(environment = config.environment(), "Configuration loaded");

    let pool = database::setup_database(config).await?;
    let blobs = storage::setup_storage(config).await?;
    let state = services::initialize_services(config, pool, blobs).await?;
    let router = routes::setup_routes(state.clone());

    Ok((state, router))
}
