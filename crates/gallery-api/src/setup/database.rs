//! Persistent Store connection

use anyhow::{Context, Result};
use gallery_core::Config;
use sqlx::migrate::Migrator;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use std::time::Duration;

/// Schema migrations, embedded at build time from the workspace `migrations/`.
static MIGRATOR: Migrator = sqlx::migrate!("../../migrations");

pub async fn setup_database(config: &Config) -> Result<PgPool> {
    let pool = PgPoolOptions::new()
        .max_connections(config.db_max_connections())
        .acquire_timeout(Duration::from_secs(config.db_timeout_seconds()))
        .idle_timeout(Duration::from_secs(600))
        .connect(config.database_url())
        .await
        .context("Failed to connect to the picture store database")?;
    tracing::info!(
        max_connections = config.db_max_connections(),
        "Database pool ready"
    );

    MIGRATOR
        .run(&pool)
        .await
        .context("Failed to apply gallery schema migrations")?;
    tracing::info!(migrations = MIGRATOR.iter().count(), "Gallery schema up to date");

    Ok(pool)
}
