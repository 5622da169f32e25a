use anyhow::Context;
use sqlx::{postgres::PgPoolOptions, PgPool};
use tracing::{info, warn};

use crate::config::AppConfig;

pub async fn connect(config: &AppConfig) -> anyhow::Result<PgPool> {
    let db = PgPoolOptions::new()
        .max_connections(10)
        .connect(&config.database_url)
        .await
        .context("connect to database")?;
    Ok(db)
}

/// Brings the schema up to date, optionally wiping it first.
pub async fn prepare_schema(db: &PgPool, reset: bool) -> anyhow::Result<()> {
    if reset {
        warn!("RESET_SCHEMA is set; dropping all user data");
        sqlx::query("DROP TABLE IF EXISTS users")
            .execute(db)
            .await
            .context("drop users table")?;
        sqlx::query("DROP TABLE IF EXISTS _sqlx_migrations")
            .execute(db)
            .await
            .context("drop migration history")?;
    }

    sqlx::migrate!("./migrations")
        .run(db)
        .await
        .context("run migrations")?;
    info!("schema ready");
    Ok(())
}
