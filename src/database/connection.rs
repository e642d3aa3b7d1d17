//! Database connection handling.

use sqlx::postgres::PgPoolOptions;
use sqlx::{PgPool, Row};
use tracing::info;

use crate::config::DatabaseConfig;
use crate::error::Result;

/// Owns the connection pool for one database.
pub struct DatabaseConnection {
    pool: PgPool,
}

impl DatabaseConnection {
    /// Build a pool from explicit configuration.
    pub async fn connect(config: &DatabaseConfig) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(config.pool.max_connections)
            .min_connections(config.pool.min_connections)
            .acquire_timeout(config.pool.acquire_timeout())
            .idle_timeout(config.pool.idle_timeout())
            .max_lifetime(config.pool.max_lifetime())
            .test_before_acquire(config.pool.test_before_acquire)
            .connect(&config.url)
            .await?;

        info!(
            max_connections = config.pool.max_connections,
            min_connections = config.pool.min_connections,
            "database pool ready"
        );

        Ok(Self { pool })
    }

    /// Build a pool from the environment (`QUARRY_DATABASE_URL` or
    /// `DATABASE_URL`).
    pub async fn from_env() -> Result<Self> {
        Self::connect(&DatabaseConfig::from_env()?).await
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    pub async fn health_check(&self) -> Result<bool> {
        let row = sqlx::query("SELECT 1 as health").fetch_one(&self.pool).await?;
        let health: i32 = row.try_get("health")?;
        Ok(health == 1)
    }

    pub async fn close(self) {
        self.pool.close().await;
    }
}
