use std::time::Duration;

use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use thiserror::Error;

use crate::config::{Config, ConfigError};

/// Thin wrapper over the Postgres pool. All services borrow the pool from
/// here; nothing in the core holds a second connection source.
#[derive(Clone)]
pub struct Database {
    pool: PgPool,
}

impl Database {
    pub async fn from_env() -> Result<Self, DbInitError> {
        let config = Config::from_env()?;
        Self::connect(&config).await
    }

    pub async fn connect(config: &Config) -> Result<Self, DbInitError> {
        let pool = PgPoolOptions::new()
            .max_connections(config.pool.max_connections)
            .acquire_timeout(config.pool.acquire_timeout)
            .connect(&config.database_url)
            .await
            .map_err(DbInitError::Sqlx)?;

        Ok(Self { pool })
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    pub async fn run_migrations(&self) -> Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("./migrations").run(&self.pool).await
    }

    /// Round-trips a trivial query; used by callers wiring liveness checks.
    pub async fn ping(&self, timeout: Duration) -> Result<(), DbPingError> {
        let result = tokio::time::timeout(timeout, sqlx::query("SELECT 1").execute(&self.pool)).await;
        match result {
            Ok(Ok(_)) => Ok(()),
            Ok(Err(err)) => Err(DbPingError::Sqlx(err)),
            Err(_) => Err(DbPingError::Timeout),
        }
    }
}

#[derive(Debug, Error)]
pub enum DbInitError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
}

#[derive(Debug, Error)]
pub enum DbPingError {
    #[error("health check timed out")]
    Timeout,
    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
}
