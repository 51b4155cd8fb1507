use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub log_level: String,
    pub pool: PoolConfig,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        let _ = dotenvy::dotenv();

        let database_url = std::env::var("DATABASE_URL").map_err(|_| ConfigError::Missing {
            key: "DATABASE_URL",
        })?;

        let log_level = std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());

        Ok(Self {
            database_url,
            log_level,
            pool: PoolConfig::from_env(),
        })
    }
}

#[derive(Debug, Clone)]
pub struct PoolConfig {
    pub max_connections: u32,
    pub acquire_timeout: Duration,
}

impl PoolConfig {
    fn from_env() -> Self {
        let max_connections = env_u32("DB_MAX_CONNECTIONS", 10);
        let acquire_timeout_ms = env_u64("DB_ACQUIRE_TIMEOUT_MS", 5000);

        Self {
            max_connections,
            acquire_timeout: Duration::from_millis(acquire_timeout_ms),
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required env var: {key}")]
    Missing { key: &'static str },
}

fn env_u64(key: &str, default: u64) -> u64 {
    std::env::var(key)
        .ok()
        .and_then(|value| value.parse::<u64>().ok())
        .unwrap_or(default)
}

fn env_u32(key: &str, default: u32) -> u32 {
    std::env::var(key)
        .ok()
        .and_then(|value| value.parse::<u32>().ok())
        .unwrap_or(default)
}
