//! # Configuration
//!
//! Database and pool configuration loaded from the environment through the
//! `config` crate, with explicit validation and no silent fallbacks for the
//! connection URL. Pool profiles cover the deployment shapes this core is
//! run in; individual knobs can be overridden per environment variable.

use std::time::Duration;

use config::{Config, Environment};
use serde::Deserialize;

use crate::error::{QuarryError, Result};

/// Detect the runtime environment (`QUARRY_ENV`, then `APP_ENV`,
/// defaulting to `development`).
pub fn environment() -> String {
    std::env::var("QUARRY_ENV")
        .or_else(|_| std::env::var("APP_ENV"))
        .unwrap_or_else(|_| "development".to_string())
}

/// Connection pool sizing and lifetime settings.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct PoolSettings {
    pub max_connections: u32,
    pub min_connections: u32,
    pub acquire_timeout_seconds: u64,
    pub idle_timeout_seconds: u64,
    pub max_lifetime_seconds: u64,
    pub test_before_acquire: bool,
}

impl Default for PoolSettings {
    fn default() -> Self {
        Self {
            max_connections: 20,
            min_connections: 2,
            acquire_timeout_seconds: 5,
            idle_timeout_seconds: 300,
            max_lifetime_seconds: 3600,
            test_before_acquire: true,
        }
    }
}

impl PoolSettings {
    /// Small pool with fast timeouts for test runs.
    pub fn test() -> Self {
        Self {
            max_connections: 5,
            min_connections: 1,
            acquire_timeout_seconds: 3,
            idle_timeout_seconds: 60,
            max_lifetime_seconds: 600,
            test_before_acquire: true,
        }
    }

    /// Minimal pool for containers and other resource-constrained hosts.
    pub fn constrained() -> Self {
        Self {
            max_connections: 5,
            min_connections: 1,
            acquire_timeout_seconds: 15,
            idle_timeout_seconds: 900,
            max_lifetime_seconds: 10800,
            test_before_acquire: false,
        }
    }

    pub fn acquire_timeout(&self) -> Duration {
        Duration::from_secs(self.acquire_timeout_seconds)
    }

    pub fn idle_timeout(&self) -> Duration {
        Duration::from_secs(self.idle_timeout_seconds)
    }

    pub fn max_lifetime(&self) -> Duration {
        Duration::from_secs(self.max_lifetime_seconds)
    }
}

/// Top-level database configuration.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct DatabaseConfig {
    pub url: String,
    #[serde(default)]
    pub pool: PoolSettings,
}

impl DatabaseConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            pool: PoolSettings::default(),
        }
    }

    pub fn with_pool(mut self, pool: PoolSettings) -> Self {
        self.pool = pool;
        self
    }

    /// Load configuration from the environment.
    ///
    /// `QUARRY_DATABASE_URL` takes precedence, then `DATABASE_URL`. Pool
    /// sizing starts from the profile matching the runtime environment and
    /// applies `QUARRY_DB_MAX_CONNECTIONS` / `QUARRY_DB_MIN_CONNECTIONS`
    /// overrides when present.
    pub fn from_env() -> Result<Self> {
        let source = Config::builder()
            .add_source(Environment::with_prefix("QUARRY"))
            .build()
            .map_err(|e| QuarryError::Configuration(e.to_string()))?;

        let url = source
            .get_string("database_url")
            .ok()
            .or_else(|| std::env::var("DATABASE_URL").ok())
            .ok_or_else(|| {
                QuarryError::Configuration(
                    "database url is not set (QUARRY_DATABASE_URL or DATABASE_URL)".to_string(),
                )
            })?;

        let mut pool = match environment().as_str() {
            "test" => PoolSettings::test(),
            _ => PoolSettings::default(),
        };

        if let Ok(max) = source.get_int("db_max_connections") {
            pool.max_connections = u32::try_from(max)
                .map_err(|_| QuarryError::Configuration("db_max_connections out of range".into()))?;
        }
        if let Ok(min) = source.get_int("db_min_connections") {
            pool.min_connections = u32::try_from(min)
                .map_err(|_| QuarryError::Configuration("db_min_connections out of range".into()))?;
        }

        Ok(Self { url, pool })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_profile_is_reasonable() {
        let pool = PoolSettings::default();
        assert!(pool.max_connections >= pool.min_connections);
        assert_eq!(pool.acquire_timeout(), Duration::from_secs(5));
    }

    #[test]
    fn test_profile_is_smaller_than_default() {
        assert!(PoolSettings::test().max_connections < PoolSettings::default().max_connections);
    }

    #[test]
    fn config_builder_chain() {
        let config = DatabaseConfig::new("postgresql://localhost/quarry_test")
            .with_pool(PoolSettings::constrained());
        assert_eq!(config.pool, PoolSettings::constrained());
    }
}
