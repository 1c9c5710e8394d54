pub mod config;
pub mod operations;

use std::time::Instant;

use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use thiserror::Error;

use crate::db::config::{DbConfig, DbConfigError};

#[derive(Debug, Clone)]
pub enum HealthCheckResult {
    Healthy { latency_ms: u64 },
    Unhealthy { reason: String },
}

impl HealthCheckResult {
    pub fn is_healthy(&self) -> bool {
        matches!(self, Self::Healthy { .. })
    }
}

#[derive(Clone)]
pub struct DatabaseProxy {
    config: DbConfig,
    pool: PgPool,
}

impl DatabaseProxy {
    pub async fn from_env() -> Result<Self, DbInitError> {
        let config = DbConfig::from_env()?;
        Self::connect(config).await
    }

    pub async fn connect(config: DbConfig) -> Result<Self, DbInitError> {
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(config.acquire_timeout)
            .connect(&config.primary_url)
            .await?;

        Ok(Self { config, pool })
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    pub async fn check_health(&self) -> HealthCheckResult {
        let started = Instant::now();
        let result = tokio::time::timeout(
            self.config.health_check_timeout,
            sqlx::query("SELECT 1").execute(&self.pool),
        )
        .await;

        match result {
            Ok(Ok(_)) => HealthCheckResult::Healthy {
                latency_ms: started.elapsed().as_millis() as u64,
            },
            Ok(Err(err)) => HealthCheckResult::Unhealthy {
                reason: err.to_string(),
            },
            Err(_) => HealthCheckResult::Unhealthy {
                reason: "timeout".to_string(),
            },
        }
    }
}

#[derive(Debug, Error)]
pub enum DbInitError {
    #[error(transparent)]
    Config(#[from] DbConfigError),
    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
}
