//! Database Integration - PostgreSQL connection pooling

use std::sync::Arc;
use std::time::Duration;

use sqlx::{postgres::PgPoolOptions, Pool, Postgres};

use crate::error::ModelError;

/// Connection pool configuration
#[derive(Debug, Clone)]
pub struct PoolConfig {
    pub max_connections: u32,
    pub min_connections: u32,
    /// Seconds to wait for a connection
    pub acquire_timeout: u64,
    pub idle_timeout: Option<u64>,
    pub max_lifetime: Option<u64>,
    pub test_before_acquire: bool,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_connections: 10,
            min_connections: 1,
            acquire_timeout: 30,
            idle_timeout: Some(600),  // 10 minutes
            max_lifetime: Some(1800), // 30 minutes
            test_before_acquire: true,
        }
    }
}

impl PoolConfig {
    pub fn validate(&self) -> Result<(), ModelError> {
        if self.max_connections == 0 {
            return Err(ModelError::Configuration(
                "max_connections must be greater than zero".to_string(),
            ));
        }
        if self.min_connections > self.max_connections {
            return Err(ModelError::Configuration(format!(
                "min_connections ({}) exceeds max_connections ({})",
                self.min_connections, self.max_connections
            )));
        }
        Ok(())
    }
}

fn validate_database_url(url: &str) -> Result<(), ModelError> {
    if !url.starts_with("postgresql://") && !url.starts_with("postgres://") {
        return Err(ModelError::Configuration(
            "Invalid PostgreSQL URL scheme".to_string(),
        ));
    }
    Ok(())
}

/// Create a database pool with the default configuration
pub async fn create_database_pool(database_url: &str) -> Result<Arc<Pool<Postgres>>, ModelError> {
    create_database_pool_with_config(database_url, &PoolConfig::default()).await
}

/// Create a database pool with custom configuration
pub async fn create_database_pool_with_config(
    database_url: &str,
    config: &PoolConfig,
) -> Result<Arc<Pool<Postgres>>, ModelError> {
    validate_database_url(database_url)?;
    config.validate()?;

    tracing::debug!(
        "Creating database pool with config: max={}, min={}, timeout={}s, idle_timeout={:?}s, max_lifetime={:?}s, test_before_acquire={}",
        config.max_connections,
        config.min_connections,
        config.acquire_timeout,
        config.idle_timeout,
        config.max_lifetime,
        config.test_before_acquire
    );

    let mut options = PgPoolOptions::new()
        .max_connections(config.max_connections)
        .min_connections(config.min_connections)
        .acquire_timeout(Duration::from_secs(config.acquire_timeout))
        .test_before_acquire(config.test_before_acquire);

    if let Some(idle_timeout) = config.idle_timeout {
        options = options.idle_timeout(Duration::from_secs(idle_timeout));
    }

    if let Some(max_lifetime) = config.max_lifetime {
        options = options.max_lifetime(Duration::from_secs(max_lifetime));
    }

    let pool = options.connect(database_url).await.map_err(|e| {
        tracing::error!("Failed to create database pool: {}", e);
        ModelError::Storage(format!("Failed to create database pool: {}", e))
    })?;

    tracing::info!(
        "Database pool created with {} max connections",
        config.max_connections
    );
    Ok(Arc::new(pool))
}
