/// Application context and dependency injection
use crate::{
    account::AccountManager,
    config::ServerConfig,
    db,
    error::{RegistryError, RegistryResult},
    geotag::GeoTagManager,
    rate_limit::RateLimiter,
    registry::{RegistryService, StatisticsAggregator},
};
use sqlx::SqlitePool;
use std::sync::Arc;

/// Application context holding all shared services
#[derive(Clone)]
pub struct AppContext {
    pub config: Arc<ServerConfig>,
    pub db: SqlitePool,
    pub account_manager: Arc<AccountManager>,
    pub registry: Arc<RegistryService>,
    pub statistics: Arc<StatisticsAggregator>,
    pub geotags: Arc<GeoTagManager>,
    pub rate_limiter: Arc<RateLimiter>,
}

impl AppContext {
    /// Create a new application context from configuration
    pub async fn new(config: ServerConfig) -> RegistryResult<Self> {
        config.validate()?;

        Self::ensure_directories(&config).await?;

        let options = db::DatabaseOptions {
            max_connections: config.storage.max_connections,
            ..Default::default()
        };
        let pool = db::create_pool(&config.storage.registry_db, options).await?;

        db::run_migrations(&pool).await?;
        db::test_connection(&pool).await?;

        Self::from_pool(config, pool).await
    }

    /// Build the services over an existing, migrated pool
    pub async fn from_pool(config: ServerConfig, pool: SqlitePool) -> RegistryResult<Self> {
        let config = Arc::new(config);
        let mode = config.authentication.mode;

        let account_manager = Arc::new(AccountManager::new(pool.clone(), Arc::clone(&config)));
        if let Some(admin) = &config.authentication.bootstrap_admin {
            account_manager.ensure_bootstrap_admin(admin).await?;
        }

        tracing::info!(mode = mode.as_str(), "Registry services initialized");

        Ok(Self {
            registry: Arc::new(RegistryService::new(pool.clone(), mode)),
            statistics: Arc::new(StatisticsAggregator::new(pool.clone())),
            geotags: Arc::new(GeoTagManager::new(pool.clone(), mode)),
            rate_limiter: Arc::new(RateLimiter::new(&config.rate_limit)),
            account_manager,
            db: pool,
            config,
        })
    }

    /// Ensure required directories exist
    async fn ensure_directories(config: &ServerConfig) -> RegistryResult<()> {
        let dir = &config.storage.data_directory;
        if !dir.exists() {
            tokio::fs::create_dir_all(dir).await.map_err(|e| {
                RegistryError::Internal(format!("Failed to create directory {:?}: {}", dir, e))
            })?;
        }

        Ok(())
    }

    /// Get service URL
    pub fn service_url(&self) -> String {
        format!(
            "http://{}:{}",
            self.config.service.hostname, self.config.service.port
        )
    }
}
