use std::sync::Arc;

use crate::baas::memory::{MemoryAuth, MemoryStore};
use crate::baas::postgres::PostgresStore;
use crate::baas::rest::RestBackend;
use crate::baas::{AuthProvider, Store};
use crate::config::{Config, StoreBackend};
use crate::error::{AppError, Result};

/// The application's state.
#[derive(Clone)]
pub struct AppState {
    /// The application's configuration.
    pub config: Arc<Config>,
    /// Session lookup and credential exchange.
    pub auth: Arc<dyn AuthProvider>,
    /// Row access.
    pub store: Arc<dyn Store>,
}

impl AppState {
    /// Builds the backends selected by `STORE_BACKEND`.
    pub async fn new(config: &Config) -> Result<Self> {
        let (auth, store): (Arc<dyn AuthProvider>, Arc<dyn Store>) = match config.store_backend {
            StoreBackend::Rest => {
                let rest = Arc::new(RestBackend::new(
                    &config.baas_url,
                    config.baas_anon_key.clone(),
                    config.upstream_timeout,
                )?);
                tracing::info!("✅ REST backend initialized at {}", config.baas_url);
                (rest.clone(), rest)
            }
            StoreBackend::Postgres => {
                let rest = Arc::new(RestBackend::new(
                    &config.baas_url,
                    config.baas_anon_key.clone(),
                    config.upstream_timeout,
                )?);
                let database_url = config
                    .database_url
                    .as_deref()
                    .ok_or_else(|| AppError::Internal("DATABASE_URL is not set".to_string()))?;
                let pool = crate::db::create_pool(database_url, config.db_pool_size)?;
                (rest, Arc::new(PostgresStore::new(pool)))
            }
            StoreBackend::Memory => {
                tracing::warn!("⚠️ Using the in-memory backend; data is lost on restart");
                (Arc::new(MemoryAuth::new()), Arc::new(MemoryStore::new()))
            }
        };

        Ok(Self::with_backends(config.clone(), auth, store))
    }

    /// Assembles a state from already-built backends.
    pub fn with_backends(config: Config, auth: Arc<dyn AuthProvider>, store: Arc<dyn Store>) -> Self {
        AppState {
            config: Arc::new(config),
            auth,
            store,
        }
    }
}
