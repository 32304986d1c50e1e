use deadpool_postgres::{
    Config, ManagerConfig, Pool, PoolConfig, RecyclingMethod, Runtime, Timeouts,
};
use std::time::Duration;
use tokio_postgres::NoTls;

use crate::error::Result;

/// Creates the connection pool used by the Postgres row store.
///
/// Statements are prepared through `Client::prepare_cached`, so the pool's
/// per-connection statement cache is the only one in play.
pub fn create_pool(database_url: &str, max_size: usize) -> Result<Pool> {
    let mut cfg = Config::new();
    cfg.url = Some(database_url.to_string());

    cfg.manager = Some(ManagerConfig {
        recycling_method: RecyclingMethod::Fast,
    });

    let mut pool = PoolConfig::new(max_size.max(1));
    pool.timeouts = Timeouts {
        wait: Some(Duration::from_secs(5)),
        create: Some(Duration::from_secs(2)),
        recycle: Some(Duration::from_secs(1)),
    };
    cfg.pool = Some(pool);

    let pool = cfg.create_pool(Some(Runtime::Tokio1), NoTls)?;
    tracing::info!("✅ PostgreSQL pool initialized (max {} connections)", max_size);
    Ok(pool)
}
