use std::env;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use zeroize::Zeroizing;

/// Which implementation backs the row store and the auth provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
    /// Supabase-compatible HTTP API for both auth and rows.
    Rest,
    /// HTTP auth, rows straight from the backing Postgres database.
    Postgres,
    /// Everything in process. Local development and tests.
    Memory,
}

impl StoreBackend {
    fn parse(value: &str) -> Result<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "rest" => Ok(Self::Rest),
            "postgres" => Ok(Self::Postgres),
            "memory" => Ok(Self::Memory),
            other => bail!("Unknown STORE_BACKEND '{}' (expected rest, postgres or memory)", other),
        }
    }
}

/// The application's configuration.
#[derive(Clone)]
pub struct Config {
    /// The address the HTTP server binds to.
    pub bind_addr: SocketAddr,
    /// The store/auth implementation.
    pub store_backend: StoreBackend,
    /// Base URL of the backend-as-a-service.
    pub baas_url: String,
    /// Public API key sent as `apikey` on every backend call.
    pub baas_anon_key: Zeroizing<String>,
    /// The URL of the PostgreSQL database (postgres backend only).
    pub database_url: Option<String>,
    /// Maximum number of pooled database connections.
    pub db_pool_size: usize,
    /// Timeout for calls to the backend-as-a-service.
    pub upstream_timeout: Duration,
    /// Origins allowed by CORS.
    pub cors_origins: Vec<String>,
    /// Interval after which one rate-limit token is replenished.
    pub rate_limit_replenish_ms: u64,
    /// Burst size of the per-IP rate limiter.
    pub rate_limit_burst: u32,
    /// Directory served under `/assets`.
    pub assets_dir: PathBuf,
    /// Whether cookies are marked `Secure`.
    pub production: bool,
}

impl Config {
    /// Creates a new `Config` from environment variables.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Creates a `Config` from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let store_backend = match lookup("STORE_BACKEND") {
            Some(value) => StoreBackend::parse(&value)?,
            None => StoreBackend::Rest,
        };

        let (baas_url, baas_anon_key) = if store_backend == StoreBackend::Memory {
            (
                lookup("BAAS_URL").unwrap_or_default(),
                Zeroizing::new(lookup("BAAS_ANON_KEY").unwrap_or_default()),
            )
        } else {
            let url = lookup("BAAS_URL").context("BAAS_URL must be set")?;
            let key = lookup("BAAS_ANON_KEY").context("BAAS_ANON_KEY must be set")?;
            (url.trim_end_matches('/').to_string(), Zeroizing::new(key))
        };

        let database_url = lookup("DATABASE_URL");
        if store_backend == StoreBackend::Postgres && database_url.is_none() {
            bail!("DATABASE_URL must be set when STORE_BACKEND=postgres");
        }

        let bind_addr = lookup("BIND_ADDR")
            .unwrap_or_else(|| "127.0.0.1:3000".to_string())
            .parse()
            .context("Invalid BIND_ADDR")?;

        let cors_origins = lookup("CORS_ORIGINS")
            .unwrap_or_else(|| "http://localhost:3000".to_string())
            .split(',')
            .map(str::trim)
            .filter(|origin| !origin.is_empty())
            .map(str::to_string)
            .collect();

        Ok(Self {
            bind_addr,
            store_backend,
            baas_url,
            baas_anon_key,
            database_url,
            db_pool_size: parse_or(&lookup, "DB_POOL_SIZE", 16)?,
            upstream_timeout: Duration::from_secs(parse_or(&lookup, "UPSTREAM_TIMEOUT_SECS", 10)?),
            cors_origins,
            rate_limit_replenish_ms: parse_or(&lookup, "RATE_LIMIT_REPLENISH_MS", 100)?,
            rate_limit_burst: parse_or(&lookup, "RATE_LIMIT_BURST", 50)?,
            assets_dir: lookup("ASSETS_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("public")),
            production: lookup("APP_ENV").as_deref() == Some("production"),
        })
    }

    /// A configuration for the in-memory backend with generous rate limits.
    pub fn in_memory() -> Self {
        Self {
            bind_addr: SocketAddr::from(([127, 0, 0, 1], 0)),
            store_backend: StoreBackend::Memory,
            baas_url: String::new(),
            baas_anon_key: Zeroizing::new(String::new()),
            database_url: None,
            db_pool_size: 1,
            upstream_timeout: Duration::from_secs(10),
            cors_origins: vec!["http://localhost:3000".to_string()],
            rate_limit_replenish_ms: 1,
            rate_limit_burst: 10_000,
            assets_dir: PathBuf::from("public"),
            production: false,
        }
    }
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> Result<T>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match lookup(key) {
        Some(raw) => raw.trim().parse().with_context(|| format!("Invalid {}", key)),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn rest_backend_requires_baas_settings() {
        let err = Config::from_lookup(lookup_from(&[])).err().unwrap();
        assert!(err.to_string().contains("BAAS_URL"));
    }

    #[test]
    fn rest_backend_defaults() {
        let config = Config::from_lookup(lookup_from(&[
            ("BAAS_URL", "https://project.example.co/"),
            ("BAAS_ANON_KEY", "anon"),
        ]))
        .unwrap();

        assert_eq!(config.store_backend, StoreBackend::Rest);
        assert_eq!(config.baas_url, "https://project.example.co");
        assert_eq!(config.bind_addr, "127.0.0.1:3000".parse().unwrap());
        assert_eq!(config.upstream_timeout, Duration::from_secs(10));
        assert_eq!(config.cors_origins, vec!["http://localhost:3000"]);
        assert!(!config.production);
    }

    #[test]
    fn postgres_backend_requires_database_url() {
        let err = Config::from_lookup(lookup_from(&[
            ("STORE_BACKEND", "postgres"),
            ("BAAS_URL", "https://project.example.co"),
            ("BAAS_ANON_KEY", "anon"),
        ]))
        .err()
        .unwrap();
        assert!(err.to_string().contains("DATABASE_URL"));
    }

    #[test]
    fn memory_backend_needs_nothing() {
        let config = Config::from_lookup(lookup_from(&[
            ("STORE_BACKEND", "Memory"),
            ("CORS_ORIGINS", "http://a.test, http://b.test,"),
            ("APP_ENV", "production"),
        ]))
        .unwrap();
        assert_eq!(config.store_backend, StoreBackend::Memory);
        assert_eq!(config.cors_origins, vec!["http://a.test", "http://b.test"]);
        assert!(config.production);
    }

    #[test]
    fn bad_numbers_are_reported_by_key() {
        let err = Config::from_lookup(lookup_from(&[
            ("STORE_BACKEND", "memory"),
            ("UPSTREAM_TIMEOUT_SECS", "soon"),
        ]))
        .err()
        .unwrap();
        assert!(err.to_string().contains("UPSTREAM_TIMEOUT_SECS"));
    }
}
