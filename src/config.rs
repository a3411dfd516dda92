//! Runtime configuration.
//!
//! Env-driven with sensible fallbacks, so the server binary and the
//! background alignment jobs share one configuration surface.

use std::time::Duration;

use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use tracing::info;

/// Search-index connection and naming.
#[derive(Debug, Clone)]
pub struct IndexConfig {
    /// Base URL of the search index (Elasticsearch-compatible).
    pub base_url: String,
    /// The combined external-authority index.
    pub combined_index: String,
    /// The system's own merged index (parent/child documents).
    pub merged_index: String,
    /// Default language for label selection when the caller's requested
    /// language has no match.
    pub default_lang: String,
    /// Request timeout for index calls.
    pub timeout: Duration,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            base_url: std::env::var("INDEX_URL")
                .unwrap_or_else(|_| "http://localhost:9200".to_string()),
            combined_index: std::env::var("INDEX_COMBINED")
                .unwrap_or_else(|_| "combined".to_string()),
            merged_index: std::env::var("INDEX_MERGED").unwrap_or_else(|_| "places".to_string()),
            default_lang: std::env::var("INDEX_DEFAULT_LANG").unwrap_or_else(|_| "en".to_string()),
            timeout: Duration::from_secs(30),
        }
    }
}

/// Database pool configuration.
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub database_url: String,
    pub max_connections: u32,
    pub connection_timeout: Duration,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            database_url: std::env::var("DATABASE_URL")
                .unwrap_or_else(|_| "postgresql://localhost:5432/gazetteer".to_string()),
            max_connections: std::env::var("DATABASE_POOL_SIZE")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(10),
            connection_timeout: Duration::from_secs(30),
        }
    }
}

impl DatabaseConfig {
    /// Connect a pool with this configuration.
    pub async fn connect(&self) -> Result<PgPool, sqlx::Error> {
        info!("connecting to database: {}", mask_database_url(&self.database_url));
        PgPoolOptions::new()
            .max_connections(self.max_connections)
            .acquire_timeout(self.connection_timeout)
            .connect(&self.database_url)
            .await
    }
}

/// Reconciliation server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub bind_addr: String,
    /// Public base URL advertised in the service manifest.
    pub public_url: String,
    /// Maximum queries accepted per reconciliation batch.
    pub batch_ceiling: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: std::env::var("RECON_BIND").unwrap_or_else(|_| "0.0.0.0:8005".to_string()),
            public_url: std::env::var("RECON_PUBLIC_URL")
                .unwrap_or_else(|_| "http://localhost:8005".to_string()),
            batch_ceiling: std::env::var("RECON_BATCH_CEILING")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(50),
        }
    }
}

/// Mask credentials in a database URL before logging it.
fn mask_database_url(url: &str) -> String {
    match url::Url::parse(url) {
        Ok(mut parsed) => {
            if parsed.password().is_some() {
                let _ = parsed.set_password(Some("****"));
            }
            parsed.to_string()
        }
        Err(_) => "<unparseable database url>".to_string(),
    }
}
