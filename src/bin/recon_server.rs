//! Reconciliation service binary: wires configuration, the index
//! gateway, and the router, then serves.

use std::sync::Arc;

use anyhow::{Context, Result};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;
use tracing_subscriber::EnvFilter;

use gazetteer::config::{IndexConfig, ServerConfig};
use gazetteer::index::EsGateway;
use gazetteer::recon::{recon_router, ReconState};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let index_config = IndexConfig::default();
    let server_config = ServerConfig::default();

    let gateway = EsGateway::new(&index_config).context("building index gateway")?;
    let state = ReconState {
        gateway: Arc::new(gateway),
        index: index_config.merged_index.clone(),
        default_lang: index_config.default_lang.clone(),
        batch_ceiling: server_config.batch_ceiling,
        public_url: server_config.public_url.clone(),
    };

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);
    let app = recon_router(state).layer(cors).layer(TraceLayer::new_for_http());

    let listener = tokio::net::TcpListener::bind(&server_config.bind_addr)
        .await
        .with_context(|| format!("binding {}", server_config.bind_addr))?;
    info!(addr = %server_config.bind_addr, index = %index_config.merged_index, "reconciliation service listening");
    axum::serve(listener, app).await.context("serving")?;
    Ok(())
}
