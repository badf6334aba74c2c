//! archwave-sw server entry point.
//!
//! Boots the offline worker runtime against the configured origin and
//! exposes it as MCP tools on stdio. Logging goes to stderr to avoid
//! interfering with the JSON-RPC protocol on stdout.

use anyhow::{Context, Result};
use archwave_client::{FetchClient, FetchConfig};
use archwave_core::{AppConfig, CacheStorage};
use archwave_worker::WorkerScript;
use rmcp::service::serve_server;
use rmcp::transport::io::stdio;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

mod error;
mod handler;
mod state;
mod tools;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .json()
        .init();

    let config = AppConfig::load().context("loading configuration")?;
    let origin = config.origin_url()?;
    tracing::info!(origin = %origin, db_path = %config.db_path.display(), "starting archwave-sw on stdio transport");

    let caches = CacheStorage::open(&config.db_path)
        .await
        .with_context(|| format!("opening cache storage at {}", config.db_path.display()))?
        .with_quota(config.quota_bytes);

    let network = Arc::new(FetchClient::new(FetchConfig {
        user_agent: config.user_agent.clone(),
        max_bytes: config.max_bytes,
        timeout: config.timeout(),
        ..FetchConfig::default()
    })?);

    let state = state::ServerState::boot(origin, caches, network, WorkerScript::default()).await?;
    let handler = handler::ArchwaveServer::new(state);
    let server = serve_server(handler, stdio()).await?;

    server.waiting().await?;

    Ok(())
}
