//! cache_delete tool implementation.
//!
//! Drops a whole cache store. Deleting the active generation's store leaves
//! the worker running; its next cache miss recreates the store.

use crate::state::ServerState;
use crate::tools::json_result;
use archwave_core::Error;
use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Parameters for the cache_delete tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CacheDeleteParams {
    /// Name of the store to delete.
    pub store: String,
}

/// Output from the cache_delete tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CacheDeleteOutput {
    /// Whether a store with that name existed.
    pub deleted: bool,
    pub stores: Vec<String>,
}

pub async fn delete_impl(state: &ServerState, params: CacheDeleteParams) -> Result<CallToolResult, McpError> {
    if params.store.trim().is_empty() {
        return Err(Error::InvalidInput("store cannot be empty".into()).into());
    }

    let caches = state.registration.caches();
    let deleted = caches.delete_store(&params.store).await?;
    tracing::info!(store = %params.store, deleted, "cache store deleted");

    json_result(&CacheDeleteOutput { deleted, stores: caches.store_names().await? })
}
