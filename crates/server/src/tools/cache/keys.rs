//! cache_keys tool implementation.
//!
//! Lists the stores in cache storage and the entries of one of them.

use crate::state::ServerState;
use crate::tools::json_result;
use archwave_core::{EntryMeta, Error};
use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Parameters for the cache_keys tool.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct CacheKeysParams {
    /// Store to list (default: the active worker's generation, or the
    /// built-in generation when no worker is active).
    #[serde(default)]
    pub store: Option<String>,
}

/// Output from the cache_keys tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CacheKeysOutput {
    /// Every store name, in creation order.
    pub stores: Vec<String>,
    pub store: String,
    pub entries: Vec<EntryMeta>,
}

pub async fn keys_impl(state: &ServerState, params: CacheKeysParams) -> Result<CallToolResult, McpError> {
    let name = match params.store {
        Some(name) => name,
        None => state
            .registration
            .active()
            .map(|v| v.generation_tag().to_string())
            .unwrap_or_else(|| state.script.generation_tag.clone()),
    };

    let caches = state.registration.caches();
    let store = caches
        .get_store(&name)
        .await?
        .ok_or_else(|| Error::CacheMiss(format!("no cache store named {name}")))?;

    let output = CacheKeysOutput { stores: caches.store_names().await?, entries: store.entries().await?, store: name };
    json_result(&output)
}
