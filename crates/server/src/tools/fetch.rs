//! worker_fetch and network_offline tools.
//!
//! `worker_fetch` issues a request as an open page, so it goes through the
//! active worker exactly as a browser navigation or subresource load would.

use super::json_result;
use crate::error::ToolError;
use crate::state::ServerState;
use archwave_client::resolve;
use archwave_core::{Error, Request};
use archwave_worker::{ClientId, ResponseSource};
use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Longest body preview returned in a tool result.
const BODY_PREVIEW_CHARS: usize = 4096;

fn default_method() -> String {
    "GET".to_string()
}

/// Parameters for the worker_fetch tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct WorkerFetchParams {
    /// Path on the site origin (e.g. "/about") or an absolute URL.
    pub url: String,

    /// HTTP method (default: GET). Only GET requests are handled by the worker.
    #[serde(default = "default_method")]
    pub method: String,

    /// Page issuing the request (default: the page opened at boot).
    #[serde(default)]
    pub client: Option<ClientId>,
}

/// Output from the worker_fetch tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct WorkerFetchOutput {
    pub url: String,
    pub status: u16,
    pub status_text: String,
    pub source: ResponseSource,
    pub content_type: Option<String>,
    pub body_bytes: usize,
    /// Body decoded as UTF-8 (lossy), truncated for display.
    pub body_preview: String,
    pub body_truncated: bool,
}

/// Parameters for the network_offline tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct NetworkOfflineParams {
    /// True to drop connectivity, false to restore it.
    pub offline: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct NetworkOfflineOutput {
    pub offline: bool,
}

fn parse_method(method: &str) -> Result<String, ToolError> {
    let method = method.trim().to_ascii_uppercase();
    if method.is_empty() || !method.bytes().all(|b| b.is_ascii_alphabetic()) {
        return Err(ToolError::InvalidMethod(method));
    }
    Ok(method)
}

pub async fn fetch_impl(state: &ServerState, params: WorkerFetchParams) -> Result<CallToolResult, McpError> {
    if params.url.trim().is_empty() {
        return Err(ToolError::InvalidInput("url cannot be empty".into()).into());
    }
    let method = parse_method(&params.method)?;
    let url = resolve(state.registration.origin(), &params.url).map_err(|e| Error::InvalidUrl(e.to_string()))?;
    let client = params.client.unwrap_or(state.default_client);

    let served = state.registration.fetch(client, Request::new(&method, url)).await?;

    let response = served.response;
    let text = String::from_utf8_lossy(&response.body);
    let body_truncated = text.chars().count() > BODY_PREVIEW_CHARS;
    let output = WorkerFetchOutput {
        content_type: response.content_type().map(str::to_string),
        body_bytes: response.body.len(),
        body_preview: text.chars().take(BODY_PREVIEW_CHARS).collect(),
        body_truncated,
        url: response.url,
        status: response.status,
        status_text: response.status_text,
        source: served.source,
    };

    json_result(&output)
}

pub async fn offline_impl(state: &ServerState, params: NetworkOfflineParams) -> Result<CallToolResult, McpError> {
    state.network.set_offline(params.offline);
    json_result(&NetworkOfflineOutput { offline: state.network.is_offline() })
}
