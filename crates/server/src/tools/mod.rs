//! MCP tool implementations.
//!
//! Each tool drives the worker runtime the way a page or the browser would
//! and reports the result as pretty-printed JSON.

pub mod cache;
pub mod fetch;
pub mod worker;

use archwave_core::Error;
use rmcp::{
    ErrorData as McpError,
    model::{CallToolResult, Content},
};
use serde::Serialize;

/// Serialize `output` into a successful tool result.
pub(crate) fn json_result<T: Serialize>(output: &T) -> Result<CallToolResult, McpError> {
    let json = serde_json::to_string_pretty(output)
        .map_err(|e| Error::InvalidInput(format!("Failed to serialize output: {e}")))?;
    Ok(CallToolResult::success(vec![Content::text(json)]))
}
