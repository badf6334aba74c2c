//! MCP server handler implementation.
//!
//! Routes tool calls to the implementations in `tools`, all sharing one
//! worker registration.

use crate::state::ServerState;
use crate::tools::cache::{CacheDeleteParams, CacheKeysParams, delete_impl, keys_impl};
use crate::tools::fetch::{NetworkOfflineParams, WorkerFetchParams, fetch_impl, offline_impl};
use crate::tools::worker::{WorkerMessageParams, WorkerRegisterParams, message_impl, register_impl, status_impl};
use std::sync::Arc;

use rmcp::{
    ErrorData as McpError, ServerHandler,
    handler::server::{
        tool::{ToolCallContext, ToolRouter},
        wrapper::Parameters,
    },
    model::{
        CallToolRequestParam, CallToolResult, Implementation, ListToolsResult, PaginatedRequestParam, ProtocolVersion,
        ServerCapabilities, ServerInfo,
    },
    service::{RequestContext, RoleServer},
    tool, tool_router,
};

/// The main MCP server handler for the offline worker.
#[derive(Clone)]
pub struct ArchwaveServer {
    state: Arc<ServerState>,
    tool_router: ToolRouter<Self>,
}

#[tool_router]
impl ArchwaveServer {
    pub fn new(state: ServerState) -> Self {
        Self { state: Arc::new(state), tool_router: Self::tool_router() }
    }

    /// Register the worker script from the boot page.
    ///
    /// Installs a new generation when it differs from the active or waiting one.
    #[tool(
        description = "Register the offline worker script from the site page. Installs a new cache generation (seeding the shell manifest) when it differs from the active one; a waiting update is asked to skip waiting."
    )]
    async fn worker_register(&self, params: Parameters<WorkerRegisterParams>) -> Result<CallToolResult, McpError> {
        register_impl(&self.state, params.0).await
    }

    #[tool(
        description = "Show installing, waiting, and active worker versions, the pages they control, and whether the site page has reloaded."
    )]
    async fn worker_status(&self) -> Result<CallToolResult, McpError> {
        status_impl(&self.state).await
    }

    /// Issue a request as a page.
    #[tool(
        description = "Fetch a URL as a page on the site. The active worker decides between network and cache; the result reports which one answered."
    )]
    async fn worker_fetch(&self, params: Parameters<WorkerFetchParams>) -> Result<CallToolResult, McpError> {
        fetch_impl(&self.state, params.0).await
    }

    #[tool(description = "Post a message to the worker, e.g. {\"type\": \"SKIP_WAITING\"} to activate a waiting version.")]
    async fn worker_message(&self, params: Parameters<WorkerMessageParams>) -> Result<CallToolResult, McpError> {
        message_impl(&self.state, params.0).await
    }

    #[tool(description = "Simulate losing or regaining network connectivity.")]
    async fn network_offline(&self, params: Parameters<NetworkOfflineParams>) -> Result<CallToolResult, McpError> {
        offline_impl(&self.state, params.0).await
    }

    #[tool(description = "List cache stores and the entries held by one of them.")]
    async fn cache_keys(&self, params: Parameters<CacheKeysParams>) -> Result<CallToolResult, McpError> {
        keys_impl(&self.state, params.0).await
    }

    #[tool(description = "Delete a cache store by name.")]
    async fn cache_delete(&self, params: Parameters<CacheDeleteParams>) -> Result<CallToolResult, McpError> {
        delete_impl(&self.state, params.0).await
    }
}

impl ServerHandler for ArchwaveServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            server_info: Implementation {
                name: "archwave-sw".into(),
                version: env!("CARGO_PKG_VERSION").into(),
                ..Default::default()
            },
            protocol_version: ProtocolVersion::LATEST,
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            ..Default::default()
        }
    }

    async fn list_tools(
        &self, _request: Option<PaginatedRequestParam>, _context: RequestContext<RoleServer>,
    ) -> Result<ListToolsResult, rmcp::model::ErrorData> {
        Ok(ListToolsResult { meta: None, tools: self.tool_router.list_all(), next_cursor: None })
    }

    async fn call_tool(
        &self, request: CallToolRequestParam, context: RequestContext<RoleServer>,
    ) -> Result<CallToolResult, rmcp::model::ErrorData> {
        self.tool_router
            .call(ToolCallContext::new(self, request, context))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::testing::offline_state;
    use archwave_worker::WorkerScript;

    #[tokio::test]
    async fn test_all_tools_listed() {
        let server = ArchwaveServer::new(offline_state(WorkerScript::default()).await);

        let mut names: Vec<String> = server.tool_router.list_all().into_iter().map(|t| t.name.to_string()).collect();
        names.sort();

        assert_eq!(
            names,
            [
                "cache_delete",
                "cache_keys",
                "network_offline",
                "worker_fetch",
                "worker_message",
                "worker_register",
                "worker_status"
            ]
        );
    }

    #[tokio::test]
    async fn test_server_info() {
        let server = ArchwaveServer::new(offline_state(WorkerScript::default()).await);
        let info = server.get_info();
        assert_eq!(info.server_info.name, "archwave-sw");
        assert!(info.capabilities.tools.is_some());
    }
}
