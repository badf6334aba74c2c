//! Structured errors for tool input handling.

use rmcp::model::{ErrorCode, ErrorData as McpError};

/// Tool input errors that never reach the worker.
#[derive(Debug, thiserror::Error)]
pub enum ToolError {
    /// Invalid input parameters (e.g., empty URL).
    #[error("INVALID_INPUT: {0}")]
    InvalidInput(String),

    /// HTTP method the worker cannot carry.
    #[error("INVALID_METHOD: {0}")]
    InvalidMethod(String),
}

impl From<ToolError> for McpError {
    fn from(err: ToolError) -> Self {
        let (code, message) = match &err {
            ToolError::InvalidInput(msg) => (-32602, msg.clone()),
            ToolError::InvalidMethod(msg) => (-32602, format!("unsupported method: {msg}")),
        };

        McpError { code: ErrorCode(code), message: message.into(), data: None }
    }
}
