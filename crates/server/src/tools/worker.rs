//! worker_register, worker_status and worker_message tools.

use super::json_result;
use crate::state::ServerState;
use archwave_core::Error;
use archwave_worker::{ClientId, PageAgent, RegisterOutcome, RegistrationStatus, WorkerMessage, WorkerScript, WorkerState};
use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Parameters for the worker_register tool.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct WorkerRegisterParams {
    /// Generation tag to install instead of the built-in one.
    #[serde(default)]
    pub generation_tag: Option<String>,

    /// Shell manifest to seed instead of the built-in one.
    #[serde(default)]
    pub shell_manifest: Option<Vec<String>>,

    /// Whether the install handler signals skip-waiting itself (default: true).
    /// When false, an update is left waiting and the page asks it to take over.
    #[serde(default)]
    pub skip_waiting_on_install: Option<bool>,
}

/// The page opened at boot, as its bootstrap script sees it.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct PageView {
    pub client: ClientId,
    pub controller: Option<String>,
    /// Whether a controller change has already triggered the page's one reload.
    pub reloaded: bool,
}

impl PageView {
    fn of(page: &PageAgent) -> Self {
        Self { client: page.client(), controller: page.controller(), reloaded: page.has_reloaded() }
    }
}

/// Output from the worker_register tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct WorkerRegisterOutput {
    pub outcome: RegisterOutcome,
    pub page: PageView,
    pub status: RegistrationStatus,
}

/// Output from the worker_status tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct WorkerStatusOutput {
    pub page: PageView,
    pub status: RegistrationStatus,
}

/// Parameters for the worker_message tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct WorkerMessageParams {
    /// Message payload, e.g. `{"type": "SKIP_WAITING"}`.
    pub message: serde_json::Value,
}

/// Output from the worker_message tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct WorkerMessageOutput {
    /// Whether the payload was a message the worker understands.
    pub recognized: bool,
    /// State of the version that received the message, after handling it.
    pub state: WorkerState,
    pub page: PageView,
    pub status: RegistrationStatus,
}

fn script_for(state: &ServerState, params: WorkerRegisterParams) -> Result<WorkerScript, Error> {
    let mut script = state.script.clone();
    if let Some(tag) = params.generation_tag {
        let tag = tag.trim();
        if tag.is_empty() {
            return Err(Error::InvalidInput("generation_tag cannot be empty".into()));
        }
        script.generation_tag = tag.to_string();
    }
    if let Some(manifest) = params.shell_manifest {
        script.shell_manifest = manifest;
    }
    if let Some(skip) = params.skip_waiting_on_install {
        script.skip_waiting_on_install = skip;
    }
    Ok(script)
}

/// Register the worker script from the boot page, installing a new
/// generation when it differs from the active or waiting one.
pub async fn register_impl(state: &ServerState, params: WorkerRegisterParams) -> Result<CallToolResult, McpError> {
    let script = script_for(state, params)?;
    let mut page = state.page.lock().await;
    let outcome = page.register(script).await?;

    json_result(&WorkerRegisterOutput { outcome, page: PageView::of(&page), status: state.registration.status() })
}

pub async fn status_impl(state: &ServerState) -> Result<CallToolResult, McpError> {
    let mut page = state.page.lock().await;
    page.poll_controller_change();

    json_result(&WorkerStatusOutput { page: PageView::of(&page), status: state.registration.status() })
}

/// Post a message from the page to the waiting worker, or the active one
/// when nothing is waiting.
pub async fn message_impl(state: &ServerState, params: WorkerMessageParams) -> Result<CallToolResult, McpError> {
    let message = WorkerMessage::from_value(&params.message);
    let recognized = message != WorkerMessage::Unknown;
    let mut page = state.page.lock().await;
    let worker_state = state.registration.post_message(message).await?;
    page.poll_controller_change();

    json_result(&WorkerMessageOutput {
        recognized,
        state: worker_state,
        page: PageView::of(&page),
        status: state.registration.status(),
    })
}
