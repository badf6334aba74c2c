//! The worker script's four lifecycle handlers.
//!
//! The registration runtime drives a generation through these; each one
//! receives the generation's `WorkerScope`. Work a handler does not await
//! itself goes through `WorkerScope::wait_until`.

mod activate;
mod fetch;
mod install;
mod message;

use crate::message::WorkerMessage;
use crate::scope::WorkerScope;
use crate::script::WorkerScript;
use archwave_client::Network;
use archwave_core::{CacheStorage, Error, Request, Response};
use async_trait::async_trait;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use url::Url;

/// Where the response handed to the page came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum ResponseSource {
    Network,
    Cache,
}

/// A response handed back to the page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Served {
    pub response: Response,
    pub source: ResponseSource,
}

impl Served {
    pub fn network(response: Response) -> Self {
        Self { response, source: ResponseSource::Network }
    }

    pub fn cache(response: Response) -> Self {
        Self { response, source: ResponseSource::Cache }
    }
}

/// Result of the fetch handler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchOutcome {
    /// Not taken over; the request goes out as if never intercepted.
    Passthrough,
    /// Taken over. `None` surfaces to the page as a failed fetch.
    Respond(Option<Served>),
}

#[async_trait]
pub trait WorkerHandlers: Send + Sync {
    async fn install(&self, scope: &WorkerScope) -> Result<(), Error>;
    async fn activate(&self, scope: &WorkerScope) -> Result<(), Error>;
    async fn fetch(&self, scope: &WorkerScope, request: &Request) -> FetchOutcome;
    async fn message(&self, scope: &WorkerScope, message: &WorkerMessage);
}

/// The Architecture Wave offline worker.
pub struct OfflineWorker {
    script: WorkerScript,
    origin: Url,
    caches: CacheStorage,
    network: Arc<dyn Network>,
}

impl OfflineWorker {
    pub fn new(script: WorkerScript, origin: Url, caches: CacheStorage, network: Arc<dyn Network>) -> Self {
        Self { script, origin, caches, network }
    }

    pub fn script(&self) -> &WorkerScript {
        &self.script
    }
}

#[async_trait]
impl WorkerHandlers for OfflineWorker {
    async fn install(&self, scope: &WorkerScope) -> Result<(), Error> {
        install::run(self, scope).await
    }

    async fn activate(&self, scope: &WorkerScope) -> Result<(), Error> {
        activate::run(self, scope).await
    }

    async fn fetch(&self, scope: &WorkerScope, request: &Request) -> FetchOutcome {
        fetch::run(self, scope, request).await
    }

    async fn message(&self, scope: &WorkerScope, message: &WorkerMessage) {
        message::run(scope, message)
    }
}
