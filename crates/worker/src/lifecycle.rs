//! Registration runtime: the host side of the worker lifecycle.
//!
//! A registration owns up to three worker versions at once (installing,
//! waiting, active) and runs lifecycle jobs one at a time. Fetches from
//! controlled pages are dispatched to the active version concurrently with
//! any job in progress.
//!
//! ```text
//! register ─▶ Installing ──ok──▶ Installed ──(no active | skip waiting)──▶ Activating ─▶ Activated
//!                 │                  │                                                        │
//!                 └─err─▶ Redundant  └──superseded by a newer install──▶ Redundant ◀─replaced─┘
//! ```

use crate::clients::{ClientId, ClientInfo, Clients};
use crate::handlers::{FetchOutcome, OfflineWorker, Served, WorkerHandlers};
use crate::message::WorkerMessage;
use crate::scope::WorkerScope;
use crate::script::WorkerScript;
use archwave_client::{Network, resolve};
use archwave_core::{CacheStorage, Error, Request};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use url::Url;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum WorkerState {
    Installing,
    Installed,
    Activating,
    Activated,
    Redundant,
}

/// What `register` did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum RegisterOutcome {
    /// The registration already runs (or holds waiting) this generation.
    Unchanged,
    /// Installed and waiting for the active version to be released.
    Waiting,
    /// Installed and activated.
    Activated,
}

/// One installed copy of the worker script.
pub struct WorkerVersion {
    id: u64,
    generation_tag: String,
    handlers: Arc<dyn WorkerHandlers>,
    scope: WorkerScope,
    state: Mutex<WorkerState>,
}

impl WorkerVersion {
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn generation_tag(&self) -> &str {
        &self.generation_tag
    }

    pub fn state(&self) -> WorkerState {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn set_state(&self, state: WorkerState) {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner) = state;
        tracing::info!(version = self.id, generation = %self.generation_tag, ?state, "worker state changed");
    }

    fn info(&self) -> VersionInfo {
        VersionInfo { id: self.id, generation_tag: self.generation_tag.clone(), state: self.state() }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct VersionInfo {
    pub id: u64,
    pub generation_tag: String,
    pub state: WorkerState,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct RegistrationStatus {
    pub scope: String,
    pub installing: Option<VersionInfo>,
    pub waiting: Option<VersionInfo>,
    pub active: Option<VersionInfo>,
    pub clients: Vec<ClientInfo>,
}

#[derive(Default)]
struct Slots {
    installing: Option<Arc<WorkerVersion>>,
    waiting: Option<Arc<WorkerVersion>>,
    active: Option<Arc<WorkerVersion>>,
}

/// A worker registration for one origin.
pub struct Registration {
    origin: Url,
    caches: CacheStorage,
    network: Arc<dyn Network>,
    clients: Arc<Clients>,
    slots: Mutex<Slots>,
    jobs: tokio::sync::Mutex<()>,
    next_version: AtomicU64,
}

impl Registration {
    pub fn new(origin: Url, caches: CacheStorage, network: Arc<dyn Network>) -> Self {
        Self {
            origin,
            caches,
            network,
            clients: Arc::new(Clients::new()),
            slots: Mutex::new(Slots::default()),
            jobs: tokio::sync::Mutex::new(()),
            next_version: AtomicU64::new(1),
        }
    }

    fn slots(&self) -> MutexGuard<'_, Slots> {
        self.slots.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn origin(&self) -> &Url {
        &self.origin
    }

    pub fn caches(&self) -> &CacheStorage {
        &self.caches
    }

    pub fn network(&self) -> &Arc<dyn Network> {
        &self.network
    }

    pub fn clients(&self) -> &Arc<Clients> {
        &self.clients
    }

    pub fn active(&self) -> Option<Arc<WorkerVersion>> {
        self.slots().active.clone()
    }

    pub fn waiting(&self) -> Option<Arc<WorkerVersion>> {
        self.slots().waiting.clone()
    }

    pub fn status(&self) -> RegistrationStatus {
        let slots = self.slots();
        RegistrationStatus {
            scope: self.origin.to_string(),
            installing: slots.installing.as_ref().map(|v| v.info()),
            waiting: slots.waiting.as_ref().map(|v| v.info()),
            active: slots.active.as_ref().map(|v| v.info()),
            clients: self.clients.list(),
        }
    }

    fn new_version(&self, script: WorkerScript, state: WorkerState) -> Arc<WorkerVersion> {
        Arc::new(WorkerVersion {
            id: self.next_version.fetch_add(1, Ordering::SeqCst),
            generation_tag: script.generation_tag.clone(),
            scope: WorkerScope::new(&script.generation_tag, self.clients.clone()),
            handlers: Arc::new(OfflineWorker::new(
                script,
                self.origin.clone(),
                self.caches.clone(),
                self.network.clone(),
            )),
            state: Mutex::new(state),
        })
    }

    /// Install `script` as a new version unless this generation is already
    /// active or waiting.
    ///
    /// # Errors
    ///
    /// Returns `Error::InstallFailed` if the install handler fails. The new
    /// version becomes redundant and the active version keeps serving.
    pub async fn register(&self, script: WorkerScript) -> Result<RegisterOutcome, Error> {
        let _job = self.jobs.lock().await;

        {
            let slots = self.slots();
            let current = slots.waiting.as_ref().or(slots.active.as_ref());
            if current.is_some_and(|v| v.generation_tag == script.generation_tag) {
                tracing::debug!(generation = %script.generation_tag, "registration unchanged");
                return Ok(RegisterOutcome::Unchanged);
            }
        }

        let version = self.new_version(script, WorkerState::Installing);
        self.slots().installing = Some(version.clone());
        tracing::info!(version = version.id, generation = %version.generation_tag, "installing worker");

        let installed = version.handlers.install(&version.scope).await;
        version.scope.keep_alive().settle().await;
        self.slots().installing = None;

        if let Err(e) = installed {
            version.set_state(WorkerState::Redundant);
            tracing::warn!(generation = %version.generation_tag, error = %e, "install failed; keeping previous worker");
            return Err(Error::InstallFailed(format!("{}: {}", version.generation_tag, e)));
        }

        version.set_state(WorkerState::Installed);
        let has_active = {
            let mut slots = self.slots();
            if let Some(superseded) = slots.waiting.replace(version.clone()) {
                superseded.set_state(WorkerState::Redundant);
            }
            slots.active.is_some()
        };

        if !has_active || version.scope.skip_waiting_requested() {
            self.activate_waiting().await;
            Ok(RegisterOutcome::Activated)
        } else {
            tracing::info!(generation = %version.generation_tag, "worker installed and waiting");
            Ok(RegisterOutcome::Waiting)
        }
    }

    /// Resume a generation whose store survived a restart, without
    /// reinstalling it. Returns false (and does nothing) when storage holds
    /// no store for the generation or a worker is already active.
    pub async fn resume(&self, script: WorkerScript) -> Result<bool, Error> {
        let _job = self.jobs.lock().await;

        if self.active().is_some() {
            return Ok(false);
        }
        let Some(store) = self.caches.get_store(&script.generation_tag).await? else {
            return Ok(false);
        };
        if store.is_empty().await? {
            return Ok(false);
        }

        let version = self.new_version(script, WorkerState::Activated);
        self.slots().active = Some(version.clone());
        self.clients.activate(&version.generation_tag);
        tracing::info!(version = version.id, generation = %version.generation_tag, "resumed worker from existing cache");
        Ok(true)
    }

    /// Promote the waiting version. Callers must hold the job lock.
    async fn activate_waiting(&self) -> Option<Arc<WorkerVersion>> {
        let version = {
            let mut slots = self.slots();
            let version = slots.waiting.take()?;
            if let Some(previous) = slots.active.replace(version.clone()) {
                previous.set_state(WorkerState::Redundant);
            }
            version
        };

        version.set_state(WorkerState::Activating);
        self.clients.activate(&version.generation_tag);

        let activated = version.handlers.activate(&version.scope).await;
        version.scope.keep_alive().settle().await;
        if let Err(e) = activated {
            tracing::warn!(generation = %version.generation_tag, error = %e, "activate handler failed");
        }

        version.set_state(WorkerState::Activated);
        Some(version)
    }

    /// Post a message to the waiting version, or to the active one when
    /// nothing is waiting. Returns the state of the receiving version after
    /// the message was handled.
    pub async fn post_message(&self, message: WorkerMessage) -> Result<WorkerState, Error> {
        let _job = self.jobs.lock().await;

        let (target, is_waiting) = {
            let slots = self.slots();
            match (&slots.waiting, &slots.active) {
                (Some(waiting), _) => (waiting.clone(), true),
                (None, Some(active)) => (active.clone(), false),
                (None, None) => return Err(Error::InvalidState("no worker to receive message".into())),
            }
        };

        target.handlers.message(&target.scope, &message).await;
        target.scope.keep_alive().settle().await;

        if is_waiting && target.scope.skip_waiting_requested() {
            self.activate_waiting().await;
        }

        Ok(target.state())
    }

    /// Open a page on this registration's origin.
    pub fn open_client(&self, path: &str) -> Result<ClientInfo, Error> {
        let url = resolve(&self.origin, path).map_err(|e| Error::InvalidUrl(e.to_string()))?;
        Ok(self.clients.open(url.as_str()))
    }

    /// Issue a request from a page.
    ///
    /// Controlled pages go through the active worker; uncontrolled ones, and
    /// requests the worker passes through, go straight to the network.
    ///
    /// # Errors
    ///
    /// Returns `Error::FetchFailed` when the page would see a failed fetch.
    pub async fn fetch(&self, client: ClientId, request: Request) -> Result<Served, Error> {
        let info = self
            .clients
            .get(client)
            .ok_or_else(|| Error::InvalidInput(format!("unknown client {client}")))?;

        let worker = match (info.controller, self.active()) {
            (Some(_), Some(active)) => Some(active),
            _ => None,
        };

        let outcome = match worker {
            Some(active) => active.handlers.fetch(&active.scope, &request).await,
            None => FetchOutcome::Passthrough,
        };

        match outcome {
            FetchOutcome::Respond(Some(served)) => Ok(served),
            FetchOutcome::Respond(None) => Err(Error::FetchFailed(request.url.to_string())),
            FetchOutcome::Passthrough => self
                .network
                .fetch(&request)
                .await
                .map(Served::network)
                .map_err(|e| Error::FetchFailed(format!("{}: {}", request.url, e))),
        }
    }

    /// Wait for background work of the active and waiting versions
    /// (cache writes started by fetches, for instance).
    pub async fn settle(&self) {
        let versions: Vec<_> = {
            let slots = self.slots();
            [slots.waiting.clone(), slots.active.clone()].into_iter().flatten().collect()
        };
        for version in versions {
            version.scope.keep_alive().settle().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handlers::ResponseSource;
    use crate::testing::{StubNetwork, at, origin};
    use bytes::Bytes;

    async fn registration(network: Arc<StubNetwork>) -> Registration {
        let caches = CacheStorage::open_in_memory().await.unwrap();
        Registration::new(origin(), caches, network)
    }

    fn shell_network() -> Arc<StubNetwork> {
        let network = Arc::new(StubNetwork::new());
        network.serve("/", "<html>shell</html>");
        network.serve("/manifest.json", "{}");
        network
    }

    #[tokio::test]
    async fn test_first_register_activates() {
        let reg = registration(shell_network()).await;

        let outcome = reg.register(WorkerScript::new("v1", &["/"])).await.unwrap();

        assert_eq!(outcome, RegisterOutcome::Activated);
        let active = reg.active().unwrap();
        assert_eq!(active.generation_tag(), "v1");
        assert_eq!(active.state(), WorkerState::Activated);
        assert!(reg.waiting().is_none());
    }

    #[tokio::test]
    async fn test_register_same_generation_is_unchanged() {
        let network = shell_network();
        let reg = registration(network.clone()).await;
        reg.register(WorkerScript::new("v1", &["/"])).await.unwrap();

        let outcome = reg.register(WorkerScript::new("v1", &["/"])).await.unwrap();

        assert_eq!(outcome, RegisterOutcome::Unchanged);
        assert_eq!(network.request_count("/"), 1);
    }

    #[tokio::test]
    async fn test_new_generation_replaces_and_evicts() {
        let reg = registration(shell_network()).await;
        reg.register(WorkerScript::new("v1", &["/"])).await.unwrap();
        let v1 = reg.active().unwrap();

        let outcome = reg.register(WorkerScript::new("v2", &["/"])).await.unwrap();

        assert_eq!(outcome, RegisterOutcome::Activated);
        assert_eq!(reg.active().unwrap().generation_tag(), "v2");
        assert_eq!(v1.state(), WorkerState::Redundant);
        assert_eq!(reg.caches().store_names().await.unwrap(), vec!["v2"]);
    }

    #[tokio::test]
    async fn test_failed_install_keeps_previous_worker() {
        let reg = registration(shell_network()).await;
        reg.register(WorkerScript::new("v1", &["/"])).await.unwrap();

        let result = reg.register(WorkerScript::new("v2", &["/", "/missing.png"])).await;

        assert!(matches!(result, Err(Error::InstallFailed(_))));
        let active = reg.active().unwrap();
        assert_eq!(active.generation_tag(), "v1");
        assert_eq!(active.state(), WorkerState::Activated);
        assert!(reg.waiting().is_none());
        assert!(reg.status().installing.is_none());
    }

    #[tokio::test]
    async fn test_first_install_failure_leaves_no_worker() {
        let network = Arc::new(StubNetwork::new());
        network.set_offline(true);
        let reg = registration(network).await;

        let result = reg.register(WorkerScript::new("v1", &["/"])).await;

        assert!(matches!(result, Err(Error::InstallFailed(_))));
        assert!(reg.active().is_none());
    }

    #[tokio::test]
    async fn test_waiting_worker_activated_by_skip_waiting_message() {
        let reg = registration(shell_network()).await;
        reg.register(WorkerScript::new("v1", &["/"])).await.unwrap();
        let page = reg.open_client("/").unwrap();
        let mut changes = reg.clients().subscribe();

        let script = WorkerScript { skip_waiting_on_install: false, ..WorkerScript::new("v2", &["/"]) };
        let outcome = reg.register(script).await.unwrap();
        assert_eq!(outcome, RegisterOutcome::Waiting);
        assert_eq!(reg.active().unwrap().generation_tag(), "v1");
        assert_eq!(reg.waiting().unwrap().state(), WorkerState::Installed);

        let state = reg.post_message(WorkerMessage::SkipWaiting).await.unwrap();

        assert_eq!(state, WorkerState::Activated);
        assert_eq!(reg.active().unwrap().generation_tag(), "v2");
        assert!(reg.waiting().is_none());
        assert_eq!(reg.clients().get(page.id).unwrap().controller.as_deref(), Some("v2"));
        assert_eq!(changes.try_recv().unwrap().controller, "v2");
    }

    #[tokio::test]
    async fn test_unknown_message_leaves_worker_waiting() {
        let reg = registration(shell_network()).await;
        reg.register(WorkerScript::new("v1", &["/"])).await.unwrap();
        let script = WorkerScript { skip_waiting_on_install: false, ..WorkerScript::new("v2", &["/"]) };
        reg.register(script).await.unwrap();

        let state = reg.post_message(WorkerMessage::Unknown).await.unwrap();

        assert_eq!(state, WorkerState::Installed);
        assert_eq!(reg.active().unwrap().generation_tag(), "v1");
    }

    #[tokio::test]
    async fn test_message_without_worker() {
        let reg = registration(shell_network()).await;
        let result = reg.post_message(WorkerMessage::SkipWaiting).await;
        assert!(matches!(result, Err(Error::InvalidState(_))));
    }

    #[tokio::test]
    async fn test_page_opened_before_registration_is_claimed() {
        let reg = registration(shell_network()).await;
        let page = reg.open_client("/").unwrap();
        assert_eq!(page.controller, None);

        reg.register(WorkerScript::new("v1", &["/"])).await.unwrap();

        assert_eq!(reg.clients().get(page.id).unwrap().controller.as_deref(), Some("v1"));
    }

    #[tokio::test]
    async fn test_uncontrolled_page_bypasses_worker() {
        let network = shell_network();
        let reg = registration(network.clone()).await;
        let page = reg.open_client("/").unwrap();

        let served = reg.fetch(page.id, Request::parse_get(&at("/")).unwrap()).await.unwrap();

        assert_eq!(served.source, ResponseSource::Network);
        assert!(reg.caches().store_names().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_post_passthrough_goes_to_network() {
        let network = shell_network();
        let reg = registration(network.clone()).await;
        reg.register(WorkerScript::new("v1", &["/"])).await.unwrap();
        let page = reg.open_client("/").unwrap();

        let post = Request::new("POST", url::Url::parse(&at("/")).unwrap());
        let served = reg.fetch(page.id, post).await.unwrap();
        reg.settle().await;

        assert_eq!(served.source, ResponseSource::Network);
        assert_eq!(network.request_count("/"), 2);
        let store = reg.caches().get_store("v1").await.unwrap().unwrap();
        assert_eq!(store.len().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_fetch_unknown_client() {
        let reg = registration(shell_network()).await;
        let result = reg.fetch(42, Request::parse_get(&at("/")).unwrap()).await;
        assert!(matches!(result, Err(Error::InvalidInput(_))));
    }

    #[tokio::test]
    async fn test_offline_scenario_end_to_end() {
        let network = shell_network();
        let reg = registration(network.clone()).await;

        reg.register(WorkerScript::new("arch-v2", &["/", "/manifest.json"])).await.unwrap();
        let store = reg.caches().get_store("arch-v2").await.unwrap().unwrap();
        assert_eq!(store.len().await.unwrap(), 2);

        let page = reg.open_client("/").unwrap();
        network.set_offline(true);

        let home = reg.fetch(page.id, Request::parse_get(&at("/")).unwrap()).await.unwrap();
        assert_eq!(home.source, ResponseSource::Cache);
        assert_eq!(home.response.body, Bytes::from_static(b"<html>shell</html>"));

        let chunk = reg
            .fetch(page.id, Request::parse_get(&at("/_next/chunk123.js")).unwrap())
            .await;
        assert!(matches!(chunk, Err(Error::FetchFailed(_))));

        let outcome = reg.register(WorkerScript::new("arch-v2", &["/", "/manifest.json"])).await.unwrap();
        assert_eq!(outcome, RegisterOutcome::Unchanged);
        assert_eq!(reg.caches().store_names().await.unwrap(), vec!["arch-v2"]);
        assert_eq!(store.len().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_resume_from_surviving_store() {
        let network = shell_network();
        let caches = CacheStorage::open_in_memory().await.unwrap();
        let first = Registration::new(origin(), caches.clone(), network.clone());
        first.register(WorkerScript::new("v1", &["/"])).await.unwrap();

        network.set_offline(true);
        let restarted = Registration::new(origin(), caches, network);
        assert!(restarted.resume(WorkerScript::new("v1", &["/"])).await.unwrap());
        assert_eq!(restarted.active().unwrap().state(), WorkerState::Activated);

        let page = restarted.open_client("/").unwrap();
        let home = restarted.fetch(page.id, Request::parse_get(&at("/")).unwrap()).await.unwrap();
        assert_eq!(home.source, ResponseSource::Cache);
    }

    #[tokio::test]
    async fn test_resume_without_store() {
        let reg = registration(shell_network()).await;
        assert!(!reg.resume(WorkerScript::new("v1", &["/"])).await.unwrap());
        assert!(reg.active().is_none());
    }

    #[tokio::test]
    async fn test_status_reports_versions_and_clients() {
        let reg = registration(shell_network()).await;
        reg.register(WorkerScript::new("v1", &["/"])).await.unwrap();
        reg.open_client("/about").unwrap();

        let status = reg.status();
        assert_eq!(status.scope, "https://architecturewave.com/");
        assert_eq!(status.active.unwrap().generation_tag, "v1");
        assert_eq!(status.clients.len(), 1);
        assert_eq!(status.clients[0].url, at("/about"));
    }

    #[tokio::test]
    async fn test_background_writes_do_not_accumulate() {
        let reg = registration(shell_network()).await;
        reg.register(WorkerScript::new("v1", &["/"])).await.unwrap();
        let page = reg.open_client("/").unwrap();

        for i in 0..50 {
            let request = Request::parse_get(&at(&format!("/articles/{i}"))).unwrap();
            reg.fetch(page.id, request).await.unwrap();
        }

        let active = reg.active().unwrap();
        for _ in 0..200 {
            if active.scope.keep_alive().pending() == 0 {
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        }
        assert_eq!(active.scope.keep_alive().pending(), 0);
        let store = reg.caches().get_store("v1").await.unwrap().unwrap();
        assert_eq!(store.len().await.unwrap(), 51);
    }

    #[tokio::test]
    async fn test_deleted_live_store_is_repopulated() {
        let network = shell_network();
        network.serve("/about", "about page");
        let reg = registration(network.clone()).await;
        reg.register(WorkerScript::new("v1", &["/"])).await.unwrap();
        let page = reg.open_client("/").unwrap();
        reg.caches().delete_store("v1").await.unwrap();

        let about = || Request::parse_get(&at("/about")).unwrap();
        let first = reg.fetch(page.id, about()).await.unwrap();
        reg.settle().await;
        let second = reg.fetch(page.id, about()).await.unwrap();

        assert_eq!(first.source, ResponseSource::Network);
        assert_eq!(second.source, ResponseSource::Cache);
        assert_eq!(reg.caches().store_names().await.unwrap(), vec!["v1"]);
        assert_eq!(network.request_count("/about"), 1);
    }
}
