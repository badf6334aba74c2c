//! Shared state behind the tool handlers.

use archwave_client::FetchClient;
use archwave_core::{CacheStorage, Error};
use archwave_worker::{ClientId, PageAgent, Registration, WorkerScript};
use std::sync::Arc;
use tokio::sync::Mutex;
use url::Url;

pub struct ServerState {
    pub registration: Arc<Registration>,
    pub network: Arc<FetchClient>,
    pub script: WorkerScript,
    /// The site page opened at boot. Registration goes through it so a
    /// waiting update is told to skip waiting and its reload is recorded.
    pub page: Mutex<PageAgent>,
    /// Client id of `page`; tool fetches run as this page unless told otherwise.
    pub default_client: ClientId,
}

impl ServerState {
    /// Run the boot sequence of a page load: reuse a generation whose store
    /// survived a restart, open the page, and let its bootstrap register
    /// the worker script.
    ///
    /// Registration failures are logged; the page then talks to the network
    /// directly until a later `worker_register` succeeds.
    pub async fn boot(
        origin: Url, caches: CacheStorage, network: Arc<FetchClient>, script: WorkerScript,
    ) -> Result<Self, Error> {
        let registration = Arc::new(Registration::new(origin, caches, network.clone()));

        match registration.resume(script.clone()).await {
            Ok(true) => {}
            Ok(false) => tracing::debug!("no surviving generation to resume"),
            Err(e) => tracing::warn!(error = %e, "could not inspect cache storage"),
        }

        let mut page = PageAgent::open(registration.clone(), "/")?;
        match page.register(script.clone()).await {
            Ok(outcome) => tracing::info!(?outcome, generation = %script.generation_tag, "worker registered"),
            Err(e) => tracing::warn!(error = %e, "worker registration failed; requests go to the network"),
        }

        let default_client = page.client();
        Ok(Self { registration, network, script, page: Mutex::new(page), default_client })
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use archwave_client::FetchConfig;

    pub const ORIGIN: &str = "https://architecturewave.com";

    pub fn offline_client() -> Arc<FetchClient> {
        let network = Arc::new(FetchClient::new(FetchConfig::default()).unwrap());
        network.set_offline(true);
        network
    }

    /// Boot over `caches` with a client that never leaves the process.
    pub async fn offline_state_with(caches: CacheStorage, script: WorkerScript) -> ServerState {
        ServerState::boot(Url::parse(ORIGIN).unwrap(), caches, offline_client(), script)
            .await
            .unwrap()
    }

    pub async fn offline_state(script: WorkerScript) -> ServerState {
        offline_state_with(CacheStorage::open_in_memory().await.unwrap(), script).await
    }

    /// Storage holding one shell entry under `generation`.
    pub async fn seeded_caches(generation: &str, path: &str, body: &str) -> CacheStorage {
        let caches = CacheStorage::open_in_memory().await.unwrap();
        let store = caches.open_store(generation).await.unwrap();
        let url = format!("{ORIGIN}{path}");
        store
            .put(
                &archwave_core::Request::parse_get(&url).unwrap(),
                &archwave_core::Response::new(url.clone(), 200, body.to_string()),
            )
            .await
            .unwrap();
        caches
    }

    /// Text payload of a successful tool result, parsed as JSON.
    pub fn result_json(result: &rmcp::model::CallToolResult) -> serde_json::Value {
        let text = result.content[0].as_text().unwrap().text.clone();
        serde_json::from_str(&text).unwrap()
    }
}
