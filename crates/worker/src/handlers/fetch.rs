//! Fetch: per-request resolution policy.
//!
//! - Non-GET requests pass through untouched.
//! - Build assets go to the network first and are never written to cache;
//!   the current store is only consulted when the network fails.
//! - Everything else is served from the current store when present. On a
//!   miss the network response goes to the page and a copy is written to
//!   the store in the background; a failed write is ignored. The live
//!   generation recreates its store if it was deleted, a superseded one
//!   drops the write.

use super::{FetchOutcome, OfflineWorker, Served};
use crate::scope::WorkerScope;
use crate::script::RequestClass;
use archwave_core::{Request, Response};

pub(super) async fn run(worker: &OfflineWorker, scope: &WorkerScope, request: &Request) -> FetchOutcome {
    if !request.is_get() {
        return FetchOutcome::Passthrough;
    }

    match worker.script.classify(&request.url) {
        RequestClass::BuildAsset => network_first(worker, scope, request).await,
        RequestClass::ShellStatic => cache_first(worker, scope, request).await,
    }
}

/// Look the request up in this generation's store. Storage errors count as a miss.
async fn lookup(worker: &OfflineWorker, scope: &WorkerScope, request: &Request) -> Option<Response> {
    let result = match worker.caches.get_store(scope.generation_tag()).await {
        Ok(Some(store)) => store.match_request(request).await,
        Ok(None) => Ok(None),
        Err(e) => Err(e),
    };
    result.unwrap_or_else(|e| {
        tracing::warn!(url = %request.url, error = %e, "cache lookup failed; treating as miss");
        None
    })
}

async fn network_first(worker: &OfflineWorker, scope: &WorkerScope, request: &Request) -> FetchOutcome {
    match worker.network.fetch(request).await {
        Ok(response) => FetchOutcome::Respond(Some(Served::network(response))),
        Err(e) => {
            tracing::debug!(url = %request.url, error = %e, "build asset unreachable; trying cache");
            FetchOutcome::Respond(lookup(worker, scope, request).await.map(Served::cache))
        }
    }
}

async fn cache_first(worker: &OfflineWorker, scope: &WorkerScope, request: &Request) -> FetchOutcome {
    if let Some(response) = lookup(worker, scope, request).await {
        tracing::debug!(url = %request.url, "cache hit");
        return FetchOutcome::Respond(Some(Served::cache(response)));
    }

    match worker.network.fetch(request).await {
        Ok(response) => {
            let copy = response.clone();
            let caches = worker.caches.clone();
            let tag = scope.generation_tag().to_string();
            let clients = scope.clients().clone();
            let request = request.clone();
            scope.wait_until(async move {
                // a superseded generation must not bring its evicted store back
                let live = clients.active_generation().as_deref() == Some(tag.as_str());
                let store = if live {
                    caches.open_store(&tag).await.map(Some)
                } else {
                    caches.get_store(&tag).await
                };
                let written = match store {
                    Ok(Some(store)) => store.put(&request, &copy).await,
                    Ok(None) => {
                        tracing::debug!(generation = %tag, "store gone; dropping cache write");
                        Ok(())
                    }
                    Err(e) => Err(e),
                };
                if let Err(e) = written {
                    tracing::debug!(url = %request.url, error = %e, "cache write failed; ignored");
                }
            });
            FetchOutcome::Respond(Some(Served::network(response)))
        }
        Err(e) => {
            tracing::debug!(url = %request.url, error = %e, "network failed on cache miss");
            FetchOutcome::Respond(None)
        }
    }
}
