//! Activate: evict every other generation's store, then claim open pages.
//!
//! Enumeration and deletion failures are logged and skipped; activation
//! itself never fails because of them.

use super::OfflineWorker;
use crate::scope::WorkerScope;
use archwave_core::Error;

pub(super) async fn run(worker: &OfflineWorker, scope: &WorkerScope) -> Result<(), Error> {
    let tag = scope.generation_tag();

    let names = match worker.caches.store_names().await {
        Ok(names) => names,
        Err(e) => {
            tracing::warn!(generation = tag, error = %e, "could not list cache stores; skipping eviction");
            Vec::new()
        }
    };

    for name in names.iter().filter(|name| name.as_str() != tag) {
        match worker.caches.delete_store(name).await {
            Ok(true) => tracing::info!(generation = tag, store = %name, "evicted stale cache store"),
            Ok(false) => {}
            Err(e) => tracing::warn!(generation = tag, store = %name, error = %e, "failed to evict cache store"),
        }
    }

    let claimed = scope.claim();
    tracing::info!(generation = tag, claimed, "worker activated");
    Ok(())
}
