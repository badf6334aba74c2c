//! Install: seed this generation's store with the shell manifest.
//!
//! Seeding is all-or-nothing. Any manifest entry that cannot be fetched, or
//! answers with a non-2xx status, fails the install and nothing is stored.

use super::OfflineWorker;
use crate::scope::WorkerScope;
use archwave_client::resolve;
use archwave_core::{Error, Request};
use futures::future::try_join_all;

pub(super) async fn run(worker: &OfflineWorker, scope: &WorkerScope) -> Result<(), Error> {
    let tag = scope.generation_tag();
    if worker.script.skip_waiting_on_install {
        scope.skip_waiting();
    }

    let requests = worker
        .script
        .shell_manifest
        .iter()
        .map(|path| {
            resolve(&worker.origin, path)
                .map(Request::get)
                .map_err(|e| Error::InvalidUrl(format!("{path}: {e}")))
        })
        .collect::<Result<Vec<_>, _>>()?;

    let store = worker.caches.open_store(tag).await?;

    let responses = try_join_all(requests.iter().map(|request| async move {
        let response = worker.network.fetch(request).await?;
        if !response.ok() {
            return Err(Error::HttpError(format!("{} answered {}", request.url, response.status)));
        }
        Ok(response)
    }))
    .await?;

    let count = requests.len();
    store.put_all(requests.into_iter().zip(responses).collect()).await?;

    tracing::info!(generation = tag, entries = count, "seeded shell cache");
    Ok(())
}
