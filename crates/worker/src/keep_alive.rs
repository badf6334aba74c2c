//! Event lifetime extension.
//!
//! A handler that starts work it does not await itself (a background cache
//! write, for instance) hands that work to `wait_until`. The event is only
//! finished once `settle` has seen every extension complete.
//!
//! Extensions that finish on their own are reaped on the next `wait_until`
//! or `pending`, so a host that never settles does not accumulate them.

use std::future::Future;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::task::{JoinError, JoinSet};

#[derive(Debug, Clone, Default)]
pub struct KeepAlive {
    tasks: Arc<Mutex<JoinSet<()>>>,
}

impl KeepAlive {
    pub fn new() -> Self {
        Self::default()
    }

    /// Keep the event open until `fut` completes. Must be called from
    /// within a tokio runtime.
    pub fn wait_until<F>(&self, fut: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let mut tasks = self.tasks.lock().unwrap_or_else(PoisonError::into_inner);
        reap(&mut tasks);
        tasks.spawn(fut);
    }

    /// Extensions still running.
    pub fn pending(&self) -> usize {
        let mut tasks = self.tasks.lock().unwrap_or_else(PoisonError::into_inner);
        reap(&mut tasks);
        tasks.len()
    }

    /// Wait for every extension, including ones registered while waiting.
    pub async fn settle(&self) {
        loop {
            let mut batch = {
                let mut tasks = self.tasks.lock().unwrap_or_else(PoisonError::into_inner);
                std::mem::take(&mut *tasks)
            };
            if batch.is_empty() {
                return;
            }
            while let Some(result) = batch.join_next().await {
                log_failure(result);
            }
        }
    }
}

/// Drop finished extensions without waiting on running ones.
fn reap(tasks: &mut JoinSet<()>) {
    while let Some(result) = tasks.try_join_next() {
        log_failure(result);
    }
}

fn log_failure(result: Result<(), JoinError>) {
    if let Err(e) = result {
        tracing::warn!(error = %e, "event extension did not complete");
    }
}
