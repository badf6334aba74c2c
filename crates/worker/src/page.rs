//! Page-side half of the update protocol.
//!
//! A page registers the worker script on load. When that brings in a new
//! generation that is left waiting while the page already has a controller,
//! the page asks it to skip waiting. The first controller change afterwards
//! triggers a single reload; later ones are ignored.

use crate::clients::{ClientId, ControllerChange};
use crate::handlers::Served;
use crate::lifecycle::{RegisterOutcome, Registration};
use crate::message::WorkerMessage;
use crate::script::WorkerScript;
use archwave_client::resolve;
use archwave_core::{Error, Request};
use std::sync::Arc;
use tokio::sync::broadcast::{self, error::TryRecvError};

pub struct PageAgent {
    registration: Arc<Registration>,
    client: ClientId,
    changes: broadcast::Receiver<ControllerChange>,
    reloaded: bool,
}

impl PageAgent {
    /// Open a page at `path` on the registration's origin.
    pub fn open(registration: Arc<Registration>, path: &str) -> Result<Self, Error> {
        let changes = registration.clients().subscribe();
        let client = registration.open_client(path)?.id;
        Ok(Self { registration, client, changes, reloaded: false })
    }

    pub fn client(&self) -> ClientId {
        self.client
    }

    /// Generation tag of the worker controlling this page.
    pub fn controller(&self) -> Option<String> {
        self.registration.clients().get(self.client).and_then(|c| c.controller)
    }

    pub fn has_reloaded(&self) -> bool {
        self.reloaded
    }

    /// Register the worker script, forcing a waiting update to take over.
    pub async fn register(&mut self, script: WorkerScript) -> Result<RegisterOutcome, Error> {
        let outcome = self.registration.register(script).await?;

        if outcome == RegisterOutcome::Waiting && self.controller().is_some() {
            tracing::info!(client = self.client, "new worker waiting; requesting skip waiting");
            self.registration.post_message(WorkerMessage::SkipWaiting).await?;
        }

        self.poll_controller_change();
        Ok(outcome)
    }

    /// Consume pending controller-change notifications for this page.
    /// Returns true when this call triggered the page's one reload.
    pub fn poll_controller_change(&mut self) -> bool {
        let mut changed = false;
        loop {
            match self.changes.try_recv() {
                Ok(change) if change.client == self.client => changed = true,
                Ok(_) => {}
                Err(TryRecvError::Lagged(skipped)) => {
                    tracing::debug!(client = self.client, skipped, "controller notifications lagged");
                    changed = true;
                }
                Err(TryRecvError::Empty | TryRecvError::Closed) => break,
            }
        }

        if changed && !self.reloaded {
            self.reloaded = true;
            tracing::info!(client = self.client, controller = ?self.controller(), "controller changed; reloading");
            return true;
        }
        false
    }

    /// GET a path or absolute URL as this page.
    pub async fn fetch(&self, target: &str) -> Result<Served, Error> {
        let url = resolve(self.registration.origin(), target).map_err(|e| Error::InvalidUrl(e.to_string()))?;
        self.registration.fetch(self.client, Request::get(url)).await
    }
}
