//! What a worker generation's handlers can reach of the host: its own
//! generation tag, the skip-waiting signal, the page registry, and event
//! lifetime extension.

use crate::clients::Clients;
use crate::keep_alive::KeepAlive;
use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

#[derive(Debug)]
pub struct WorkerScope {
    generation_tag: String,
    skip_waiting: AtomicBool,
    clients: Arc<Clients>,
    keep_alive: KeepAlive,
}

impl WorkerScope {
    pub fn new(generation_tag: &str, clients: Arc<Clients>) -> Self {
        Self {
            generation_tag: generation_tag.to_string(),
            skip_waiting: AtomicBool::new(false),
            clients,
            keep_alive: KeepAlive::new(),
        }
    }

    pub fn generation_tag(&self) -> &str {
        &self.generation_tag
    }

    /// Ask to be activated without waiting for controlled pages to close.
    pub fn skip_waiting(&self) {
        self.skip_waiting.store(true, Ordering::SeqCst);
    }

    pub fn skip_waiting_requested(&self) -> bool {
        self.skip_waiting.load(Ordering::SeqCst)
    }

    pub fn clients(&self) -> &Arc<Clients> {
        &self.clients
    }

    /// Take control of every open page. Returns how many pages switched.
    pub fn claim(&self) -> usize {
        self.clients.claim(&self.generation_tag)
    }

    pub fn wait_until<F>(&self, fut: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        self.keep_alive.wait_until(fut);
    }

    pub fn keep_alive(&self) -> &KeepAlive {
        &self.keep_alive
    }
}
