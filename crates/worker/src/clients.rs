//! Pages controlled (or not yet controlled) by the registration.
//!
//! A page opened while a worker generation is active starts out controlled
//! by it. Pages opened earlier stay uncontrolled until a worker claims them.
//! Every controller switch is broadcast as a `ControllerChange`.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use tokio::sync::broadcast;

pub type ClientId = u64;

const CHANGE_CHANNEL_CAPACITY: usize = 64;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct ClientInfo {
    pub id: ClientId,
    pub url: String,
    /// Generation tag of the controlling worker, if any.
    pub controller: Option<String>,
}

/// A page switched to a new controlling worker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControllerChange {
    pub client: ClientId,
    pub controller: String,
}

#[derive(Debug, Default)]
struct Inner {
    next_id: ClientId,
    clients: BTreeMap<ClientId, ClientInfo>,
    active: Option<String>,
}

#[derive(Debug)]
pub struct Clients {
    inner: Mutex<Inner>,
    changes: broadcast::Sender<ControllerChange>,
}

impl Default for Clients {
    fn default() -> Self {
        Self::new()
    }
}

impl Clients {
    pub fn new() -> Self {
        let (changes, _) = broadcast::channel(CHANGE_CHANNEL_CAPACITY);
        Self { inner: Mutex::new(Inner { next_id: 1, ..Default::default() }), changes }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ControllerChange> {
        self.changes.subscribe()
    }

    /// Open a page. It is controlled by the active generation, if there is one.
    pub fn open(&self, url: &str) -> ClientInfo {
        let mut inner = self.lock();
        let id = inner.next_id;
        inner.next_id += 1;
        let info = ClientInfo { id, url: url.to_string(), controller: inner.active.clone() };
        inner.clients.insert(id, info.clone());
        info
    }

    pub fn close(&self, id: ClientId) -> bool {
        self.lock().clients.remove(&id).is_some()
    }

    pub fn get(&self, id: ClientId) -> Option<ClientInfo> {
        self.lock().clients.get(&id).cloned()
    }

    pub fn list(&self) -> Vec<ClientInfo> {
        self.lock().clients.values().cloned().collect()
    }

    /// Generation tag of the most recently activated worker.
    pub fn active_generation(&self) -> Option<String> {
        self.lock().active.clone()
    }

    /// Record a newly activated generation. Pages already under a controller
    /// move to it; uncontrolled pages stay uncontrolled until claimed.
    pub(crate) fn activate(&self, tag: &str) -> usize {
        let mut inner = self.lock();
        inner.active = Some(tag.to_string());
        let switched = Self::switch(&mut inner, tag, |c| c.controller.is_some());
        drop(inner);
        self.announce(switched)
    }

    /// Take control of every open page not already controlled by `tag`.
    pub fn claim(&self, tag: &str) -> usize {
        let mut inner = self.lock();
        let switched = Self::switch(&mut inner, tag, |_| true);
        drop(inner);
        self.announce(switched)
    }

    fn switch(inner: &mut Inner, tag: &str, eligible: impl Fn(&ClientInfo) -> bool) -> Vec<ControllerChange> {
        inner
            .clients
            .values_mut()
            .filter(|c| eligible(c) && c.controller.as_deref() != Some(tag))
            .map(|c| {
                c.controller = Some(tag.to_string());
                ControllerChange { client: c.id, controller: tag.to_string() }
            })
            .collect()
    }

    fn announce(&self, switched: Vec<ControllerChange>) -> usize {
        let count = switched.len();
        for change in switched {
            // no subscribers is fine
            let _ = self.changes.send(change);
        }
        count
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_before_activation_is_uncontrolled() {
        let clients = Clients::new();
        let page = clients.open("https://a.com/");
        assert_eq!(page.controller, None);
        assert_eq!(page.id, 1);
    }

    #[test]
    fn test_open_after_activation_is_controlled() {
        let clients = Clients::new();
        clients.activate("v1");
        let page = clients.open("https://a.com/");
        assert_eq!(page.controller.as_deref(), Some("v1"));
    }

    #[test]
    fn test_activate_switches_only_controlled_pages() {
        let clients = Clients::new();
        let early = clients.open("https://a.com/early");
        clients.activate("v1");
        let controlled = clients.open("https://a.com/late");

        let switched = clients.activate("v2");
        assert_eq!(switched, 1);
        assert_eq!(clients.get(early.id).unwrap().controller, None);
        assert_eq!(clients.get(controlled.id).unwrap().controller.as_deref(), Some("v2"));
    }

    #[test]
    fn test_claim_takes_every_page_and_broadcasts() {
        let clients = Clients::new();
        let mut changes = clients.subscribe();
        let a = clients.open("https://a.com/a");
        let b = clients.open("https://a.com/b");

        assert_eq!(clients.claim("v1"), 2);
        assert_eq!(clients.claim("v1"), 0);

        let first = changes.try_recv().unwrap();
        let second = changes.try_recv().unwrap();
        assert_eq!(first, ControllerChange { client: a.id, controller: "v1".into() });
        assert_eq!(second.client, b.id);
        assert!(changes.try_recv().is_err());
    }

    #[test]
    fn test_close() {
        let clients = Clients::new();
        let page = clients.open("https://a.com/");
        assert!(clients.close(page.id));
        assert!(!clients.close(page.id));
        assert!(clients.list().is_empty());
    }
}
