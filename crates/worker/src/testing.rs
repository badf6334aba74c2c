//! In-memory network for policy tests.

use archwave_client::Network;
use archwave_core::{Error, Request, Response};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

pub const ORIGIN: &str = "https://architecturewave.com";

pub fn origin() -> url::Url {
    url::Url::parse(ORIGIN).unwrap()
}

pub fn at(path: &str) -> String {
    format!("{ORIGIN}{path}")
}

/// Serves canned responses (404 for anything unknown) and records every
/// attempted request, including ones made while offline.
#[derive(Default)]
pub struct StubNetwork {
    responses: Mutex<HashMap<String, Response>>,
    offline: AtomicBool,
    log: Mutex<Vec<String>>,
}

impl StubNetwork {
    pub fn new() -> Self {
        Self::default()
    }

    /// Serve `body` with status 200 at `path` under the test origin.
    pub fn serve(&self, path: &str, body: &str) {
        let url = at(path);
        self.serve_response(&url, Response::new(url.clone(), 200, body.to_string()));
    }

    pub fn serve_response(&self, url: &str, response: Response) {
        self.responses.lock().unwrap().insert(url.to_string(), response);
    }

    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    pub fn requests(&self) -> Vec<String> {
        self.log.lock().unwrap().clone()
    }

    pub fn request_count(&self, path: &str) -> usize {
        let url = at(path);
        self.log.lock().unwrap().iter().filter(|u| **u == url).count()
    }
}

#[async_trait]
impl Network for StubNetwork {
    async fn fetch(&self, request: &Request) -> Result<Response, Error> {
        let key = request.cache_key();
        self.log.lock().unwrap().push(key.clone());

        if self.offline.load(Ordering::SeqCst) {
            return Err(Error::Network(format!("offline: {key}")));
        }

        Ok(self
            .responses
            .lock()
            .unwrap()
            .get(&key)
            .cloned()
            .unwrap_or_else(|| Response::new(key.clone(), 404, "not found")))
    }
}
