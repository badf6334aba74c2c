//! The Architecture Wave offline worker and the runtime that hosts it.
//!
//! This crate provides:
//! - The worker script: generation constants, request classification, and
//!   the install / activate / fetch / message handlers
//! - A registration runtime that drives worker versions through their
//!   lifecycle and routes page requests
//! - The page-side update protocol (skip-waiting request, single reload)

pub mod clients;
pub mod handlers;
pub mod keep_alive;
pub mod lifecycle;
pub mod message;
pub mod page;
pub mod scope;
pub mod script;

#[cfg(test)]
mod testing;

pub use clients::{ClientId, ClientInfo, Clients, ControllerChange};
pub use handlers::{FetchOutcome, OfflineWorker, ResponseSource, Served, WorkerHandlers};
pub use keep_alive::KeepAlive;
pub use lifecycle::{RegisterOutcome, Registration, RegistrationStatus, VersionInfo, WorkerState};
pub use message::WorkerMessage;
pub use page::PageAgent;
pub use scope::WorkerScope;
pub use script::{BUILD_ASSET_PREFIX, GENERATION_TAG, RequestClass, SHELL_MANIFEST, WorkerScript};
