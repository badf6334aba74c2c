//! Core types and shared functionality for the Architecture Wave offline worker.
//!
//! This crate provides:
//! - Cache storage (named cache stores) with a SQLite backend
//! - Request/response types shared by the network and the worker
//! - Unified error types
//! - Configuration structures

pub mod cache;
pub mod config;
pub mod error;
pub mod http;

pub use cache::{CacheStorage, CacheStore, EntryMeta};
pub use config::AppConfig;
pub use error::Error;
pub use http::{Request, Response};
