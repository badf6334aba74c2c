//! SQLite-backed cache storage for the offline worker.
//!
//! This module provides persistent, origin-scoped cache storage using SQLite
//! with async access via tokio-rusqlite. It supports:
//!
//! - Named cache stores, one per worker generation
//! - Per-store URL → response entries with SHA-256 body digests
//! - Automatic schema migrations
//! - WAL mode for concurrent access
//! - An optional total-size quota

pub mod connection;
pub mod entries;
pub mod hash;
pub mod migrations;
pub mod stores;

pub use crate::Error;

pub use connection::CacheStorage;
pub use entries::EntryMeta;
pub use stores::CacheStore;
