//! Cache-related MCP tools.
//!
//! These inspect and manipulate cache storage directly, the way browser
//! devtools would, bypassing the worker.

pub mod delete;
pub mod keys;

pub use delete::{CacheDeleteParams, delete_impl};
pub use keys::{CacheKeysParams, keys_impl};
