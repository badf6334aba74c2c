//! Network access for the offline worker.
//!
//! This crate provides the `Network` seam the worker fetches through and the
//! reqwest-backed implementation used outside of tests.

pub mod fetch;

pub use fetch::{FetchClient, FetchConfig, Network, UrlError, resolve};
