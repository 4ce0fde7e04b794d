//! Proxy pool built from a scraped public proxy list.
//!
//! The pool is ephemeral: rebuilt from the live source at the start of every
//! proxy-mode run, never persisted alongside the record store.

mod pool;
mod scrape;

pub use pool::{ProxyEndpoint, ProxyPool};
pub use scrape::{fetch_proxy_pool, DEFAULT_SOURCE_URL};

use thiserror::Error;

/// Proxy source errors. Fatal for proxy-mode runs: a partially built pool
/// would silently degrade the anonymity the feature exists to provide.
#[derive(Error, Debug)]
pub enum FetchError {
    #[error("proxy source request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("proxy source page malformed: {0}")]
    Malformed(String),
}
