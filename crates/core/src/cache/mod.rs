//! Cache store for generated ticket documents.
//!
//! Entries are content-addressed: the key is derived from the user input
//! alone, so identical complaints from different customers share one entry.
//! Any customer details the generator copied into that entry are served to
//! every later requester with the same text; only `ticketId` is per request.
//! Writes are unconditional `SET` with expiry; the last writer wins.

mod key;
mod redis_store;

pub use key::CacheKey;
pub use redis_store::RedisCache;

use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;

/// Errors from the cache store.
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("Cache connection failed: {0}")]
    Connection(String),

    #[error("Cache command failed: {0}")]
    Command(String),
}

/// Key/value store with per-entry expiry.
#[async_trait]
pub trait CacheStore: Send + Sync {
    /// Backend name for logging.
    fn name(&self) -> &str;

    /// Liveness check.
    async fn ping(&self) -> Result<(), CacheError>;

    /// Fetch a value; `None` on miss or expiry.
    async fn get(&self, key: &CacheKey) -> Result<Option<String>, CacheError>;

    /// Store a value that expires after `ttl`, replacing any existing entry.
    async fn set_with_ttl(
        &self,
        key: &CacheKey,
        value: &str,
        ttl: Duration,
    ) -> Result<(), CacheError>;
}
