//! Redis-backed cache store.

use async_trait::async_trait;
use redis::aio::MultiplexedConnection;
use redis::AsyncCommands;
use std::time::Duration;
use tracing::{debug, info};

use crate::config::CacheConfig;

use super::{CacheError, CacheKey, CacheStore};

/// Redis cache over one multiplexed connection.
///
/// The connection is established once by [`RedisCache::connect`]; there is
/// no reconnect or retry. A store that cannot be reached at startup is a
/// configuration problem and should stop the process.
#[derive(Clone)]
pub struct RedisCache {
    connection: MultiplexedConnection,
    url: String,
}

impl RedisCache {
    /// Open a connection and verify it with `PING`, both within the
    /// configured connect timeout.
    pub async fn connect(config: &CacheConfig) -> Result<Self, CacheError> {
        let url = config.url();
        let timeout = config.connect_timeout();
        info!(url = %url, timeout_secs = timeout.as_secs(), "Connecting to cache store");

        let client =
            redis::Client::open(url.as_str()).map_err(|e| CacheError::Connection(e.to_string()))?;

        let cache = tokio::time::timeout(timeout, async {
            let connection = client
                .get_multiplexed_async_connection()
                .await
                .map_err(|e| CacheError::Connection(e.to_string()))?;
            let cache = Self { connection, url };
            cache.ping().await?;
            Ok::<_, CacheError>(cache)
        })
        .await
        .map_err(|_| {
            CacheError::Connection(format!("no reply within {}s", timeout.as_secs()))
        })??;

        info!("Connected to cache store");
        Ok(cache)
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

fn map_redis_error(e: redis::RedisError) -> CacheError {
    if e.is_connection_refusal() || e.is_connection_dropped() || e.is_io_error() {
        CacheError::Connection(e.to_string())
    } else {
        CacheError::Command(e.to_string())
    }
}

#[async_trait]
impl CacheStore for RedisCache {
    fn name(&self) -> &str {
        "redis"
    }

    async fn ping(&self) -> Result<(), CacheError> {
        let mut conn = self.connection.clone();
        let pong: String = redis::cmd("PING")
            .query_async(&mut conn)
            .await
            .map_err(|e| CacheError::Connection(e.to_string()))?;
        debug!(reply = %pong, "Cache ping");
        Ok(())
    }

    async fn get(&self, key: &CacheKey) -> Result<Option<String>, CacheError> {
        let mut conn = self.connection.clone();
        conn.get::<_, Option<String>>(key.as_str())
            .await
            .map_err(map_redis_error)
    }

    async fn set_with_ttl(
        &self,
        key: &CacheKey,
        value: &str,
        ttl: Duration,
    ) -> Result<(), CacheError> {
        let mut conn = self.connection.clone();
        conn.set_ex::<_, _, ()>(key.as_str(), value, ttl.as_secs())
            .await
            .map_err(map_redis_error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;

    #[tokio::test]
    async fn test_connect_to_silent_host_times_out() {
        // Accepts the TCP handshake but never speaks RESP.
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();

        let config = CacheConfig {
            host: "127.0.0.1".to_string(),
            port,
            connect_timeout_secs: 1,
            ..Default::default()
        };

        let started = std::time::Instant::now();
        let result = RedisCache::connect(&config).await;

        assert!(matches!(result, Err(CacheError::Connection(_))));
        assert!(started.elapsed() < Duration::from_secs(5));
        drop(listener);
    }

    #[tokio::test]
    async fn test_connect_refused_is_connection_error() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let config = CacheConfig {
            host: "127.0.0.1".to_string(),
            port,
            ..Default::default()
        };

        let result = RedisCache::connect(&config).await;
        assert!(matches!(result, Err(CacheError::Connection(_))));
    }
}
