//! Key/value cache helper backed by Redis.

use anyhow::{Context, Result, anyhow};
use async_lock::OnceCell;
use redis::AsyncCommands;
use redis::aio::ConnectionManager;
use tracing::{debug, info};

use crate::logging::redact_url;

/// Environment variable holding the default cache URL.
pub const REDIS_CONN_URL_ENV: &str = "REDIS_CONN_URL";

/// A Redis client that connects on first use and reconnects on its own.
pub struct CacheClient {
    client: redis::Client,
    connection: OnceCell<ConnectionManager>,
    display_url: String,
}

impl std::fmt::Debug for CacheClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheClient")
            .field("url", &self.display_url)
            .field("connected", &self.connection.is_initialized())
            .finish()
    }
}

impl CacheClient {
    /// Parse a `redis://` or `rediss://` URL. No connection is made.
    pub fn from_url(url: &str) -> Result<Self> {
        let display_url = redact_url(url);
        let client = redis::Client::open(url)
            .with_context(|| format!("Invalid cache URL {display_url}"))?;

        Ok(Self {
            client,
            connection: OnceCell::new(),
            display_url,
        })
    }

    /// Build from `REDIS_CONN_URL`.
    pub fn from_env() -> Result<Self> {
        let url = std::env::var(REDIS_CONN_URL_ENV)
            .map_err(|_| anyhow!("{REDIS_CONN_URL_ENV} is not set"))?;
        Self::from_url(&url)
    }

    async fn connection(&self) -> Result<ConnectionManager> {
        let manager = self
            .connection
            .get_or_try_init(|| async {
                let manager = self
                    .client
                    .get_connection_manager()
                    .await
                    .with_context(|| format!("Failed to connect to {}", self.display_url))?;
                info!(url = %self.display_url, "Cache connected");
                Ok::<_, anyhow::Error>(manager)
            })
            .await?;
        Ok(manager.clone())
    }

    pub async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let mut conn = self.connection().await?;
        let value: Option<Vec<u8>> = conn.get(key).await?;
        debug!(key = %key, hit = value.is_some(), "Cache get");
        Ok(value)
    }

    pub async fn set(&self, key: &str, value: impl AsRef<[u8]>) -> Result<()> {
        let mut conn = self.connection().await?;
        let _: () = conn.set(key, value.as_ref()).await?;
        debug!(key = %key, "Cache set");
        Ok(())
    }

    /// Store `value` with an expiry in seconds.
    pub async fn set_with_ttl(&self, key: &str, value: impl AsRef<[u8]>, ttl_secs: u64) -> Result<()> {
        let mut conn = self.connection().await?;
        let _: () = conn.set_ex(key, value.as_ref(), ttl_secs).await?;
        debug!(key = %key, ttl_secs, "Cache set");
        Ok(())
    }

    /// Round trip a `PING`.
    pub async fn ping(&self) -> Result<()> {
        let mut conn = self.connection().await?;
        let pong: String = redis::cmd("PING").query_async(&mut conn).await?;
        if pong != "PONG" {
            return Err(anyhow!("Unexpected PING reply: {pong}"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_url_does_not_connect() {
        let cache = CacheClient::from_url("redis://:s3cret@127.0.0.1:1/0").unwrap();
        let debug = format!("{cache:?}");
        assert!(!debug.contains("s3cret"));
        assert!(debug.contains("connected: false"));
    }

    #[test]
    fn test_from_url_rejects_other_schemes() {
        let err = CacheClient::from_url("http://cache:6379").unwrap_err();
        assert!(err.to_string().contains("Invalid cache URL"));
    }
}
