//! Redis-backed cache store.

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use redis::AsyncCommands;
use redis::aio::ConnectionManager;

use super::{CacheStore, StoreError};

/// [`CacheStore`] backed by Redis `GET` / `SET PX`.
///
/// Cloning is cheap; clones share one multiplexed, self-reconnecting
/// connection.
#[derive(Clone)]
pub struct RedisStore {
    connection: ConnectionManager,
}

impl fmt::Debug for RedisStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RedisStore")
            .field("connection", &"<ConnectionManager>")
            .finish()
    }
}

impl RedisStore {
    /// Connects to the Redis server at `url` (e.g. `redis://127.0.0.1:6379`).
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Redis`] if the URL is invalid or the server is unreachable.
    pub async fn connect(url: &str) -> Result<Self, StoreError> {
        let client = redis::Client::open(url)?;
        let connection = ConnectionManager::new(client).await?;
        tracing::debug!(%url, "connected to redis cache store");
        Ok(Self { connection })
    }
}

#[async_trait]
impl CacheStore for RedisStore {
    async fn get(&self, key: &str) -> Result<Option<Bytes>, StoreError> {
        let mut conn = self.connection.clone();
        let value: Option<Vec<u8>> = conn.get(key).await?;
        Ok(value.map(Bytes::from))
    }

    async fn set(&self, key: &str, value: Bytes, ttl: Duration) -> Result<(), StoreError> {
        let mut conn = self.connection.clone();
        let _: () = conn.pset_ex(key, value.to_vec(), expire_millis(ttl)).await?;
        Ok(())
    }
}

// Longest PX Redis accepts once it adds the current time in milliseconds.
const MAX_EXPIRE_MILLIS: u64 = i64::MAX as u64 / 2;

// Redis rejects a zero expiry and any expiry that overflows its clock.
fn expire_millis(ttl: Duration) -> u64 {
    u64::try_from(ttl.as_millis())
        .unwrap_or(u64::MAX)
        .clamp(1, MAX_EXPIRE_MILLIS)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn expiry_is_sent_in_milliseconds() {
        assert_eq!(expire_millis(Duration::from_secs(5)), 5_000);
        assert_eq!(expire_millis(Duration::from_micros(1_500)), 1);
    }

    #[test]
    fn zero_ttl_becomes_shortest_expiry() {
        assert_eq!(expire_millis(Duration::ZERO), 1);
    }

    #[test]
    fn huge_ttl_stays_within_redis_range() {
        assert_eq!(expire_millis(Duration::MAX), MAX_EXPIRE_MILLIS);
        assert!(expire_millis(Duration::from_secs(u64::MAX / 1_000)) <= i64::MAX as u64);
    }
}
