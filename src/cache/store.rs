//! Cache store adapters.
//!
//! The cache layer talks to its backing key-value service only through
//! [`CacheStore`]. [`MemoryStore`] keeps a bounded set of entries in process memory;
//! `RedisStore` (feature `redis`) talks to a Redis server.

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use moka::Expiry;
use moka::future::Cache as MokaCache;
use thiserror::Error;
use tokio::time::Instant;

use crate::rpc::BoxError;

/// Errors reported by a cache store.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("cache store unavailable: {0}")]
    Unavailable(String),

    #[error("cache store round-trip outlived the call deadline")]
    DeadlineElapsed,

    #[error("cache store backend error: {0}")]
    Backend(#[source] BoxError),

    #[cfg(feature = "redis")]
    #[error("redis error: {0}")]
    Redis(#[from] redis::RedisError),
}

/// An asynchronous key-value store with per-entry expiry.
///
/// Implementations must be safe for concurrent use: one store is shared by
/// every call passing through the cache interceptors, and concurrent writes
/// to one key may land in any order.
#[async_trait]
pub trait CacheStore: Send + Sync {
    /// Retrieves the bytes stored under `key`.
    ///
    /// # Returns
    ///
    /// * `Ok(Some(bytes))` — the key exists and has not expired
    /// * `Ok(None)` — the key is absent or expired
    /// * `Err(e)` — the store could not answer
    async fn get(&self, key: &str) -> Result<Option<Bytes>, StoreError>;

    /// Stores `value` under `key`, replacing any previous entry; the entry
    /// expires once `ttl` has elapsed.
    async fn set(&self, key: &str, value: Bytes, ttl: Duration) -> Result<(), StoreError>;
}

/// Runs a store round-trip, bounded by the call's deadline when it has one.
pub(crate) async fn with_deadline<T, F>(deadline: Option<Instant>, op: F) -> Result<T, StoreError>
where
    F: Future<Output = Result<T, StoreError>>,
{
    match deadline {
        Some(deadline) => tokio::time::timeout_at(deadline, op)
            .await
            .map_err(|_| StoreError::DeadlineElapsed)?,
        None => op.await,
    }
}

/// Capacity of [`MemoryStore::new`].
pub const DEFAULT_MAX_CAPACITY: u64 = 10_000;

// Longest expiry handed to moka; longer entries are reclaimed by capacity only.
const MAX_TRACKED_TTL: Duration = Duration::from_secs(60 * 60 * 24 * 365);

#[derive(Debug, Clone)]
struct Entry {
    value: Bytes,
    ttl: Duration,
    // Deadline on the Tokio clock. `None` when `now + ttl` overflows; such
    // entries never expire.
    expires_at: Option<Instant>,
}

impl Entry {
    fn is_live(&self, now: Instant) -> bool {
        self.expires_at.is_none_or(|at| now < at)
    }

    fn reclaim_after(&self) -> Option<Duration> {
        (self.ttl <= MAX_TRACKED_TTL).then_some(self.ttl)
    }
}

// Hands each entry's own TTL to moka so expired entries are reclaimed.
struct EntryTtl;

impl Expiry<String, Entry> for EntryTtl {
    fn expire_after_create(
        &self,
        _key: &String,
        entry: &Entry,
        _created_at: std::time::Instant,
    ) -> Option<Duration> {
        entry.reclaim_after()
    }

    fn expire_after_update(
        &self,
        _key: &String,
        entry: &Entry,
        _updated_at: std::time::Instant,
        _duration_until_expiry: Option<Duration>,
    ) -> Option<Duration> {
        entry.reclaim_after()
    }
}

/// In-process [`CacheStore`] on a bounded `moka` cache.
///
/// Each entry carries its own TTL. Reads check it against the Tokio clock
/// and drop entries found expired; moka reclaims the rest in the background
/// and evicts the least useful entries once `max_capacity` is reached.
///
/// # Examples
///
/// ```
/// use std::time::Duration;
/// use bytes::Bytes;
/// use readthrough::cache::{CacheStore, MemoryStore};
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let store = MemoryStore::new();
/// store.set("cache:svc.Greeter/Hello", Bytes::from_static(b"{}"), Duration::from_secs(5)).await.unwrap();
/// assert_eq!(
///     store.get("cache:svc.Greeter/Hello").await.unwrap(),
///     Some(Bytes::from_static(b"{}"))
/// );
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct MemoryStore {
    entries: MokaCache<String, Entry>,
}

impl MemoryStore {
    /// Creates a store holding at most [`DEFAULT_MAX_CAPACITY`] entries.
    pub fn new() -> Self {
        Self::with_max_capacity(DEFAULT_MAX_CAPACITY)
    }

    pub fn with_max_capacity(max_capacity: u64) -> Self {
        let entries = MokaCache::builder()
            .max_capacity(max_capacity)
            .expire_after(EntryTtl)
            .build();
        Self { entries }
    }

    /// Returns the number of retained entries once pending evictions have run.
    pub async fn entry_count(&self) -> u64 {
        self.entries.run_pending_tasks().await;
        self.entries.entry_count()
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CacheStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<Bytes>, StoreError> {
        match self.entries.get(key).await {
            Some(entry) if entry.is_live(Instant::now()) => Ok(Some(entry.value)),
            Some(_) => {
                self.entries.invalidate(key).await;
                Ok(None)
            }
            None => Ok(None),
        }
    }

    async fn set(&self, key: &str, value: Bytes, ttl: Duration) -> Result<(), StoreError> {
        let entry = Entry {
            value,
            ttl,
            expires_at: Instant::now().checked_add(ttl),
        };
        self.entries.insert(key.to_owned(), entry).await;
        Ok(())
    }
}
