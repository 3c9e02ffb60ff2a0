//! Read-through response caching for unary calls.
//!
//! A [`ReadThroughCache`] produces two interceptors that are installed as a
//! pair, inbound first:
//!
//! - [`ReadThroughInbound`] answers cacheable calls from the store when it
//!   holds a decodable entry, short-circuiting the handler.
//! - [`ReadThroughOutbound`] records successful, cacheable responses in the
//!   store with a fixed time-to-live.
//!
//! Only methods declaring
//! [`IdempotencyLevel::NoSideEffects`](crate::rpc::IdempotencyLevel::NoSideEffects)
//! are cached, and a caller can opt out per call with `Cache-Control: no-cache`.
//! Entries are never deleted by this layer; they disappear when the store
//! expires them.
//!
//! ## Failure handling
//!
//! | Failure                        | Outcome                                   |
//! |--------------------------------|-------------------------------------------|
//! | store read error               | logged, call goes to the handler          |
//! | cached entry does not decode   | [`FailureMode`]: error (`Strict`) or pass-through |
//! | response does not encode       | [`FailureMode`]: error (`Strict`) or uncached response |
//! | store write error              | [`FailureMode`]: error (`Strict`) or uncached response |
//! | handler error                  | propagated, never cached                  |

use std::sync::Arc;

use thiserror::Error;

use crate::interceptor::{InterceptorHandler, from_interceptor};
use crate::rpc::{Code, Codec, CodecError, JsonCodec, Request, RpcError};

pub mod config;
pub mod inbound;
pub mod key;
pub mod outbound;
pub mod policy;
#[cfg(feature = "redis")]
pub mod redis;
pub mod store;

pub use config::{CacheConfig, FailureMode, KeyStrategy};
pub use inbound::ReadThroughInbound;
pub use key::{derive_key, derive_key_in, payload_fingerprint};
pub use outbound::ReadThroughOutbound;
pub use policy::{bypass_requested, is_cacheable};
#[cfg(feature = "redis")]
pub use redis::RedisStore;
pub use store::{CacheStore, MemoryStore, StoreError};

/// Response header set on every answer served from the cache.
pub const X_CACHE: &str = "X-Cache";
/// Response header carrying the key a cached answer was served from.
pub const X_CACHE_KEY: &str = "X-Cache-Key";
/// Value of [`X_CACHE`] on a hit.
pub const HIT: &str = "HIT";

/// Failures of the cache layer itself.
///
/// Converted into an [`RpcError`] (with this error as its source) when the
/// active [`FailureMode`] surfaces them to the caller.
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("failed to decode cached response under `{key}`: {source}")]
    Decode {
        key: String,
        #[source]
        source: CodecError,
    },

    #[error("failed to encode cache entry for `{procedure}`: {source}")]
    Encode {
        procedure: String,
        #[source]
        source: CodecError,
    },

    #[error("failed to write cache entry `{key}`: {source}")]
    Store {
        key: String,
        #[source]
        source: StoreError,
    },
}

impl From<CacheError> for RpcError {
    fn from(err: CacheError) -> Self {
        let code = match err {
            CacheError::Decode { .. } => Code::DataLoss,
            CacheError::Encode { .. } | CacheError::Store { .. } => Code::Internal,
        };
        RpcError::from_source(code, err)
    }
}

/// Shared state of a read-through cache: store, codec, and configuration.
///
/// Cloning is cheap; every clone and every interceptor built from it refer to
/// the same store.
///
/// # Examples
///
/// ```rust,no_run
/// use std::sync::Arc;
/// use std::time::Duration;
/// use readthrough::cache::{CacheConfig, MemoryStore, ReadThroughCache};
/// use readthrough::router::Router;
///
/// let cache = ReadThroughCache::new(Arc::new(MemoryStore::new()))
///     .with_config(CacheConfig::default().with_ttl(Duration::from_secs(30)));
///
/// let mut router = Router::new();
/// for interceptor in cache.interceptors() {
///     router.intercept(interceptor);
/// }
/// ```
#[derive(Clone)]
pub struct ReadThroughCache {
    store: Arc<dyn CacheStore>,
    codec: Arc<dyn Codec>,
    config: Arc<CacheConfig>,
}

impl ReadThroughCache {
    /// Creates a cache over `store` using [`JsonCodec`] and the default configuration.
    pub fn new(store: Arc<dyn CacheStore>) -> Self {
        Self {
            store,
            codec: Arc::new(JsonCodec),
            config: Arc::new(CacheConfig::default()),
        }
    }

    #[must_use]
    pub fn with_config(mut self, config: CacheConfig) -> Self {
        self.config = Arc::new(config);
        self
    }

    /// Replaces the codec used to encode entries and decode them back.
    #[must_use]
    pub fn with_codec(mut self, codec: Arc<dyn Codec>) -> Self {
        self.codec = codec;
        self
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    pub fn store(&self) -> &dyn CacheStore {
        self.store.as_ref()
    }

    pub fn codec(&self) -> &dyn Codec {
        self.codec.as_ref()
    }

    /// The read-path interceptor.
    pub fn inbound(&self) -> ReadThroughInbound {
        ReadThroughInbound::new(self.clone())
    }

    /// The write-path interceptor.
    pub fn outbound(&self) -> ReadThroughOutbound {
        ReadThroughOutbound::new(self.clone())
    }

    /// Both interceptors, in installation order.
    pub fn interceptors(&self) -> [InterceptorHandler; 2] {
        [
            from_interceptor(Arc::new(self.inbound())),
            from_interceptor(Arc::new(self.outbound())),
        ]
    }

    pub(crate) fn key_for(&self, req: &Request) -> Result<String, CodecError> {
        key::key_for(req, &self.config, self.codec.as_ref())
    }
}
