//! Write path: record successful cacheable responses.

use tracing::{debug, warn};

use super::store::with_deadline;
use super::{CacheError, FailureMode, ReadThroughCache, is_cacheable};
use crate::interceptor::{CallFuture, CallResult, Interceptor, Next};
use crate::rpc::{Request, Response};

/// Interceptor that writes successful, cacheable responses to the store.
///
/// # Behavior
///
/// - Handler errors are propagated unchanged and never cached.
/// - Calls that are not cacheable (see [`is_cacheable`]) are returned
///   unmodified; the store is not written.
/// - Otherwise the response message is encoded with the cache's codec and
///   stored under the call's key for the configured time-to-live, and the
///   original response is returned.
/// - If encoding or the write fails, the call fails under
///   [`FailureMode::Strict`] even though the handler succeeded; under
///   [`FailureMode::BestEffort`] the failure is logged and the response is
///   returned uncached.
pub struct ReadThroughOutbound {
    cache: ReadThroughCache,
}

impl ReadThroughOutbound {
    pub fn new(cache: ReadThroughCache) -> Self {
        Self { cache }
    }
}

impl Interceptor for ReadThroughOutbound {
    fn intercept(&self, req: Request, next: Next) -> CallFuture {
        let cache = self.cache.clone();

        Box::pin(async move {
            // Cacheability and the key depend only on the request, so both are
            // settled before the request moves down the chain.
            if !is_cacheable(req.spec(), req.headers(), cache.config()) {
                return next.run(req).await;
            }
            let procedure = req.procedure().to_owned();
            let deadline = req.call_deadline();
            let key = cache.key_for(&req);

            let response = next.run(req).await?;

            let key = match key {
                Ok(key) => key,
                Err(source) => {
                    return settle(&cache, response, CacheError::Encode { procedure, source });
                }
            };

            let bytes = match cache.codec().encode(response.message()) {
                Ok(bytes) => bytes,
                Err(source) => {
                    return settle(&cache, response, CacheError::Encode { procedure, source });
                }
            };

            let ttl = cache.config().ttl;
            let written = with_deadline(deadline, cache.store().set(&key, bytes, ttl)).await;
            match written {
                Ok(()) => {
                    debug!(%key, ?ttl, "cached response");
                    Ok(response)
                }
                Err(source) => settle(&cache, response, CacheError::Store { key, source }),
            }
        })
    }
}

// Applies the failure mode to a cache failure that followed a successful handler call.
fn settle(cache: &ReadThroughCache, response: Response, err: CacheError) -> CallResult {
    match cache.config().failure_mode {
        FailureMode::Strict => Err(err.into()),
        FailureMode::BestEffort => {
            warn!(error = %err, "response not cached");
            Ok(response)
        }
    }
}
