//! Read path: serve cacheable calls from the store.

use tracing::{debug, warn};

use super::store::with_deadline;
use super::{CacheError, FailureMode, HIT, ReadThroughCache, X_CACHE, X_CACHE_KEY, is_cacheable};
use crate::interceptor::{CallFuture, Interceptor, Next};
use crate::rpc::{Request, Response};

/// Interceptor that answers cacheable calls from the store.
///
/// # Behavior
///
/// - Calls that are not cacheable (see [`is_cacheable`]) pass through untouched;
///   the store is not consulted.
/// - On a miss, or when the store cannot be read, the call passes through.
///   Store read errors are logged and never reach the caller.
/// - On a hit the entry is decoded as the method's output type and returned
///   with `X-Cache: HIT` and `X-Cache-Key: <key>`; the handler is **not** called.
/// - An entry that fails to decode fails the call under [`FailureMode::Strict`]
///   and is skipped under [`FailureMode::BestEffort`].
pub struct ReadThroughInbound {
    cache: ReadThroughCache,
}

impl ReadThroughInbound {
    pub fn new(cache: ReadThroughCache) -> Self {
        Self { cache }
    }
}

impl Interceptor for ReadThroughInbound {
    fn intercept(&self, req: Request, next: Next) -> CallFuture {
        let cache = self.cache.clone();

        Box::pin(async move {
            if !is_cacheable(req.spec(), req.headers(), cache.config()) {
                debug!(procedure = %req.procedure(), "call not cacheable, passing through");
                return next.run(req).await;
            }

            let key = match cache.key_for(&req) {
                Ok(key) => key,
                Err(e) => {
                    warn!(procedure = %req.procedure(), error = %e, "cannot derive cache key, passing through");
                    return next.run(req).await;
                }
            };

            let cached = match with_deadline(req.call_deadline(), cache.store().get(&key)).await {
                Ok(Some(bytes)) => bytes,
                Ok(None) => {
                    debug!(%key, "cache miss");
                    return next.run(req).await;
                }
                Err(e) => {
                    warn!(%key, error = %e, "cache read failed, passing through");
                    return next.run(req).await;
                }
            };

            match cache.codec().decode(req.spec().output(), &cached) {
                Ok(message) => {
                    debug!(%key, "cache hit");
                    let mut response = Response::new(message);
                    response.set_header(X_CACHE, HIT);
                    response.set_header(X_CACHE_KEY, key);
                    Ok(response)
                }
                Err(source) => {
                    let err = CacheError::Decode { key, source };
                    match cache.config().failure_mode {
                        FailureMode::Strict => Err(err.into()),
                        FailureMode::BestEffort => {
                            warn!(error = %err, "ignoring undecodable cache entry");
                            next.run(req).await
                        }
                    }
                }
            }
        })
    }
}
