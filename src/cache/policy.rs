//! Cacheability policy.

use super::CacheConfig;
use crate::rpc::{Headers, MethodDescriptor};

/// Returns `true` if a call may be answered from, and recorded into, the cache.
///
/// A call is cacheable only when its method declares
/// [`IdempotencyLevel::NoSideEffects`](crate::rpc::IdempotencyLevel::NoSideEffects)
/// and the caller has not opted out (see [`bypass_requested`]).
pub fn is_cacheable(spec: &MethodDescriptor, headers: &Headers, config: &CacheConfig) -> bool {
    spec.idempotency_level().is_side_effect_free() && !bypass_requested(headers, config)
}

/// Returns `true` if any value of the bypass header equals the bypass value exactly.
///
/// The header name matches case-insensitively; the value is case-sensitive.
pub fn bypass_requested(headers: &Headers, config: &CacheConfig) -> bool {
    headers
        .get_all(&config.bypass_header)
        .any(|value| value == config.bypass_value)
}
