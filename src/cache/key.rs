//! Cache key derivation.
//!
//! A key is `<namespace>:<procedure>` where `<procedure>` is the procedure
//! path with a single leading `/` removed, e.g. `/svc.Greeter/Hello` becomes
//! `cache:svc.Greeter/Hello`. Under [`KeyStrategy::ProcedureAndPayload`] a
//! `#<sha256>` fingerprint of the request payload is appended.

use sha2::{Digest, Sha256};

use super::{CacheConfig, KeyStrategy};
use crate::rpc::{Codec, CodecError, Request};

/// Namespace used by [`derive_key`].
pub const DEFAULT_NAMESPACE: &str = "cache";

/// Derives the cache key for `procedure` in the default namespace.
///
/// # Examples
///
/// ```
/// use readthrough::cache::derive_key;
///
/// assert_eq!(derive_key("/svc.Greeter/Hello"), "cache:svc.Greeter/Hello");
/// assert_eq!(derive_key("svc.Greeter/Hello"), "cache:svc.Greeter/Hello");
/// ```
pub fn derive_key(procedure: &str) -> String {
    derive_key_in(DEFAULT_NAMESPACE, procedure)
}

/// Derives the cache key for `procedure` under `namespace`.
pub fn derive_key_in(namespace: &str, procedure: &str) -> String {
    let procedure = procedure.strip_prefix('/').unwrap_or(procedure);
    format!("{namespace}:{procedure}")
}

/// Hex-encoded SHA-256 of an encoded request payload.
pub fn payload_fingerprint(encoded: &[u8]) -> String {
    hex::encode(Sha256::digest(encoded))
}

/// Derives the key for `req` according to `config`.
///
/// Only [`KeyStrategy::ProcedureAndPayload`] can fail, when the request
/// message cannot be encoded.
pub(crate) fn key_for(
    req: &Request,
    config: &CacheConfig,
    codec: &dyn Codec,
) -> Result<String, CodecError> {
    let key = derive_key_in(&config.namespace, req.procedure());
    match config.key_strategy {
        KeyStrategy::Procedure => Ok(key),
        KeyStrategy::ProcedureAndPayload => {
            let encoded = codec.encode(req.message())?;
            Ok(format!("{key}#{}", payload_fingerprint(&encoded)))
        }
    }
}
