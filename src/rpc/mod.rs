//! Unary RPC call model.
//!
//! This module provides the primitives the cache layer queries on every call:
//! [`Code`], [`RpcError`], [`IdempotencyLevel`], [`Headers`],
//! [`MethodDescriptor`], [`Request`], [`Response`], and the runtime message
//! model ([`MessageSchema`], [`DynamicMessage`], [`Codec`]).

use std::fmt;

use thiserror::Error;

pub mod codec;
pub mod headers;
pub mod method;
pub mod request;
pub mod response;
pub mod schema;

pub use codec::{Codec, CodecError, JsonCodec};
pub use headers::Headers;
pub use method::MethodDescriptor;
pub use request::Request;
pub use response::Response;
pub use schema::{DynamicMessage, FieldKind, MessageSchema};

/// Boxed, thread-safe error used as the source of an [`RpcError`].
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// An RPC status code carried by a failed call.
///
/// # Examples
///
/// ```
/// use readthrough::rpc::Code;
///
/// assert_eq!(Code::Unimplemented.as_str(), "unimplemented");
/// assert_eq!(Code::DataLoss.to_string(), "data_loss");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Code {
    Canceled,
    Unknown,
    InvalidArgument,
    DeadlineExceeded,
    NotFound,
    Unimplemented,
    Internal,
    Unavailable,
    DataLoss,
}

impl Code {
    /// Returns the canonical lowercase name of this code.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Canceled => "canceled",
            Self::Unknown => "unknown",
            Self::InvalidArgument => "invalid_argument",
            Self::DeadlineExceeded => "deadline_exceeded",
            Self::NotFound => "not_found",
            Self::Unimplemented => "unimplemented",
            Self::Internal => "internal",
            Self::Unavailable => "unavailable",
            Self::DataLoss => "data_loss",
        }
    }
}

impl fmt::Display for Code {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A failed unary call: a [`Code`], a human-readable message, and an
/// optional underlying cause.
///
/// # Examples
///
/// ```
/// use readthrough::rpc::{Code, RpcError};
///
/// let err = RpcError::new(Code::NotFound, "no such user");
/// assert_eq!(err.code(), Code::NotFound);
/// assert_eq!(err.to_string(), "not_found: no such user");
/// ```
#[derive(Debug, Error)]
#[error("{code}: {message}")]
pub struct RpcError {
    code: Code,
    message: String,
    #[source]
    source: Option<BoxError>,
}

impl RpcError {
    /// Creates an error without an underlying cause.
    pub fn new(code: Code, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            source: None,
        }
    }

    /// Creates an error wrapping `source`, using its `Display` output as the message.
    pub fn from_source<E>(code: Code, source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self {
            code,
            message: source.to_string(),
            source: Some(Box::new(source)),
        }
    }

    pub fn code(&self) -> Code {
        self.code
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    /// Returns the underlying cause if it is of type `E`.
    pub fn source_as<E>(&self) -> Option<&E>
    where
        E: std::error::Error + 'static,
    {
        self.source.as_deref().and_then(|e| e.downcast_ref::<E>())
    }
}

/// The side-effect classification a method declares.
///
/// Only [`IdempotencyLevel::NoSideEffects`] calls may be answered from a
/// cache; anything else, including an unspecified level, must reach the
/// handler.
///
/// # Examples
///
/// ```
/// use readthrough::rpc::IdempotencyLevel;
///
/// let level: IdempotencyLevel = "NO_SIDE_EFFECTS".parse().unwrap();
/// assert!(level.is_side_effect_free());
/// assert!(!IdempotencyLevel::Idempotent.is_side_effect_free());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum IdempotencyLevel {
    /// Repeated calls have no observable effect; safe to serve from a cache.
    NoSideEffects,
    /// Repeated calls have the same effect as one call.
    Idempotent,
    /// Nothing is declared.
    #[default]
    Unknown,
}

impl IdempotencyLevel {
    /// Returns the level's schema name.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::NoSideEffects => "NO_SIDE_EFFECTS",
            Self::Idempotent => "IDEMPOTENT",
            Self::Unknown => "IDEMPOTENCY_UNKNOWN",
        }
    }

    /// Returns `true` only for [`IdempotencyLevel::NoSideEffects`].
    pub fn is_side_effect_free(self) -> bool {
        matches!(self, Self::NoSideEffects)
    }
}

impl fmt::Display for IdempotencyLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for IdempotencyLevel {
    type Err = std::convert::Infallible;

    // Unrecognized names fall back to `Unknown`, which is never cacheable.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "NO_SIDE_EFFECTS" => Self::NoSideEffects,
            "IDEMPOTENT" => Self::Idempotent,
            _ => Self::Unknown,
        })
    }
}
