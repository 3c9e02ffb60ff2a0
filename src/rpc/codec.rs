//! Message wire encodings.
//!
//! A [`Codec`] turns a [`DynamicMessage`] into bytes and back. Decoding is
//! driven by a runtime [`MessageSchema`] handle, so callers such as the cache
//! layer can rebuild a response for any method without knowing its concrete
//! message type.

use std::sync::Arc;

use bytes::Bytes;
use serde_json::{Map, Value};
use thiserror::Error;

use super::{BoxError, DynamicMessage, FieldKind, MessageSchema};

/// Errors produced while encoding, decoding, or building messages.
#[derive(Debug, Error)]
pub enum CodecError {
    #[error("malformed {codec} payload for `{message}`: {source}")]
    Malformed {
        codec: &'static str,
        message: String,
        #[source]
        source: BoxError,
    },

    #[error("message `{message}` has no field `{field}`")]
    UnknownField { message: String, field: String },

    #[error("field `{message}.{field}` expects {expected}, found {found}")]
    FieldType {
        message: String,
        field: String,
        expected: FieldKind,
        found: &'static str,
    },

    #[error("failed to encode `{message}`: {source}")]
    Encode {
        message: String,
        #[source]
        source: BoxError,
    },
}

/// A wire encoding for [`DynamicMessage`]s.
///
/// Implementations must be `Send + Sync`; a single codec instance is shared
/// by every call passing through an interceptor chain.
pub trait Codec: Send + Sync {
    /// Short name of the encoding, used in logs and errors.
    fn name(&self) -> &'static str;

    /// Serializes `message` to its canonical wire form.
    ///
    /// # Errors
    ///
    /// Returns [`CodecError::Encode`] if the message cannot be represented.
    fn encode(&self, message: &DynamicMessage) -> Result<Bytes, CodecError>;

    /// Deserializes `bytes` into a message of type `schema`.
    ///
    /// # Errors
    ///
    /// Returns [`CodecError::Malformed`] if the bytes are not a valid encoding,
    /// or a schema error if they describe fields `schema` does not declare.
    fn decode(&self, schema: &Arc<MessageSchema>, bytes: &[u8])
    -> Result<DynamicMessage, CodecError>;
}

/// The canonical codec: a message is a JSON object of its set fields.
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
/// use readthrough::rpc::{Codec, DynamicMessage, FieldKind, JsonCodec, MessageSchema};
///
/// let schema = Arc::new(MessageSchema::new("svc.HelloReply").field("msg", FieldKind::String));
/// let reply = DynamicMessage::new(schema.clone()).with("msg", "hi").unwrap();
///
/// let bytes = JsonCodec.encode(&reply).unwrap();
/// assert_eq!(&bytes[..], br#"{"msg":"hi"}"#);
/// assert_eq!(JsonCodec.decode(&schema, &bytes).unwrap(), reply);
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

impl Codec for JsonCodec {
    fn name(&self) -> &'static str {
        "json"
    }

    fn encode(&self, message: &DynamicMessage) -> Result<Bytes, CodecError> {
        serde_json::to_vec(message.fields())
            .map(Bytes::from)
            .map_err(|e| CodecError::Encode {
                message: message.schema().name().to_owned(),
                source: Box::new(e),
            })
    }

    fn decode(
        &self,
        schema: &Arc<MessageSchema>,
        bytes: &[u8],
    ) -> Result<DynamicMessage, CodecError> {
        let object: Map<String, Value> =
            serde_json::from_slice(bytes).map_err(|e| CodecError::Malformed {
                codec: self.name(),
                message: schema.name().to_owned(),
                source: Box::new(e),
            })?;

        let mut message = DynamicMessage::new(Arc::clone(schema));
        for (field, value) in object {
            message.set(&field, value)?;
        }
        Ok(message)
    }
}
