//! Method descriptors: the static identity and schema of a unary procedure.

use std::sync::Arc;

use super::{IdempotencyLevel, MessageSchema};

/// Describes one unary procedure.
///
/// The descriptor is built once when a procedure is registered and shared by
/// every call to it through an [`Arc`].
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
/// use readthrough::rpc::{FieldKind, IdempotencyLevel, MessageSchema, MethodDescriptor};
///
/// let request = Arc::new(MessageSchema::new("svc.HelloRequest").field("name", FieldKind::String));
/// let reply = Arc::new(MessageSchema::new("svc.HelloReply").field("msg", FieldKind::String));
///
/// let hello = MethodDescriptor::new("/svc.Greeter/Hello", request, reply)
///     .idempotency(IdempotencyLevel::NoSideEffects);
///
/// assert_eq!(hello.procedure(), "/svc.Greeter/Hello");
/// assert_eq!(hello.output().name(), "svc.HelloReply");
/// ```
#[derive(Debug, Clone)]
pub struct MethodDescriptor {
    procedure: String,
    idempotency: IdempotencyLevel,
    input: Arc<MessageSchema>,
    output: Arc<MessageSchema>,
}

impl MethodDescriptor {
    /// Creates a descriptor with [`IdempotencyLevel::Unknown`].
    pub fn new(
        procedure: impl Into<String>,
        input: Arc<MessageSchema>,
        output: Arc<MessageSchema>,
    ) -> Self {
        Self {
            procedure: procedure.into(),
            idempotency: IdempotencyLevel::Unknown,
            input,
            output,
        }
    }

    /// Sets the declared side-effect classification.
    #[must_use]
    pub fn idempotency(mut self, level: IdempotencyLevel) -> Self {
        self.idempotency = level;
        self
    }

    /// The fully-qualified procedure path, e.g. `/svc.Greeter/Hello`.
    pub fn procedure(&self) -> &str {
        &self.procedure
    }

    pub fn idempotency_level(&self) -> IdempotencyLevel {
        self.idempotency
    }

    pub fn input(&self) -> &Arc<MessageSchema> {
        &self.input
    }

    pub fn output(&self) -> &Arc<MessageSchema> {
        &self.output
    }
}
