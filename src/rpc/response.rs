//! Unary call responses.

use super::{DynamicMessage, Headers};

/// A successful unary response: the output message plus response metadata.
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
/// use readthrough::rpc::{DynamicMessage, FieldKind, MessageSchema, Response};
///
/// let schema = Arc::new(MessageSchema::new("svc.HelloReply").field("msg", FieldKind::String));
/// let response = Response::new(DynamicMessage::new(schema).with("msg", "hi").unwrap())
///     .header("X-Request-Id", "abc-123");
///
/// assert_eq!(response.headers().get("x-request-id"), Some("abc-123"));
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct Response {
    headers: Headers,
    message: DynamicMessage,
}

impl Response {
    /// Creates a response carrying `message` and no headers.
    pub fn new(message: DynamicMessage) -> Self {
        Self {
            headers: Headers::new(),
            message,
        }
    }

    /// Appends a response header. Multiple calls with the same name are additive.
    #[must_use]
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name, value);
        self
    }

    /// Replaces a header in-place. Intended for interceptors that decorate a
    /// response produced downstream or rebuilt from a cache.
    pub fn set_header(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.headers.set(name, value);
    }

    pub fn headers(&self) -> &Headers {
        &self.headers
    }

    pub fn message(&self) -> &DynamicMessage {
        &self.message
    }

    /// Consumes the response, returning the output message.
    pub fn into_message(self) -> DynamicMessage {
        self.message
    }
}
