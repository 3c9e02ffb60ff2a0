//! Unary call requests.

use std::sync::Arc;

use tokio::time::Instant;

use super::{DynamicMessage, Headers, MethodDescriptor};

/// A single unary call: the target method, caller metadata, and the input message.
///
/// A request is immutable once it enters an interceptor chain; interceptors
/// read it and pass it on by value.
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
/// use readthrough::rpc::{DynamicMessage, FieldKind, MessageSchema, MethodDescriptor, Request};
///
/// let input = Arc::new(MessageSchema::new("svc.HelloRequest").field("name", FieldKind::String));
/// let output = Arc::new(MessageSchema::new("svc.HelloReply"));
/// let spec = Arc::new(MethodDescriptor::new("/svc.Greeter/Hello", input.clone(), output));
///
/// let request = Request::new(spec, DynamicMessage::new(input).with("name", "ada").unwrap())
///     .header("Cache-Control", "no-cache");
///
/// assert_eq!(request.procedure(), "/svc.Greeter/Hello");
/// assert_eq!(request.headers().get("cache-control"), Some("no-cache"));
/// ```
#[derive(Debug, Clone)]
pub struct Request {
    spec: Arc<MethodDescriptor>,
    headers: Headers,
    message: DynamicMessage,
    deadline: Option<Instant>,
}

impl Request {
    /// Creates a request with no headers and no deadline.
    pub fn new(spec: Arc<MethodDescriptor>, message: DynamicMessage) -> Self {
        Self {
            spec,
            headers: Headers::new(),
            message,
            deadline: None,
        }
    }

    /// Appends a request header.
    #[must_use]
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name, value);
        self
    }

    /// Sets the instant after which the caller no longer waits for this call.
    #[must_use]
    pub fn deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    // Rebinds the request to the descriptor the procedure was registered with.
    pub(crate) fn with_spec(mut self, spec: Arc<MethodDescriptor>) -> Self {
        self.spec = spec;
        self
    }

    /// Returns the descriptor of the method being called.
    pub fn spec(&self) -> &Arc<MethodDescriptor> {
        &self.spec
    }

    /// Shorthand for `self.spec().procedure()`.
    pub fn procedure(&self) -> &str {
        self.spec.procedure()
    }

    pub fn headers(&self) -> &Headers {
        &self.headers
    }

    pub fn message(&self) -> &DynamicMessage {
        &self.message
    }

    pub fn call_deadline(&self) -> Option<Instant> {
        self.deadline
    }
}
