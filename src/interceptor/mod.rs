//! Interceptor pipeline — composable before/after logic around unary handlers.
//!
//! Each interceptor wraps the next layer, enabling request inspection,
//! short-circuit responses, and response decoration without coupling handlers
//! to infrastructure concerns such as caching.
//!
//! ## Core types
//!
//! - [`Interceptor`] — trait implemented by all interceptors.
//! - [`Next`] — cursor into the remaining chain; call [`Next::run`] to advance
//!   to the next layer, or to the handler once the chain is exhausted.
//! - [`InterceptorHandler`] — type-erased, cheaply-cloneable interceptor function.
//! - [`UnaryHandler`] — type-erased terminal handler.
//! - [`from_interceptor`] — converts an [`Interceptor`] into an [`InterceptorHandler`].
//! - [`LoggerInterceptor`] — built-in call logger.

use std::{future::Future, pin::Pin, sync::Arc};
use tokio::time::Instant;

use crate::rpc::{Request, Response, RpcError};

/// The outcome of a unary call.
pub type CallResult = Result<Response, RpcError>;

/// A boxed, `Send` future resolving to a [`CallResult`].
pub type CallFuture = Pin<Box<dyn Future<Output = CallResult> + Send>>;

/// A type-erased, reference-counted interceptor function.
///
/// Every entry in the interceptor stack is stored as an `InterceptorHandler`.
/// The [`Arc`] wrapper makes handlers cheap to clone so that [`Next`] can
/// advance through the chain without copying closures.
///
/// ```rust,no_run
/// use std::sync::Arc;
/// use readthrough::interceptor::{CallFuture, InterceptorHandler, Next};
/// use readthrough::rpc::Request;
///
/// let handler: InterceptorHandler = Arc::new(|req: Request, next: Next| -> CallFuture {
///     Box::pin(async move { next.run(req).await })
/// });
/// ```
pub type InterceptorHandler =
    Arc<dyn Fn(Request, Next) -> CallFuture + Send + Sync + 'static>;

/// A type-erased terminal handler invoked once every interceptor has run.
pub type UnaryHandler = Arc<dyn Fn(Request) -> CallFuture + Send + Sync + 'static>;

/// Converts an [`Interceptor`] implementation into an [`InterceptorHandler`].
///
/// # Examples
///
/// ```rust,no_run
/// use std::sync::Arc;
/// use readthrough::interceptor::{LoggerInterceptor, from_interceptor};
///
/// let handler = from_interceptor(Arc::new(LoggerInterceptor));
/// ```
pub fn from_interceptor<I>(interceptor: Arc<I>) -> InterceptorHandler
where
    I: Interceptor + 'static,
{
    Arc::new(move |req: Request, next: Next| interceptor.intercept(req, next))
}

/// A cursor into the remaining interceptor chain for a single call.
///
/// `Next` is consumed on each call to [`run`](Self::run), so an interceptor
/// cannot forward the same call twice.
pub struct Next {
    interceptors: Arc<[InterceptorHandler]>,
    // Position of the interceptor invoked by the next `run` call.
    index: usize,
    handler: UnaryHandler,
}

impl Next {
    /// Creates a `Next` positioned at the start of `interceptors`, ending in `handler`.
    pub fn new(interceptors: Arc<[InterceptorHandler]>, handler: UnaryHandler) -> Self {
        Self {
            interceptors,
            index: 0,
            handler,
        }
    }

    /// Invokes the next interceptor in the chain and returns its result.
    ///
    /// Once every interceptor has been visited, the terminal handler is called.
    pub async fn run(mut self, req: Request) -> CallResult {
        if self.index < self.interceptors.len() {
            let interceptor = Arc::clone(&self.interceptors[self.index]);
            self.index += 1;
            interceptor(req, self).await
        } else {
            (self.handler)(req).await
        }
    }
}

/// The core trait for all interceptors.
///
/// Implementors receive a [`Request`] and a [`Next`] cursor. They may:
///
/// - **Pass through** — call `next.run(req).await` without modification.
/// - **Short-circuit** — return a result directly without calling `next`.
/// - **Decorate** — call `next.run(req).await`, inspect the outcome, and
///   return a modified copy or an error.
///
/// Implementations are shared across Tokio tasks, so they must be `Send + Sync`
/// and must return a `Send` future.
pub trait Interceptor: Send + Sync {
    /// Handle the call and optionally delegate to the next layer.
    fn intercept(&self, req: Request, next: Next) -> CallFuture;
}

/// Built-in interceptor that logs each call's procedure, outcome, and duration.
///
/// Emits a single `tracing::info!` record after the downstream chain completes.
/// It never short-circuits.
pub struct LoggerInterceptor;

impl Interceptor for LoggerInterceptor {
    fn intercept(&self, req: Request, next: Next) -> CallFuture {
        Box::pin(async move {
            let start = Instant::now();
            let procedure = req.procedure().to_owned();

            let result = next.run(req).await;

            let elapsed = start.elapsed();
            match &result {
                Ok(_) => tracing::info!(%procedure, ?elapsed, "call ok"),
                Err(e) => tracing::info!(%procedure, code = %e.code(), ?elapsed, "call failed"),
            }

            result
        })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;
    use crate::rpc::{Code, DynamicMessage, FieldKind, MessageSchema, MethodDescriptor};

    fn reply_schema() -> Arc<MessageSchema> {
        Arc::new(MessageSchema::new("test.Reply").field("from", FieldKind::String))
    }

    fn request() -> Request {
        let input = Arc::new(MessageSchema::new("test.Empty"));
        let spec = Arc::new(MethodDescriptor::new("/test.Svc/Call", input.clone(), reply_schema()));
        Request::new(spec, DynamicMessage::new(input))
    }

    fn reply(from: &str) -> Response {
        Response::new(DynamicMessage::new(reply_schema()).with("from", from).unwrap())
    }

    fn handler() -> UnaryHandler {
        Arc::new(|_req: Request| -> CallFuture { Box::pin(async { Ok(reply("handler")) }) })
    }

    // Records its label on the way in, then forwards.
    struct Tag(&'static str, Arc<Mutex<Vec<&'static str>>>);

    impl Interceptor for Tag {
        fn intercept(&self, req: Request, next: Next) -> CallFuture {
            self.1.lock().unwrap().push(self.0);
            Box::pin(async move { next.run(req).await })
        }
    }

    struct ShortCircuit;

    impl Interceptor for ShortCircuit {
        fn intercept(&self, _req: Request, _next: Next) -> CallFuture {
            Box::pin(async { Ok(reply("short-circuit")) })
        }
    }

    #[tokio::test]
    async fn empty_chain_calls_handler() {
        let next = Next::new(Arc::from(Vec::new()), handler());
        let resp = next.run(request()).await.unwrap();
        assert_eq!(resp, reply("handler"));
    }

    #[tokio::test]
    async fn interceptors_run_in_order() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let chain: Vec<InterceptorHandler> = vec![
            from_interceptor(Arc::new(Tag("first", Arc::clone(&seen)))),
            from_interceptor(Arc::new(Tag("second", Arc::clone(&seen)))),
        ];
        let resp = Next::new(Arc::from(chain), handler())
            .run(request())
            .await
            .unwrap();
        assert_eq!(resp, reply("handler"));
        assert_eq!(*seen.lock().unwrap(), vec!["first", "second"]);
    }

    #[tokio::test]
    async fn short_circuit_skips_rest_of_chain() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let chain: Vec<InterceptorHandler> = vec![
            from_interceptor(Arc::new(ShortCircuit)),
            from_interceptor(Arc::new(Tag("unreached", Arc::clone(&seen)))),
        ];
        let resp = Next::new(Arc::from(chain), handler())
            .run(request())
            .await
            .unwrap();
        assert_eq!(resp, reply("short-circuit"));
        assert!(seen.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn logger_passes_errors_through() {
        let failing: UnaryHandler = Arc::new(|_req: Request| -> CallFuture {
            Box::pin(async { Err(RpcError::new(Code::NotFound, "gone")) })
        });
        let chain: Vec<InterceptorHandler> = vec![from_interceptor(Arc::new(LoggerInterceptor))];
        let err = Next::new(Arc::from(chain), failing)
            .run(request())
            .await
            .unwrap_err();
        assert_eq!(err.code(), Code::NotFound);
    }
}
