//! Procedure routing — map procedure paths to unary handlers.
//!
//! [`Router`] holds the registered procedures, each bound to its
//! [`MethodDescriptor`], and the interceptor stack every call runs through
//! before reaching its handler:
//!
//! ```text
//! call ──► interceptor 1 ──► interceptor 2 ──► … ──► handler
//! ```
//!
//! Procedures are matched by exact path. Registering the same path twice
//! replaces the earlier handler.

use std::future::Future;
use std::sync::Arc;

use crate::interceptor::{CallFuture, CallResult, InterceptorHandler, Next, UnaryHandler};
use crate::rpc::{Code, MethodDescriptor, Request, RpcError};

/// Conversion trait for async handler functions.
///
/// Any `Fn(Request) -> impl Future<Output = CallResult> + Send` that is also
/// `Send + Sync + 'static` implements this trait via the blanket impl below.
pub trait IntoHandler: Send + Sync + 'static {
    /// Call the handler with the given request, boxing the returned future.
    fn call(&self, req: Request) -> CallFuture;
}

impl<T, F> IntoHandler for T
where
    T: Fn(Request) -> F + Send + Sync + 'static,
    F: Future<Output = CallResult> + Send + 'static,
{
    fn call(&self, req: Request) -> CallFuture {
        Box::pin((self)(req))
    }
}

// A registered procedure binding a descriptor to its handler.
struct Route {
    spec: Arc<MethodDescriptor>,
    handler: UnaryHandler,
}

/// Unary call router with an interceptor stack.
///
/// # Examples
///
/// ```rust,no_run
/// use std::sync::Arc;
/// use readthrough::router::Router;
/// use readthrough::rpc::{
///     DynamicMessage, IdempotencyLevel, MessageSchema, MethodDescriptor, Request, Response, RpcError,
/// };
///
/// # async fn example() {
/// let empty = Arc::new(MessageSchema::new("svc.Empty"));
/// let mut router = Router::new();
/// let ping = router.unary(
///     MethodDescriptor::new("/svc.Health/Ping", empty.clone(), empty.clone())
///         .idempotency(IdempotencyLevel::NoSideEffects),
///     move |req: Request| {
///         let reply = DynamicMessage::new(req.spec().output().clone());
///         async move { Ok::<_, RpcError>(Response::new(reply)) }
///     },
/// );
///
/// let response = router.call(Request::new(ping, DynamicMessage::new(empty))).await;
/// assert!(response.is_ok());
/// # }
/// ```
#[derive(Default)]
pub struct Router {
    routes: Vec<Route>,
    interceptors: Arc<[InterceptorHandler]>,
}

impl Router {
    /// Create a new, empty `Router` with no procedures and no interceptors.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `handler` for the procedure described by `spec`.
    ///
    /// Returns the shared descriptor, to be used when building requests for
    /// this procedure.
    pub fn unary(
        &mut self,
        spec: MethodDescriptor,
        handler: impl IntoHandler,
    ) -> Arc<MethodDescriptor> {
        let spec = Arc::new(spec);
        let handler: UnaryHandler = Arc::new(move |req| handler.call(req));
        self.routes
            .retain(|route| route.spec.procedure() != spec.procedure());
        self.routes.push(Route {
            spec: Arc::clone(&spec),
            handler,
        });
        spec
    }

    /// Append an interceptor to the stack. Interceptors run in the order they
    /// were added, before the handler.
    pub fn intercept(&mut self, interceptor: InterceptorHandler) {
        let mut stack = self.interceptors.to_vec();
        stack.push(interceptor);
        self.interceptors = stack.into();
    }

    /// Return the descriptor registered for `procedure`, if any.
    pub fn descriptor(&self, procedure: &str) -> Option<Arc<MethodDescriptor>> {
        self.route(procedure).map(|route| Arc::clone(&route.spec))
    }

    /// Return the number of registered procedures.
    pub fn len(&self) -> usize {
        self.routes.len()
    }

    /// Return `true` if no procedures have been registered.
    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    fn route(&self, procedure: &str) -> Option<&Route> {
        self.routes
            .iter()
            .find(|route| route.spec.procedure() == procedure)
    }

    /// Dispatch `req` through the interceptor stack to its procedure's handler.
    ///
    /// The request is matched by procedure path and then carries the
    /// descriptor registered for that path, whatever descriptor the caller
    /// attached.
    ///
    /// # Errors
    ///
    /// - [`Code::Unimplemented`] if no procedure is registered for the request's path.
    /// - [`Code::InvalidArgument`] if the request message is not of the
    ///   procedure's input type.
    /// - Whatever the interceptors or the handler return.
    pub async fn call(&self, req: Request) -> CallResult {
        let Some(route) = self.route(req.procedure()) else {
            return Err(RpcError::new(
                Code::Unimplemented,
                format!("no procedure registered for {}", req.procedure()),
            ));
        };

        if req.message().schema() != route.spec.input() {
            return Err(RpcError::new(
                Code::InvalidArgument,
                format!(
                    "{} expects {}, got {}",
                    route.spec.procedure(),
                    route.spec.input().name(),
                    req.message().schema().name()
                ),
            ));
        }

        // Interceptors see the registered descriptor, never the caller's copy.
        let req = req.with_spec(Arc::clone(&route.spec));
        Next::new(Arc::clone(&self.interceptors), Arc::clone(&route.handler))
            .run(req)
            .await
    }
}
