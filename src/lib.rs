//! # readthrough
//!
//! A read-through response cache for unary RPC interceptor chains.
//!
//! Calls to methods declared side-effect free are answered from a shared
//! key-value store when a fresh entry exists; otherwise the handler runs and
//! its response is written back with a fixed time-to-live.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use readthrough::cache::{MemoryStore, ReadThroughCache};
//! use readthrough::router::Router;
//! use readthrough::rpc::{
//!     DynamicMessage, FieldKind, IdempotencyLevel, MessageSchema, MethodDescriptor, Request,
//!     Response, RpcError,
//! };
//!
//! #[tokio::main]
//! async fn main() -> Result<(), RpcError> {
//!     let input = Arc::new(MessageSchema::new("svc.HelloRequest"));
//!     let output = Arc::new(MessageSchema::new("svc.HelloReply").field("msg", FieldKind::String));
//!
//!     let cache = ReadThroughCache::new(Arc::new(MemoryStore::new()));
//!     let mut router = Router::new();
//!     for interceptor in cache.interceptors() {
//!         router.intercept(interceptor);
//!     }
//!
//!     let reply = DynamicMessage::new(output.clone()).with("msg", "hi").unwrap();
//!     let hello = router.unary(
//!         MethodDescriptor::new("/svc.Greeter/Hello", input.clone(), output)
//!             .idempotency(IdempotencyLevel::NoSideEffects),
//!         move |_req: Request| {
//!             let reply = reply.clone();
//!             async move { Ok::<_, RpcError>(Response::new(reply)) }
//!         },
//!     );
//!
//!     let first = router.call(Request::new(hello.clone(), DynamicMessage::new(input.clone()))).await?;
//!     let second = router.call(Request::new(hello, DynamicMessage::new(input))).await?;
//!     assert_eq!(first.message(), second.message());
//!     assert_eq!(second.headers().get("X-Cache"), Some("HIT"));
//!     Ok(())
//! }
//! ```

pub mod cache;
pub mod interceptor;
pub mod router;
pub mod rpc;

// ── Convenience re-exports ────────────────────────────────────────────────────
pub use cache::{CacheConfig, CacheStore, MemoryStore, ReadThroughCache};
pub use interceptor::{Interceptor, Next};
pub use router::Router;
pub use rpc::{Code, Request, Response, RpcError};
