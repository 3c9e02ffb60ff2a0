//! Greeter demo — a side-effect-free procedure served through the read-through cache.
//!
//! Run with:
//!
//! ```sh
//! RUST_LOG=debug cargo run --example greeter
//! ```
//!
//! The first call reaches the handler and populates the cache; the second is
//! answered from the store and carries `X-Cache: HIT`. A third call sends
//! `Cache-Control: no-cache` and goes back to the handler.

use std::sync::Arc;

use readthrough::cache::{CacheConfig, MemoryStore, ReadThroughCache};
use readthrough::interceptor::{LoggerInterceptor, from_interceptor};
use readthrough::router::Router;
use readthrough::rpc::{
    Code, DynamicMessage, FieldKind, IdempotencyLevel, MessageSchema, MethodDescriptor, Request,
    Response, RpcError,
};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), RpcError> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // Picks up READTHROUGH_TTL_SECS and friends; falls back to defaults.
    let config = CacheConfig::load().unwrap_or_else(|e| {
        tracing::warn!(error = %e, "invalid cache configuration, using defaults");
        CacheConfig::default()
    });
    let cache = ReadThroughCache::new(Arc::new(MemoryStore::new())).with_config(config);

    let mut router = Router::new();
    router.intercept(from_interceptor(Arc::new(LoggerInterceptor)));
    for interceptor in cache.interceptors() {
        router.intercept(interceptor);
    }

    let input = Arc::new(MessageSchema::new("svc.HelloRequest").field("name", FieldKind::String));
    let output = Arc::new(MessageSchema::new("svc.HelloReply").field("msg", FieldKind::String));

    let hello = router.unary(
        MethodDescriptor::new("/svc.Greeter/Hello", input.clone(), output)
            .idempotency(IdempotencyLevel::NoSideEffects),
        |req: Request| async move {
            let name = req
                .message()
                .get("name")
                .and_then(|v| v.as_str())
                .unwrap_or("stranger")
                .to_owned();
            tracing::info!(%name, "handler invoked");
            let reply = DynamicMessage::new(Arc::clone(req.spec().output()))
                .with("msg", format!("hello, {name}"))
                .map_err(|e| RpcError::from_source(Code::Internal, e))?;
            Ok::<_, RpcError>(Response::new(reply))
        },
    );

    let message = DynamicMessage::new(input)
        .with("name", "world")
        .map_err(|e| RpcError::from_source(Code::InvalidArgument, e))?;

    for (label, req) in [
        ("first", Request::new(hello.clone(), message.clone())),
        ("second", Request::new(hello.clone(), message.clone())),
        (
            "no-cache",
            Request::new(hello.clone(), message).header("Cache-Control", "no-cache"),
        ),
    ] {
        let resp = router.call(req).await?;
        println!(
            "{label:>8}: {} (X-Cache: {}, X-Cache-Key: {})",
            resp.message().get("msg").and_then(|v| v.as_str()).unwrap_or_default(),
            resp.headers().get("X-Cache").unwrap_or("-"),
            resp.headers().get("X-Cache-Key").unwrap_or("-"),
        );
    }

    Ok(())
}
