use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;

use readthrough::cache::{
    CacheConfig, CacheError, CacheStore, KeyStrategy, MemoryStore, ReadThroughCache, StoreError,
    derive_key,
};
use readthrough::interceptor::{LoggerInterceptor, from_interceptor};
use readthrough::router::Router;
use readthrough::rpc::{
    Code, DynamicMessage, FieldKind, IdempotencyLevel, MessageSchema, MethodDescriptor, Request,
    Response, RpcError,
};

const HELLO: &str = "/svc.Greeter/Hello";
const HELLO_KEY: &str = "cache:svc.Greeter/Hello";

/// Memory store that counts every round-trip and can refuse reads.
#[derive(Default)]
struct CountingStore {
    inner: MemoryStore,
    gets: AtomicUsize,
    sets: AtomicUsize,
    fail_gets: bool,
}

impl CountingStore {
    fn gets(&self) -> usize {
        self.gets.load(Ordering::SeqCst)
    }

    fn sets(&self) -> usize {
        self.sets.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CacheStore for CountingStore {
    async fn get(&self, key: &str) -> Result<Option<Bytes>, StoreError> {
        self.gets.fetch_add(1, Ordering::SeqCst);
        if self.fail_gets {
            return Err(StoreError::Unavailable("connection reset by peer".into()));
        }
        self.inner.get(key).await
    }

    async fn set(&self, key: &str, value: Bytes, ttl: Duration) -> Result<(), StoreError> {
        self.sets.fetch_add(1, Ordering::SeqCst);
        self.inner.set(key, value, ttl).await
    }
}

struct Greeter {
    router: Router,
    hello: Arc<MethodDescriptor>,
    store: Arc<CountingStore>,
    handler_calls: Arc<AtomicUsize>,
}

impl Greeter {
    fn request(&self) -> Request {
        self.request_for("world")
    }

    fn request_for(&self, name: &str) -> Request {
        let msg = DynamicMessage::new(Arc::clone(self.hello.input()))
            .with("name", name)
            .unwrap();
        Request::new(Arc::clone(&self.hello), msg)
    }

    fn handler_calls(&self) -> usize {
        self.handler_calls.load(Ordering::SeqCst)
    }
}

fn reply_schema() -> Arc<MessageSchema> {
    Arc::new(MessageSchema::new("svc.HelloReply").field("msg", FieldKind::String))
}

fn reply(msg: &str) -> DynamicMessage {
    DynamicMessage::new(reply_schema()).with("msg", msg).unwrap()
}

// Builds a router whose Hello handler answers "hi" for "world" and
// "hi <name>" otherwise, with the cache installed in front of it.
fn greeter(level: IdempotencyLevel, store: CountingStore, config: CacheConfig) -> Greeter {
    let store = Arc::new(store);
    let cache = ReadThroughCache::new(store.clone()).with_config(config);

    let mut router = Router::new();
    router.intercept(from_interceptor(Arc::new(LoggerInterceptor)));
    for interceptor in cache.interceptors() {
        router.intercept(interceptor);
    }

    let input = Arc::new(MessageSchema::new("svc.HelloRequest").field("name", FieldKind::String));
    let handler_calls = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&handler_calls);
    let hello = router.unary(
        MethodDescriptor::new(HELLO, input, reply_schema()).idempotency(level),
        move |req: Request| {
            counter.fetch_add(1, Ordering::SeqCst);
            let name = req
                .message()
                .get("name")
                .and_then(|v| v.as_str())
                .unwrap_or("world")
                .to_owned();
            async move {
                let msg = if name == "world" {
                    "hi".to_owned()
                } else {
                    format!("hi {name}")
                };
                Ok::<_, RpcError>(Response::new(reply(&msg)))
            }
        },
    );

    Greeter {
        router,
        hello,
        store,
        handler_calls,
    }
}

#[tokio::test]
async fn no_side_effects_call_is_cached_then_served() {
    let svc = greeter(
        IdempotencyLevel::NoSideEffects,
        CountingStore::default(),
        CacheConfig::default(),
    );

    let first = svc.router.call(svc.request()).await.unwrap();
    assert_eq!(first.message(), &reply("hi"));
    assert!(first.headers().is_empty());
    assert_eq!(svc.handler_calls(), 1);
    assert_eq!(svc.store.sets(), 1);
    assert_eq!(
        svc.store.inner.get(HELLO_KEY).await.unwrap(),
        Some(Bytes::from_static(br#"{"msg":"hi"}"#))
    );

    let second = svc.router.call(svc.request()).await.unwrap();
    assert_eq!(second.message(), &reply("hi"));
    assert_eq!(second.headers().get("X-Cache"), Some("HIT"));
    assert_eq!(second.headers().get("X-Cache-Key"), Some(HELLO_KEY));
    assert_eq!(svc.handler_calls(), 1);
    // A hit is served by the inbound interceptor; nothing is rewritten.
    assert_eq!(svc.store.sets(), 1);
}

#[tokio::test]
async fn idempotent_call_never_touches_store() {
    let svc = greeter(
        IdempotencyLevel::Idempotent,
        CountingStore::default(),
        CacheConfig::default(),
    );

    for _ in 0..2 {
        let resp = svc.router.call(svc.request()).await.unwrap();
        assert_eq!(resp.message(), &reply("hi"));
        assert!(!resp.headers().contains("X-Cache"));
    }

    assert_eq!(svc.handler_calls(), 2);
    assert_eq!(svc.store.gets(), 0);
    assert_eq!(svc.store.sets(), 0);
}

#[tokio::test]
async fn unspecified_idempotency_is_not_cached() {
    let svc = greeter(
        IdempotencyLevel::Unknown,
        CountingStore::default(),
        CacheConfig::default(),
    );

    svc.router.call(svc.request()).await.unwrap();
    svc.router.call(svc.request()).await.unwrap();

    assert_eq!(svc.handler_calls(), 2);
    assert_eq!(svc.store.gets() + svc.store.sets(), 0);
}

#[tokio::test]
async fn bypass_header_always_reaches_handler() {
    let svc = greeter(
        IdempotencyLevel::NoSideEffects,
        CountingStore::default(),
        CacheConfig::default(),
    );
    svc.store
        .inner
        .set(HELLO_KEY, Bytes::from_static(br#"{"msg":"stale"}"#), Duration::from_secs(60))
        .await
        .unwrap();

    let resp = svc
        .router
        .call(svc.request().header("Cache-Control", "no-cache"))
        .await
        .unwrap();

    assert_eq!(resp.message(), &reply("hi"));
    assert_eq!(svc.handler_calls(), 1);
    assert_eq!(svc.store.gets(), 0);
    assert_eq!(svc.store.sets(), 0);
}

#[tokio::test]
async fn corrupted_entry_surfaces_decode_error() {
    let svc = greeter(
        IdempotencyLevel::NoSideEffects,
        CountingStore::default(),
        CacheConfig::default(),
    );
    svc.store
        .inner
        .set(HELLO_KEY, Bytes::from_static(b"\x0a\x02hi"), Duration::from_secs(60))
        .await
        .unwrap();

    let err = svc.router.call(svc.request()).await.unwrap_err();

    assert_eq!(err.code(), Code::DataLoss);
    assert!(matches!(
        err.source_as::<CacheError>(),
        Some(CacheError::Decode { key, .. }) if key == HELLO_KEY
    ));
    assert_eq!(svc.handler_calls(), 0);
}

#[tokio::test]
async fn store_read_errors_are_invisible_to_callers() {
    let store = CountingStore {
        fail_gets: true,
        ..CountingStore::default()
    };
    let svc = greeter(IdempotencyLevel::NoSideEffects, store, CacheConfig::default());

    for _ in 0..3 {
        let resp = svc.router.call(svc.request()).await.unwrap();
        assert_eq!(resp.message(), &reply("hi"));
    }

    assert_eq!(svc.handler_calls(), 3);
    assert_eq!(svc.store.gets(), 3);
}

#[tokio::test(start_paused = true)]
async fn entry_is_served_until_ttl_elapses() {
    let ttl = Duration::from_secs(5);
    let svc = greeter(
        IdempotencyLevel::NoSideEffects,
        CountingStore::default(),
        CacheConfig::default().with_ttl(ttl),
    );

    svc.router.call(svc.request()).await.unwrap();

    tokio::time::advance(ttl - Duration::from_millis(1)).await;
    let hit = svc.router.call(svc.request()).await.unwrap();
    assert_eq!(hit.headers().get("X-Cache"), Some("HIT"));
    assert_eq!(hit.message(), &reply("hi"));
    assert_eq!(svc.handler_calls(), 1);

    tokio::time::advance(Duration::from_millis(1)).await;
    let miss = svc.router.call(svc.request()).await.unwrap();
    assert!(!miss.headers().contains("X-Cache"));
    assert_eq!(svc.handler_calls(), 2);
}

#[tokio::test]
async fn procedure_keys_share_one_slot_across_payloads() {
    let svc = greeter(
        IdempotencyLevel::NoSideEffects,
        CountingStore::default(),
        CacheConfig::default(),
    );

    svc.router.call(svc.request_for("ada")).await.unwrap();
    let other = svc.router.call(svc.request_for("grace")).await.unwrap();

    // The default key ignores the payload, so Grace is answered with Ada's reply.
    assert_eq!(other.message(), &reply("hi ada"));
    assert_eq!(other.headers().get("X-Cache-Key"), Some(HELLO_KEY));
    assert_eq!(svc.handler_calls(), 1);
}

#[tokio::test]
async fn payload_keys_separate_requests() {
    let svc = greeter(
        IdempotencyLevel::NoSideEffects,
        CountingStore::default(),
        CacheConfig::default().with_key_strategy(KeyStrategy::ProcedureAndPayload),
    );

    let ada = svc.router.call(svc.request_for("ada")).await.unwrap();
    let grace = svc.router.call(svc.request_for("grace")).await.unwrap();
    assert_eq!(ada.message(), &reply("hi ada"));
    assert_eq!(grace.message(), &reply("hi grace"));
    assert_eq!(svc.handler_calls(), 2);

    let ada_again = svc.router.call(svc.request_for("ada")).await.unwrap();
    assert_eq!(ada_again.message(), &reply("hi ada"));
    let key = ada_again.headers().get("X-Cache-Key").unwrap();
    assert!(key.starts_with(&format!("{HELLO_KEY}#")));
    assert_eq!(svc.handler_calls(), 2);
}

#[tokio::test]
async fn namespace_prefixes_keys() {
    let svc = greeter(
        IdempotencyLevel::NoSideEffects,
        CountingStore::default(),
        CacheConfig::default().with_namespace("rpc-cache"),
    );

    svc.router.call(svc.request()).await.unwrap();
    let hit = svc.router.call(svc.request()).await.unwrap();

    assert_eq!(hit.headers().get("X-Cache-Key"), Some("rpc-cache:svc.Greeter/Hello"));
    assert_eq!(svc.store.inner.get(HELLO_KEY).await.unwrap(), None);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_calls_race_safely_on_one_key() {
    let svc = Arc::new(greeter(
        IdempotencyLevel::NoSideEffects,
        CountingStore::default(),
        CacheConfig::default(),
    ));

    let mut tasks = Vec::new();
    for _ in 0..16 {
        let svc = Arc::clone(&svc);
        tasks.push(tokio::spawn(async move {
            svc.router.call(svc.request()).await
        }));
    }
    for task in tasks {
        let resp = task.await.unwrap().unwrap();
        assert_eq!(resp.message(), &reply("hi"));
    }

    assert!(svc.handler_calls() >= 1);
    assert_eq!(svc.store.sets(), svc.handler_calls());
    assert_eq!(
        svc.store.inner.get(HELLO_KEY).await.unwrap(),
        Some(Bytes::from_static(br#"{"msg":"hi"}"#))
    );
}

#[tokio::test]
async fn caller_descriptor_cannot_make_a_call_cacheable() {
    let svc = greeter(
        IdempotencyLevel::Unknown,
        CountingStore::default(),
        CacheConfig::default(),
    );
    let forged = Arc::new(
        MethodDescriptor::new(HELLO, Arc::clone(svc.hello.input()), reply_schema())
            .idempotency(IdempotencyLevel::NoSideEffects),
    );
    let msg = DynamicMessage::new(Arc::clone(svc.hello.input()))
        .with("name", "world")
        .unwrap();

    for _ in 0..2 {
        let resp = svc
            .router
            .call(Request::new(Arc::clone(&forged), msg.clone()))
            .await
            .unwrap();
        assert!(!resp.headers().contains("X-Cache"));
    }

    assert_eq!(svc.handler_calls(), 2);
    assert_eq!(svc.store.gets() + svc.store.sets(), 0);
    assert_eq!(svc.store.inner.get(HELLO_KEY).await.unwrap(), None);
}

#[test]
fn key_derivation_is_pure() {
    assert_eq!(derive_key(HELLO), derive_key(HELLO));
    assert_eq!(derive_key(HELLO), HELLO_KEY);
}
