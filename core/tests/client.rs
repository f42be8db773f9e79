//! End-to-end dispatcher tests over a mock transport and an in-memory
//! tagged cache store.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use crowdmap_core::{
    CacheStore, CacheTags, CallOptions, Client, Config, Context, ErrorKind, HttpSend, Method,
    Params, Result,
};
use pretty_assertions::assert_eq;
use serde_json::json;

/// Transport double: records every request, answers from a one-off queue
/// first, then with the default body.
#[derive(Debug, Clone)]
struct MockHttp {
    inner: Arc<Mutex<MockHttpInner>>,
}

#[derive(Debug)]
struct MockHttpInner {
    default_body: Bytes,
    queued: VecDeque<Bytes>,
    requests: Vec<(http::Method, String, Bytes)>,
}

impl MockHttp {
    fn new(default_body: serde_json::Value) -> Self {
        Self {
            inner: Arc::new(Mutex::new(MockHttpInner {
                default_body: Bytes::from(default_body.to_string()),
                queued: VecDeque::new(),
                requests: Vec::new(),
            })),
        }
    }

    fn push_response(&self, body: serde_json::Value) {
        self.inner
            .lock()
            .unwrap()
            .queued
            .push_back(Bytes::from(body.to_string()));
    }

    fn hits(&self) -> usize {
        self.inner.lock().unwrap().requests.len()
    }

    fn last_request(&self) -> (http::Method, String, Bytes) {
        self.inner.lock().unwrap().requests.last().unwrap().clone()
    }
}

#[async_trait]
impl HttpSend for MockHttp {
    async fn http_send(&self, req: http::Request<Bytes>) -> Result<http::Response<Bytes>> {
        let mut inner = self.inner.lock().unwrap();
        let (parts, body) = req.into_parts();
        inner
            .requests
            .push((parts.method, parts.uri.to_string(), body));

        let body = inner
            .queued
            .pop_front()
            .unwrap_or_else(|| inner.default_body.clone());
        Ok(http::Response::builder().status(200).body(body).unwrap())
    }
}

/// In-memory tagged key-value store.
#[derive(Debug, Clone, Default)]
struct MemoryStore {
    entries: Arc<Mutex<HashMap<String, (Bytes, HashSet<String>)>>>,
}

impl MemoryStore {
    fn keys(&self) -> Vec<String> {
        self.entries.lock().unwrap().keys().cloned().collect()
    }
}

#[async_trait]
impl CacheStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<Bytes>> {
        Ok(self
            .entries
            .lock()
            .unwrap()
            .get(key)
            .map(|(value, _)| value.clone()))
    }

    async fn set_with_tags(
        &self,
        key: &str,
        value: Bytes,
        _ttl: Duration,
        tags: &[String],
    ) -> Result<bool> {
        self.entries
            .lock()
            .unwrap()
            .insert(key.to_string(), (value, tags.iter().cloned().collect()));
        Ok(true)
    }

    async fn delete_tag(&self, tag: &str) -> Result<bool> {
        self.entries
            .lock()
            .unwrap()
            .retain(|_, (_, tags)| !tags.contains(tag));
        Ok(true)
    }
}

/// Store double whose every operation fails, standing in for an unreachable
/// backend.
#[derive(Debug, Clone, Copy)]
struct FailingStore;

#[async_trait]
impl CacheStore for FailingStore {
    async fn get(&self, _key: &str) -> Result<Option<Bytes>> {
        Err(crowdmap_core::Error::unexpected("backend unreachable"))
    }

    async fn set_with_tags(
        &self,
        _key: &str,
        _value: Bytes,
        _ttl: Duration,
        _tags: &[String],
    ) -> Result<bool> {
        Err(crowdmap_core::Error::unexpected("backend unreachable"))
    }

    async fn delete_tag(&self, _tag: &str) -> Result<bool> {
        Err(crowdmap_core::Error::unexpected("backend unreachable"))
    }
}

fn client(http: MockHttp, store: MemoryStore) -> Client {
    let _ = env_logger::builder().is_test(true).try_init();

    let ctx = Context::new().with_http_send(http).with_cache_store(store);
    Client::new(
        ctx,
        Config::new()
            .with_public_key("pubkey")
            .with_private_key("privkey"),
    )
    .unwrap()
}

fn maps_call() -> (Method, &'static str, Params, CallOptions) {
    (
        Method::Get,
        "/maps",
        Params::new().with("bbox", "1,2,3,4"),
        CallOptions::new().with_cache(CacheTags::tags(["maps"])),
    )
}

#[tokio::test]
async fn test_get_hits_transport_once_then_cache() {
    let http = MockHttp::new(json!({"payload": {"maps": [1, 2]}}));
    let c = client(http.clone(), MemoryStore::default());
    let (method, resource, params, opts) = maps_call();

    let first = c
        .call(method, resource, params.clone(), opts.clone())
        .await
        .unwrap();
    assert_eq!(http.hits(), 1);
    assert_eq!(c.profiler().live_count(), 1);
    assert_eq!(c.profiler().cached_count(), 0);

    let second = c.call(method, resource, params, opts).await.unwrap();
    assert_eq!(second, first);
    assert_eq!(http.hits(), 1, "second call must be served from cache");
    assert_eq!(c.profiler().live_count(), 1);
    assert_eq!(c.profiler().cached_count(), 1);
}

#[tokio::test]
async fn test_invalidating_tag_causes_refetch() {
    let http = MockHttp::new(json!({"payload": "v1"}));
    let c = client(http.clone(), MemoryStore::default());
    let (method, resource, params, opts) = maps_call();

    c.call(method, resource, params.clone(), opts.clone())
        .await
        .unwrap();
    c.call(method, resource, params.clone(), opts.clone())
        .await
        .unwrap();
    assert_eq!(http.hits(), 1);

    assert!(c.invalidate_tag("maps").await);
    c.call(method, resource, params, opts).await.unwrap();
    assert_eq!(http.hits(), 2, "invalidation must force a live call");
}

#[tokio::test]
async fn test_invalidate_tags_option_runs_before_lookup() {
    let http = MockHttp::new(json!({"payload": "v1"}));
    let c = client(http.clone(), MemoryStore::default());
    let (method, resource, params, opts) = maps_call();

    c.call(method, resource, params.clone(), opts.clone())
        .await
        .unwrap();

    http.push_response(json!({"payload": "v2"}));
    let refreshed = c
        .call(
            method,
            resource,
            params,
            opts.with_invalidate_tags(["maps"]),
        )
        .await
        .unwrap();
    assert_eq!(http.hits(), 2);
    assert_eq!(refreshed, json!({"payload": "v2"}));
}

#[tokio::test]
async fn test_write_methods_never_touch_cache() {
    let http = MockHttp::new(json!({"payload": "ok"}));
    let store = MemoryStore::default();
    let c = client(http.clone(), store.clone());

    let opts = CallOptions::new().with_cache(CacheTags::tags(["posts"]));
    for _ in 0..2 {
        c.call(Method::Post, "/posts", Params::new().with("title", "t"), opts.clone())
            .await
            .unwrap();
    }

    assert_eq!(http.hits(), 2, "writes are never served from cache");
    assert!(store.keys().is_empty(), "writes must not populate the cache");
}

#[tokio::test]
async fn test_force_refresh_bypasses_lookup_and_overwrites() {
    let http = MockHttp::new(json!({"payload": "stale"}));
    let c = client(http.clone(), MemoryStore::default());
    let (method, resource, params, opts) = maps_call();

    c.call(method, resource, params.clone(), opts.clone())
        .await
        .unwrap();
    assert_eq!(http.hits(), 1);

    http.push_response(json!({"payload": "fresh"}));
    let refreshed = c
        .call(
            method,
            resource,
            params.clone(),
            opts.clone().with_force_refresh(),
        )
        .await
        .unwrap();
    assert_eq!(http.hits(), 2, "force refresh must hit the transport");
    assert_eq!(refreshed, json!({"payload": "fresh"}));

    // The fresh result overwrote the entry; a plain call now serves it.
    let cached = c.call(method, resource, params, opts).await.unwrap();
    assert_eq!(http.hits(), 2);
    assert_eq!(cached, json!({"payload": "fresh"}));
}

#[tokio::test]
async fn test_disabled_cache_sentinel_skips_read_and_write() {
    let http = MockHttp::new(json!({"payload": "ok"}));
    let store = MemoryStore::default();
    let c = client(http.clone(), store.clone());

    let opts = CallOptions::new().with_cache(CacheTags::Disabled);
    for _ in 0..2 {
        c.call(Method::Get, "/maps", Params::new(), opts.clone())
            .await
            .unwrap();
    }

    assert_eq!(http.hits(), 2);
    assert!(store.keys().is_empty());
}

#[tokio::test]
async fn test_empty_tag_list_still_caches() {
    let http = MockHttp::new(json!({"payload": "ok"}));
    let c = client(http.clone(), MemoryStore::default());

    for _ in 0..2 {
        c.call(Method::Get, "/maps", Params::new(), CallOptions::new())
            .await
            .unwrap();
    }

    assert_eq!(http.hits(), 1);
    assert_eq!(c.profiler().cached_count(), 1);
}

#[tokio::test]
async fn test_failing_store_never_fails_the_call() {
    let http = MockHttp::new(json!({"payload": "ok"}));
    let ctx = Context::new()
        .with_http_send(http.clone())
        .with_cache_store(FailingStore);
    let c = Client::new(
        ctx,
        Config::new()
            .with_public_key("pubkey")
            .with_private_key("privkey"),
    )
    .unwrap();

    // Lookup, store and invalidation all fail; the call still resolves live.
    let (method, resource, params, opts) = maps_call();
    let value = c
        .call(
            method,
            resource,
            params.clone(),
            opts.clone().with_invalidate_tags(["maps"]),
        )
        .await
        .unwrap();
    assert_eq!(value, json!({"payload": "ok"}));
    assert_eq!(http.hits(), 1);
    assert_eq!(c.profiler().live_count(), 1);

    // Every call goes live since nothing can be cached.
    c.call(method, resource, params, opts).await.unwrap();
    assert_eq!(http.hits(), 2);

    // Standalone invalidation reports failure instead of erroring.
    assert!(!c.invalidate_tag("maps").await);
}

#[tokio::test]
async fn test_api_error_carries_server_message() {
    let http = MockHttp::new(json!({"error": true, "message": "bad key"}));
    let c = client(http, MemoryStore::default());

    let err = c
        .call(Method::Get, "/maps", Params::new(), CallOptions::new())
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Api);
    assert_eq!(err.to_string(), "bad key");
}

#[tokio::test]
async fn test_no_transport_configured_is_transport_error() {
    let ctx = Context::new().with_cache_store(MemoryStore::default());
    let c = Client::new(
        ctx,
        Config::new()
            .with_public_key("pubkey")
            .with_private_key("privkey"),
    )
    .unwrap();

    let err = c
        .call(Method::Get, "/maps", Params::new(), CallOptions::new())
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Transport);
}

#[tokio::test]
async fn test_profiler_shared_across_clients() {
    let profiler = Arc::new(crowdmap_core::Profiler::new());
    let config = Config::new()
        .with_public_key("pubkey")
        .with_private_key("privkey");

    let mut clients = Vec::new();
    for _ in 0..2 {
        let http = MockHttp::new(json!({"payload": "ok"}));
        let ctx = Context::new().with_http_send(http);
        clients.push(
            Client::new(ctx, config.clone())
                .unwrap()
                .with_profiler(profiler.clone()),
        );
    }

    for c in &clients {
        c.call(Method::Get, "/maps", Params::new(), CallOptions::new())
            .await
            .unwrap();
    }

    assert_eq!(profiler.live_count(), 2);
    assert_eq!(profiler.summary(), "crowdmap (2 live, 0 cached)");
}

#[tokio::test]
async fn test_request_is_signed_and_session_key_merged() {
    let http = MockHttp::new(json!({"payload": "ok"}));
    let c = client(http.clone(), MemoryStore::default());
    c.set_session_key("sess-123");

    c.call(
        Method::Get,
        "/maps",
        Params::new().with("bbox", "1,2,3,4"),
        CallOptions::new().with_session_key(),
    )
    .await
    .unwrap();

    let (method, url, _) = http.last_request();
    assert_eq!(method, http::Method::GET);
    assert!(url.starts_with("https://api.crowdmap.com/v1/maps?"));
    assert!(url.contains("apikey=Apubkey"));
    assert!(url.contains("session=sess-123"));
}

#[tokio::test]
async fn test_cache_keys_exclude_signature() {
    let http = MockHttp::new(json!({"payload": "ok"}));
    let store = MemoryStore::default();
    let c = client(http, store.clone());

    c.call(Method::Get, "/maps", Params::new(), CallOptions::new())
        .await
        .unwrap();

    let keys = store.keys();
    assert_eq!(keys, vec!["GET-/maps-".to_string()]);
}

#[tokio::test]
async fn test_error_responses_are_not_cached() {
    let http = MockHttp::new(json!({"payload": "ok"}));
    let store = MemoryStore::default();
    let c = client(http.clone(), store.clone());

    http.push_response(json!({"error": true, "message": "down"}));
    let err = c
        .call(Method::Get, "/maps", Params::new(), CallOptions::new())
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Api);
    assert!(store.keys().is_empty());

    // The next call goes live again and caches the good payload.
    let value = c
        .call(Method::Get, "/maps", Params::new(), CallOptions::new())
        .await
        .unwrap();
    assert_eq!(value, json!({"payload": "ok"}));
    assert_eq!(http.hits(), 2);
    assert_eq!(store.keys().len(), 1);
}

#[tokio::test]
async fn test_post_sends_form_body_with_signature() {
    let http = MockHttp::new(json!({"payload": "ok"}));
    let c = client(http.clone(), MemoryStore::default());

    c.call(
        Method::Post,
        "/posts",
        Params::new().with("title", "hello"),
        CallOptions::new(),
    )
    .await
    .unwrap();

    let (method, url, body) = http.last_request();
    assert_eq!(method, http::Method::POST);
    assert_eq!(url, "https://api.crowdmap.com/v1/posts");
    let body = String::from_utf8(body.to_vec()).unwrap();
    assert!(body.contains("apikey=Apubkey"));
    assert!(body.contains("title=hello"));
}
