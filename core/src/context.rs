use crate::{Error, Result};
use bytes::Bytes;
use std::collections::HashMap;
use std::fmt::Debug;
use std::sync::Arc;
use std::time::Duration;

/// Context holds the pluggable capabilities the client needs: an HTTP
/// transport, a tagged cache store and an environment accessor.
///
/// ## Important
///
/// No default implementations are provided. Any unconfigured component uses a
/// no-op implementation: the transport errors when called, the cache store
/// behaves as an always-miss cache, the environment is empty.
///
/// ## Example
///
/// ```
/// use crowdmap_core::{Context, OsEnv};
///
/// let ctx = Context::new().with_env(OsEnv);
/// ```
#[derive(Clone)]
pub struct Context {
    http: Arc<dyn HttpSend>,
    cache: Arc<dyn CacheStore>,
    env: Arc<dyn Env>,
}

impl Debug for Context {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Context")
            .field("http", &self.http)
            .field("cache", &self.cache)
            .field("env", &self.env)
            .finish()
    }
}

impl Default for Context {
    fn default() -> Self {
        Self::new()
    }
}

impl Context {
    /// Create a new Context with no-op implementations.
    pub fn new() -> Self {
        Self {
            http: Arc::new(NoopHttpSend),
            cache: Arc::new(NoopCacheStore),
            env: Arc::new(NoopEnv),
        }
    }

    /// Replace the HTTP client implementation.
    pub fn with_http_send(mut self, http: impl HttpSend) -> Self {
        self.http = Arc::new(http);
        self
    }

    /// Replace the cache store implementation.
    pub fn with_cache_store(mut self, cache: impl CacheStore) -> Self {
        self.cache = Arc::new(cache);
        self
    }

    /// Replace the environment implementation.
    pub fn with_env(mut self, env: impl Env) -> Self {
        self.env = Arc::new(env);
        self
    }

    /// Send http request and return the response.
    #[inline]
    pub async fn http_send(&self, req: http::Request<Bytes>) -> Result<http::Response<Bytes>> {
        self.http.http_send(req).await
    }

    /// Read a cached value by key.
    #[inline]
    pub async fn cache_get(&self, key: &str) -> Result<Option<Bytes>> {
        self.cache.get(key).await
    }

    /// Write a cached value under key with a lifetime and a set of tags.
    #[inline]
    pub async fn cache_set_with_tags(
        &self,
        key: &str,
        value: Bytes,
        ttl: Duration,
        tags: &[String],
    ) -> Result<bool> {
        self.cache.set_with_tags(key, value, ttl, tags).await
    }

    /// Delete every cached entry associated with tag.
    #[inline]
    pub async fn cache_delete_tag(&self, tag: &str) -> Result<bool> {
        self.cache.delete_tag(tag).await
    }

    /// Get the environment variable.
    ///
    /// - Returns `Some(v)` if the environment variable is found and is valid utf-8.
    /// - Returns `None` if the environment variable is not found or value is invalid.
    #[inline]
    pub fn env_var(&self, key: &str) -> Option<String> {
        self.env.var(key)
    }

    /// Returns a hashmap of (variable, value) pairs of strings, for all the
    /// environment variables of the current process.
    #[inline]
    pub fn env_vars(&self) -> HashMap<String, String> {
        self.env.vars()
    }
}

/// HttpSend is used to exchange one request with the remote API.
///
/// This trait is designed for the client's own calls; please don't use it as a
/// general http client.
#[async_trait::async_trait]
pub trait HttpSend: Debug + Send + Sync + 'static {
    /// Send http request and return the response.
    async fn http_send(&self, req: http::Request<Bytes>) -> Result<http::Response<Bytes>>;
}

/// CacheStore is the adapter over a tagged key-value backend (a remote store
/// such as redis, or an in-memory map in tests).
///
/// Entries carry a lifetime and a set of tags; a tag groups entries for bulk
/// deletion. The backend owns all entry storage and tag associations.
#[async_trait::async_trait]
pub trait CacheStore: Debug + Send + Sync + 'static {
    /// Read the raw value stored under key, `None` on miss.
    async fn get(&self, key: &str) -> Result<Option<Bytes>>;

    /// Store value under key with the given lifetime and tags.
    ///
    /// Returns whether the backend accepted the write.
    async fn set_with_tags(
        &self,
        key: &str,
        value: Bytes,
        ttl: Duration,
        tags: &[String],
    ) -> Result<bool>;

    /// Delete every entry associated with tag.
    ///
    /// Returns whether the backend performed the deletion. Concurrent readers
    /// may still observe a deleted value once; tag deletion is
    /// eventually-observed, not transactional.
    async fn delete_tag(&self, tag: &str) -> Result<bool>;
}

/// Env abstracts environment variable access for configuration loading.
pub trait Env: Debug + Send + Sync + 'static {
    /// Get an environment variable.
    fn var(&self, key: &str) -> Option<String>;

    /// Returns a hashmap of (variable, value) pairs of strings, for all the
    /// environment variables of the current process.
    fn vars(&self) -> HashMap<String, String>;
}

/// Implements Env over the process environment.
#[derive(Debug, Copy, Clone)]
pub struct OsEnv;

impl Env for OsEnv {
    fn var(&self, key: &str) -> Option<String> {
        std::env::var_os(key)?.into_string().ok()
    }

    fn vars(&self) -> HashMap<String, String> {
        std::env::vars().collect()
    }
}

/// StaticEnv provides a fixed environment.
///
/// This is useful for testing or for providing a fixed configuration source.
#[derive(Debug, Clone, Default)]
pub struct StaticEnv {
    /// The environment variables to use.
    pub envs: HashMap<String, String>,
}

impl Env for StaticEnv {
    fn var(&self, key: &str) -> Option<String> {
        self.envs.get(key).cloned()
    }

    fn vars(&self) -> HashMap<String, String> {
        self.envs.clone()
    }
}

/// NoopHttpSend is a no-op implementation that always returns an error.
///
/// This is used when no HTTP client is configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopHttpSend;

#[async_trait::async_trait]
impl HttpSend for NoopHttpSend {
    async fn http_send(&self, _req: http::Request<Bytes>) -> Result<http::Response<Bytes>> {
        Err(Error::transport(
            "HTTP sending not supported: no HTTP client configured",
        ))
    }
}

/// NoopCacheStore behaves as an always-miss cache that rejects writes.
///
/// This is used when no cache store is configured: caching degrades to
/// calling the API live on every request.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopCacheStore;

#[async_trait::async_trait]
impl CacheStore for NoopCacheStore {
    async fn get(&self, _key: &str) -> Result<Option<Bytes>> {
        Ok(None)
    }

    async fn set_with_tags(
        &self,
        _key: &str,
        _value: Bytes,
        _ttl: Duration,
        _tags: &[String],
    ) -> Result<bool> {
        Ok(false)
    }

    async fn delete_tag(&self, _tag: &str) -> Result<bool> {
        Ok(false)
    }
}

/// NoopEnv is a no-op implementation that always returns None/empty.
///
/// This is used when no environment is configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopEnv;

impl Env for NoopEnv {
    fn var(&self, _key: &str) -> Option<String> {
        None
    }

    fn vars(&self) -> HashMap<String, String> {
        HashMap::new()
    }
}
