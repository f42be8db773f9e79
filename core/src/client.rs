//! The request dispatcher: signing, cache orchestration and validation.

use std::fmt::{Debug, Formatter};
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};

use log::debug;
use serde_json::Value;

use crate::cache::{CacheGateway, CacheTags};
use crate::constants::{APIKEY_FIELD, DEFAULT_CACHE_TTL, SESSION_FIELD};
use crate::profile::Profiler;
use crate::request::{build_request, Method, Params};
use crate::utils::{is_truthy, Redact};
use crate::{sign, time, Config, Context, Credential, Error, Result};

/// Per-call options for [`Client::call`].
#[derive(Debug, Clone, Default)]
pub struct CallOptions {
    /// Merge the client's session key into the params.
    pub add_session_key: bool,
    /// Cache tagging for the call; `CacheTags::Disabled` opts out of caching.
    pub cache: CacheTags,
    /// Tags to invalidate before the call runs.
    pub invalidate_tags: Vec<String>,
    /// Skip the cache lookup for this one call without disabling the store.
    pub force_refresh: bool,
}

impl CallOptions {
    /// Create default options: cache without tags, no invalidation, no
    /// session key.
    pub fn new() -> Self {
        Self::default()
    }

    /// Merge the session key into the params, when one is set.
    pub fn with_session_key(mut self) -> Self {
        self.add_session_key = true;
        self
    }

    /// Set cache tagging for the call.
    pub fn with_cache(mut self, cache: CacheTags) -> Self {
        self.cache = cache;
        self
    }

    /// Invalidate the given tags before the call runs.
    pub fn with_invalidate_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.invalidate_tags = tags.into_iter().map(Into::into).collect();
        self
    }

    /// Bypass the cache lookup for this call. The fresh response still
    /// overwrites the cached entry.
    pub fn with_force_refresh(mut self) -> Self {
        self.force_refresh = true;
        self
    }
}

/// Client for the crowdmap API.
///
/// Each [`call`] signs the request, consults the tagged response cache for
/// read methods, exchanges the request over the context's transport,
/// validates the payload and populates the cache. One profiling record is
/// emitted per call.
///
/// [`call`]: Client::call
pub struct Client {
    ctx: Context,
    credential: Credential,
    cache: CacheGateway,
    profiler: Arc<Profiler>,
    session_key: RwLock<Option<String>>,
}

impl Client {
    /// Create a client from a context and config.
    ///
    /// Fails with a config error when the credential is missing or empty.
    ///
    /// The client starts with its own [`Profiler`]; when the process runs
    /// several clients, construct one accumulator and share it via
    /// [`with_profiler`], otherwise counters split per client.
    ///
    /// [`with_profiler`]: Client::with_profiler
    pub fn new(ctx: Context, config: Config) -> Result<Self> {
        let credential = Credential::new(
            config.public_key.unwrap_or_default(),
            config.private_key.unwrap_or_default(),
        );
        if !credential.is_valid() {
            return Err(Error::config_invalid(
                "public_key and private_key are required",
            ));
        }

        let ttl = config
            .cache_ttl
            .unwrap_or(Duration::from_secs(DEFAULT_CACHE_TTL));

        Ok(Self {
            ctx: ctx.clone(),
            credential,
            cache: CacheGateway::new(ctx, ttl),
            profiler: Arc::new(Profiler::new()),
            session_key: RwLock::new(config.session_key),
        })
    }

    /// Replace the profiler, sharing one accumulator across clients.
    pub fn with_profiler(mut self, profiler: Arc<Profiler>) -> Self {
        self.profiler = profiler;
        self
    }

    /// The profiler receiving this client's records.
    pub fn profiler(&self) -> &Profiler {
        &self.profiler
    }

    /// Set the session key merged into opted-in calls.
    ///
    /// Intended to be set once after login; concurrent calls read it behind
    /// a read-mostly lock.
    pub fn set_session_key(&self, session_key: impl Into<String>) {
        *self.session_key.write().expect("lock poisoned") = Some(session_key.into());
    }

    /// Delete every cached entry associated with tag, outside of any call.
    pub async fn invalidate_tag(&self, tag: &str) -> bool {
        self.cache.invalidate_tag(tag).await
    }

    /// Execute one API call.
    ///
    /// The call resolves fully before returning: tag invalidation, cache
    /// lookup (read methods only, unless bypassed), then on miss a signed
    /// transport exchange, validation and cache population.
    pub async fn call(
        &self,
        method: Method,
        resource: &str,
        mut params: Params,
        opts: CallOptions,
    ) -> Result<Value> {
        debug!("API - CALL {method} {resource} {params:?}");

        // Invalidation runs first and never blocks the call.
        for tag in &opts.invalidate_tags {
            self.cache.invalidate_tag(tag).await;
        }

        if opts.add_session_key {
            let session = self.session_key.read().expect("lock poisoned").clone();
            if let Some(session) = session {
                params.insert(SESSION_FIELD, session);
            }
        }

        let cacheable = method.is_cacheable() && !opts.cache.is_disabled();

        if cacheable && !opts.force_refresh {
            if let Some(value) = self.cache.lookup(method, resource, &params).await {
                debug!("API - CALL - CACHED RESPONSE {method} {resource}");
                self.profiler.record(method, resource, true, None);
                return Ok(value);
            }
        }

        // Timestamp and signature are captured fresh for every attempt.
        let timestamp = time::unix_seconds(time::now());
        params.insert(
            APIKEY_FIELD,
            sign::signature(&self.credential, method, resource, timestamp),
        );

        // Files must not be serialized into query or body params.
        let files = params.take_files();

        let req = build_request(method, resource, &params, &files)?;
        let url = req.uri().to_string();
        debug!("API - REQUEST - {method} {url}");

        let start = Instant::now();
        let resp = self.ctx.http_send(req).await.map_err(|err| {
            Error::transport(format!("request failed: {method} {url}")).with_source(err)
        })?;
        let elapsed_ms = start.elapsed().as_millis() as u64;

        let body = resp.into_body();
        let value = decode_response(&body)?;
        debug!("API - RESPONSE - {method} {url} - RETURN {} bytes", body.len());

        self.profiler.record(method, resource, false, Some(elapsed_ms));

        if cacheable {
            if let CacheTags::Tags(tags) = &opts.cache {
                // The apikey in params is dropped by key derivation, so this
                // key matches the one the lookup used.
                self.cache.store(method, resource, &params, &value, tags).await;
            }
        }

        Ok(value)
    }
}

impl Debug for Client {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let session = self.session_key.read().expect("lock poisoned");
        f.debug_struct("Client")
            .field("ctx", &self.ctx)
            .field("credential", &self.credential)
            .field("cache", &self.cache)
            .field("session_key", &session.as_ref().map(Redact::from))
            .finish()
    }
}

/// Validate the raw transport payload and decode it.
///
/// - Empty raw payload: the transport produced no response.
/// - Unparseable or empty decoded payload: decode error. The API never
///   answers a bare null/false/zero on success, so those decode as errors
///   too, matching the reference behavior.
/// - Decoded object with a truthy `error` field: application error, carrying
///   the server message when present.
fn decode_response(body: &[u8]) -> Result<Value> {
    if body.is_empty() {
        return Err(Error::transport("empty response from server"));
    }

    let value: Value = serde_json::from_slice(body)
        .map_err(|err| Error::decode("response is not valid json").with_source(err))?;
    if !is_truthy(&value) {
        return Err(Error::decode("response decoded to an empty payload"));
    }

    if let Some(error) = value.get("error").filter(|e| is_truthy(e)) {
        let message = value
            .get("message")
            .and_then(Value::as_str)
            .filter(|m| !m.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| match error {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            });
        return Err(Error::api(message));
    }

    Ok(value)
}
