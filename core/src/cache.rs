//! Response caching: key derivation, tag handling and the best-effort gateway.

use std::time::Duration;

use bytes::Bytes;
use log::debug;
use serde_json::Value;

use crate::constants::APIKEY_FIELD;
use crate::request::{Method, Params};
use crate::utils::is_truthy;
use crate::Context;

/// Derive the cache key for a call.
///
/// The key is a pure function of method, resource and params, so identical
/// calls share entries across processes. Params serialize in sorted field
/// order; the [`APIKEY_FIELD`] is dropped first since the signature changes
/// on every call and would make every lookup miss.
pub fn cache_key(method: Method, resource: &str, params: &Params) -> String {
    let mut ser = form_urlencoded::Serializer::new(String::new());
    for (k, v) in params.iter() {
        if k == APIKEY_FIELD {
            continue;
        }
        ser.append_pair(k, v);
    }

    format!("{}-{}-{}", method.as_str(), resource, ser.finish())
}

/// Cache tagging for one call.
///
/// `Disabled` opts the call out of caching entirely; `Tags` caches the call,
/// grouping the entry under the given tags for bulk invalidation. An empty
/// tag list still caches the call, the entry is just unreachable by
/// tag-based invalidation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheTags {
    /// Do not cache this call at all.
    Disabled,
    /// Cache this call under the given tags.
    Tags(Vec<String>),
}

impl Default for CacheTags {
    fn default() -> Self {
        CacheTags::Tags(Vec::new())
    }
}

impl CacheTags {
    /// Cache the call without any tags.
    pub fn none() -> Self {
        Self::default()
    }

    /// Cache the call under the given tags.
    pub fn tags<I, S>(tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        CacheTags::Tags(tags.into_iter().map(Into::into).collect())
    }

    /// Whether caching is disabled for the call.
    pub fn is_disabled(&self) -> bool {
        matches!(self, CacheTags::Disabled)
    }
}

/// CacheGateway wraps the context's [`CacheStore`] with the configured
/// lifetime and the crowdmap key/value conventions.
///
/// Caching is best-effort: every store fault degrades to a miss or a no-op
/// and is only logged, never surfaced to the caller.
///
/// [`CacheStore`]: crate::CacheStore
#[derive(Debug, Clone)]
pub struct CacheGateway {
    ctx: Context,
    ttl: Duration,
}

impl CacheGateway {
    /// Create a gateway over the context's cache store.
    pub fn new(ctx: Context, ttl: Duration) -> Self {
        Self { ctx, ttl }
    }

    /// Look up the cached response for a call, `None` on miss.
    ///
    /// Store faults, undecodable entries and entries decoding to an empty
    /// payload are treated as misses: the dispatcher never stores those, so
    /// they can only be backend corruption.
    pub async fn lookup(&self, method: Method, resource: &str, params: &Params) -> Option<Value> {
        let key = cache_key(method, resource, params);
        let raw = match self.ctx.cache_get(&key).await {
            Ok(raw) => raw?,
            Err(err) => {
                debug!("cache get failed for {key}: {err}");
                return None;
            }
        };

        match serde_json::from_slice(&raw) {
            Ok(value) if is_truthy(&value) => Some(value),
            Ok(_) => {
                debug!("cached entry for {key} decoded empty, treating as miss");
                None
            }
            Err(err) => {
                debug!("cached entry for {key} is undecodable, treating as miss: {err}");
                None
            }
        }
    }

    /// Store a validated response under the derived key with the given tags.
    pub async fn store(
        &self,
        method: Method,
        resource: &str,
        params: &Params,
        value: &Value,
        tags: &[String],
    ) -> bool {
        let key = cache_key(method, resource, params);
        let raw = match serde_json::to_vec(value) {
            Ok(raw) => Bytes::from(raw),
            Err(err) => {
                debug!("cache encode failed for {key}: {err}");
                return false;
            }
        };

        match self
            .ctx
            .cache_set_with_tags(&key, raw, self.ttl, tags)
            .await
        {
            Ok(stored) => stored,
            Err(err) => {
                debug!("cache set failed for {key}: {err}");
                false
            }
        }
    }

    /// Delete every cached entry associated with tag.
    ///
    /// Failures are logged and reported as `false`; they never block a call.
    pub async fn invalidate_tag(&self, tag: &str) -> bool {
        match self.ctx.cache_delete_tag(tag).await {
            Ok(deleted) => deleted,
            Err(err) => {
                debug!("cache tag delete failed for {tag}: {err}");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cache_key_is_stable() {
        let params = Params::new().with("bbox", "1,2,3,4").with("zoom", "10");
        let a = cache_key(Method::Get, "/maps", &params);
        let b = cache_key(Method::Get, "/maps", &params);
        assert_eq!(a, b);
        assert_eq!(a, "GET-/maps-bbox=1%2C2%2C3%2C4&zoom=10");
    }

    #[test]
    fn test_cache_key_excludes_apikey() {
        let plain = Params::new().with("bbox", "1,2,3,4");
        let signed = plain.clone().with(APIKEY_FIELD, "Apub123abc");
        let resigned = plain.clone().with(APIKEY_FIELD, "Apub456def");

        let key = cache_key(Method::Get, "/maps", &plain);
        assert_eq!(key, cache_key(Method::Get, "/maps", &signed));
        assert_eq!(key, cache_key(Method::Get, "/maps", &resigned));
    }

    #[test]
    fn test_cache_key_empty_params() {
        let key = cache_key(Method::Get, "/maps", &Params::new());
        assert_eq!(key, "GET-/maps-");
        assert_eq!(key, cache_key(Method::Get, "/maps", &Params::new()));
    }

    #[test]
    fn test_cache_key_varies_with_method_and_resource() {
        let params = Params::new().with("id", "1");
        let base = cache_key(Method::Get, "/maps", &params);
        assert_ne!(base, cache_key(Method::Delete, "/maps", &params));
        assert_ne!(base, cache_key(Method::Get, "/users", &params));
    }

    #[test]
    fn test_cache_tags_default_is_enabled() {
        assert!(!CacheTags::default().is_disabled());
        assert!(!CacheTags::tags(["maps"]).is_disabled());
        assert!(CacheTags::Disabled.is_disabled());
    }

    /// Store double handing back a fixed raw entry for every key.
    #[derive(Debug)]
    struct FixedStore(Bytes);

    #[async_trait::async_trait]
    impl crate::CacheStore for FixedStore {
        async fn get(&self, _key: &str) -> crate::Result<Option<Bytes>> {
            Ok(Some(self.0.clone()))
        }

        async fn set_with_tags(
            &self,
            _key: &str,
            _value: Bytes,
            _ttl: Duration,
            _tags: &[String],
        ) -> crate::Result<bool> {
            Ok(true)
        }

        async fn delete_tag(&self, _tag: &str) -> crate::Result<bool> {
            Ok(true)
        }
    }

    #[tokio::test]
    async fn test_empty_decoded_entries_are_misses() {
        for raw in [&b"null"[..], b"false", b"0", b"\"\"", b"[]"] {
            let ctx = Context::new().with_cache_store(FixedStore(Bytes::from_static(raw)));
            let gateway = CacheGateway::new(ctx, Duration::from_secs(60));
            assert!(
                gateway
                    .lookup(Method::Get, "/maps", &Params::new())
                    .await
                    .is_none(),
                "entry {raw:?} must not be served as a hit"
            );
        }
    }

    #[tokio::test]
    async fn test_undecodable_entries_are_misses() {
        let ctx = Context::new().with_cache_store(FixedStore(Bytes::from_static(b"not json")));
        let gateway = CacheGateway::new(ctx, Duration::from_secs(60));
        assert!(gateway
            .lookup(Method::Get, "/maps", &Params::new())
            .await
            .is_none());
    }

    #[tokio::test]
    async fn test_noop_store_degrades_to_miss() {
        let gateway = CacheGateway::new(Context::new(), Duration::from_secs(60));
        let params = Params::new();

        assert!(gateway.lookup(Method::Get, "/maps", &params).await.is_none());
        assert!(
            !gateway
                .store(Method::Get, "/maps", &params, &Value::Null, &[])
                .await
        );
        assert!(!gateway.invalidate_tag("maps").await);
    }
}
