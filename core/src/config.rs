use std::fmt::{Debug, Formatter};
use std::time::Duration;

use crate::constants::*;
use crate::{utils::Redact, Context};

/// Config carries all the configuration for the crowdmap client.
#[derive(Clone, Default)]
pub struct Config {
    /// `public_key` will be loaded from
    ///
    /// - this field if it's `is_some`
    /// - env value: [`CROWDMAP_PUBLIC_KEY`]
    pub public_key: Option<String>,
    /// `private_key` will be loaded from
    ///
    /// - this field if it's `is_some`
    /// - env value: [`CROWDMAP_PRIVATE_KEY`]
    pub private_key: Option<String>,
    /// `session_key` will be loaded from
    ///
    /// - this field if it's `is_some`
    /// - env value: [`CROWDMAP_SESSION_KEY`]
    pub session_key: Option<String>,
    /// Lifetime for cached responses, defaults to [`DEFAULT_CACHE_TTL`]
    /// seconds. Loaded from env value [`CROWDMAP_CACHE_TTL`] when unset.
    pub cache_ttl: Option<Duration>,
}

impl Config {
    /// Create a new Config.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set public_key.
    pub fn with_public_key(mut self, public_key: impl Into<String>) -> Self {
        self.public_key = Some(public_key.into());
        self
    }

    /// Set private_key.
    pub fn with_private_key(mut self, private_key: impl Into<String>) -> Self {
        self.private_key = Some(private_key.into());
        self
    }

    /// Set session_key.
    pub fn with_session_key(mut self, session_key: impl Into<String>) -> Self {
        self.session_key = Some(session_key.into());
        self
    }

    /// Set the lifetime for cached responses.
    pub fn with_cache_ttl(mut self, ttl: Duration) -> Self {
        self.cache_ttl = Some(ttl);
        self
    }

    /// Load config from env.
    pub fn from_env(mut self, ctx: &Context) -> Self {
        if let Some(v) = ctx.env_var(CROWDMAP_PUBLIC_KEY) {
            self.public_key.get_or_insert(v);
        }
        if let Some(v) = ctx.env_var(CROWDMAP_PRIVATE_KEY) {
            self.private_key.get_or_insert(v);
        }
        if let Some(v) = ctx.env_var(CROWDMAP_SESSION_KEY) {
            self.session_key.get_or_insert(v);
        }
        if self.cache_ttl.is_none() {
            if let Some(secs) = ctx
                .env_var(CROWDMAP_CACHE_TTL)
                .and_then(|v| v.parse::<u64>().ok())
            {
                self.cache_ttl = Some(Duration::from_secs(secs));
            }
        }

        self
    }
}

impl Debug for Config {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("public_key", &self.public_key.as_ref().map(Redact::from))
            .field("private_key", &self.private_key.as_ref().map(Redact::from))
            .field("session_key", &self.session_key.as_ref().map(Redact::from))
            .field("cache_ttl", &self.cache_ttl)
            .finish()
    }
}
