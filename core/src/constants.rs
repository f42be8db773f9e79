//! Constants shared across the crowdmap client.

/// Scheme of the crowdmap API endpoint.
pub const API_SCHEME: &str = "https";
/// Host of the crowdmap API endpoint.
pub const API_HOST: &str = "api.crowdmap.com";
/// Base path of the crowdmap API, prepended to every resource.
pub const API_BASE_PATH: &str = "/v1";

/// Param field carrying the per-call signature.
///
/// This field changes on every call and must never participate in cache key
/// derivation.
pub const APIKEY_FIELD: &str = "apikey";
/// Param field carrying the session key.
pub const SESSION_FIELD: &str = "session";

/// User agent sent with every request.
pub const USER_AGENT: &str = "Mozilla/5.0 Crowdmap Client";

/// Default lifetime in seconds for cached responses.
pub const DEFAULT_CACHE_TTL: u64 = 300;

// Env values used for configuration loading.

/// Env value for the public key.
pub const CROWDMAP_PUBLIC_KEY: &str = "CROWDMAP_PUBLIC_KEY";
/// Env value for the private key.
pub const CROWDMAP_PRIVATE_KEY: &str = "CROWDMAP_PRIVATE_KEY";
/// Env value for the session key.
pub const CROWDMAP_SESSION_KEY: &str = "CROWDMAP_SESSION_KEY";
/// Env value for the cache lifetime in seconds.
pub const CROWDMAP_CACHE_TTL: &str = "CROWDMAP_CACHE_TTL";
