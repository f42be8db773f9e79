use crowdmap_core::{Context, OsEnv};
use crowdmap_http_send_reqwest::ReqwestHttpSend;
use reqwest::Client;

/// Assembles a [`Context`] with the default capability set: a `reqwest`
/// transport and the process environment.
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultContext;

impl DefaultContext {
    /// Build a context with a default `reqwest::Client`.
    pub fn new() -> Context {
        Self::with_client(Client::new())
    }

    /// Build a context with a custom `reqwest::Client`, for callers that
    /// need timeouts, proxies or pooling configured.
    pub fn with_client(client: Client) -> Context {
        Context::new()
            .with_http_send(ReqwestHttpSend::new(client))
            .with_env(OsEnv)
    }
}
