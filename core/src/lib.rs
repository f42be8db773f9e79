//! Core components of the crowdmap API client.
//!
//! This crate implements the client for the crowdmap v1 HTTP API: per-call
//! request signing, tag-based response caching and lightweight call
//! profiling.
//!
//! ## Overview
//!
//! The crate is built around several key concepts:
//!
//! - **Context**: a container holding the pluggable I/O capabilities — the
//!   HTTP transport ([`HttpSend`]), the tagged cache backend ([`CacheStore`])
//!   and environment access ([`Env`])
//! - **Client**: the dispatcher orchestrating signing, cache lookup and
//!   population, transport exchange and response validation
//! - **CacheGateway**: a best-effort wrapper over the cache backend with
//!   deterministic key derivation and tag-based invalidation
//! - **Profiler**: an injectable, append-only accumulator of live vs. cached
//!   call records
//!
//! ## Example
//!
//! ```no_run
//! use crowdmap_core::{CacheTags, CallOptions, Client, Config, Context, Method, Params};
//!
//! # async fn example(ctx: Context) -> crowdmap_core::Result<()> {
//! let client = Client::new(
//!     ctx,
//!     Config::new()
//!         .with_public_key("my-public-key")
//!         .with_private_key("my-private-key"),
//! )?;
//!
//! let maps = client
//!     .call(
//!         Method::Get,
//!         "/maps",
//!         Params::new().with("bbox", "1,2,3,4"),
//!         CallOptions::new().with_cache(CacheTags::tags(["maps"])),
//!     )
//!     .await?;
//! println!("{maps}");
//! # Ok(())
//! # }
//! ```

// Make sure all our public APIs have docs.
#![warn(missing_docs)]

pub mod constants;
pub mod hash;
pub mod time;
pub mod utils;

mod error;
pub use error::{Error, ErrorKind, Result};
mod context;
pub use context::{
    CacheStore, Context, Env, HttpSend, NoopCacheStore, NoopEnv, NoopHttpSend, OsEnv, StaticEnv,
};

mod credential;
pub use credential::Credential;
mod config;
pub use config::Config;

mod request;
pub use request::{FileUpload, Method, Params};
mod sign;
pub use sign::signature;

mod cache;
pub use cache::{cache_key, CacheGateway, CacheTags};
mod profile;
pub use profile::{ProfileRecord, Profiler};

mod client;
pub use client::{CallOptions, Client};
