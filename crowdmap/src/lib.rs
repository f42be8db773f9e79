//! Crowdmap API client.
//!
//! This crate bundles [`crowdmap-core`] with a ready-made context wired for
//! `reqwest` and the process environment. Signing, caching and profiling
//! semantics live in the core crate; this facade only assembles them.
//!
//! ```no_run
//! use crowdmap::{CacheTags, CallOptions, Client, Config, DefaultContext, Method, Params};
//!
//! # async fn example() -> crowdmap::Result<()> {
//! let ctx = DefaultContext::new();
//! let client = Client::new(ctx.clone(), Config::new().from_env(&ctx))?;
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
//!
//! No cache store is wired by default: without one, every call goes live.
//! Plug a tagged backend via [`Context::with_cache_store`].
//!
//! [`crowdmap-core`]: crowdmap_core

#![warn(missing_docs)]

pub use crowdmap_core::*;
pub use crowdmap_http_send_reqwest::ReqwestHttpSend;

mod context;
pub use context::DefaultContext;
