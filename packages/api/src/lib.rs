//! muxpool public API
//!
//! Fluent builders for session pools, protocol negotiators and proxy tunnel
//! agents, plus one-call helpers that run on the process-wide defaults.
//!
//! ```no_run
//! use bytes::Bytes;
//!
//! # async fn run() -> muxpool::Result<()> {
//! let request = http::Request::get("https://example.com/")
//!     .body(Bytes::new())
//!     .map_err(muxpool::error::builder)?;
//! let response = muxpool::auto("https://example.com", request).await?;
//! let body = response.into_body().collect().await?;
//! println!("{} bytes", body.len());
//! # Ok(())
//! # }
//! ```

#![deny(unsafe_code)]
#![warn(clippy::all, clippy::pedantic)]

use std::sync::Arc;

use bytes::Bytes;
use http::{Request, Response};

pub mod builder;

pub use builder::{AgentBuilder, NegotiatorBuilder, TunnelBuilder};

pub use muxpool_client::{
    Agent, AgentConfig, AgentSlots, Authority, AutoNegotiator, Body, Dispatcher, Error, H2Config,
    IntoTarget, Kind, NegotiatorConfig, PoolStatsSnapshot, PooledStream, ProxyReach,
    RequestOptions, ResolveOptions, Result, Scheme, Session, SessionOptions, SessionState, Slot,
    TunnelDescriptor, default_agent, default_negotiator, error, reset_default_agent,
    reset_default_negotiator, set_default_agent, set_default_negotiator,
};
pub use muxpool_client::protocols::{H2Handle, H2Stream};

/// Static entry points mirroring the builders.
pub struct Muxpool;

impl Muxpool {
    /// Start configuring a session pool.
    pub fn agent() -> AgentBuilder {
        AgentBuilder::new()
    }

    /// Start configuring a tunnel agent through `proxy_url`.
    pub fn tunnel(proxy_url: impl Into<String>) -> TunnelBuilder {
        TunnelBuilder::new(proxy_url)
    }

    pub fn negotiator() -> NegotiatorBuilder {
        NegotiatorBuilder::new()
    }
}

/// Wait for a session to `target` on the default pool.
///
/// # Errors
///
/// See [`Agent::get_session`].
pub async fn get_session(target: impl IntoTarget, options: &SessionOptions) -> Result<Arc<Session<H2Handle>>> {
    default_agent()?.get_session(target, options).await
}

/// Open a stream to `target` on the default pool.
///
/// # Errors
///
/// See [`Agent::open_stream`].
pub async fn open_stream(
    target: impl IntoTarget,
    options: &SessionOptions,
    head: Request<()>,
) -> Result<PooledStream<H2Handle>> {
    default_agent()?.open_stream(target, options, head).await
}

/// Negotiate a protocol for `target` with the default negotiator and send
/// `request` over it.
///
/// # Errors
///
/// See [`AutoNegotiator::auto`].
pub async fn auto(target: impl IntoTarget, request: Request<Bytes>) -> Result<Response<Body>> {
    default_negotiator()?
        .auto(target, ResolveOptions::default(), request)
        .await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn get_session_rejects_unsupported_scheme() {
        let err = get_session("ftp://example.com", &SessionOptions::default())
            .await
            .unwrap_err();

        assert!(err.is_builder());
    }

    #[test]
    fn entry_points_return_builders() {
        assert!(Muxpool::agent().max_sessions(4).build().is_ok());
        assert!(Muxpool::negotiator().build().is_ok());
        assert!(Muxpool::tunnel("http://127.0.0.1:8080").build().is_ok());
    }
}
