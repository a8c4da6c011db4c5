//! # muxpool client
//!
//! Client-side manager for multiplexed HTTP/2 sessions. Given a target
//! authority and connection options it hands out ready streams while
//! reusing sessions whenever that is legal, bounding the number of sessions
//! and concurrent streams, evicting sessions another session already covers
//! and caching TLS tickets and negotiated protocols.
//!
//! ## Components
//!
//! - [`Agent`]: the session pool
//! - [`AutoNegotiator`]: picks HTTP/2 or HTTP/1.1 per target through ALPN
//! - [`proxy::tunnel_agent`]: pools whose sessions run through a CONNECT proxy
//!
//! ## Usage
//!
//! ```no_run
//! use muxpool_client::{Agent, AgentConfig, SessionOptions};
//!
//! # async fn run() -> muxpool_client::Result<()> {
//! let agent = Agent::new(AgentConfig::default())?;
//! let head = http::Request::get("https://example.com/")
//!     .body(())
//!     .map_err(muxpool_client::error::builder)?;
//! let mut stream = agent
//!     .open_stream("https://example.com", &SessionOptions::default(), head)
//!     .await?;
//! stream.finish()?;
//! let response = stream.response().await?;
//! println!("{}", response.status());
//! # Ok(())
//! # }
//! ```

#![deny(unsafe_code)]
#![warn(clippy::all)]

use parking_lot::Mutex;

pub mod cache;
pub mod config;
pub mod connect;
pub mod error;
pub mod http;
pub mod pool;
pub mod protocols;
pub mod proxy;
pub mod telemetry;

pub mod prelude;

pub use crate::prelude::*;

static DEFAULT_AGENT: Mutex<Option<Agent>> = Mutex::new(None);
static DEFAULT_NEGOTIATOR: Mutex<Option<AutoNegotiator>> = Mutex::new(None);

/// The process-wide pool, created on first use with default settings.
///
/// # Errors
///
/// Only fails if the default configuration is rejected, which it never is.
pub fn default_agent() -> Result<Agent> {
    let mut slot = DEFAULT_AGENT.lock();
    if let Some(agent) = slot.as_ref() {
        return Ok(agent.clone());
    }
    let agent = Agent::new(AgentConfig::default())?;
    *slot = Some(agent.clone());
    Ok(agent)
}

/// Replace the process-wide pool, returning the previous one. The previous
/// pool keeps working for handles that are still held.
pub fn set_default_agent(agent: Agent) -> Option<Agent> {
    DEFAULT_AGENT.lock().replace(agent)
}

/// Destroy the process-wide pool. The next [`default_agent`] call builds a
/// fresh one.
pub fn reset_default_agent(reason: Option<&str>) {
    let previous = DEFAULT_AGENT.lock().take();
    if let Some(agent) = previous {
        agent.destroy(reason);
    }
}

/// The process-wide negotiator, created on first use with default settings.
///
/// # Errors
///
/// See [`default_agent`].
pub fn default_negotiator() -> Result<AutoNegotiator> {
    let mut slot = DEFAULT_NEGOTIATOR.lock();
    if let Some(negotiator) = slot.as_ref() {
        return Ok(negotiator.clone());
    }
    let negotiator = AutoNegotiator::new(NegotiatorConfig::default())?;
    *slot = Some(negotiator.clone());
    Ok(negotiator)
}

pub fn set_default_negotiator(negotiator: AutoNegotiator) -> Option<AutoNegotiator> {
    DEFAULT_NEGOTIATOR.lock().replace(negotiator)
}

/// Drop the process-wide negotiator and destroy its HTTP/2 pool.
pub fn reset_default_negotiator(reason: Option<&str>) {
    let previous = DEFAULT_NEGOTIATOR.lock().take();
    if let Some(negotiator) = previous {
        negotiator.http2_agent().destroy(reason);
    }
}
