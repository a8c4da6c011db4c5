//! Types most callers need, re-exported at the crate root.

pub use crate::cache::{ProtocolCache, TlsSessionCache, TlsSessionEntry};
pub use crate::config::{AgentConfig, H2Config, NegotiatorConfig};
pub use crate::error::{Error, Kind, Result};
pub use crate::http::{Authority, IntoTarget, RequestOptions, Scheme};
pub use crate::pool::{
    Agent, PooledStream, RequestTimeout, Session, SessionOptions, SessionState, TlsVersion,
};
pub use crate::protocols::{
    AgentSlots, AutoNegotiator, Body, Dispatcher, H2Connector, ResolveOptions, Slot,
};
pub use crate::proxy::{ProxyReach, TunnelDescriptor, tunnel_agent};
pub use crate::telemetry::{PoolStats, PoolStatsSnapshot};

pub use ::http::{HeaderMap, Method, Request, Response, StatusCode};
pub use url::Url;
