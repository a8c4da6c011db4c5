//! Proxy tunnel agents
//!
//! A tunnel agent is an ordinary session pool whose dialing step asks an
//! HTTP proxy for a CONNECT tunnel first. The proxy is reached over plain
//! HTTP/1.1, HTTP/1.1 over TLS, or a stream of another HTTP/2 pool.

pub mod descriptor;
pub mod h2_io;
pub mod reach;
pub mod tunnel;

pub use descriptor::TunnelDescriptor;
pub use h2_io::H2Io;
pub use reach::ProxyReach;
pub use tunnel::{TunnelDialer, tunnel_agent, tunnel_agent_with};
