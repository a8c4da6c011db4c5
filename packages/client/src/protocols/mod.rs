//! Wire protocols and protocol selection
//!
//! - `h2`: the bundled multiplexed session connector
//! - `http1`: the legacy request/response transport
//! - `alpn`: TLS probes that report the negotiated protocol
//! - `auto`: per-target choice between the two

pub mod alpn;
pub mod auto;
pub mod body;
pub mod h2;
pub mod http1;

pub use alpn::{AlpnProbe, TlsAlpnProbe};
pub use auto::{AgentSlots, AutoNegotiator, Dispatcher, ResolveOptions, Slot};
pub use body::Body;
pub use h2::{H2Connector, H2Handle, H2Stream};
pub use http1::{Http1Transport, LegacyTransport};
