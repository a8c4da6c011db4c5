//! In-memory handshake caches
//!
//! - `TlsSessionCache`: resumption tickets per authority and options fingerprint
//! - `ProtocolCache`: negotiated ALPN protocol per host, port and offer

pub mod protocol;
pub mod tls_session;

pub use protocol::ProtocolCache;
pub use tls_session::{TlsResumption, TlsSessionCache, TlsSessionEntry};
