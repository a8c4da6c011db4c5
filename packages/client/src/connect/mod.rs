//! Byte-stream establishment: TCP, TLS and the `Io` abstraction tunnels plug into.

pub mod dialer;
pub mod io;
pub mod tls;

pub use dialer::{Dialer, DirectDialer, connect_tcp};
pub use io::{BoxIo, ConnectionInfo, Io, TunnelIo};
pub use tls::{SessionResumption, TlsConfigCache, build_client_config};
