//! Multiplexed session pool
//!
//! `Agent` is the pool. Sessions come from a `SessionConnector`, streams are
//! checked out as `PooledStream`s, and connection identity is described by
//! `SessionOptions`.

pub mod agent;
pub mod options;
pub mod session;
pub mod stream;
pub mod transport;

pub(crate) mod queue;
pub(crate) mod state;

pub use agent::Agent;
pub use options::{SessionOptions, TlsVersion};
pub use session::{Session, SessionState};
pub use stream::{PooledStream, RequestTimeout, RequestTimer};
pub use transport::{
    Connecting, MuxStream, RequestHead, SessionConnector, SessionEvent, SessionHandle,
};
