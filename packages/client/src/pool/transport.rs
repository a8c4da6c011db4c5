//! Transport seams consumed by the pool
//!
//! The pool never speaks a wire protocol itself. A `SessionConnector` starts
//! a session and hands back a handle plus a channel of `SessionEvent`s; the
//! pool reacts to those events in arrival order.

use tokio::sync::mpsc;

use crate::cache::TlsSessionEntry;
use crate::error::{Error, Result};
use crate::http::Authority;

use super::options::SessionOptions;

/// Request metadata sent when a stream is opened.
pub type RequestHead = http::Request<()>;

/// One logical stream on a session.
pub trait MuxStream: Send + 'static {
    /// Reset the stream locally without waiting for the peer.
    fn cancel(&mut self);
}

/// Handle to one physical multiplexed connection.
///
/// Implementations must not call back into the pool synchronously: the pool
/// invokes these methods while its state is locked.
pub trait SessionHandle: Send + Sync + 'static {
    type Stream: MuxStream;

    /// Open a stream. Only called once the session has reported its settings.
    fn open_stream(&self, head: RequestHead) -> Result<Self::Stream>;

    /// Stop accepting new streams and close once the open ones finish.
    fn close(&self);

    /// Tear the connection down immediately.
    fn destroy(&self, error: Option<Error>);
}

/// Notifications emitted by a session over its lifetime.
#[derive(Debug)]
pub enum SessionEvent {
    /// The peer's settings arrived (first occurrence) or changed.
    Settings { max_concurrent_streams: u32 },
    /// The peer announced additional origins it serves.
    Origin(Vec<String>),
    /// A resumption ticket worth caching for the next handshake.
    TlsSession(TlsSessionEntry),
    Error(Error),
    Closed,
}

/// A session whose handshake is in progress.
pub struct Connecting<H> {
    pub handle: H,
    pub events: mpsc::UnboundedReceiver<SessionEvent>,
}

/// Starts sessions toward an authority.
///
/// `connect` returns immediately; handshake progress and failures are
/// reported through the event channel. An `Err` here means the attempt could
/// not even be started.
pub trait SessionConnector: Send + Sync + 'static {
    type Handle: SessionHandle;

    fn connect(
        &self,
        authority: &Authority,
        options: &SessionOptions,
        tls_session: Option<TlsSessionEntry>,
    ) -> Result<Connecting<Self::Handle>>;
}
