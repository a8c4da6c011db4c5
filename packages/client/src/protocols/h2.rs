//! HTTP/2 session connector
//!
//! Dials through a `Dialer`, runs the h2 client handshake and drives the
//! connection on a spawned task. The task reports the peer's stream limit as
//! `Settings` events, first once a PING round-trip proves the peer's initial
//! SETTINGS have been applied and again whenever the limit changes.

use std::fmt;
use std::future::{Future, poll_fn};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::task::Poll;

use bytes::Bytes;
use h2::client::{ResponseFuture, SendRequest};
use h2::{Ping, RecvStream, SendStream};
use http::Response;
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio::task::AbortHandle;
use tracing::{debug, warn};

use crate::cache::TlsSessionEntry;
use crate::config::H2Config;
use crate::connect::{BoxIo, Dialer, DirectDialer, SessionResumption};
use crate::error::{self, Error, Result};
use crate::http::Authority;
use crate::pool::{Connecting, MuxStream, RequestHead, SessionConnector, SessionEvent, SessionHandle, SessionOptions};

/// Connects HTTP/2 sessions over whatever the configured dialer produces.
#[derive(Clone)]
pub struct H2Connector {
    dialer: Arc<dyn Dialer>,
    config: H2Config,
}

impl Default for H2Connector {
    fn default() -> Self {
        Self::new(DirectDialer::default(), H2Config::default())
    }
}

impl H2Connector {
    pub fn new(dialer: impl Dialer, config: H2Config) -> Self {
        Self {
            dialer: Arc::new(dialer),
            config,
        }
    }

    pub fn with_dialer(dialer: Arc<dyn Dialer>, config: H2Config) -> Self {
        Self { dialer, config }
    }

    pub fn config(&self) -> &H2Config {
        &self.config
    }
}

impl fmt::Debug for H2Connector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("H2Connector")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl SessionConnector for H2Connector {
    type Handle = H2Handle;

    fn connect(
        &self,
        authority: &Authority,
        options: &SessionOptions,
        tls_session: Option<TlsSessionEntry>,
    ) -> Result<Connecting<H2Handle>> {
        let runtime = tokio::runtime::Handle::try_current().map_err(error::connect)?;
        let (events_tx, events) = mpsc::unbounded_channel();
        let shared = Arc::new(H2Shared {
            sender: Mutex::new(None),
            task: Mutex::new(None),
            closed: AtomicBool::new(false),
        });

        // tickets issued on this connection flow back to the pool's cache
        let dial = if authority.is_secure() {
            let servername = options
                .servername
                .clone()
                .unwrap_or_else(|| authority.host().to_string());
            let state = tls_session
                .and_then(|entry| entry.resumption)
                .unwrap_or_default();
            let tickets = events_tx.clone();
            let resumption = SessionResumption::new(servername, state, move |entry| {
                let _ = tickets.send(SessionEvent::TlsSession(entry));
            });
            self.dialer.dial_resuming(authority, options, resumption)
        } else {
            self.dialer.dial(authority, options)
        };
        let task = runtime.spawn(run_session(
            dial,
            self.config.clone(),
            Arc::clone(&shared),
            events_tx,
            authority.key().to_string(),
        ));
        *shared.task.lock() = Some(task.abort_handle());

        Ok(Connecting {
            handle: H2Handle { shared },
            events,
        })
    }
}

struct H2Shared {
    sender: Mutex<Option<SendRequest<Bytes>>>,
    task: Mutex<Option<AbortHandle>>,
    closed: AtomicBool,
}

/// Handle to one HTTP/2 connection.
pub struct H2Handle {
    shared: Arc<H2Shared>,
}

impl H2Handle {
    pub fn is_closed(&self) -> bool {
        self.shared.closed.load(Ordering::Acquire)
    }
}

impl fmt::Debug for H2Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("H2Handle")
            .field("closed", &self.is_closed())
            .finish()
    }
}

impl SessionHandle for H2Handle {
    type Stream = H2Stream;

    fn open_stream(&self, head: RequestHead) -> Result<H2Stream> {
        // each clone tracks its own pending-open state
        let mut sender = self
            .shared
            .sender
            .lock()
            .clone()
            .ok_or_else(|| error::stream(error::SessionClosing))?;
        let (response, send) = sender.send_request(head, false).map_err(error::stream)?;

        Ok(H2Stream {
            response: Some(response),
            send,
        })
    }

    fn close(&self) {
        self.shared.closed.store(true, Ordering::Release);
        // the connection winds down once the last request handle and stream are gone
        self.shared.sender.lock().take();
    }

    fn destroy(&self, error: Option<Error>) {
        self.close();
        if let Some(task) = self.shared.task.lock().take() {
            if let Some(error) = error {
                debug!(target: "muxpool::transport", error = %error, "aborting h2 connection");
            }
            task.abort();
        }
    }
}

/// One HTTP/2 request stream.
pub struct H2Stream {
    response: Option<ResponseFuture>,
    send: SendStream<Bytes>,
}

impl H2Stream {
    /// Queue request body data.
    ///
    /// # Errors
    ///
    /// Returns a stream error if the stream was reset.
    pub fn send_data(&mut self, data: Bytes, end_of_stream: bool) -> Result<()> {
        self.send.send_data(data, end_of_stream).map_err(error::stream)
    }

    /// End the request body.
    ///
    /// # Errors
    ///
    /// Returns a stream error if the stream was reset.
    pub fn finish(&mut self) -> Result<()> {
        self.send_data(Bytes::new(), true)
    }

    /// Wait for the response head. Can only be awaited once.
    ///
    /// # Errors
    ///
    /// Returns a stream error if the stream failed or the response was
    /// already taken.
    pub async fn response(&mut self) -> Result<Response<RecvStream>> {
        let response = self
            .response
            .take()
            .ok_or_else(|| error::stream("response already taken"))?;
        response.await.map_err(error::stream)
    }

    pub fn send_stream(&mut self) -> &mut SendStream<Bytes> {
        &mut self.send
    }
}

impl MuxStream for H2Stream {
    fn cancel(&mut self) {
        self.send.send_reset(h2::Reason::CANCEL);
    }
}

impl fmt::Debug for H2Stream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("H2Stream")
            .field("response_pending", &self.response.is_some())
            .finish()
    }
}

async fn run_session(
    dial: futures::future::BoxFuture<'static, Result<BoxIo>>,
    config: H2Config,
    shared: Arc<H2Shared>,
    events: mpsc::UnboundedSender<SessionEvent>,
    authority: String,
) {
    let io = match tokio::time::timeout(config.handshake_timeout, dial).await {
        Ok(Ok(io)) => io,
        Ok(Err(err)) => {
            let _ = events.send(SessionEvent::Error(err));
            return;
        }
        Err(_) => {
            let _ = events.send(SessionEvent::Error(error::connect(error::TimedOut)));
            return;
        }
    };

    let info = io.connection_info();
    if let Some(alpn) = info.alpn.as_deref() {
        if alpn != b"h2" {
            let protocol = String::from_utf8_lossy(alpn).into_owned();
            let _ = events.send(SessionEvent::Error(error::connect(format!(
                "server negotiated {protocol} instead of h2"
            ))));
            return;
        }
    }

    let (send_request, connection) = match config.builder().handshake::<_, Bytes>(io).await {
        Ok(parts) => parts,
        Err(err) => {
            let _ = events.send(SessionEvent::Error(error::connect(err)));
            return;
        }
    };
    debug!(target: "muxpool::transport", authority = %authority, tunneled = info.tunneled, "h2 handshake complete");

    let mut connection = connection;
    // the peer's SETTINGS must be its first frame, so once our PING is
    // answered its stream limit has been applied
    let mut ping_pong = connection.ping_pong();
    let mut connection = Box::pin(connection);
    let mut ready = Some(Box::pin(send_request.ready()));
    let mut awaiting_pong = match ping_pong.as_mut().map(|ping_pong| ping_pong.send_ping(Ping::opaque())) {
        Some(Ok(())) => true,
        Some(Err(err)) => {
            let _ = events.send(SessionEvent::Error(error::connect(err)));
            let _ = events.send(SessionEvent::Closed);
            return;
        }
        None => false,
    };
    let mut announced: Option<usize> = None;

    let result = poll_fn(|cx| {
        if let Some(pending) = ready.as_mut() {
            match pending.as_mut().poll(cx) {
                Poll::Ready(Ok(sender)) => {
                    if !shared.closed.load(Ordering::Acquire) {
                        *shared.sender.lock() = Some(sender);
                    }
                    ready = None;
                }
                Poll::Ready(Err(err)) => return Poll::Ready(Err(err)),
                Poll::Pending => {}
            }
        }

        let polled = connection.as_mut().poll(cx);

        if awaiting_pong {
            if let Some(ping_pong) = ping_pong.as_mut() {
                match ping_pong.poll_pong(cx) {
                    Poll::Ready(Ok(_)) => awaiting_pong = false,
                    Poll::Ready(Err(err)) => return Poll::Ready(Err(err)),
                    Poll::Pending => {}
                }
            }
        }

        if ready.is_none() && !awaiting_pong {
            let max = connection.max_concurrent_send_streams();
            if announced != Some(max) {
                announced = Some(max);
                let _ = events.send(SessionEvent::Settings {
                    max_concurrent_streams: u32::try_from(max).unwrap_or(u32::MAX),
                });
            }
        }
        polled
    })
    .await;

    shared.sender.lock().take();
    if let Err(err) = result {
        if !err.is_go_away() || err.reason() != Some(h2::Reason::NO_ERROR) {
            warn!(target: "muxpool::transport", authority = %authority, error = %err, "h2 connection failed");
            let _ = events.send(SessionEvent::Error(error::connect(err)));
        }
    }
    let _ = events.send(SessionEvent::Closed);
}

/// Return `len` bytes of receive window to the peer after consuming body data.
pub(crate) fn release_capacity(recv: &mut RecvStream, len: usize) {
    let _ = recv.flow_control().release_capacity(len);
}
