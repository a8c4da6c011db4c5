//! HTTP/1.1 request/response transport
//!
//! Used by the negotiator whenever a target does not speak h2. Keep-alive
//! connections are parked per authority key and options fingerprint and
//! handed back out once hyper reports them ready again.

use std::fmt;
use std::sync::Arc;

use bytes::Bytes;
use futures::future::BoxFuture;
use hashbrown::HashMap;
use http::header::{HOST, HeaderValue};
use http::{Request, Response, Uri};
use http_body_util::Full;
use hyper::body::Incoming;
use hyper::client::conn::http1::{self, SendRequest};
use hyper_util::rt::TokioIo;
use parking_lot::Mutex;
use tracing::debug;

use crate::config::ALPN_HTTP11;
use crate::connect::{Dialer, DirectDialer};
use crate::error::{self, Result};
use crate::http::Authority;
use crate::pool::SessionOptions;

/// Performs one request/response exchange without multiplexing.
pub trait LegacyTransport: Send + Sync + 'static {
    fn request(
        &self,
        authority: &Authority,
        options: &SessionOptions,
        request: Request<Bytes>,
    ) -> BoxFuture<'static, Result<Response<Incoming>>>;
}

const MAX_IDLE_PER_KEY: usize = 8;

/// hyper HTTP/1.1 client over [`DirectDialer`].
#[derive(Clone)]
pub struct Http1Transport {
    inner: Arc<Inner>,
}

struct Inner {
    dialer: DirectDialer,
    idle: Mutex<HashMap<String, Vec<SendRequest<Full<Bytes>>>>>,
    pooled: bool,
}

impl Default for Http1Transport {
    fn default() -> Self {
        Self::with_pooling(true)
    }
}

impl Http1Transport {
    pub fn new() -> Self {
        Self::default()
    }

    /// A transport that opens a fresh connection for every request.
    pub fn unpooled() -> Self {
        Self::with_pooling(false)
    }

    fn with_pooling(pooled: bool) -> Self {
        Self {
            inner: Arc::new(Inner {
                dialer: DirectDialer::new(vec![ALPN_HTTP11.as_bytes().to_vec()]),
                idle: Mutex::new(HashMap::new()),
                pooled,
            }),
        }
    }

    pub fn is_pooled(&self) -> bool {
        self.inner.pooled
    }

    /// Number of parked keep-alive connections across all keys.
    pub fn idle_connection_count(&self) -> usize {
        self.inner.idle.lock().values().map(Vec::len).sum()
    }
}

impl fmt::Debug for Http1Transport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Http1Transport")
            .field("pooled", &self.inner.pooled)
            .field("idle", &self.idle_connection_count())
            .finish()
    }
}

impl Inner {
    fn checkout(&self, key: &str) -> Option<SendRequest<Full<Bytes>>> {
        let mut idle = self.idle.lock();
        let senders = idle.get_mut(key)?;
        while let Some(sender) = senders.pop() {
            if sender.is_ready() && !sender.is_closed() {
                return Some(sender);
            }
        }
        idle.remove(key);
        None
    }

    fn park(&self, key: String, sender: SendRequest<Full<Bytes>>) {
        let mut idle = self.idle.lock();
        let senders = idle.entry(key).or_default();
        if senders.len() < MAX_IDLE_PER_KEY {
            senders.push(sender);
        }
    }
}

impl LegacyTransport for Http1Transport {
    fn request(
        &self,
        authority: &Authority,
        options: &SessionOptions,
        request: Request<Bytes>,
    ) -> BoxFuture<'static, Result<Response<Incoming>>> {
        let inner = Arc::clone(&self.inner);
        let authority = authority.clone();
        let options = options.clone();

        Box::pin(async move {
            let key = format!("{}|{}", authority.key(), options.fingerprint());
            let request = origin_form(&authority, request)?;

            let mut sender = match inner.pooled.then(|| inner.checkout(&key)).flatten() {
                Some(sender) => sender,
                None => {
                    let io = inner.dialer.dial(&authority, &options).await?;
                    let (sender, connection) = http1::handshake(TokioIo::new(io))
                        .await
                        .map_err(error::connect)?;
                    let authority_key = authority.key().to_string();
                    tokio::spawn(async move {
                        if let Err(err) = connection.await {
                            debug!(target: "muxpool::transport", authority = %authority_key, error = %err, "http/1.1 connection ended");
                        }
                    });
                    sender
                }
            };

            sender.ready().await.map_err(error::request)?;
            let response = sender.send_request(request).await.map_err(error::request)?;

            if inner.pooled {
                // parked once the response body has been read to the end
                let inner = Arc::clone(&inner);
                tokio::spawn(async move {
                    if sender.ready().await.is_ok() {
                        inner.park(key, sender);
                    }
                });
            }
            Ok(response)
        })
    }
}

/// Rewrite `request` for the wire: origin-form target plus a `Host` header.
fn origin_form(authority: &Authority, request: Request<Bytes>) -> Result<Request<Full<Bytes>>> {
    let (mut parts, body) = request.into_parts();

    let path = parts
        .uri
        .path_and_query()
        .map_or("/", |path| path.as_str())
        .to_string();
    parts.uri = path.parse::<Uri>().map_err(error::invalid_url)?;

    if !parts.headers.contains_key(HOST) {
        let host = HeaderValue::from_str(authority.host_header()).map_err(error::invalid_header)?;
        parts.headers.insert(HOST, host);
    }

    Ok(Request::from_parts(parts, Full::new(body)))
}
