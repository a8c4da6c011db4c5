//! Establishing byte streams toward an authority
//!
//! `Dialer` is the step a session connector runs before its protocol
//! handshake. `DirectDialer` opens TCP (plus TLS for https authorities);
//! tunnel agents substitute a dialer that goes through a proxy.

use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;

use futures::future::BoxFuture;
use tokio::net::{TcpSocket, TcpStream};
use tracing::debug;

use crate::error::{self, Result};
use crate::http::Authority;
use crate::pool::SessionOptions;

use super::io::BoxIo;
use super::tls::{self, SessionResumption, TlsConfigCache};

pub trait Dialer: Send + Sync + 'static {
    /// Open a connected stream to `authority`, TLS included when the
    /// authority is secure.
    fn dial(&self, authority: &Authority, options: &SessionOptions) -> BoxFuture<'static, Result<BoxIo>>;

    /// Like [`Dialer::dial`], with the TLS handshake toward `authority`
    /// resuming from `resumption`. Dialers that run no such handshake
    /// ignore it.
    fn dial_resuming(
        &self,
        authority: &Authority,
        options: &SessionOptions,
        _resumption: SessionResumption,
    ) -> BoxFuture<'static, Result<BoxIo>> {
        self.dial(authority, options)
    }
}

/// Connects straight to the target.
#[derive(Debug, Clone)]
pub struct DirectDialer {
    tls: Arc<TlsConfigCache>,
    alpn: Vec<Vec<u8>>,
    connect_timeout: Option<Duration>,
}

impl Default for DirectDialer {
    fn default() -> Self {
        Self::new(vec![b"h2".to_vec()])
    }
}

impl DirectDialer {
    /// A dialer offering `alpn` on secure connections.
    pub fn new(alpn: Vec<Vec<u8>>) -> Self {
        Self {
            tls: Arc::new(TlsConfigCache::new()),
            alpn,
            connect_timeout: Some(Duration::from_secs(10)),
        }
    }

    #[must_use]
    pub fn with_connect_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn tls_configs(&self) -> &Arc<TlsConfigCache> {
        &self.tls
    }

    /// Like [`Dialer::dial`] but with TLS chosen explicitly rather than by scheme.
    pub fn dial_with(
        &self,
        authority: &Authority,
        options: &SessionOptions,
        secure: bool,
    ) -> BoxFuture<'static, Result<BoxIo>> {
        self.open(authority, options, secure, None)
    }

    fn open(
        &self,
        authority: &Authority,
        options: &SessionOptions,
        secure: bool,
        resumption: Option<SessionResumption>,
    ) -> BoxFuture<'static, Result<BoxIo>> {
        let tls = Arc::clone(&self.tls);
        let alpn = self.alpn.clone();
        let timeout = self.connect_timeout;
        let authority = authority.clone();
        let options = options.clone();

        Box::pin(async move {
            let tcp = connect_tcp(authority.host(), authority.port(), options.local_address, timeout).await?;
            if !secure {
                return Ok(Box::new(tcp) as BoxIo);
            }

            let config = tls.config(&options, &alpn)?;
            let server_name = options.servername.as_deref().unwrap_or(authority.host());
            let stream = tls::wrap_resuming(tcp, config, server_name, resumption).await?;
            Ok(Box::new(stream) as BoxIo)
        })
    }
}

impl Dialer for DirectDialer {
    fn dial(&self, authority: &Authority, options: &SessionOptions) -> BoxFuture<'static, Result<BoxIo>> {
        self.dial_with(authority, options, authority.is_secure())
    }

    fn dial_resuming(
        &self,
        authority: &Authority,
        options: &SessionOptions,
        resumption: SessionResumption,
    ) -> BoxFuture<'static, Result<BoxIo>> {
        self.open(authority, options, authority.is_secure(), Some(resumption))
    }
}

/// Resolve `host` and connect to the first address that accepts.
///
/// # Errors
///
/// Returns a connect error carrying the last failure if no address accepted.
pub async fn connect_tcp(
    host: &str,
    port: u16,
    local_address: Option<IpAddr>,
    timeout: Option<Duration>,
) -> Result<TcpStream> {
    let addrs: Vec<SocketAddr> = tokio::net::lookup_host((host, port))
        .await
        .map_err(error::connect)?
        .collect();

    let mut last_error = None;
    for addr in addrs {
        let attempt = connect_addr(addr, local_address);
        let result = match timeout {
            Some(limit) => match tokio::time::timeout(limit, attempt).await {
                Ok(result) => result,
                Err(elapsed) => Err(std::io::Error::new(std::io::ErrorKind::TimedOut, elapsed)),
            },
            None => attempt.await,
        };

        match result {
            Ok(stream) => {
                stream.set_nodelay(true).map_err(error::connect)?;
                debug!(target: "muxpool::transport", %addr, "tcp connected");
                return Ok(stream);
            }
            Err(err) => {
                debug!(target: "muxpool::transport", %addr, error = %err, "tcp connect failed");
                last_error = Some(err);
            }
        }
    }

    Err(match last_error {
        Some(err) => error::connect(err),
        None => error::connect(format!("no addresses resolved for {host}:{port}")),
    })
}

async fn connect_addr(addr: SocketAddr, local_address: Option<IpAddr>) -> std::io::Result<TcpStream> {
    let socket = if addr.is_ipv4() {
        TcpSocket::new_v4()?
    } else {
        TcpSocket::new_v6()?
    };
    if let Some(local) = local_address {
        if local.is_ipv4() == addr.is_ipv4() {
            socket.bind(SocketAddr::new(local, 0))?;
        }
    }
    socket.connect(addr).await
}

#[cfg(test)]
mod tests {
    use tokio::net::TcpListener;

    use super::*;

    #[tokio::test]
    async fn connects_to_local_listener() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();

        let stream = connect_tcp("127.0.0.1", port, None, Some(Duration::from_secs(5)))
            .await
            .unwrap();
        assert_eq!(stream.peer_addr().unwrap().port(), port);
    }

    #[tokio::test]
    async fn refused_connection_is_connect_error() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let err = connect_tcp("127.0.0.1", port, None, None).await.unwrap_err();
        assert!(err.is_connect());
    }
}
