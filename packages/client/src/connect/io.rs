//! Byte-stream abstraction shared by direct sockets, TLS streams and tunnels

use std::io;
use std::net::SocketAddr;
use std::pin::Pin;
use std::task::{Context, Poll};

use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};
use tokio::net::TcpStream;

/// What is known about the far end of a connection.
///
/// Tunneled streams have no network-level peer; their info is synthesized
/// from the target authority and whatever protocol the tunnel reported.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConnectionInfo {
    pub remote_addr: Option<SocketAddr>,
    /// `host:port` the bytes are ultimately exchanged with
    pub authority: Option<String>,
    /// Negotiated application protocol
    pub alpn: Option<Vec<u8>>,
    pub tunneled: bool,
}

impl ConnectionInfo {
    pub fn negotiated_h2(&self) -> bool {
        self.alpn.as_deref() == Some(&b"h2"[..])
    }
}

/// A connected byte stream the session layer can run over.
pub trait Io: AsyncRead + AsyncWrite + Send + Unpin + 'static {
    fn connection_info(&self) -> ConnectionInfo;
}

pub type BoxIo = Box<dyn Io>;

impl Io for TcpStream {
    fn connection_info(&self) -> ConnectionInfo {
        ConnectionInfo {
            remote_addr: self.peer_addr().ok(),
            authority: None,
            alpn: None,
            tunneled: false,
        }
    }
}

impl<T: Io> Io for tokio_rustls::client::TlsStream<T> {
    fn connection_info(&self) -> ConnectionInfo {
        let (io, session) = self.get_ref();
        let mut info = io.connection_info();
        info.alpn = session.alpn_protocol().map(<[u8]>::to_vec);
        info
    }
}

impl Io for BoxIo {
    fn connection_info(&self) -> ConnectionInfo {
        (**self).connection_info()
    }
}

/// Wraps a stream that is not a socket and reports synthesized info for it.
pub struct TunnelIo<T> {
    inner: T,
    info: ConnectionInfo,
}

impl<T> TunnelIo<T> {
    pub fn new(inner: T, authority: String, alpn: Option<Vec<u8>>) -> Self {
        Self {
            inner,
            info: ConnectionInfo {
                remote_addr: None,
                authority: Some(authority),
                alpn,
                tunneled: true,
            },
        }
    }

    pub fn into_inner(self) -> T {
        self.inner
    }
}

impl<T> Io for TunnelIo<T>
where
    T: AsyncRead + AsyncWrite + Send + Unpin + 'static,
{
    fn connection_info(&self) -> ConnectionInfo {
        self.info.clone()
    }
}

impl<T: AsyncRead + Unpin> AsyncRead for TunnelIo<T> {
    fn poll_read(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        Pin::new(&mut self.inner).poll_read(cx, buf)
    }
}

impl<T: AsyncWrite + Unpin> AsyncWrite for TunnelIo<T> {
    fn poll_write(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        Pin::new(&mut self.inner).poll_write(cx, buf)
    }

    fn poll_flush(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.inner).poll_flush(cx)
    }

    fn poll_shutdown(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.inner).poll_shutdown(cx)
    }
}
