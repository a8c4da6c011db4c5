//! Byte-stream adapter over an HTTP/2 CONNECT stream

use std::io;
use std::pin::Pin;
use std::task::{Context, Poll, ready};

use bytes::{Buf, Bytes};
use h2::RecvStream;
use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};

use crate::pool::{Agent, PooledStream};
use crate::protocols::H2Handle;
use crate::protocols::h2::release_capacity;

/// Reads DATA frames from and writes DATA frames to an established CONNECT
/// stream. The stream slot goes back to the proxy pool when this is dropped.
pub struct H2Io {
    recv: RecvStream,
    stream: PooledStream<H2Handle>,
    pending: Bytes,
    // proxy pool outlives the tunnel
    _agent: Agent,
}

impl H2Io {
    pub(crate) fn new(recv: RecvStream, stream: PooledStream<H2Handle>, agent: Agent) -> Self {
        Self {
            recv,
            stream,
            pending: Bytes::new(),
            _agent: agent,
        }
    }
}

fn broken_pipe<E: Into<Box<dyn std::error::Error + Send + Sync>>>(err: E) -> io::Error {
    io::Error::new(io::ErrorKind::BrokenPipe, err)
}

impl AsyncRead for H2Io {
    fn poll_read(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        let this = &mut *self;

        while this.pending.is_empty() {
            match ready!(this.recv.poll_data(cx)) {
                Some(Ok(data)) => {
                    release_capacity(&mut this.recv, data.len());
                    this.pending = data;
                }
                Some(Err(err)) => return Poll::Ready(Err(broken_pipe(err))),
                None => return Poll::Ready(Ok(())),
            }
        }

        let len = this.pending.len().min(buf.remaining());
        buf.put_slice(&this.pending[..len]);
        this.pending.advance(len);
        Poll::Ready(Ok(()))
    }
}

impl AsyncWrite for H2Io {
    fn poll_write(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        if buf.is_empty() {
            return Poll::Ready(Ok(0));
        }

        let send = self.stream.send_stream();
        send.reserve_capacity(buf.len());
        match ready!(send.poll_capacity(cx)) {
            Some(Ok(granted)) => {
                let len = granted.min(buf.len());
                send.send_data(Bytes::copy_from_slice(&buf[..len]), false)
                    .map_err(broken_pipe)?;
                Poll::Ready(Ok(len))
            }
            Some(Err(err)) => Poll::Ready(Err(broken_pipe(err))),
            None => Poll::Ready(Err(broken_pipe("tunnel stream closed"))),
        }
    }

    fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }

    fn poll_shutdown(mut self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        let _ = self.stream.send_stream().send_data(Bytes::new(), true);
        Poll::Ready(Ok(()))
    }
}
