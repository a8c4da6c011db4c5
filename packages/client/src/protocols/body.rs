//! Response bodies for either dispatch path

use std::fmt;

use bytes::{Bytes, BytesMut};
use h2::RecvStream;
use http_body_util::BodyExt;
use hyper::body::Incoming;

use crate::error::{self, Result};
use crate::pool::{Agent, PooledStream};

use super::h2::{H2Handle, release_capacity};

/// Body of a response obtained through a [`Dispatcher`](super::auto::Dispatcher).
pub enum Body {
    /// Data frames of a pooled HTTP/2 stream. The stream slot is returned to
    /// its pool once the body ends or is dropped.
    Multiplexed {
        recv: RecvStream,
        stream: PooledStream<H2Handle>,
        // keeps one-off pools alive until the body is done
        agent: Agent,
    },
    Legacy(Incoming),
}

impl Body {
    /// Next chunk of data, or `None` at the end of the body.
    ///
    /// # Errors
    ///
    /// Returns a stream error for HTTP/2 resets and a request error for
    /// HTTP/1.1 read failures.
    pub async fn chunk(&mut self) -> Result<Option<Bytes>> {
        match self {
            Body::Multiplexed { recv, stream, .. } => match recv.data().await {
                Some(Ok(data)) => {
                    release_capacity(recv, data.len());
                    Ok(Some(data))
                }
                Some(Err(err)) => {
                    stream.close();
                    Err(error::stream(err))
                }
                None => {
                    stream.close();
                    Ok(None)
                }
            },
            Body::Legacy(incoming) => loop {
                match incoming.frame().await {
                    Some(Ok(frame)) => {
                        if let Ok(data) = frame.into_data() {
                            return Ok(Some(data));
                        }
                    }
                    Some(Err(err)) => return Err(error::request(err)),
                    None => return Ok(None),
                }
            },
        }
    }

    /// Read the remaining body into one buffer.
    ///
    /// # Errors
    ///
    /// See [`Body::chunk`].
    pub async fn collect(mut self) -> Result<Bytes> {
        let mut buf = BytesMut::new();
        while let Some(chunk) = self.chunk().await? {
            buf.extend_from_slice(&chunk);
        }
        Ok(buf.freeze())
    }

    pub fn is_multiplexed(&self) -> bool {
        matches!(self, Body::Multiplexed { .. })
    }
}

impl fmt::Debug for Body {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Body::Multiplexed { stream, agent, .. } => f
                .debug_struct("Body::Multiplexed")
                .field("stream", stream)
                .field("agent", agent)
                .finish(),
            Body::Legacy(_) => f.write_str("Body::Legacy"),
        }
    }
}
