//! Streams checked out of the pool
//!
//! A `PooledStream` returns its slot to the owning session when it is closed,
//! cancelled or dropped, whichever happens first.

use std::fmt;
use std::future::Future;
use std::ops::{Deref, DerefMut};
use std::pin::Pin;
use std::sync::{Arc, Weak};
use std::task::{Context, Poll};
use std::time::Duration;

use pin_project_lite::pin_project;
use tokio::time::Sleep;

use super::session::Session;
use super::transport::{MuxStream, SessionHandle};

/// Returns a stream slot to the pool that handed it out.
pub(crate) trait StreamReleaser<H: SessionHandle>: Send + Sync {
    fn release(&self, session: &Arc<Session<H>>);
}

/// A stream opened through the pool.
pub struct PooledStream<H: SessionHandle> {
    stream: H::Stream,
    session: Arc<Session<H>>,
    releaser: Weak<dyn StreamReleaser<H>>,
    released: bool,
}

impl<H: SessionHandle> PooledStream<H> {
    pub(crate) fn new(
        stream: H::Stream,
        session: Arc<Session<H>>,
        releaser: Weak<dyn StreamReleaser<H>>,
    ) -> Self {
        Self {
            stream,
            session,
            releaser,
            released: false,
        }
    }

    /// The session carrying this stream.
    pub fn session(&self) -> &Arc<Session<H>> {
        &self.session
    }

    /// Mark the stream finished and give its slot back to the pool.
    pub fn close(&mut self) {
        self.release();
    }

    /// Reset the stream locally and give its slot back without waiting for
    /// the peer to acknowledge.
    pub fn cancel(&mut self) {
        if !self.released {
            self.stream.cancel();
        }
        self.release();
    }

    pub fn is_released(&self) -> bool {
        self.released
    }

    /// An advisory timer for this request. It only reports that `after`
    /// elapsed; aborting is up to the caller.
    pub fn timer(&self, after: Duration) -> RequestTimer {
        RequestTimer {
            sleep: tokio::time::sleep(after),
            after,
        }
    }

    fn release(&mut self) {
        if std::mem::replace(&mut self.released, true) {
            return;
        }
        if let Some(releaser) = self.releaser.upgrade() {
            releaser.release(&self.session);
        }
    }
}

impl<H: SessionHandle> Deref for PooledStream<H> {
    type Target = H::Stream;

    fn deref(&self) -> &Self::Target {
        &self.stream
    }
}

impl<H: SessionHandle> DerefMut for PooledStream<H> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.stream
    }
}

impl<H: SessionHandle> Drop for PooledStream<H> {
    fn drop(&mut self) {
        self.release();
    }
}

impl<H: SessionHandle> fmt::Debug for PooledStream<H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PooledStream")
            .field("session", &self.session.id())
            .field("released", &self.released)
            .finish()
    }
}

/// Reported by [`RequestTimer`] once its duration has elapsed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequestTimeout {
    pub after: Duration,
}

pin_project! {
    /// Advisory per-request timer, see [`PooledStream::timer`].
    #[derive(Debug)]
    #[must_use = "timers do nothing unless polled"]
    pub struct RequestTimer {
        #[pin]
        sleep: Sleep,
        after: Duration,
    }
}

impl Future for RequestTimer {
    type Output = RequestTimeout;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.project();
        match this.sleep.poll(cx) {
            Poll::Ready(()) => Poll::Ready(RequestTimeout { after: *this.after }),
            Poll::Pending => Poll::Pending,
        }
    }
}
