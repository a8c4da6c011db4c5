use std::collections::VecDeque;
use std::sync::Arc;

use tokio::sync::oneshot;

use crate::error::{Error, Result};
use crate::http::Authority;

use super::options::SessionOptions;
use super::session::Session;
use super::stream::PooledStream;
use super::transport::{RequestHead, SessionHandle};

/// A caller waiting for a session or for a stream on one.
pub(crate) enum Listener<H: SessionHandle> {
    Session(oneshot::Sender<Result<Arc<Session<H>>>>),
    Stream {
        head: RequestHead,
        tx: oneshot::Sender<Result<PooledStream<H>>>,
    },
}

impl<H: SessionHandle> Listener<H> {
    /// The caller dropped its future.
    pub(crate) fn is_canceled(&self) -> bool {
        match self {
            Listener::Session(tx) => tx.is_closed(),
            Listener::Stream { tx, .. } => tx.is_closed(),
        }
    }

    pub(crate) fn reject(self, error: Error) {
        // a closed receiver has nobody left to inform
        match self {
            Listener::Session(tx) => {
                let _ = tx.send(Err(error));
            }
            Listener::Stream { tx, .. } => {
                let _ = tx.send(Err(error));
            }
        }
    }
}

/// One in-flight connection attempt for a (fingerprint, authority) pair.
pub(crate) struct QueueEntry<H: SessionHandle> {
    pub(crate) authority: Authority,
    pub(crate) options: SessionOptions,
    pub(crate) listeners: VecDeque<Listener<H>>,
    pub(crate) started: bool,
    pub(crate) completed: bool,
    pub(crate) session_id: Option<u64>,
}

impl<H: SessionHandle> QueueEntry<H> {
    pub(crate) fn new(authority: Authority, options: SessionOptions) -> Self {
        Self {
            authority,
            options,
            listeners: VecDeque::new(),
            started: false,
            completed: false,
            session_id: None,
        }
    }

    pub(crate) fn prune_canceled(&mut self) {
        self.listeners.retain(|listener| !listener.is_canceled());
    }

    pub(crate) fn reject_all(&mut self, error: &Error) {
        self.completed = true;
        for listener in self.listeners.drain(..) {
            listener.reject(error.clone());
        }
    }
}
