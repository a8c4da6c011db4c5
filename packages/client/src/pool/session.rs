//! Pooled session entity
//!
//! Stream counter, capacity and lifecycle state belong to the session but are
//! only ever mutated by the owning pool, under the pool lock.

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};

use parking_lot::Mutex;

use crate::http::Authority;

use super::transport::SessionHandle;

static NEXT_SESSION_ID: AtomicU64 = AtomicU64::new(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Handshake in progress, settings not yet received
    Connecting,
    /// Usable, below capacity
    Free,
    /// Usable, at or above capacity
    Busy,
    /// Graceful close requested, no new streams
    Closing,
    Closed,
}

/// One physical multiplexed connection owned by a pool.
pub struct Session<H> {
    id: u64,
    authority: Authority,
    fingerprint: String,
    pub(crate) handle: H,
    origins: Mutex<Vec<String>>,
    capacity: AtomicUsize,
    streams: AtomicUsize,
    state: Mutex<SessionState>,
    settings_received: AtomicBool,
    idle_epoch: AtomicU64,
    stream_cap: Option<u32>,
}

impl<H: SessionHandle> Session<H> {
    pub(crate) fn new(
        authority: Authority,
        fingerprint: String,
        handle: H,
        stream_cap: Option<u32>,
    ) -> Self {
        Self {
            id: NEXT_SESSION_ID.fetch_add(1, Ordering::Relaxed),
            origins: Mutex::new(vec![authority.key().to_string()]),
            authority,
            fingerprint,
            handle,
            capacity: AtomicUsize::new(0),
            streams: AtomicUsize::new(0),
            state: Mutex::new(SessionState::Connecting),
            settings_received: AtomicBool::new(false),
            idle_epoch: AtomicU64::new(0),
            stream_cap,
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    /// The authority this session was opened for.
    pub fn authority(&self) -> &Authority {
        &self.authority
    }

    pub fn fingerprint(&self) -> &str {
        &self.fingerprint
    }

    /// Handle to the underlying transport session.
    pub fn handle(&self) -> &H {
        &self.handle
    }

    /// Authority keys this session may serve. Starts with its own and only grows.
    pub fn origins(&self) -> Vec<String> {
        self.origins.lock().clone()
    }

    pub fn serves(&self, authority_key: &str) -> bool {
        self.origins.lock().iter().any(|origin| origin == authority_key)
    }

    /// Whether every origin of `other` is also served by this session.
    pub fn covers(&self, other: &Session<H>) -> bool {
        if std::ptr::eq(self, other) {
            return true;
        }
        let mine = self.origins.lock();
        other.origins.lock().iter().all(|origin| mine.contains(origin))
    }

    pub fn capacity(&self) -> usize {
        self.capacity.load(Ordering::Acquire)
    }

    pub fn current_streams(&self) -> usize {
        self.streams.load(Ordering::Acquire)
    }

    pub fn has_capacity(&self) -> bool {
        self.current_streams() < self.capacity()
    }

    pub fn state(&self) -> SessionState {
        *self.state.lock()
    }

    pub fn is_settled(&self) -> bool {
        self.settings_received.load(Ordering::Acquire)
    }

    /// Closing or closed; the pool no longer routes streams to it.
    pub fn is_retired(&self) -> bool {
        matches!(self.state(), SessionState::Closing | SessionState::Closed)
    }

    pub(crate) fn set_state(&self, state: SessionState) {
        *self.state.lock() = state;
    }

    /// Apply the peer's advertised limit, bounded by the configured cap.
    pub(crate) fn set_capacity(&self, max_concurrent_streams: u32) -> usize {
        let capped = match self.stream_cap {
            Some(cap) => max_concurrent_streams.min(cap),
            None => max_concurrent_streams,
        };
        let capacity = capped as usize;
        self.capacity.store(capacity, Ordering::Release);
        capacity
    }

    /// Returns true on the first call only.
    pub(crate) fn mark_settled(&self) -> bool {
        !self.settings_received.swap(true, Ordering::AcqRel)
    }

    /// Add origins, ignoring duplicates. Returns how many were new.
    pub(crate) fn extend_origins(&self, keys: impl IntoIterator<Item = String>) -> usize {
        let mut origins = self.origins.lock();
        let before = origins.len();
        for key in keys {
            if !origins.contains(&key) {
                origins.push(key);
            }
        }
        origins.len() - before
    }

    pub(crate) fn increment_streams(&self) -> usize {
        self.idle_epoch.fetch_add(1, Ordering::AcqRel);
        self.streams.fetch_add(1, Ordering::AcqRel) + 1
    }

    pub(crate) fn decrement_streams(&self) -> usize {
        let previous = self
            .streams
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| Some(n.saturating_sub(1)))
            .unwrap_or(0);
        previous.saturating_sub(1)
    }

    /// Invalidate any armed idle timer and return the new epoch.
    pub(crate) fn next_idle_epoch(&self) -> u64 {
        self.idle_epoch.fetch_add(1, Ordering::AcqRel) + 1
    }

    pub(crate) fn idle_epoch(&self) -> u64 {
        self.idle_epoch.load(Ordering::Acquire)
    }
}

impl<H> fmt::Debug for Session<H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.id)
            .field("authority", &self.authority.key())
            .field("state", &*self.state.lock())
            .field("capacity", &self.capacity.load(Ordering::Relaxed))
            .field("streams", &self.streams.load(Ordering::Relaxed))
            .finish()
    }
}
