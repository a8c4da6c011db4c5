//! Bounded LRU of TLS resumption tickets
//!
//! Entries are named `authorityKey:optionsFingerprint`, so a ticket is only
//! offered back to a session with the same target and connection identity.

use std::collections::VecDeque;
use std::fmt;
use std::num::NonZeroUsize;
use std::sync::Arc;

use bytes::Bytes;
use lru::LruCache;
use parking_lot::Mutex;
use rustls::NamedGroup;
use rustls::client::{Tls12ClientSessionValue, Tls13ClientSessionValue};

/// A resumption ticket and the server name it was negotiated for.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TlsSessionEntry {
    /// Serialized ticket, for connectors that manage tickets themselves.
    pub ticket: Bytes,
    pub servername: Option<String>,
    /// Session state kept by the bundled rustls handshake.
    pub resumption: Option<TlsResumption>,
}

const MAX_TLS13_TICKETS: usize = 8;

/// rustls resumption state for one cache entry.
///
/// Clones share the same state: the cached entry and the connection that
/// filled it see the same tickets, and each TLS 1.3 ticket is handed out once.
#[derive(Clone, Default)]
pub struct TlsResumption {
    state: Arc<Mutex<ResumptionState>>,
}

#[derive(Default)]
struct ResumptionState {
    kx_hint: Option<NamedGroup>,
    tls12: Option<Tls12ClientSessionValue>,
    tls13: VecDeque<Tls13ClientSessionValue>,
}

impl TlsResumption {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stored TLS 1.3 tickets plus a TLS 1.2 session, if any.
    pub fn ticket_count(&self) -> usize {
        let state = self.state.lock();
        state.tls13.len() + usize::from(state.tls12.is_some())
    }

    pub fn is_empty(&self) -> bool {
        self.ticket_count() == 0
    }

    pub(crate) fn set_kx_hint(&self, group: NamedGroup) {
        self.state.lock().kx_hint = Some(group);
    }

    pub(crate) fn kx_hint(&self) -> Option<NamedGroup> {
        self.state.lock().kx_hint
    }

    pub(crate) fn set_tls12(&self, value: Tls12ClientSessionValue) {
        self.state.lock().tls12 = Some(value);
    }

    pub(crate) fn tls12(&self) -> Option<Tls12ClientSessionValue> {
        self.state.lock().tls12.clone()
    }

    pub(crate) fn remove_tls12(&self) {
        self.state.lock().tls12 = None;
    }

    pub(crate) fn push_tls13(&self, value: Tls13ClientSessionValue) {
        let mut state = self.state.lock();
        if state.tls13.len() == MAX_TLS13_TICKETS {
            state.tls13.pop_front();
        }
        state.tls13.push_back(value);
    }

    pub(crate) fn take_tls13(&self) -> Option<Tls13ClientSessionValue> {
        self.state.lock().tls13.pop_back()
    }
}

impl PartialEq for TlsResumption {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.state, &other.state)
    }
}

impl Eq for TlsResumption {}

impl fmt::Debug for TlsResumption {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TlsResumption")
            .field("tickets", &self.ticket_count())
            .finish()
    }
}

#[derive(Debug)]
pub struct TlsSessionCache {
    entries: Mutex<LruCache<String, TlsSessionEntry>>,
}

impl TlsSessionCache {
    /// A capacity of zero is raised to one.
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            entries: Mutex::new(LruCache::new(capacity)),
        }
    }

    pub fn cache_name(authority_key: &str, fingerprint: &str) -> String {
        format!("{authority_key}:{fingerprint}")
    }

    /// Look up an entry and mark it as recently used.
    pub fn get(&self, name: &str) -> Option<TlsSessionEntry> {
        self.entries.lock().get(name).cloned()
    }

    pub fn insert(&self, name: String, entry: TlsSessionEntry) {
        self.entries.lock().put(name, entry);
    }

    /// Drop the entry for a session that errored.
    pub fn purge(&self, name: &str) -> Option<TlsSessionEntry> {
        self.entries.lock().pop(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.lock().contains(name)
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.entries.lock().cap().get()
    }

    pub fn clear(&self) {
        self.entries.lock().clear();
    }
}
