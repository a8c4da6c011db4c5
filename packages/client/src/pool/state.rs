//! Pool bookkeeping guarded by the agent lock

use std::collections::BTreeMap;
use std::sync::Arc;

use hashbrown::HashMap;

use super::queue::QueueEntry;
use super::session::Session;
use super::stream::PooledStream;
use super::transport::SessionHandle;

/// fingerprint -> authority key -> sessions
pub(crate) struct SessionSet<H> {
    by_fingerprint: HashMap<String, BTreeMap<String, Vec<Arc<Session<H>>>>>,
}

impl<H: SessionHandle> SessionSet<H> {
    pub(crate) fn new() -> Self {
        Self {
            by_fingerprint: HashMap::new(),
        }
    }

    pub(crate) fn insert(&mut self, session: Arc<Session<H>>) {
        self.by_fingerprint
            .entry(session.fingerprint().to_string())
            .or_default()
            .entry(session.authority().key().to_string())
            .or_default()
            .push(session);
    }

    pub(crate) fn remove(&mut self, session: &Session<H>) -> bool {
        let Some(by_authority) = self.by_fingerprint.get_mut(session.fingerprint()) else {
            return false;
        };
        let Some(sessions) = by_authority.get_mut(session.authority().key()) else {
            return false;
        };
        let before = sessions.len();
        sessions.retain(|candidate| candidate.id() != session.id());
        let removed = sessions.len() != before;

        if sessions.is_empty() {
            by_authority.remove(session.authority().key());
        }
        if by_authority.is_empty() {
            self.by_fingerprint.remove(session.fingerprint());
        }
        removed
    }

    pub(crate) fn contains(&self, session: &Session<H>) -> bool {
        self.by_fingerprint
            .get(session.fingerprint())
            .and_then(|by_authority| by_authority.get(session.authority().key()))
            .is_some_and(|sessions| sessions.iter().any(|s| s.id() == session.id()))
    }

    /// The session under capacity serving `authority_key` with the most open
    /// streams. Sessions opened for the authority itself are scanned first;
    /// equal counts keep the earlier match.
    pub(crate) fn best_for(&self, fingerprint: &str, authority_key: &str) -> Option<Arc<Session<H>>> {
        let by_authority = self.by_fingerprint.get(fingerprint)?;
        let own = by_authority.get(authority_key).into_iter().flatten();
        let others = by_authority
            .iter()
            .filter(|(key, _)| key.as_str() != authority_key)
            .flat_map(|(_, sessions)| sessions.iter());

        let mut best: Option<&Arc<Session<H>>> = None;
        for session in own.chain(others) {
            if !session.has_capacity() || !session.serves(authority_key) {
                continue;
            }
            match best {
                Some(current) if session.current_streams() <= current.current_streams() => {}
                _ => best = Some(session),
            }
        }
        best.cloned()
    }

    pub(crate) fn count(&self, fingerprint: &str) -> usize {
        self.by_fingerprint
            .get(fingerprint)
            .map_or(0, |by_authority| by_authority.values().map(Vec::len).sum())
    }

    pub(crate) fn len(&self) -> usize {
        self.by_fingerprint.keys().map(|fp| self.count(fp)).sum()
    }

    /// Snapshot of every session for one fingerprint.
    pub(crate) fn snapshot(&self, fingerprint: &str) -> Vec<Arc<Session<H>>> {
        self.by_fingerprint
            .get(fingerprint)
            .map(|by_authority| by_authority.values().flatten().cloned().collect())
            .unwrap_or_default()
    }

    /// Snapshot of every session in the set.
    pub(crate) fn snapshot_all(&self) -> Vec<Arc<Session<H>>> {
        self.by_fingerprint
            .values()
            .flat_map(|by_authority| by_authority.values().flatten().cloned())
            .collect()
    }

    pub(crate) fn drain(&mut self) -> Vec<Arc<Session<H>>> {
        let sessions = self.snapshot_all();
        self.by_fingerprint.clear();
        sessions
    }
}

pub(crate) struct PoolState<H: SessionHandle> {
    pub(crate) free: SessionSet<H>,
    pub(crate) busy: SessionSet<H>,
    /// Sessions still waiting for their first settings
    pub(crate) pending: HashMap<u64, Arc<Session<H>>>,
    /// fingerprint -> attempts in arrival order, at most one per authority key
    pub(crate) queue: HashMap<String, Vec<QueueEntry<H>>>,
    /// Streams that could not be delivered; dropped after the lock is released
    pub(crate) orphans: Vec<PooledStream<H>>,
}

impl<H: SessionHandle> PoolState<H> {
    pub(crate) fn new() -> Self {
        Self {
            free: SessionSet::new(),
            busy: SessionSet::new(),
            pending: HashMap::new(),
            queue: HashMap::new(),
            orphans: Vec::new(),
        }
    }

    /// Remove a session from every collection. Returns true if it was tracked.
    pub(crate) fn untrack(&mut self, session: &Session<H>) -> bool {
        let in_free = self.free.remove(session);
        let in_busy = self.busy.remove(session);
        let pending = self.pending.remove(&session.id()).is_some();
        in_free || in_busy || pending
    }

    /// Take the attempt that produced `session_id` out of the queue.
    pub(crate) fn take_entry(&mut self, fingerprint: &str, session_id: u64) -> Option<QueueEntry<H>> {
        let entries = self.queue.get_mut(fingerprint)?;
        let index = entries
            .iter()
            .position(|entry| entry.session_id == Some(session_id))?;
        let entry = entries.remove(index);
        if entries.is_empty() {
            self.queue.remove(fingerprint);
        }
        Some(entry)
    }

    pub(crate) fn entry_for(&mut self, fingerprint: &str, authority_key: &str) -> Option<&mut QueueEntry<H>> {
        self.queue
            .get_mut(fingerprint)?
            .iter_mut()
            .find(|entry| entry.authority.key() == authority_key)
    }

    pub(crate) fn queued_attempts(&self) -> usize {
        self.queue.values().map(Vec::len).sum()
    }
}
