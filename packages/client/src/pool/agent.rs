//! Session pool
//!
//! An `Agent` hands out sessions and streams for target authorities. It
//! reuses free sessions, deduplicates concurrent connection attempts, bounds
//! the number of sessions per options fingerprint and evicts sessions that
//! another session can absorb.
//!
//! All bookkeeping lives in one `PoolState` behind a mutex that is never held
//! across an await point. Each session's events are applied in order by a
//! dedicated task holding only a weak reference to the pool.

use std::collections::VecDeque;
use std::fmt;
use std::mem;
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, trace, warn};

use crate::cache::TlsSessionCache;
use crate::config::AgentConfig;
use crate::error::{self, Error, Result};
use crate::http::{Authority, IntoTarget};
use crate::telemetry::{PoolStats, PoolStatsSnapshot};

use super::options::SessionOptions;
use super::queue::{Listener, QueueEntry};
use super::session::{Session, SessionState};
use super::state::PoolState;
use super::stream::{PooledStream, StreamReleaser};
use super::transport::{Connecting, RequestHead, SessionConnector, SessionEvent, SessionHandle};

type HandleOf<C> = <C as SessionConnector>::Handle;

/// A pool of multiplexed sessions.
///
/// Cloning an `Agent` yields another handle to the same pool.
pub struct Agent<C: SessionConnector = crate::protocols::H2Connector> {
    shared: Arc<Shared<C>>,
}

struct Shared<C: SessionConnector> {
    me: Weak<Shared<C>>,
    connector: C,
    config: AgentConfig,
    state: Mutex<PoolState<HandleOf<C>>>,
    tls_cache: TlsSessionCache,
    stats: PoolStats,
}

impl Agent {
    /// Create a pool using the bundled HTTP/2 connector.
    ///
    /// # Errors
    ///
    /// Returns a builder error if `config` fails validation.
    pub fn new(config: AgentConfig) -> Result<Self> {
        Self::with_connector(crate::protocols::H2Connector::default(), config)
    }
}

impl<C: SessionConnector> Agent<C> {
    /// Create a pool over a custom connector.
    ///
    /// # Errors
    ///
    /// Returns a builder error if `config` fails validation.
    pub fn with_connector(connector: C, config: AgentConfig) -> Result<Self> {
        config.validate()?;
        let tls_cache = TlsSessionCache::new(config.max_cached_tls_sessions);
        let shared = Arc::new_cyclic(|me| Shared {
            me: me.clone(),
            connector,
            config,
            state: Mutex::new(PoolState::new()),
            tls_cache,
            stats: PoolStats::default(),
        });
        Ok(Self { shared })
    }

    /// Wait for a usable session serving `target`.
    ///
    /// # Errors
    ///
    /// Fails with the error of the connection attempt this call waited on, or
    /// with a builder error if `target` is not an http(s) authority.
    pub async fn get_session(
        &self,
        target: impl IntoTarget,
        options: &SessionOptions,
    ) -> Result<Arc<Session<HandleOf<C>>>> {
        let authority = target.into_authority()?;
        let (tx, rx) = oneshot::channel();
        self.shared
            .enqueue(authority, options.clone(), Listener::Session(tx));
        rx.await.map_err(|_| error::canceled())?
    }

    /// Wait for a session serving `target` and open a stream on it.
    ///
    /// Dropping the returned future before it resolves guarantees no stream
    /// is opened on its behalf.
    ///
    /// # Errors
    ///
    /// Fails like [`Agent::get_session`], or with a stream error if the
    /// transport refuses the stream.
    pub async fn open_stream(
        &self,
        target: impl IntoTarget,
        options: &SessionOptions,
        head: RequestHead,
    ) -> Result<PooledStream<HandleOf<C>>> {
        let authority = target.into_authority()?;
        let (tx, rx) = oneshot::channel();
        self.shared
            .enqueue(authority, options.clone(), Listener::Stream { head, tx });
        rx.await.map_err(|_| error::canceled())?
    }

    /// Send a request head on a pooled stream. Same as [`Agent::open_stream`].
    ///
    /// # Errors
    ///
    /// See [`Agent::open_stream`].
    pub async fn request(
        &self,
        target: impl IntoTarget,
        options: &SessionOptions,
        head: RequestHead,
    ) -> Result<PooledStream<HandleOf<C>>> {
        self.open_stream(target, options, head).await
    }

    /// Open a stream on a session previously returned by [`Agent::get_session`].
    ///
    /// # Errors
    ///
    /// Returns a stream error if the session is no longer pooled or is at capacity.
    pub fn open_stream_on(
        &self,
        session: &Arc<Session<HandleOf<C>>>,
        head: RequestHead,
    ) -> Result<PooledStream<HandleOf<C>>> {
        self.shared.with_state(|state| {
            if !state.free.contains(session) && !state.busy.contains(session) {
                return Err(error::stream(error::SessionClosing));
            }
            self.shared.open_on(state, session, head)
        })
    }

    /// Gracefully close every session with no open streams.
    pub fn close_idle_sessions(&self) {
        self.shared.close_idle_sessions();
    }

    /// Destroy every session and reject every waiting caller.
    ///
    /// The pool stays usable; later calls start new sessions.
    pub fn destroy(&self, reason: Option<&str>) {
        self.shared.destroy(reason);
    }

    /// Number of free plus busy sessions.
    pub fn session_count(&self) -> usize {
        let state = self.shared.state.lock();
        state.free.len() + state.busy.len()
    }

    pub fn free_session_count(&self) -> usize {
        self.shared.state.lock().free.len()
    }

    pub fn busy_session_count(&self) -> usize {
        self.shared.state.lock().busy.len()
    }

    /// Sessions still waiting for their first settings.
    pub fn pending_session_count(&self) -> usize {
        self.shared.state.lock().pending.len()
    }

    /// Connection attempts currently queued or in flight.
    pub fn queued_attempt_count(&self) -> usize {
        self.shared.state.lock().queued_attempts()
    }

    pub fn stats(&self) -> PoolStatsSnapshot {
        self.shared.stats.snapshot()
    }

    pub fn tls_session_cache(&self) -> &TlsSessionCache {
        &self.shared.tls_cache
    }

    pub fn config(&self) -> &AgentConfig {
        &self.shared.config
    }

    pub fn connector(&self) -> &C {
        &self.shared.connector
    }

    /// Whether two handles refer to the same pool.
    pub fn same_pool(&self, other: &Agent<C>) -> bool {
        Arc::ptr_eq(&self.shared, &other.shared)
    }
}

impl<C: SessionConnector> Clone for Agent<C> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<C: SessionConnector> fmt::Debug for Agent<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.shared.state.lock();
        f.debug_struct("Agent")
            .field("free", &state.free.len())
            .field("busy", &state.busy.len())
            .field("pending", &state.pending.len())
            .field("queued", &state.queued_attempts())
            .finish()
    }
}

impl<C: SessionConnector> Shared<C> {
    /// Run `f` under the pool lock, then drop undeliverable streams once the
    /// lock is released (dropping them re-enters the pool).
    fn with_state<R>(&self, f: impl FnOnce(&mut PoolState<HandleOf<C>>) -> R) -> R {
        let (result, orphans) = {
            let mut state = self.state.lock();
            let result = f(&mut state);
            (result, mem::take(&mut state.orphans))
        };
        drop(orphans);
        result
    }

    fn enqueue(&self, authority: Authority, options: SessionOptions, listener: Listener<HandleOf<C>>) {
        self.with_state(|state| self.admit(state, authority, options, listener));
    }

    fn admit(
        &self,
        state: &mut PoolState<HandleOf<C>>,
        authority: Authority,
        options: SessionOptions,
        listener: Listener<HandleOf<C>>,
    ) {
        let fingerprint = options.fingerprint();

        if let Some(session) = state.free.best_for(&fingerprint, authority.key()) {
            trace!(
                target: "muxpool::pool",
                authority = %authority,
                session_id = session.id(),
                "reusing free session"
            );
            PoolStats::bump(&self.stats.reuse_hits);
            self.serve(state, listener, &session);
            return;
        }

        if let Some(entry) = state.entry_for(&fingerprint, authority.key()) {
            trace!(target: "muxpool::pool", authority = %authority, "joining queued attempt");
            entry.listeners.push_back(listener);
            PoolStats::bump(&self.stats.queue_joins);
            return;
        }

        let mut entry = QueueEntry::new(authority, options);
        entry.listeners.push_back(listener);
        state.queue.entry(fingerprint.clone()).or_default().push(entry);
        self.process_queue(state, &fingerprint);
    }

    /// Hand `listener` its session, or open its stream on `session`.
    fn serve(
        &self,
        state: &mut PoolState<HandleOf<C>>,
        listener: Listener<HandleOf<C>>,
        session: &Arc<Session<HandleOf<C>>>,
    ) {
        match listener {
            Listener::Session(tx) => {
                let _ = tx.send(Ok(Arc::clone(session)));
            }
            Listener::Stream { head, tx } => {
                if tx.is_closed() {
                    return;
                }
                match self.open_on(state, session, head) {
                    Ok(stream) => {
                        if let Err(Ok(stream)) = tx.send(Ok(stream)) {
                            state.orphans.push(stream);
                        }
                    }
                    Err(err) => {
                        let _ = tx.send(Err(err));
                    }
                }
            }
        }
    }

    fn open_on(
        &self,
        state: &mut PoolState<HandleOf<C>>,
        session: &Arc<Session<HandleOf<C>>>,
        head: RequestHead,
    ) -> Result<PooledStream<HandleOf<C>>> {
        if session.is_retired() {
            return Err(error::stream(error::SessionClosing));
        }
        if !session.has_capacity() {
            return Err(error::stream("session has no spare stream capacity"));
        }

        let stream = session.handle.open_stream(head)?;
        let streams = session.increment_streams();
        PoolStats::bump(&self.stats.streams_opened);

        if streams >= session.capacity() && state.free.remove(session) {
            session.set_state(SessionState::Busy);
            state.busy.insert(Arc::clone(session));
            debug!(
                target: "muxpool::pool",
                session_id = session.id(),
                streams,
                "session reached capacity"
            );
        }

        let releaser: Weak<dyn StreamReleaser<HandleOf<C>>> = self.me.clone();
        Ok(PooledStream::new(stream, Arc::clone(session), releaser))
    }

    /// Serve waiting attempts for `fingerprint` from free sessions and start
    /// new attempts while the session limit allows.
    fn process_queue(&self, state: &mut PoolState<HandleOf<C>>, fingerprint: &str) {
        let Some(entries) = state.queue.remove(fingerprint) else {
            return;
        };
        let mut started = entries.iter().filter(|entry| entry.started).count();
        let mut kept = Vec::with_capacity(entries.len());

        for mut entry in entries {
            if entry.started {
                kept.push(entry);
                continue;
            }

            entry.prune_canceled();
            while !entry.listeners.is_empty() {
                let Some(session) = state.free.best_for(fingerprint, entry.authority.key()) else {
                    break;
                };
                if let Some(listener) = entry.listeners.pop_front() {
                    PoolStats::bump(&self.stats.reuse_hits);
                    self.serve(state, listener, &session);
                }
            }
            if entry.listeners.is_empty() {
                continue;
            }

            if state.busy.count(fingerprint) + started < self.config.max_sessions {
                if self.start_entry(state, &mut entry) {
                    started += 1;
                    kept.push(entry);
                }
            } else {
                trace!(
                    target: "muxpool::pool",
                    authority = %entry.authority,
                    "session limit reached, attempt stays queued"
                );
                kept.push(entry);
            }
        }

        if !kept.is_empty() {
            // handlers above may have queued fresh attempts for this fingerprint
            let fresh = state.queue.remove(fingerprint).unwrap_or_default();
            kept.extend(fresh);
            state.queue.insert(fingerprint.to_string(), kept);
        }
    }

    /// Begin a connection attempt. Returns false if it failed to start, in
    /// which case every listener has been rejected.
    fn start_entry(&self, state: &mut PoolState<HandleOf<C>>, entry: &mut QueueEntry<HandleOf<C>>) -> bool {
        let fingerprint = entry.options.fingerprint();
        let tls_name = TlsSessionCache::cache_name(entry.authority.key(), &fingerprint);
        let cached = self.tls_cache.get(&tls_name);
        if cached.is_some() {
            PoolStats::bump(&self.stats.tls_cache_hits);
        }

        let runtime = match tokio::runtime::Handle::try_current() {
            Ok(runtime) => runtime,
            Err(err) => {
                entry.reject_all(&error::connect(err));
                return false;
            }
        };

        let Connecting { handle, events } =
            match self.connector.connect(&entry.authority, &entry.options, cached) {
                Ok(connecting) => connecting,
                Err(err) => {
                    warn!(
                        target: "muxpool::pool",
                        authority = %entry.authority,
                        error = %err,
                        "connection attempt failed to start"
                    );
                    self.tls_cache.purge(&tls_name);
                    entry.reject_all(&err);
                    return false;
                }
            };

        let session = Arc::new(Session::new(
            entry.authority.clone(),
            fingerprint,
            handle,
            entry.options.peer_max_concurrent_streams,
        ));
        entry.started = true;
        entry.session_id = Some(session.id());
        state.pending.insert(session.id(), Arc::clone(&session));
        PoolStats::bump(&self.stats.sessions_created);

        debug!(
            target: "muxpool::pool",
            authority = %entry.authority,
            session_id = session.id(),
            "connecting session"
        );

        runtime.spawn(drive(self.me.clone(), session, events));
        true
    }

    fn on_settings(&self, session: &Arc<Session<HandleOf<C>>>, max_concurrent_streams: u32) {
        self.with_state(|state| {
            if session.is_retired() {
                return;
            }
            let capacity = session.set_capacity(max_concurrent_streams);

            if !session.mark_settled() {
                self.reclassify(state, session);
                if session.has_capacity() {
                    self.process_queue(state, session.fingerprint());
                }
                return;
            }

            state.pending.remove(&session.id());
            let mut entry = state.take_entry(session.fingerprint(), session.id());
            self.place(state, session);

            debug!(
                target: "muxpool::pool",
                session_id = session.id(),
                authority = %session.authority(),
                capacity,
                "session ready"
            );

            let mut listeners = entry
                .as_mut()
                .map(|entry| {
                    entry.completed = true;
                    mem::take(&mut entry.listeners)
                })
                .unwrap_or_default();

            let mut budget = capacity.saturating_sub(session.current_streams());
            while budget > 0 {
                let Some(listener) = listeners.pop_front() else {
                    break;
                };
                if listener.is_canceled() {
                    continue;
                }
                self.serve(state, listener, session);
                budget -= 1;
            }

            if !listeners.is_empty() {
                let options = entry.as_ref().map(|entry| entry.options.clone());
                if let Some(options) = options {
                    self.redistribute(state, session.authority().clone(), options, listeners);
                }
            }

            if session.current_streams() == 0 {
                self.arm_idle_timer(session);
            }
            // this attempt no longer counts against the session limit
            self.process_queue(state, session.fingerprint());
        });
    }

    /// Overflow from a settled attempt goes to other free sessions first, then
    /// to a fresh attempt.
    fn redistribute(
        &self,
        state: &mut PoolState<HandleOf<C>>,
        authority: Authority,
        options: SessionOptions,
        mut listeners: VecDeque<Listener<HandleOf<C>>>,
    ) {
        let fingerprint = options.fingerprint();

        while let Some(listener) = listeners.pop_front() {
            if listener.is_canceled() {
                continue;
            }
            match state.free.best_for(&fingerprint, authority.key()) {
                Some(session) => self.serve(state, listener, &session),
                None => {
                    listeners.push_front(listener);
                    break;
                }
            }
        }

        if listeners.is_empty() {
            return;
        }

        debug!(
            target: "muxpool::pool",
            authority = %authority,
            remaining = listeners.len(),
            "queueing overflow listeners for a new session"
        );

        if let Some(entry) = state.entry_for(&fingerprint, authority.key()) {
            entry.listeners.extend(listeners);
        } else {
            let mut entry = QueueEntry::new(authority, options);
            entry.listeners = listeners;
            state.queue.entry(fingerprint.clone()).or_default().push(entry);
        }
        self.process_queue(state, &fingerprint);
    }

    fn on_origin(&self, session: &Arc<Session<HandleOf<C>>>, origins: Vec<String>) {
        let keys: Vec<String> = origins
            .iter()
            .filter_map(|origin| match Authority::parse(origin) {
                Ok(authority) => Some(authority.key().to_string()),
                Err(err) => {
                    warn!(
                        target: "muxpool::pool",
                        session_id = session.id(),
                        origin = %origin,
                        error = %err,
                        "ignoring malformed origin"
                    );
                    None
                }
            })
            .collect();

        self.with_state(|state| {
            if session.is_retired() {
                return;
            }
            let added = session.extend_origins(keys);
            trace!(target: "muxpool::pool", session_id = session.id(), added, "origin set grew");

            if !session.is_settled() || !session.has_capacity() {
                return;
            }
            self.close_covered_sessions(state, session);
            self.serve_covered_queue(state, session);
        });
    }

    /// Gracefully close every other session whose origins `session` serves
    /// and whose streams fit into its spare capacity.
    fn close_covered_sessions(&self, state: &mut PoolState<HandleOf<C>>, session: &Arc<Session<HandleOf<C>>>) {
        let fingerprint = session.fingerprint();
        let mut candidates = state.free.snapshot(fingerprint);
        candidates.extend(state.busy.snapshot(fingerprint));

        for covered in candidates {
            if covered.id() == session.id() || covered.is_retired() {
                continue;
            }
            if !session.covers(&covered) {
                continue;
            }
            if covered.current_streams() + session.current_streams() > session.capacity() {
                continue;
            }

            state.untrack(&covered);
            covered.set_state(SessionState::Closing);
            covered.handle.close();
            PoolStats::bump(&self.stats.covered_evictions);
            debug!(
                target: "muxpool::pool",
                session_id = covered.id(),
                covered_by = session.id(),
                "closing covered session"
            );
        }
    }

    /// Resolve queued callers whose authority `session` now serves.
    fn serve_covered_queue(&self, state: &mut PoolState<HandleOf<C>>, session: &Arc<Session<HandleOf<C>>>) {
        let fingerprint = session.fingerprint();
        let Some(entries) = state.queue.remove(fingerprint) else {
            return;
        };
        let mut kept = Vec::with_capacity(entries.len());

        for mut entry in entries {
            if session.serves(entry.authority.key()) {
                while session.has_capacity() {
                    let Some(listener) = entry.listeners.pop_front() else {
                        break;
                    };
                    if !listener.is_canceled() {
                        self.serve(state, listener, session);
                    }
                }
            }
            // a started attempt still owns its connecting session
            if entry.started || !entry.listeners.is_empty() {
                kept.push(entry);
            }
        }

        if !kept.is_empty() {
            let fresh = state.queue.remove(fingerprint).unwrap_or_default();
            kept.extend(fresh);
            state.queue.insert(fingerprint.to_string(), kept);
        }
    }

    fn on_tls_session(&self, session: &Session<HandleOf<C>>, entry: crate::cache::TlsSessionEntry) {
        let name = TlsSessionCache::cache_name(session.authority().key(), session.fingerprint());
        self.tls_cache.insert(name, entry);
    }

    fn on_error(&self, session: &Arc<Session<HandleOf<C>>>, err: Error) {
        self.with_state(|state| {
            if session.state() == SessionState::Closed {
                return;
            }
            warn!(
                target: "muxpool::pool",
                session_id = session.id(),
                authority = %session.authority(),
                error = %err,
                "session error"
            );

            if let Some(mut entry) = state.take_entry(session.fingerprint(), session.id()) {
                entry.reject_all(&err);
            }
            self.retire(state, session);
            session.handle.destroy(Some(err));
            self.tls_cache.purge(&TlsSessionCache::cache_name(
                session.authority().key(),
                session.fingerprint(),
            ));
            self.process_queue(state, session.fingerprint());
        });
    }

    fn on_closed(&self, session: &Arc<Session<HandleOf<C>>>) {
        self.with_state(|state| {
            if session.state() == SessionState::Closed {
                return;
            }
            self.retire(state, session);

            if !session.is_settled() {
                if let Some(mut entry) = state.take_entry(session.fingerprint(), session.id()) {
                    entry.reject_all(&error::protocol());
                }
            }
            debug!(target: "muxpool::pool", session_id = session.id(), "session closed");
            self.process_queue(state, session.fingerprint());
        });
    }

    fn on_idle_timeout(&self, session: &Arc<Session<HandleOf<C>>>, epoch: u64) {
        self.with_state(|state| {
            if session.idle_epoch() != epoch || session.current_streams() != 0 || session.is_retired() {
                return;
            }
            debug!(target: "muxpool::pool", session_id = session.id(), "destroying idle session");
            self.retire(state, session);
            PoolStats::bump(&self.stats.idle_timeouts);
            session.handle.destroy(Some(error::idle_timeout()));
            self.process_queue(state, session.fingerprint());
        });
    }

    /// Remove from every collection and mark closed.
    fn retire(&self, state: &mut PoolState<HandleOf<C>>, session: &Session<HandleOf<C>>) {
        state.untrack(session);
        session.set_state(SessionState::Closed);
        PoolStats::bump(&self.stats.sessions_closed);
    }

    /// Insert a newly settled session into free or busy.
    fn place(&self, state: &mut PoolState<HandleOf<C>>, session: &Arc<Session<HandleOf<C>>>) {
        if session.has_capacity() {
            session.set_state(SessionState::Free);
            state.free.insert(Arc::clone(session));
        } else {
            session.set_state(SessionState::Busy);
            state.busy.insert(Arc::clone(session));
        }
    }

    /// Move a tracked session between free and busy after its capacity changed.
    fn reclassify(&self, state: &mut PoolState<HandleOf<C>>, session: &Arc<Session<HandleOf<C>>>) {
        if state.free.remove(session) || state.busy.remove(session) {
            self.place(state, session);
        }
    }

    fn arm_idle_timer(&self, session: &Arc<Session<HandleOf<C>>>) {
        let epoch = session.next_idle_epoch();
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            return;
        };
        let pool = self.me.clone();
        let session = Arc::clone(session);
        let timeout = self.config.timeout;

        runtime.spawn(async move {
            tokio::time::sleep(timeout).await;
            if let Some(pool) = pool.upgrade() {
                pool.on_idle_timeout(&session, epoch);
            }
        });
    }

    fn close_idle_sessions(&self) {
        self.with_state(|state| {
            let mut sessions = state.free.snapshot_all();
            sessions.extend(state.busy.snapshot_all());

            for session in sessions {
                if session.current_streams() != 0 {
                    continue;
                }
                state.untrack(&session);
                session.set_state(SessionState::Closing);
                session.handle.close();
                debug!(target: "muxpool::pool", session_id = session.id(), "closing idle session");
            }
        });
    }

    fn destroy(&self, reason: Option<&str>) {
        let err = error::destroyed(reason);
        self.with_state(|state| {
            for (_, entries) in state.queue.drain() {
                for mut entry in entries {
                    entry.reject_all(&err);
                }
            }

            let mut sessions = state.free.drain();
            sessions.extend(state.busy.drain());
            sessions.extend(state.pending.drain().map(|(_, session)| session));

            debug!(target: "muxpool::pool", sessions = sessions.len(), "destroying agent");
            for session in sessions {
                session.set_state(SessionState::Closed);
                PoolStats::bump(&self.stats.sessions_closed);
                session.handle.destroy(Some(err.clone()));
            }
        });
    }
}

impl<C: SessionConnector> StreamReleaser<HandleOf<C>> for Shared<C> {
    fn release(&self, session: &Arc<Session<HandleOf<C>>>) {
        self.with_state(|state| {
            let streams = session.decrement_streams();
            PoolStats::bump(&self.stats.streams_closed);

            if session.is_retired() {
                return;
            }

            let fingerprint = session.fingerprint();
            if session.has_capacity() && state.busy.contains(session) {
                state.busy.remove(session);
                if state.free.count(fingerprint) >= self.config.max_free_sessions {
                    session.set_state(SessionState::Closing);
                    session.handle.close();
                    debug!(
                        target: "muxpool::pool",
                        session_id = session.id(),
                        "free session limit reached, closing"
                    );
                    self.process_queue(state, fingerprint);
                    return;
                }
                session.set_state(SessionState::Free);
                state.free.insert(Arc::clone(session));
            }

            if streams == 0 {
                self.arm_idle_timer(session);
            }
            if session.has_capacity() {
                self.close_covered_sessions(state, session);
            }
            self.process_queue(state, fingerprint);
        });
    }
}

impl<C: SessionConnector> Drop for Shared<C> {
    fn drop(&mut self) {
        let state = self.state.get_mut();
        let mut sessions = state.free.drain();
        sessions.extend(state.busy.drain());
        sessions.extend(state.pending.drain().map(|(_, session)| session));
        for session in sessions {
            session.set_state(SessionState::Closed);
            session.handle.destroy(None);
        }
    }
}

/// Apply a session's events in order until it closes.
async fn drive<C: SessionConnector>(
    pool: Weak<Shared<C>>,
    session: Arc<Session<HandleOf<C>>>,
    mut events: mpsc::UnboundedReceiver<SessionEvent>,
) {
    while let Some(event) = events.recv().await {
        let Some(shared) = pool.upgrade() else {
            return;
        };
        match event {
            SessionEvent::Settings {
                max_concurrent_streams,
            } => shared.on_settings(&session, max_concurrent_streams),
            SessionEvent::Origin(origins) => shared.on_origin(&session, origins),
            SessionEvent::TlsSession(entry) => shared.on_tls_session(&session, entry),
            SessionEvent::Error(err) => shared.on_error(&session, err),
            SessionEvent::Closed => {
                shared.on_closed(&session);
                return;
            }
        }
    }

    // every sender is gone: the session cannot report anything else
    if let Some(shared) = pool.upgrade() {
        shared.on_closed(&session);
    }
}
