//! Session pool statistics with cache-padded atomic counters
//!
//! Counters are bumped from inside the pool's critical section and from
//! session driver tasks, so each one sits on its own cache line.

use std::sync::atomic::{AtomicUsize, Ordering};

use crossbeam_utils::CachePadded;

/// Thread-safe pool statistics
#[derive(Debug, Default)]
pub struct PoolStats {
    /// Sessions handed to the connector
    pub sessions_created: CachePadded<AtomicUsize>,
    /// Sessions removed from the pool for any reason
    pub sessions_closed: CachePadded<AtomicUsize>,
    /// Streams opened on pooled sessions
    pub streams_opened: CachePadded<AtomicUsize>,
    /// Streams released back to the pool
    pub streams_closed: CachePadded<AtomicUsize>,
    /// Requests served by an existing free session
    pub reuse_hits: CachePadded<AtomicUsize>,
    /// Requests that joined an in-flight attempt
    pub queue_joins: CachePadded<AtomicUsize>,
    /// Sessions closed because another session covered their origins
    pub covered_evictions: CachePadded<AtomicUsize>,
    /// Sessions destroyed by the idle timer
    pub idle_timeouts: CachePadded<AtomicUsize>,
    /// Connection attempts that were offered a cached TLS ticket
    pub tls_cache_hits: CachePadded<AtomicUsize>,
}

/// Immutable snapshot of pool statistics at a point in time
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PoolStatsSnapshot {
    pub sessions_created: usize,
    pub sessions_closed: usize,
    pub streams_opened: usize,
    pub streams_closed: usize,
    pub reuse_hits: usize,
    pub queue_joins: usize,
    pub covered_evictions: usize,
    pub idle_timeouts: usize,
    pub tls_cache_hits: usize,
}

impl PoolStats {
    #[inline]
    pub(crate) fn bump(counter: &CachePadded<AtomicUsize>) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    /// Read every counter with relaxed ordering.
    #[inline]
    pub fn snapshot(&self) -> PoolStatsSnapshot {
        PoolStatsSnapshot {
            sessions_created: self.sessions_created.load(Ordering::Relaxed),
            sessions_closed: self.sessions_closed.load(Ordering::Relaxed),
            streams_opened: self.streams_opened.load(Ordering::Relaxed),
            streams_closed: self.streams_closed.load(Ordering::Relaxed),
            reuse_hits: self.reuse_hits.load(Ordering::Relaxed),
            queue_joins: self.queue_joins.load(Ordering::Relaxed),
            covered_evictions: self.covered_evictions.load(Ordering::Relaxed),
            idle_timeouts: self.idle_timeouts.load(Ordering::Relaxed),
            tls_cache_hits: self.tls_cache_hits.load(Ordering::Relaxed),
        }
    }
}

impl PoolStatsSnapshot {
    /// Streams that are still open according to the counters.
    pub fn streams_in_flight(&self) -> usize {
        self.streams_opened.saturating_sub(self.streams_closed)
    }

    /// Fraction of stream requests that did not need a new connection attempt.
    pub fn reuse_ratio(&self) -> f64 {
        if self.streams_opened == 0 {
            return 0.0;
        }
        #[allow(clippy::cast_precision_loss)]
        let ratio = self.reuse_hits as f64 / self.streams_opened as f64;
        ratio
    }
}
