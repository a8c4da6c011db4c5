//! Session pool configuration
//!
//! Provides `AgentConfig` for the idle timeout and the session/cache bounds of
//! one `Agent`.

use std::time::Duration;

use crate::error::{self, Result};

/// Bounds and timers for a single session pool.
#[derive(Debug, Clone)]
pub struct AgentConfig {
    /// How long a session with no open streams may stay open before it is destroyed
    pub timeout: Duration,
    /// Maximum number of busy sessions plus started attempts per options fingerprint
    pub max_sessions: usize,
    /// Maximum number of free sessions retained per options fingerprint
    pub max_free_sessions: usize,
    /// Capacity of the TLS session cache
    pub max_cached_tls_sessions: usize,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(10),
            max_sessions: usize::MAX,
            max_free_sessions: 10,
            max_cached_tls_sessions: 100,
        }
    }
}

impl AgentConfig {
    /// Set the idle timeout
    ///
    /// A session whose open-stream count drops to zero is forcibly destroyed
    /// once this much time passes without a new stream being opened on it.
    ///
    /// # Examples
    /// ```no_run
    /// use std::time::Duration;
    /// use muxpool_client::config::AgentConfig;
    ///
    /// let config = AgentConfig::default()
    ///     .with_timeout(Duration::from_secs(30));
    /// assert_eq!(config.timeout, Duration::from_secs(30));
    /// ```
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the session limit
    ///
    /// Once this many sessions are saturated or connecting for an options
    /// fingerprint, further attempts wait in the queue until a stream closes.
    #[must_use]
    pub fn with_max_sessions(mut self, max_sessions: usize) -> Self {
        self.max_sessions = max_sessions;
        self
    }

    /// Set how many free sessions are retained per options fingerprint
    #[must_use]
    pub fn with_max_free_sessions(mut self, max_free_sessions: usize) -> Self {
        self.max_free_sessions = max_free_sessions;
        self
    }

    #[must_use]
    pub fn with_max_cached_tls_sessions(mut self, max: usize) -> Self {
        self.max_cached_tls_sessions = max;
        self
    }

    /// Validate the configuration values
    ///
    /// # Errors
    ///
    /// Returns a builder error if:
    /// - `timeout` is zero
    /// - `max_sessions` is zero
    /// - `max_cached_tls_sessions` is zero
    pub fn validate(&self) -> Result<()> {
        if self.timeout.is_zero() {
            return Err(error::builder("timeout cannot be zero"));
        }
        if self.max_sessions == 0 {
            return Err(error::builder("max_sessions must be at least 1"));
        }
        if self.max_cached_tls_sessions == 0 {
            return Err(error::builder("max_cached_tls_sessions must be at least 1"));
        }
        Ok(())
    }
}
