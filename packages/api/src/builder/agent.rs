//! Session pool builder

use std::time::Duration;

use muxpool_client::connect::DirectDialer;
use muxpool_client::{Agent, AgentConfig, H2Config, H2Connector, Result};
use tracing::debug;

/// Builds an [`Agent`] over the bundled HTTP/2 connector.
#[derive(Debug, Clone, Default)]
pub struct AgentBuilder {
    config: AgentConfig,
    h2: H2Config,
    connect_timeout: Option<Option<Duration>>,
}

impl AgentBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Idle time after which a session with no open streams is destroyed
    #[must_use]
    pub fn idle_timeout(mut self, timeout: Duration) -> Self {
        self.config = self.config.with_timeout(timeout);
        self
    }

    /// Upper bound on busy sessions plus in-flight attempts per options fingerprint
    #[must_use]
    pub fn max_sessions(mut self, max: usize) -> Self {
        self.config = self.config.with_max_sessions(max);
        self
    }

    #[must_use]
    pub fn max_free_sessions(mut self, max: usize) -> Self {
        self.config = self.config.with_max_free_sessions(max);
        self
    }

    #[must_use]
    pub fn max_cached_tls_sessions(mut self, max: usize) -> Self {
        self.config = self.config.with_max_cached_tls_sessions(max);
        self
    }

    /// HTTP/2 settings used for every session of the pool
    #[must_use]
    pub fn h2(mut self, h2: H2Config) -> Self {
        self.h2 = h2;
        self
    }

    /// TCP connect timeout; `None` waits for the operating system
    #[must_use]
    pub fn connect_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.connect_timeout = Some(timeout);
        self
    }

    pub fn config(&self) -> &AgentConfig {
        &self.config
    }

    /// # Errors
    ///
    /// Returns a builder error if any setting is out of range.
    pub fn build(self) -> Result<Agent> {
        self.h2.validate()?;
        let mut dialer = DirectDialer::default();
        if let Some(timeout) = self.connect_timeout {
            dialer = dialer.with_connect_timeout(timeout);
        }
        debug!(
            target: "muxpool::pool",
            max_sessions = self.config.max_sessions,
            max_free_sessions = self.config.max_free_sessions,
            idle_timeout = ?self.config.timeout,
            "building session pool"
        );
        Agent::with_connector(H2Connector::new(dialer, self.h2), self.config)
    }
}
