//! Protocol negotiator builder

use std::sync::Arc;

use muxpool_client::protocols::{AlpnProbe, Http1Transport, LegacyTransport, TlsAlpnProbe};
use muxpool_client::{Agent, AgentConfig, AutoNegotiator, NegotiatorConfig, Result};
use tracing::debug;

/// Builds an [`AutoNegotiator`], filling unset components with the bundled ones.
#[derive(Default)]
pub struct NegotiatorBuilder {
    config: NegotiatorConfig,
    probe: Option<Arc<dyn AlpnProbe>>,
    http2: Option<Agent>,
    https: Option<Arc<dyn LegacyTransport>>,
    http: Option<Arc<dyn LegacyTransport>>,
}

impl NegotiatorBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn max_cached_protocols(mut self, max: usize) -> Self {
        self.config = self.config.with_max_cached_protocols(max);
        self
    }

    /// Protocols offered while probing, in preference order
    #[must_use]
    pub fn alpn_protocols<I, S>(mut self, protocols: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.config = self
            .config
            .with_alpn_protocols(protocols.into_iter().map(Into::into).collect::<Vec<String>>());
        self
    }

    #[must_use]
    pub fn probe(mut self, probe: Arc<dyn AlpnProbe>) -> Self {
        self.probe = Some(probe);
        self
    }

    /// Shared pool for targets that negotiate h2
    #[must_use]
    pub fn http2_agent(mut self, agent: Agent) -> Self {
        self.http2 = Some(agent);
        self
    }

    #[must_use]
    pub fn https_transport(mut self, transport: Arc<dyn LegacyTransport>) -> Self {
        self.https = Some(transport);
        self
    }

    #[must_use]
    pub fn http_transport(mut self, transport: Arc<dyn LegacyTransport>) -> Self {
        self.http = Some(transport);
        self
    }

    /// # Errors
    ///
    /// Returns a builder error if the configuration fails validation.
    pub fn build(self) -> Result<AutoNegotiator> {
        let probe = self.probe.unwrap_or_else(|| Arc::new(TlsAlpnProbe::new()));
        let http2 = match self.http2 {
            Some(agent) => agent,
            None => Agent::new(AgentConfig::default())?,
        };
        let legacy: Arc<dyn LegacyTransport> = Arc::new(Http1Transport::new());
        let https = self.https.unwrap_or_else(|| Arc::clone(&legacy));
        let http = self.http.unwrap_or(legacy);
        debug!(
            target: "muxpool::negotiate",
            alpn = ?self.config.alpn_protocols,
            max_cached_protocols = self.config.max_cached_protocols,
            "building negotiator"
        );

        AutoNegotiator::with_components(self.config, probe, http2, https, http)
    }
}
