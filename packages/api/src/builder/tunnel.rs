//! Proxy tunnel agent builder

use http::HeaderMap;
use muxpool_client::proxy::tunnel_agent_with;
use muxpool_client::{
    Agent, AgentConfig, H2Config, ProxyReach, Result, SessionOptions, TunnelDescriptor,
};
use tracing::debug;
use url::Url;

/// Builds a session pool whose sessions are tunneled through an HTTP proxy.
///
/// The proxy is reached over plain HTTP/1.1 for `http://` proxy URLs and
/// over TLS for `https://` ones unless [`TunnelBuilder::reach`] says otherwise.
#[derive(Debug, Clone)]
pub struct TunnelBuilder {
    proxy_url: String,
    headers: Vec<(String, String)>,
    extra_headers: HeaderMap,
    raw: bool,
    reach: Option<ProxyReach>,
    proxy_options: SessionOptions,
    config: AgentConfig,
    h2: H2Config,
}

impl TunnelBuilder {
    pub fn new(proxy_url: impl Into<String>) -> Self {
        Self {
            proxy_url: proxy_url.into(),
            headers: Vec::new(),
            extra_headers: HeaderMap::new(),
            raw: false,
            reach: None,
            proxy_options: SessionOptions::default(),
            config: AgentConfig::default(),
            h2: H2Config::default(),
        }
    }

    /// Start from an already parsed proxy URL.
    pub fn from_url(proxy_url: &Url) -> Self {
        Self::new(proxy_url.as_str())
    }

    /// Header sent with every CONNECT request
    #[must_use]
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    #[must_use]
    pub fn headers(mut self, headers: HeaderMap) -> Self {
        self.extra_headers.extend(headers);
        self
    }

    /// Speak to the target directly over the tunnel, without a TLS handshake
    #[must_use]
    pub fn raw(mut self, raw: bool) -> Self {
        self.raw = raw;
        self
    }

    #[must_use]
    pub fn reach(mut self, reach: ProxyReach) -> Self {
        self.reach = Some(reach);
        self
    }

    /// Options for the connection to the proxy itself
    #[must_use]
    pub fn proxy_options(mut self, options: SessionOptions) -> Self {
        self.proxy_options = options;
        self
    }

    #[must_use]
    pub fn agent_config(mut self, config: AgentConfig) -> Self {
        self.config = config;
        self
    }

    #[must_use]
    pub fn h2(mut self, h2: H2Config) -> Self {
        self.h2 = h2;
        self
    }

    /// # Errors
    ///
    /// Returns a builder error for an unusable proxy URL, header or setting.
    pub fn build(self) -> Result<Agent> {
        let mut descriptor = TunnelDescriptor::new(&self.proxy_url)?
            .with_headers(self.extra_headers)
            .raw(self.raw);
        for (name, value) in &self.headers {
            descriptor = descriptor.with_header(name, value)?;
        }

        let proxy = descriptor.proxy_authority()?;
        let reach = match self.reach {
            Some(reach) => reach,
            None => ProxyReach::for_proxy(&proxy),
        };
        debug!(
            target: "muxpool::proxy",
            proxy = %proxy,
            reach = reach.name(),
            raw = self.raw,
            "building tunnel agent"
        );
        tunnel_agent_with(descriptor, reach, self.proxy_options, self.config, self.h2)
    }
}
