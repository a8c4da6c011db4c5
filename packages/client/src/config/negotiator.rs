//! Protocol negotiator configuration

use crate::error::{self, Result};

/// ALPN identifier of the multiplexed protocol.
pub const ALPN_H2: &str = "h2";
/// ALPN identifier of the legacy protocol; also the answer when a server
/// negotiates nothing.
pub const ALPN_HTTP11: &str = "http/1.1";

/// Settings for an `AutoNegotiator`.
#[derive(Debug, Clone)]
pub struct NegotiatorConfig {
    /// Capacity of the negotiated-protocol cache
    pub max_cached_protocols: usize,
    /// Protocols offered during the ALPN probe
    pub alpn_protocols: Vec<String>,
    /// Whether this build can drive the multiplexed protocol at all
    pub multiplexed_supported: bool,
}

impl Default for NegotiatorConfig {
    fn default() -> Self {
        Self {
            max_cached_protocols: 100,
            alpn_protocols: vec![ALPN_H2.to_string(), ALPN_HTTP11.to_string()],
            multiplexed_supported: cfg!(feature = "http2"),
        }
    }
}

impl NegotiatorConfig {
    #[must_use]
    pub fn with_max_cached_protocols(mut self, max: usize) -> Self {
        self.max_cached_protocols = max;
        self
    }

    /// Replace the list of protocols offered during the ALPN probe
    #[must_use]
    pub fn with_alpn_protocols<I, S>(mut self, protocols: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.alpn_protocols = protocols.into_iter().map(Into::into).collect();
        self
    }

    /// Force the legacy path even when a server negotiates `h2`
    #[must_use]
    pub fn with_multiplexed_supported(mut self, supported: bool) -> Self {
        self.multiplexed_supported = supported;
        self
    }

    /// Validate the configuration values
    ///
    /// # Errors
    ///
    /// Returns a builder error if the cache capacity is zero or no ALPN
    /// protocol is offered.
    pub fn validate(&self) -> Result<()> {
        if self.max_cached_protocols == 0 {
            return Err(error::builder("max_cached_protocols must be at least 1"));
        }
        if self.alpn_protocols.is_empty() {
            return Err(error::builder("alpn_protocols cannot be empty"));
        }
        if self.alpn_protocols.iter().any(String::is_empty) {
            return Err(error::builder("alpn_protocols cannot contain an empty identifier"));
        }
        Ok(())
    }
}
