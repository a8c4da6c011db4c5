//! ALPN probing
//!
//! A probe runs a TLS handshake against a target offering a list of
//! protocols and reports which one the server picked.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use futures::future::BoxFuture;
use tracing::debug;

use crate::config::ALPN_HTTP11;
use crate::connect::{Io, TlsConfigCache, connect_tcp, tls};
use crate::error::Result;
use crate::http::Authority;
use crate::pool::SessionOptions;

/// Determines the application protocol a secure target agrees to.
pub trait AlpnProbe: Send + Sync + 'static {
    /// Negotiate with `authority` offering `alpn_protocols`.
    ///
    /// A server that completes the handshake without selecting a protocol
    /// resolves to `http/1.1`.
    fn probe(
        &self,
        authority: &Authority,
        options: &SessionOptions,
        alpn_protocols: &[String],
    ) -> BoxFuture<'static, Result<String>>;
}

/// Probes with a real rustls handshake and drops the connection afterwards.
#[derive(Clone)]
pub struct TlsAlpnProbe {
    tls: Arc<TlsConfigCache>,
    connect_timeout: Option<Duration>,
}

impl Default for TlsAlpnProbe {
    fn default() -> Self {
        Self {
            tls: Arc::new(TlsConfigCache::new()),
            connect_timeout: Some(Duration::from_secs(10)),
        }
    }
}

impl TlsAlpnProbe {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_connect_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.connect_timeout = timeout;
        self
    }
}

impl fmt::Debug for TlsAlpnProbe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TlsAlpnProbe")
            .field("connect_timeout", &self.connect_timeout)
            .finish_non_exhaustive()
    }
}

impl AlpnProbe for TlsAlpnProbe {
    fn probe(
        &self,
        authority: &Authority,
        options: &SessionOptions,
        alpn_protocols: &[String],
    ) -> BoxFuture<'static, Result<String>> {
        let tls_configs = Arc::clone(&self.tls);
        let timeout = self.connect_timeout;
        let authority = authority.clone();
        let options = options.clone();
        let offered: Vec<Vec<u8>> = alpn_protocols
            .iter()
            .map(|protocol| protocol.as_bytes().to_vec())
            .collect();

        Box::pin(async move {
            let config = tls_configs.config(&options, &offered)?;
            let tcp = connect_tcp(authority.host(), authority.port(), options.local_address, timeout).await?;
            let server_name = options.servername.as_deref().unwrap_or(authority.host());
            let stream = tls::wrap(tcp, config, server_name).await?;

            let protocol = stream
                .connection_info()
                .alpn
                .map(|alpn| String::from_utf8_lossy(&alpn).into_owned())
                .unwrap_or_else(|| ALPN_HTTP11.to_string());
            debug!(target: "muxpool::negotiate", authority = %authority, %protocol, "alpn probe complete");
            Ok(protocol)
        })
    }
}
