//! rustls client configuration
//!
//! Configurations are built once per options fingerprint and offered ALPN
//! list, then shared. Pooled sessions hand their handshake a
//! [`SessionResumption`] backed by the pool's TLS session cache; other
//! handshakes resume through the shared config's in-memory store.

use std::fmt;
use std::io::BufReader;
use std::sync::Arc;

use bytes::Bytes;
use hashbrown::HashMap;
use parking_lot::Mutex;
use rustls::client::danger::{HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier};
use rustls::client::{ClientSessionStore, Resumption, Tls12ClientSessionValue, Tls13ClientSessionValue};
use rustls::crypto::CryptoProvider;
use rustls::pki_types::{CertificateDer, ServerName, UnixTime};
use rustls::{ClientConfig, DigitallySignedStruct, NamedGroup, RootCertStore, SignatureScheme};
use tokio_rustls::TlsConnector;
use tokio_rustls::client::TlsStream;
use tracing::{debug, warn};

use crate::cache::{TlsResumption, TlsSessionEntry};
use crate::error::{self, Result};
use crate::pool::{SessionOptions, TlsVersion};

use super::io::Io;

#[derive(Debug, Default)]
pub struct TlsConfigCache {
    configs: Mutex<HashMap<String, Arc<ClientConfig>>>,
}

impl TlsConfigCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Shared configuration for `options` offering `alpn`.
    ///
    /// # Errors
    ///
    /// Returns a builder error for unusable TLS options (unknown cipher
    /// names, an unreadable CA bundle, an empty version range).
    pub fn config(&self, options: &SessionOptions, alpn: &[Vec<u8>]) -> Result<Arc<ClientConfig>> {
        let key = format!(
            "{}|{}",
            options.fingerprint(),
            alpn.iter()
                .map(|proto| String::from_utf8_lossy(proto).into_owned())
                .collect::<Vec<_>>()
                .join(",")
        );

        if let Some(config) = self.configs.lock().get(&key) {
            return Ok(Arc::clone(config));
        }

        let config = Arc::new(build_client_config(options, alpn)?);
        self.configs.lock().insert(key, Arc::clone(&config));
        Ok(config)
    }

    pub fn len(&self) -> usize {
        self.configs.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.configs.lock().is_empty()
    }
}

/// Build a rustls client configuration honoring the TLS-related session options.
///
/// # Errors
///
/// See [`TlsConfigCache::config`].
pub fn build_client_config(options: &SessionOptions, alpn: &[Vec<u8>]) -> Result<ClientConfig> {
    let provider = Arc::new(crypto_provider(options.ciphers.as_deref())?);
    let versions = protocol_versions(options.min_tls_version, options.max_tls_version)?;

    let builder = ClientConfig::builder_with_provider(Arc::clone(&provider))
        .with_protocol_versions(&versions)
        .map_err(error::tls)?;

    let mut config = if options.reject_unauthorized {
        builder
            .with_root_certificates(root_store(options)?)
            .with_no_client_auth()
    } else {
        warn!(target: "muxpool::transport", "certificate verification disabled");
        builder
            .dangerous()
            .with_custom_certificate_verifier(Arc::new(AcceptAnyCertificate { provider }))
            .with_no_client_auth()
    };

    config.alpn_protocols = alpn.to_vec();
    Ok(config)
}

fn crypto_provider(ciphers: Option<&str>) -> Result<CryptoProvider> {
    let mut provider = rustls::crypto::ring::default_provider();
    let Some(ciphers) = ciphers else {
        return Ok(provider);
    };

    let wanted: Vec<&str> = ciphers
        .split(':')
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .collect();
    provider.cipher_suites.retain(|suite| {
        let name = format!("{:?}", suite.suite());
        wanted.iter().any(|wanted| wanted.eq_ignore_ascii_case(&name))
    });

    if provider.cipher_suites.is_empty() {
        return Err(error::builder(format!("no supported cipher suite in {ciphers:?}")));
    }
    Ok(provider)
}

fn protocol_versions(
    min: Option<TlsVersion>,
    max: Option<TlsVersion>,
) -> Result<Vec<&'static rustls::SupportedProtocolVersion>> {
    let min = min.unwrap_or(TlsVersion::Tls12);
    let max = max.unwrap_or(TlsVersion::Tls13);

    let versions: Vec<_> = [
        (TlsVersion::Tls12, &rustls::version::TLS12),
        (TlsVersion::Tls13, &rustls::version::TLS13),
    ]
    .into_iter()
    .filter(|(version, _)| *version >= min && *version <= max)
    .map(|(_, supported)| supported)
    .collect();

    if versions.is_empty() {
        return Err(error::builder(format!(
            "empty TLS version range: {min} to {max}"
        )));
    }
    Ok(versions)
}

fn root_store(options: &SessionOptions) -> Result<RootCertStore> {
    let mut roots = RootCertStore::empty();
    roots.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());

    if let Some(path) = &options.ca_file {
        let pem = std::fs::read(path).map_err(error::builder)?;
        let mut added = 0usize;
        for cert in rustls_pemfile::certs(&mut BufReader::new(pem.as_slice())) {
            let cert = cert.map_err(error::builder)?;
            if let Err(err) = roots.add(cert) {
                warn!(target: "muxpool::transport", error = %err, "skipping invalid CA certificate");
            } else {
                added += 1;
            }
        }
        debug!(target: "muxpool::transport", path = %path.display(), added, "loaded CA bundle");
    }

    Ok(roots)
}

/// Run a client handshake over `io`.
///
/// # Errors
///
/// Returns a connect error if `server_name` is invalid or the handshake fails.
pub async fn wrap<T: Io>(io: T, config: Arc<ClientConfig>, server_name: &str) -> Result<TlsStream<T>> {
    wrap_resuming(io, config, server_name, None).await
}

/// [`wrap`] with the handshake resuming from, and storing into, `resumption`.
///
/// # Errors
///
/// See [`wrap`].
pub async fn wrap_resuming<T: Io>(
    io: T,
    config: Arc<ClientConfig>,
    server_name: &str,
    resumption: Option<SessionResumption>,
) -> Result<TlsStream<T>> {
    let config = match resumption {
        Some(store) => {
            let mut config = ClientConfig::clone(&config);
            config.resumption = Resumption::store(Arc::new(store));
            Arc::new(config)
        }
        None => config,
    };

    let name = ServerName::try_from(server_name.to_string()).map_err(error::tls)?;
    TlsConnector::from(config)
        .connect(name, io)
        .await
        .map_err(error::tls)
}

/// Resumption store for one connection's handshake.
///
/// Offers the tickets held in a cached [`TlsResumption`] and reports each
/// ticket the server issues through `on_ticket`, so the owning pool can
/// cache the entry under the session's name.
#[derive(Clone)]
pub struct SessionResumption {
    state: TlsResumption,
    servername: String,
    on_ticket: Arc<dyn Fn(TlsSessionEntry) + Send + Sync>,
}

impl SessionResumption {
    pub fn new(
        servername: impl Into<String>,
        state: TlsResumption,
        on_ticket: impl Fn(TlsSessionEntry) + Send + Sync + 'static,
    ) -> Self {
        Self {
            state,
            servername: servername.into(),
            on_ticket: Arc::new(on_ticket),
        }
    }

    pub fn state(&self) -> &TlsResumption {
        &self.state
    }

    fn announce(&self) {
        (self.on_ticket)(TlsSessionEntry {
            ticket: Bytes::new(),
            servername: Some(self.servername.clone()),
            resumption: Some(self.state.clone()),
        });
    }
}

impl fmt::Debug for SessionResumption {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionResumption")
            .field("servername", &self.servername)
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}

// one store serves one connection, so the server name is always ours
impl ClientSessionStore for SessionResumption {
    fn set_kx_hint(&self, _server_name: ServerName<'static>, group: NamedGroup) {
        self.state.set_kx_hint(group);
    }

    fn kx_hint(&self, _server_name: &ServerName<'_>) -> Option<NamedGroup> {
        self.state.kx_hint()
    }

    fn set_tls12_session(&self, _server_name: ServerName<'static>, value: Tls12ClientSessionValue) {
        self.state.set_tls12(value);
        self.announce();
    }

    fn tls12_session(&self, _server_name: &ServerName<'_>) -> Option<Tls12ClientSessionValue> {
        self.state.tls12()
    }

    fn remove_tls12_session(&self, _server_name: &ServerName<'static>) {
        self.state.remove_tls12();
    }

    fn insert_tls13_ticket(&self, _server_name: ServerName<'static>, value: Tls13ClientSessionValue) {
        self.state.push_tls13(value);
        self.announce();
    }

    fn take_tls13_ticket(&self, _server_name: &ServerName<'static>) -> Option<Tls13ClientSessionValue> {
        self.state.take_tls13()
    }
}

/// Verifier used when certificate checks are turned off. Signatures are
/// still checked so the handshake itself stays sound.
#[derive(Debug)]
struct AcceptAnyCertificate {
    provider: Arc<CryptoProvider>,
}

impl ServerCertVerifier for AcceptAnyCertificate {
    fn verify_server_cert(
        &self,
        _end_entity: &CertificateDer<'_>,
        _intermediates: &[CertificateDer<'_>],
        _server_name: &ServerName<'_>,
        _ocsp_response: &[u8],
        _now: UnixTime,
    ) -> std::result::Result<ServerCertVerified, rustls::Error> {
        Ok(ServerCertVerified::assertion())
    }

    fn verify_tls12_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> std::result::Result<HandshakeSignatureValid, rustls::Error> {
        rustls::crypto::verify_tls12_signature(
            message,
            cert,
            dss,
            &self.provider.signature_verification_algorithms,
        )
    }

    fn verify_tls13_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> std::result::Result<HandshakeSignatureValid, rustls::Error> {
        rustls::crypto::verify_tls13_signature(
            message,
            cert,
            dss,
            &self.provider.signature_verification_algorithms,
        )
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        self.provider
            .signature_verification_algorithms
            .supported_schemes()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn configs_are_shared_per_fingerprint_and_alpn() {
        let cache = TlsConfigCache::new();
        let options = SessionOptions::default();
        let h2 = vec![b"h2".to_vec()];

        let a = cache.config(&options, &h2).unwrap();
        let b = cache.config(&options, &h2).unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(a.alpn_protocols, h2);

        cache.config(&options, &[b"http/1.1".to_vec()]).unwrap();
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn inverted_version_range_is_rejected() {
        let options = SessionOptions::default()
            .tls_versions(Some(TlsVersion::Tls13), Some(TlsVersion::Tls12));
        assert!(build_client_config(&options, &[]).unwrap_err().is_builder());
    }

    #[test]
    fn cipher_filter() {
        let options = SessionOptions::default().ciphers("TLS13_AES_128_GCM_SHA256");
        assert!(build_client_config(&options, &[]).is_ok());

        let options = SessionOptions::default().ciphers("NOT_A_SUITE");
        assert!(build_client_config(&options, &[]).is_err());
    }

    #[test]
    fn resumption_store_reports_through_the_callback() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let store = SessionResumption::new("example.com", TlsResumption::new(), {
            let seen = Arc::clone(&seen);
            move |entry| seen.lock().push(entry)
        });

        store.announce();

        let seen = seen.lock();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].servername.as_deref(), Some("example.com"));
        assert_eq!(seen[0].resumption.as_ref(), Some(store.state()));
    }

    #[test]
    fn missing_ca_file_is_rejected() {
        let options = SessionOptions::default().ca_file("/nonexistent/muxpool-ca.pem");
        assert!(build_client_config(&options, &[]).is_err());
    }
}
