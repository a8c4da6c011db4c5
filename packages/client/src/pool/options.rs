//! Connection-identity options
//!
//! Only parameters that change which physical session may be shared live
//! here. Two requests whose options produce the same fingerprint may share
//! sessions; anything else (headers, per-request timers) never reaches it.

use std::fmt;
use std::net::IpAddr;
use std::path::PathBuf;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TlsVersion {
    Tls12,
    Tls13,
}

impl fmt::Display for TlsVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TlsVersion::Tls12 => f.write_str("TLSv1.2"),
            TlsVersion::Tls13 => f.write_str("TLSv1.3"),
        }
    }
}

/// Options that determine session identity.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SessionOptions {
    /// Local address to bind outgoing sockets to
    pub local_address: Option<IpAddr>,
    /// SNI override; defaults to the target host
    pub servername: Option<String>,
    /// Verify the peer certificate chain
    pub reject_unauthorized: bool,
    /// Extra PEM bundle of trusted roots
    pub ca_file: Option<PathBuf>,
    pub min_tls_version: Option<TlsVersion>,
    pub max_tls_version: Option<TlsVersion>,
    /// Cipher suite names, colon separated
    pub ciphers: Option<String>,
    /// Upper bound applied to the peer's advertised stream limit
    pub peer_max_concurrent_streams: Option<u32>,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            local_address: None,
            servername: None,
            reject_unauthorized: true,
            ca_file: None,
            min_tls_version: None,
            max_tls_version: None,
            ciphers: None,
            peer_max_concurrent_streams: None,
        }
    }
}

impl SessionOptions {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn local_address(mut self, addr: IpAddr) -> Self {
        self.local_address = Some(addr);
        self
    }

    #[must_use]
    pub fn servername(mut self, name: impl Into<String>) -> Self {
        self.servername = Some(name.into());
        self
    }

    #[must_use]
    pub fn reject_unauthorized(mut self, reject: bool) -> Self {
        self.reject_unauthorized = reject;
        self
    }

    #[must_use]
    pub fn ca_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.ca_file = Some(path.into());
        self
    }

    #[must_use]
    pub fn tls_versions(mut self, min: Option<TlsVersion>, max: Option<TlsVersion>) -> Self {
        self.min_tls_version = min;
        self.max_tls_version = max;
        self
    }

    #[must_use]
    pub fn ciphers(mut self, ciphers: impl Into<String>) -> Self {
        self.ciphers = Some(ciphers.into());
        self
    }

    #[must_use]
    pub fn peer_max_concurrent_streams(mut self, max: u32) -> Self {
        self.peer_max_concurrent_streams = Some(max);
        self
    }

    /// Deterministic identity string: every field in declaration order,
    /// unset fields rendered empty, joined with `:`.
    ///
    /// Fields are percent-encoded first, so a `:` inside a value (an IPv6
    /// local address, a cipher list) cannot shift the field boundaries.
    pub fn fingerprint(&self) -> String {
        fn opt<T: ToString>(value: Option<&T>) -> String {
            value.map(ToString::to_string).unwrap_or_default()
        }

        [
            opt(self.local_address.as_ref()),
            opt(self.servername.as_ref()),
            self.reject_unauthorized.to_string(),
            self.ca_file
                .as_ref()
                .map(|path| path.display().to_string())
                .unwrap_or_default(),
            opt(self.min_tls_version.as_ref()),
            opt(self.max_tls_version.as_ref()),
            opt(self.ciphers.as_ref()),
            opt(self.peer_max_concurrent_streams.as_ref()),
        ]
        .iter()
        .map(|field| urlencoding::encode(field).into_owned())
        .collect::<Vec<_>>()
        .join(":")
    }
}
