//! Canonical target authorities
//!
//! Every pool and negotiator input is reduced to an `Authority`: scheme, host
//! and port, plus the canonical `scheme://host[:port]` key used to index
//! sessions and queued attempts.

use std::fmt;

use url::{Host, Url};

use crate::error::{self, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Scheme {
    Http,
    Https,
}

impl Scheme {
    pub fn as_str(self) -> &'static str {
        match self {
            Scheme::Http => "http",
            Scheme::Https => "https",
        }
    }

    pub fn default_port(self) -> u16 {
        match self {
            Scheme::Http => 80,
            Scheme::Https => 443,
        }
    }

    pub(crate) fn from_name(scheme: &str) -> Result<Scheme> {
        match scheme.to_ascii_lowercase().as_str() {
            "http" => Ok(Scheme::Http),
            "https" => Ok(Scheme::Https),
            other => Err(error::invalid_url(format!("unsupported scheme: {other}"))),
        }
    }
}

/// A normalized `scheme://host:port` target.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Authority {
    scheme: Scheme,
    host: String,
    port: u16,
    key: String,
}

impl Authority {
    /// Build an authority from a URL with an `http` or `https` scheme.
    ///
    /// # Errors
    ///
    /// Returns a builder error when the scheme is unsupported or the URL has no host.
    pub fn from_url(url: &Url) -> Result<Authority> {
        let scheme = Scheme::from_name(url.scheme())?;
        let host = match url.host() {
            Some(Host::Domain(domain)) => domain.to_ascii_lowercase(),
            Some(Host::Ipv4(addr)) => addr.to_string(),
            Some(Host::Ipv6(addr)) => addr.to_string(),
            None => return Err(error::invalid_url(format!("URL has no host: {url}"))),
        };
        let port = url.port().unwrap_or_else(|| scheme.default_port());

        Ok(Authority {
            scheme,
            key: url.origin().ascii_serialization(),
            host,
            port,
        })
    }

    /// Parse a string such as `https://example.com:8443`. Paths and queries
    /// are accepted and ignored.
    ///
    /// # Errors
    ///
    /// Returns a builder error when the string is not a usable http(s) URL.
    pub fn parse(input: &str) -> Result<Authority> {
        let url = Url::parse(input.trim()).map_err(error::invalid_url)?;
        Authority::from_url(&url)
    }

    pub(crate) fn from_parts(scheme: Scheme, host: &str, port: Option<u16>) -> Result<Authority> {
        if host.is_empty() {
            return Err(error::invalid_url("host cannot be empty"));
        }
        let host = if host.contains(':') && !host.starts_with('[') {
            format!("[{host}]")
        } else {
            host.to_string()
        };
        let raw = match port {
            Some(port) => format!("{}://{host}:{port}", scheme.as_str()),
            None => format!("{}://{host}", scheme.as_str()),
        };
        Authority::parse(&raw)
    }

    /// Canonical `scheme://host[:port]`, default port omitted.
    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn scheme(&self) -> Scheme {
        self.scheme
    }

    /// Host without IPv6 brackets, suitable for DNS lookup and SNI.
    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn is_secure(&self) -> bool {
        self.scheme == Scheme::Https
    }

    /// `host:port` as written in a CONNECT request line, IPv6 bracketed.
    pub fn host_port(&self) -> String {
        if self.host.contains(':') {
            format!("[{}]:{}", self.host, self.port)
        } else {
            format!("{}:{}", self.host, self.port)
        }
    }

    /// `Host` header value: host, plus the port when it is not the default.
    pub fn host_header(&self) -> &str {
        self.key
            .split_once("://")
            .map_or(self.key.as_str(), |(_, rest)| rest)
    }

    /// Authority-form URI for CONNECT requests.
    pub(crate) fn connect_uri(&self) -> Result<http::Uri> {
        self.host_port().parse().map_err(error::invalid_url)
    }
}

impl fmt::Display for Authority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.key)
    }
}
