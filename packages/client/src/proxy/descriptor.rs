//! Upstream proxy description

use std::fmt;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use http::header::{HOST, HeaderName, HeaderValue, PROXY_AUTHORIZATION};
use http::HeaderMap;
use url::Url;

use crate::error::{self, Result};
use crate::http::Authority;

/// Where a tunnel goes through and how its CONNECT request looks.
#[derive(Clone)]
pub struct TunnelDescriptor {
    proxy_url: Url,
    headers: HeaderMap,
    raw: bool,
}

impl TunnelDescriptor {
    /// Describe a tunnel through `proxy_url`. Credentials embedded in the URL
    /// become a `Proxy-Authorization: Basic` header.
    ///
    /// # Errors
    ///
    /// Returns a builder error if the URL does not parse or is not http(s).
    pub fn new(proxy_url: &str) -> Result<Self> {
        let proxy_url = Url::parse(proxy_url).map_err(error::invalid_url)?;
        Self::from_url(proxy_url)
    }

    /// # Errors
    ///
    /// See [`TunnelDescriptor::new`].
    pub fn from_url(proxy_url: Url) -> Result<Self> {
        Authority::from_url(&proxy_url)?;
        Ok(Self {
            proxy_url,
            headers: HeaderMap::new(),
            raw: false,
        })
    }

    /// Add a header sent with every CONNECT request.
    ///
    /// # Errors
    ///
    /// Returns a builder error for an invalid header name or value.
    pub fn with_header(mut self, name: &str, value: &str) -> Result<Self> {
        let name = HeaderName::from_bytes(name.as_bytes()).map_err(error::invalid_header)?;
        let value = HeaderValue::from_str(value).map_err(error::invalid_header)?;
        self.headers.append(name, value);
        Ok(self)
    }

    #[must_use]
    pub fn with_headers(mut self, headers: HeaderMap) -> Self {
        self.headers.extend(headers);
        self
    }

    /// Use the tunnel as the connection itself instead of running TLS over it.
    #[must_use]
    pub fn raw(mut self, raw: bool) -> Self {
        self.raw = raw;
        self
    }

    pub fn is_raw(&self) -> bool {
        self.raw
    }

    pub fn proxy_url(&self) -> &Url {
        &self.proxy_url
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Authority of the proxy itself.
    ///
    /// # Errors
    ///
    /// Never fails for a descriptor built through [`TunnelDescriptor::new`].
    pub fn proxy_authority(&self) -> Result<Authority> {
        Authority::from_url(&self.proxy_url)
    }

    /// Headers for a CONNECT request toward `target`.
    ///
    /// # Errors
    ///
    /// Returns a builder error if the host or credentials cannot be encoded
    /// as header values.
    pub fn connect_headers(&self, target: &Authority) -> Result<HeaderMap> {
        let mut headers = self.headers.clone();

        let host = HeaderValue::from_str(&target.host_port()).map_err(error::invalid_header)?;
        headers.insert(HOST, host);

        if !headers.contains_key(PROXY_AUTHORIZATION) {
            if let Some(credentials) = self.basic_credentials()? {
                let value = HeaderValue::from_str(&format!("Basic {credentials}"))
                    .map_err(error::invalid_header)?;
                headers.insert(PROXY_AUTHORIZATION, value);
            }
        }
        Ok(headers)
    }

    fn basic_credentials(&self) -> Result<Option<String>> {
        let username = self.proxy_url.username();
        let password = self.proxy_url.password();
        if username.is_empty() && password.is_none() {
            return Ok(None);
        }

        let username = urlencoding::decode(username).map_err(error::invalid_url)?;
        let password = urlencoding::decode(password.unwrap_or("")).map_err(error::invalid_url)?;
        Ok(Some(STANDARD.encode(format!("{username}:{password}"))))
    }
}

impl fmt::Debug for TunnelDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // credentials stay out of logs
        let mut url = self.proxy_url.clone();
        let _ = url.set_password(None);
        let _ = url.set_username("");
        f.debug_struct("TunnelDescriptor")
            .field("proxy_url", &url.as_str())
            .field("headers", &self.headers.len())
            .field("raw", &self.raw)
            .finish()
    }
}
