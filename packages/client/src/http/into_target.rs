use url::Url;

use super::authority::{Authority, Scheme};
use crate::error::Result;

/// Structured form of a target, the equivalent of `{protocol, host, port}`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestOptions {
    pub scheme: Scheme,
    pub host: String,
    /// Defaults to the scheme's well-known port
    pub port: Option<u16>,
}

impl RequestOptions {
    pub fn new(scheme: Scheme, host: impl Into<String>) -> Self {
        Self {
            scheme,
            host: host.into(),
            port: None,
        }
    }

    #[must_use]
    pub fn port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }
}

/// A trait to try to convert some type into an `Authority`.
///
/// This trait is "sealed", such that only types within muxpool can
/// implement it. The pool and the negotiator both accept any `IntoTarget`,
/// so every input shape is normalized the same way.
pub trait IntoTarget: IntoTargetSealed {}

impl IntoTarget for Url {}
impl IntoTarget for &Url {}
impl IntoTarget for String {}
impl IntoTarget for &str {}
impl IntoTarget for &String {}
impl IntoTarget for RequestOptions {}
impl IntoTarget for &RequestOptions {}
impl IntoTarget for Authority {}
impl IntoTarget for &Authority {}

pub trait IntoTargetSealed {
    /// # Errors
    ///
    /// Returns a builder error if the value does not name an http(s) host.
    fn into_authority(self) -> Result<Authority>;
}

impl IntoTargetSealed for Url {
    fn into_authority(self) -> Result<Authority> {
        Authority::from_url(&self)
    }
}

impl IntoTargetSealed for &Url {
    fn into_authority(self) -> Result<Authority> {
        Authority::from_url(self)
    }
}

impl IntoTargetSealed for &str {
    fn into_authority(self) -> Result<Authority> {
        Authority::parse(self)
    }
}

impl IntoTargetSealed for &String {
    fn into_authority(self) -> Result<Authority> {
        (&**self).into_authority()
    }
}

impl IntoTargetSealed for String {
    fn into_authority(self) -> Result<Authority> {
        (&*self).into_authority()
    }
}

impl IntoTargetSealed for &RequestOptions {
    fn into_authority(self) -> Result<Authority> {
        Authority::from_parts(self.scheme, &self.host, self.port)
    }
}

impl IntoTargetSealed for RequestOptions {
    fn into_authority(self) -> Result<Authority> {
        (&self).into_authority()
    }
}

impl IntoTargetSealed for Authority {
    fn into_authority(self) -> Result<Authority> {
        Ok(self)
    }
}

impl IntoTargetSealed for &Authority {
    fn into_authority(self) -> Result<Authority> {
        Ok(self.clone())
    }
}
