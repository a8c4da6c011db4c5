use std::error::Error as StdError;
use std::fmt;
use std::sync::Arc;

use http::StatusCode;

/// A Result alias where the Err case is `muxpool_client::Error`.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors surfaced by the session pool, the protocol negotiator and tunnel agents.
///
/// Cloning is cheap: a single failed connection attempt fans the same error
/// out to every caller waiting on it.
#[derive(Clone)]
pub struct Error {
    pub(crate) inner: Box<Inner>,
}

#[derive(Clone)]
pub(crate) struct Inner {
    pub(crate) kind: Kind,
    pub(crate) source: Option<Arc<dyn StdError + Send + Sync>>,
    pub(crate) url: Option<url::Url>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Kind {
    /// Malformed option, configuration, header or target
    Builder,
    /// Transport or handshake failure while establishing a session
    Connect,
    /// Session closed before the peer confirmed it was usable
    Protocol,
    /// The proxy answered a CONNECT request with a non-200 status
    ProxyStatus(StatusCode),
    /// Session destroyed after sitting idle for too long
    Timeout,
    /// The owning pool was explicitly destroyed
    Destroyed,
    /// Failure scoped to a single stream
    Stream,
    /// Legacy request/response exchange failure
    Request,
}

impl Error {
    pub(crate) fn new(kind: Kind) -> Error {
        Error {
            inner: Box::new(Inner {
                kind,
                source: None,
                url: None,
            }),
        }
    }

    #[must_use = "Error builder methods return a new Error and should be used"]
    pub(crate) fn with<E: Into<Box<dyn StdError + Send + Sync>>>(mut self, source: E) -> Error {
        self.inner.source = Some(Arc::from(source.into()));
        self
    }

    #[must_use]
    pub fn with_url(mut self, url: url::Url) -> Self {
        self.inner.url = Some(url);
        self
    }

    /// The category of this error.
    #[must_use]
    pub fn kind(&self) -> &Kind {
        &self.inner.kind
    }

    /// Get the URL associated with this error, if any
    #[must_use]
    pub fn url(&self) -> Option<&url::Url> {
        self.inner.url.as_ref()
    }
}

impl fmt::Debug for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut f = f.debug_struct("muxpool::Error");

        f.field("kind", &self.inner.kind);

        if let Some(ref source) = self.inner.source {
            f.field("source", source);
        }

        if let Some(ref url) = self.inner.url {
            f.field("url", url);
        }

        f.finish()
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.inner.kind {
            Kind::Builder => f.write_str("builder error")?,
            Kind::Connect => f.write_str("error establishing session")?,
            Kind::Protocol => f.write_str("session closed without receiving a SETTINGS frame")?,
            Kind::ProxyStatus(code) => write!(
                f,
                "the proxy server rejected the request with status code {}",
                code.as_u16()
            )?,
            Kind::Timeout => f.write_str("session idle timeout")?,
            Kind::Destroyed => f.write_str("agent has been destroyed")?,
            Kind::Stream => f.write_str("stream error")?,
            Kind::Request => f.write_str("error sending request")?,
        }

        if let Some(ref source) = self.inner.source {
            write!(f, ": {source}")?;
        }

        Ok(())
    }
}

impl StdError for Error {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.inner
            .source
            .as_ref()
            .map(|err| &**err as &(dyn StdError + 'static))
    }
}
