use std::error::Error as StdError;
use std::io;

use http::StatusCode;

use super::helpers::TimedOut;
use super::types::{Error, Kind};

impl Error {
    /// Returns true if the error came from validating options or configuration.
    #[must_use]
    pub fn is_builder(&self) -> bool {
        matches!(self.inner.kind, Kind::Builder)
    }

    /// Returns true if the error is related to establishing a session.
    #[must_use]
    pub fn is_connect(&self) -> bool {
        matches!(self.inner.kind, Kind::Connect)
    }

    /// Returns true if a session closed before it was confirmed usable.
    #[must_use]
    pub fn is_protocol(&self) -> bool {
        matches!(self.inner.kind, Kind::Protocol)
    }

    /// Returns true if a proxy refused a CONNECT request.
    #[must_use]
    pub fn is_proxy_status(&self) -> bool {
        matches!(self.inner.kind, Kind::ProxyStatus(_))
    }

    /// Returns true if the owning pool was destroyed.
    #[must_use]
    pub fn is_destroyed(&self) -> bool {
        matches!(self.inner.kind, Kind::Destroyed)
    }

    /// Returns true if the error only affected a single stream.
    #[must_use]
    pub fn is_stream(&self) -> bool {
        matches!(self.inner.kind, Kind::Stream)
    }

    /// Returns true if the error is related to a timeout.
    #[must_use]
    pub fn is_timeout(&self) -> bool {
        if matches!(self.inner.kind, Kind::Timeout) {
            return true;
        }

        let mut source = self.source();

        while let Some(err) = source {
            if err.is::<TimedOut>() {
                return true;
            }
            if let Some(io) = err.downcast_ref::<io::Error>() {
                if io.kind() == io::ErrorKind::TimedOut {
                    return true;
                }
            }
            source = err.source();
        }

        false
    }

    /// Returns the CONNECT response status, if the proxy rejected the tunnel.
    #[must_use]
    pub fn status(&self) -> Option<StatusCode> {
        match self.inner.kind {
            Kind::ProxyStatus(code) => Some(code),
            _ => None,
        }
    }

    /// Numeric form of [`Error::status`].
    #[must_use]
    pub fn status_code(&self) -> Option<u16> {
        self.status().map(|code| code.as_u16())
    }
}
