use http::StatusCode;

use super::helpers::{OperationCanceled, SessionDestroyed, SettingsNotReceived, TimedOut};
use super::types::{Error, Kind};

pub(crate) type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Creates an `Error` for a builder/validation error.
pub fn builder<E: Into<BoxError>>(e: E) -> Error {
    Error::new(Kind::Builder).with(e.into())
}

/// Creates an `Error` for a malformed header name or value.
pub fn invalid_header<E: Into<BoxError>>(e: E) -> Error {
    Error::new(Kind::Builder).with(e.into())
}

/// Creates an `Error` for an unusable target URL.
pub fn invalid_url<E: Into<BoxError>>(e: E) -> Error {
    Error::new(Kind::Builder).with(e.into())
}

/// Creates an `Error` for a transport or handshake failure.
pub fn connect<E: Into<BoxError>>(e: E) -> Error {
    Error::new(Kind::Connect).with(e.into())
}

/// Creates an `Error` for a TLS configuration or handshake failure.
pub fn tls<E: Into<BoxError>>(e: E) -> Error {
    Error::new(Kind::Connect).with(e.into())
}

/// Creates an `Error` for a session that closed before it was usable.
pub fn protocol() -> Error {
    Error::new(Kind::Protocol).with(SettingsNotReceived)
}

/// Creates an `Error` for a CONNECT response other than 200.
pub fn proxy_status(status: StatusCode) -> Error {
    Error::new(Kind::ProxyStatus(status))
}

/// Creates an `Error` for an idle-session timeout.
pub fn idle_timeout() -> Error {
    Error::new(Kind::Timeout).with(TimedOut)
}

/// Creates an `Error` for an explicit pool teardown.
pub fn destroyed(reason: Option<&str>) -> Error {
    match reason {
        Some(reason) => Error::new(Kind::Destroyed).with(reason.to_string()),
        None => Error::new(Kind::Destroyed).with(SessionDestroyed),
    }
}

/// Creates an `Error` for a caller whose pending attempt was dropped.
pub fn canceled() -> Error {
    Error::new(Kind::Destroyed).with(OperationCanceled)
}

/// Creates an `Error` scoped to a single stream.
pub fn stream<E: Into<BoxError>>(e: E) -> Error {
    Error::new(Kind::Stream).with(e.into())
}

/// Creates an `Error` for a legacy request failure.
pub fn request<E: Into<BoxError>>(e: E) -> Error {
    Error::new(Kind::Request).with(e.into())
}
