pub mod classification;
pub mod constructors;
pub mod helpers;
pub mod types;

pub use constructors::*;
pub use helpers::{
    OperationCanceled, SessionClosing, SessionDestroyed, SettingsNotReceived, TimedOut,
};
pub use types::{Error, Kind, Result};

#[cfg(test)]
mod tests {
    use http::StatusCode;

    use super::*;

    #[test]
    fn proxy_status_carries_code() {
        let err = proxy_status(StatusCode::FORBIDDEN);

        assert!(err.is_proxy_status());
        assert_eq!(err.status_code(), Some(403));
        assert!(err.to_string().contains("403"));
    }

    #[test]
    fn idle_timeout_is_timeout() {
        let err = idle_timeout();

        assert!(err.is_timeout());
        assert!(!err.is_connect());
    }

    #[test]
    fn clone_keeps_source() {
        let err = connect(std::io::Error::new(std::io::ErrorKind::ConnectionRefused, "refused"));
        let cloned = err.clone();

        assert!(cloned.is_connect());
        assert!(cloned.to_string().contains("refused"));
    }

    #[test]
    fn destroyed_reason_is_reported() {
        let err = destroyed(Some("shutting down"));

        assert!(err.is_destroyed());
        assert!(err.to_string().contains("shutting down"));
    }
}
