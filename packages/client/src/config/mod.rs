//! Configuration for pools, negotiators and the bundled HTTP/2 connector.

pub mod agent;
pub mod h2;
pub mod negotiator;

pub use agent::AgentConfig;
pub use h2::H2Config;
pub use negotiator::{ALPN_H2, ALPN_HTTP11, NegotiatorConfig};

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[test]
    fn defaults_are_valid() {
        assert!(AgentConfig::default().validate().is_ok());
        assert!(NegotiatorConfig::default().validate().is_ok());
        assert!(H2Config::default().validate().is_ok());
        assert!(H2Config::high_throughput().validate().is_ok());
    }

    #[test]
    fn agent_defaults() {
        let config = AgentConfig::default();

        assert_eq!(config.timeout, Duration::from_secs(10));
        assert_eq!(config.max_sessions, usize::MAX);
        assert_eq!(config.max_free_sessions, 10);
        assert_eq!(config.max_cached_tls_sessions, 100);
    }

    #[test]
    fn zero_values_rejected() {
        assert!(
            AgentConfig::default()
                .with_timeout(Duration::ZERO)
                .validate()
                .unwrap_err()
                .is_builder()
        );
        assert!(AgentConfig::default().with_max_sessions(0).validate().is_err());
        assert!(
            NegotiatorConfig::default()
                .with_alpn_protocols(Vec::<String>::new())
                .validate()
                .is_err()
        );
    }

    #[test]
    fn frame_size_bounds() {
        let config = H2Config {
            max_frame_size: 1024,
            ..H2Config::default()
        };
        assert!(config.validate().is_err());
    }
}
