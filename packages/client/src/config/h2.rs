//! HTTP/2 session settings applied by the bundled connector

use std::time::Duration;

use crate::error::{self, Result};

/// HTTP/2 protocol configuration
#[derive(Debug, Clone)]
pub struct H2Config {
    pub initial_window_size: u32,
    pub initial_connection_window_size: u32,
    pub max_frame_size: u32,
    pub initial_max_send_streams: usize,
    pub enable_push: bool,
    pub max_send_buffer_size: usize,
    pub handshake_timeout: Duration,
}

impl Default for H2Config {
    fn default() -> Self {
        Self {
            initial_window_size: 65535,
            initial_connection_window_size: 65535,
            max_frame_size: 16384,
            initial_max_send_streams: 100,
            enable_push: false,
            max_send_buffer_size: 1024 * 1024,
            handshake_timeout: Duration::from_secs(10),
        }
    }
}

impl H2Config {
    /// Larger windows for long-lived, high-throughput sessions
    #[must_use]
    pub fn high_throughput() -> Self {
        Self {
            initial_window_size: 1_048_576, // 1MB
            initial_connection_window_size: 4 * 1_048_576,
            max_frame_size: 32768,
            max_send_buffer_size: 4 * 1024 * 1024, // 4MB
            ..Self::default()
        }
    }

    pub(crate) fn builder(&self) -> ::h2::client::Builder {
        let mut builder = ::h2::client::Builder::new();
        builder
            .initial_window_size(self.initial_window_size)
            .initial_connection_window_size(self.initial_connection_window_size)
            .max_frame_size(self.max_frame_size)
            .initial_max_send_streams(self.initial_max_send_streams)
            .max_send_buffer_size(self.max_send_buffer_size)
            .enable_push(self.enable_push);
        builder
    }

    /// # Errors
    ///
    /// Returns a builder error when a window or frame size is outside the
    /// range HTTP/2 allows.
    pub fn validate(&self) -> Result<()> {
        if self.initial_window_size < 65535 {
            return Err(error::builder("initial_window_size must be at least 65535"));
        }
        if self.max_frame_size < 16384 || self.max_frame_size > 16_777_215 {
            return Err(error::builder(
                "max_frame_size must be between 16384 and 16777215",
            ));
        }
        if self.handshake_timeout.is_zero() {
            return Err(error::builder("handshake_timeout cannot be zero"));
        }
        Ok(())
    }
}
