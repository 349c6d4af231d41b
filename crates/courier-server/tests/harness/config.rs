//! Relay configuration builder for integration tests

use std::time::Duration;

use courier_config::RelayConfig;

/// Builds a [`RelayConfig`] pointed at a mock provider.
pub struct ConfigBuilder {
    api_url: String,
    relay_timeout: Duration,
}

impl ConfigBuilder {
    pub fn new(api_url: impl Into<String>) -> Self {
        Self {
            api_url: api_url.into(),
            relay_timeout: Duration::from_secs(30),
        }
    }

    /// Lowers the relay execution ceiling (for timeout tests).
    pub fn with_relay_timeout(mut self, timeout: Duration) -> Self {
        self.relay_timeout = timeout;
        self
    }

    pub fn build(self) -> RelayConfig {
        RelayConfig {
            api_key: "sk-test-key".to_owned(),
            api_url: self.api_url,
            model: "claude-3-7-sonnet-20250219".to_owned(),
            max_tokens: 256,
            bind_addr: "127.0.0.1:0".parse().unwrap(),
            relay_timeout: self.relay_timeout,
            debug_startup: false,
        }
    }
}
