//! Relay configuration loaded once at process startup.
//!
//! All environment access happens here, in [`RelayConfig::from_env`]; request
//! handling code receives the built struct and never reads the environment
//! ad hoc.
//!
//! | Field | Variable | Default |
//! |-------|----------|---------|
//! | `api_key` | `ANTHROPIC_API_KEY` | required |
//! | `api_url` | `COURIER_API_URL` | `https://api.anthropic.com/v1/messages` |
//! | `model` | `COURIER_MODEL` | `claude-3-7-sonnet-20250219` |
//! | `max_tokens` | `COURIER_MAX_TOKENS` | `8192` |
//! | `bind_addr` | `COURIER_BIND_ADDR` | `0.0.0.0:8000` |
//! | `relay_timeout_secs` | `COURIER_RELAY_TIMEOUT_SECS` | `30` |
//! | `debug_startup` | `COURIER_DEBUG_STARTUP` | `false` |

use std::fmt;
use std::net::SocketAddr;
use std::time::Duration;

/// Default model identifier sent upstream when none is configured.
pub const DEFAULT_MODEL: &str = "claude-3-7-sonnet-20250219";

/// Default provider endpoint for streaming messages calls.
pub const DEFAULT_API_URL: &str = "https://api.anthropic.com/v1/messages";

const DEFAULT_MAX_TOKENS: u32 = 8192;
const DEFAULT_BIND_ADDR: &str = "0.0.0.0:8000";
const DEFAULT_RELAY_TIMEOUT_SECS: u64 = 30;

/// Errors that can occur when building the configuration.
#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    /// A required environment variable is not set.
    #[error("required environment variable '{0}' is not set")]
    MissingVar(&'static str),

    /// An environment variable holds a value that cannot be parsed.
    #[error("invalid value for '{name}': {message}")]
    InvalidVar {
        name: &'static str,
        message: String,
    },
}

impl ConfigError {
    fn invalid(name: &'static str, message: impl Into<String>) -> Self {
        Self::InvalidVar { name, message: message.into() }
    }
}

/// Process-wide relay configuration.
///
/// Built once in `main` and passed into handlers behind an `Arc`.
#[derive(Debug, Clone)]
pub struct RelayConfig {
    /// Provider API credential.
    pub api_key: String,
    /// Provider endpoint for streaming messages calls.
    pub api_url: String,
    /// Model identifier sent with every upstream request.
    pub model: String,
    /// Upper bound on tokens the provider may generate per request.
    pub max_tokens: u32,
    /// Address the HTTP server binds to.
    pub bind_addr: SocketAddr,
    /// Ceiling on total relay execution time per request.
    pub relay_timeout: Duration,
    /// Log a non-secret configuration summary at startup.
    pub debug_startup: bool,
}

impl RelayConfig {
    /// Builds the configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(&|name| std::env::var(name).ok())
    }

    /// Builds the configuration from an arbitrary variable lookup.
    pub fn from_lookup(lookup: &dyn Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let api_key = lookup("ANTHROPIC_API_KEY")
            .filter(|v| !v.is_empty())
            .ok_or(ConfigError::MissingVar("ANTHROPIC_API_KEY"))?;

        let api_url = lookup("COURIER_API_URL").unwrap_or_else(|| DEFAULT_API_URL.to_string());

        let model = lookup("COURIER_MODEL").unwrap_or_else(|| DEFAULT_MODEL.to_string());

        let max_tokens = match lookup("COURIER_MAX_TOKENS") {
            Some(raw) => raw
                .parse::<u32>()
                .map_err(|e| ConfigError::invalid("COURIER_MAX_TOKENS", e.to_string()))?,
            None => DEFAULT_MAX_TOKENS,
        };

        let bind_addr = lookup("COURIER_BIND_ADDR")
            .unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string())
            .parse::<SocketAddr>()
            .map_err(|e| ConfigError::invalid("COURIER_BIND_ADDR", e.to_string()))?;

        let relay_timeout_secs = match lookup("COURIER_RELAY_TIMEOUT_SECS") {
            Some(raw) => raw
                .parse::<u64>()
                .map_err(|e| ConfigError::invalid("COURIER_RELAY_TIMEOUT_SECS", e.to_string()))?,
            None => DEFAULT_RELAY_TIMEOUT_SECS,
        };

        let debug_startup = match lookup("COURIER_DEBUG_STARTUP").as_deref() {
            None | Some("") | Some("0") | Some("false") => false,
            Some("1") | Some("true") => true,
            Some(other) => {
                return Err(ConfigError::invalid(
                    "COURIER_DEBUG_STARTUP",
                    format!("expected 'true' or 'false', got '{}'", other),
                ))
            }
        };

        Ok(Self {
            api_key,
            api_url,
            model,
            max_tokens,
            bind_addr,
            relay_timeout: Duration::from_secs(relay_timeout_secs),
            debug_startup,
        })
    }
}

/// Non-secret summary for the gated startup log. Never includes key material.
impl fmt::Display for RelayConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "model={}, bind={}, max_tokens={}, relay_timeout={}s, api_key_len={}",
            self.model,
            self.bind_addr,
            self.max_tokens,
            self.relay_timeout.as_secs(),
            self.api_key.len()
        )
    }
}
