//! # Configuration
//!
//! Knobs shared by the router, the request context and the handler adapter.
//! Deserializable so host applications can embed it in their own config files.

use crate::pool::DEFAULT_POOL_CAPACITY;
use serde::Deserialize;

/// Log output format for [`crate::logging::init_tracing`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable lines
    #[default]
    Plain,
    /// One JSON object per event
    Json,
}

/// Runtime configuration
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Max request body size in bytes
    pub max_body_size: usize,
    /// Idle request values kept per request type
    pub pool_capacity: usize,
    /// Derive the client address from `X-Forwarded-For` / `X-Real-IP`
    pub trust_proxy_headers: bool,
    /// Log output format
    pub log_format: LogFormat,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            max_body_size: 1024 * 1024,
            pool_capacity: DEFAULT_POOL_CAPACITY,
            trust_proxy_headers: true,
            log_format: LogFormat::Plain,
        }
    }
}

impl Config {
    /// Create the default configuration
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set max request body size
    #[must_use]
    pub const fn with_max_body_size(mut self, bytes: usize) -> Self {
        self.max_body_size = bytes;
        self
    }

    /// Set the number of idle request values kept per type
    #[must_use]
    pub const fn with_pool_capacity(mut self, capacity: usize) -> Self {
        self.pool_capacity = capacity;
        self
    }

    /// Trust or ignore proxy headers when deriving the client address
    #[must_use]
    pub const fn with_trust_proxy_headers(mut self, trust: bool) -> Self {
        self.trust_proxy_headers = trust;
        self
    }

    /// Set the log output format
    #[must_use]
    pub const fn with_log_format(mut self, format: LogFormat) -> Self {
        self.log_format = format;
        self
    }
}
