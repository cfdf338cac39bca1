//! Gateway Configuration
//!
//! Defines the process-wide settings for the forwarding gateway:
//! - Upstream base URL (fixed for the process lifetime, never path-supplied)
//! - Cancellation bound for mutating forwards
//! - Listen address
//!
//! Built once at startup and shared by reference; nothing mutates it afterwards.

use crate::error::{ConsoleError, ConsoleResult};
use std::time::Duration;

/// Upstream used when `UPSTREAM_API_BASE` is unset
pub const DEFAULT_UPSTREAM_BASE: &str = "http://localhost:8000";

/// Bound after which a mutating forward is cancelled
pub const DEFAULT_FORWARD_TIMEOUT_MS: u64 = 5_000;

pub const DEFAULT_HOST: &str = "0.0.0.0";
pub const DEFAULT_PORT: u16 = 3000;

/// Complete gateway configuration
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// Upstream base URL without a trailing slash
    pub upstream_base: String,
    /// Cancellation bound for POST forwards
    pub forward_timeout: Duration,
    /// Listen host
    pub host: String,
    /// Listen port
    pub port: u16,
}

impl GatewayConfig {
    /// Create a config for the given upstream with default bound and listen address.
    pub fn new(upstream_base: &str) -> ConsoleResult<Self> {
        Ok(Self {
            upstream_base: normalize_base(upstream_base)?,
            forward_timeout: Duration::from_millis(DEFAULT_FORWARD_TIMEOUT_MS),
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
        })
    }

    /// Read `UPSTREAM_API_BASE`, `GATEWAY_HOST` and `GATEWAY_PORT`.
    pub fn from_env() -> ConsoleResult<Self> {
        let base = std::env::var("UPSTREAM_API_BASE")
            .unwrap_or_else(|_| DEFAULT_UPSTREAM_BASE.to_string());
        let mut config = Self::new(&base)?;

        if let Ok(host) = std::env::var("GATEWAY_HOST") {
            config.host = host;
        }
        if let Ok(port) = std::env::var("GATEWAY_PORT") {
            config.port = port
                .parse()
                .map_err(|_| ConsoleError::InvalidConfig(format!("invalid port: {}", port)))?;
        }

        Ok(config)
    }

    pub fn with_forward_timeout(mut self, timeout: Duration) -> Self {
        self.forward_timeout = timeout;
        self
    }

    pub fn with_listen(mut self, host: &str, port: u16) -> Self {
        self.host = host.to_string();
        self.port = port;
        self
    }

    /// Rewrite a relative path onto the upstream base.
    ///
    /// The host always comes from the config, so a crafted path cannot
    /// redirect the gateway elsewhere.
    pub fn upstream_url(&self, path: &str, query: Option<&str>) -> String {
        let mut url = format!("{}/{}", self.upstream_base, path.trim_start_matches('/'));
        if let Some(q) = query.filter(|q| !q.is_empty()) {
            url.push('?');
            url.push_str(q);
        }
        url
    }

    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn normalize_base(raw: &str) -> ConsoleResult<String> {
    let trimmed = raw.trim().trim_end_matches('/');
    let parsed = reqwest::Url::parse(trimmed)
        .map_err(|e| ConsoleError::InvalidConfig(format!("{}: {}", trimmed, e)))?;

    match parsed.scheme() {
        "http" | "https" => {}
        other => {
            return Err(ConsoleError::InvalidConfig(format!(
                "unsupported scheme: {}",
                other
            )))
        }
    }
    if parsed.host_str().is_none() {
        return Err(ConsoleError::InvalidConfig(format!(
            "missing host: {}",
            trimmed
        )));
    }

    Ok(trimmed.to_string())
}
