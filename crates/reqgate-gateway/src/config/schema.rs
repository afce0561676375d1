use std::net::{IpAddr, SocketAddr};

use axum::http::HeaderName;
use serde::Deserialize;

use reqgate_core::error::{ReqGateError, Result};
use reqgate_core::Environment;

use crate::context::request::DEFAULT_REQUEST_ID_HEADER;
use crate::obs::metrics::DEFAULT_DURATION_SAMPLES;
use crate::obs::LogLevel;
use crate::policy::rate_limit::DEFAULT_MAX_KEYS;

pub const RATE_LIMIT_MIN: i64 = 1;
pub const RATE_LIMIT_MAX: i64 = 10_000;
pub const DEFAULT_RATE_LIMIT_PER_MIN: u32 = 60;
pub const MAX_KEYS_MAX: usize = 1_000_000;
pub const DURATION_SAMPLES_MAX: usize = 100_000;

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GatewayConfig {
    #[serde(default = "default_version")]
    pub version: u32,

    #[serde(default)]
    pub gateway: GatewaySection,

    #[serde(default)]
    pub rate_limit: RateLimitSection,

    #[serde(default)]
    pub metrics: MetricsSection,

    /// Pre-supplied key; never deserialized from files and never logged.
    #[serde(skip)]
    pub api_key: Option<Secret>,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            version: default_version(),
            gateway: GatewaySection::default(),
            rate_limit: RateLimitSection::default(),
            metrics: MetricsSection::default(),
            api_key: None,
        }
    }
}

impl GatewayConfig {
    pub fn validate(&self) -> Result<()> {
        if self.version != 1 {
            return Err(ReqGateError::Validation(format!(
                "unsupported config version: {}",
                self.version
            )));
        }
        self.gateway.validate()?;
        self.rate_limit.validate()?;
        self.metrics.validate()?;
        Ok(())
    }

    pub fn listen_addr(&self) -> Result<SocketAddr> {
        self.gateway.listen.parse().map_err(|e| {
            ReqGateError::Validation(format!("gateway.listen must be a socket address: {e}"))
        })
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GatewaySection {
    #[serde(default = "default_listen")]
    pub listen: String,

    #[serde(default)]
    pub environment: Environment,

    #[serde(default)]
    pub log_level: LogLevel,

    #[serde(default = "default_request_id_header")]
    pub request_id_header: String,

    /// Peers whose `cf-connecting-ip` / `x-forwarded-for` / `x-real-ip`
    /// headers are believed. Empty: the socket peer is always the client.
    #[serde(default)]
    pub trusted_proxies: Vec<IpAddr>,
}

impl Default for GatewaySection {
    fn default() -> Self {
        Self {
            listen: default_listen(),
            environment: Environment::default(),
            log_level: LogLevel::default(),
            request_id_header: default_request_id_header(),
            trusted_proxies: Vec::new(),
        }
    }
}

impl GatewaySection {
    pub fn validate(&self) -> Result<()> {
        self.listen.parse::<SocketAddr>().map_err(|e| {
            ReqGateError::Validation(format!("gateway.listen must be a socket address: {e}"))
        })?;
        if !is_valid_header_name(&self.request_id_header) {
            return Err(ReqGateError::Validation(format!(
                "gateway.request_id_header is not a valid header name: {}",
                self.request_id_header
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RateLimitSection {
    #[serde(default = "default_requests_per_minute")]
    pub requests_per_minute: u32,

    #[serde(default = "default_max_keys")]
    pub max_keys: usize,
}

impl Default for RateLimitSection {
    fn default() -> Self {
        Self {
            requests_per_minute: default_requests_per_minute(),
            max_keys: default_max_keys(),
        }
    }
}

impl RateLimitSection {
    pub fn validate(&self) -> Result<()> {
        if !(RATE_LIMIT_MIN..=RATE_LIMIT_MAX).contains(&i64::from(self.requests_per_minute)) {
            return Err(ReqGateError::Validation(format!(
                "rate_limit.requests_per_minute must be between {RATE_LIMIT_MIN} and {RATE_LIMIT_MAX}"
            )));
        }
        if !(1..=MAX_KEYS_MAX).contains(&self.max_keys) {
            return Err(ReqGateError::Validation(format!(
                "rate_limit.max_keys must be between 1 and {MAX_KEYS_MAX}"
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MetricsSection {
    #[serde(default = "default_duration_samples")]
    pub duration_samples: usize,
}

impl Default for MetricsSection {
    fn default() -> Self {
        Self { duration_samples: default_duration_samples() }
    }
}

impl MetricsSection {
    pub fn validate(&self) -> Result<()> {
        if !(1..=DURATION_SAMPLES_MAX).contains(&self.duration_samples) {
            return Err(ReqGateError::Validation(format!(
                "metrics.duration_samples must be between 1 and {DURATION_SAMPLES_MAX}"
            )));
        }
        Ok(())
    }
}

/// String whose `Debug` output never shows the value.
#[derive(Clone, PartialEq, Eq)]
pub struct Secret(String);

impl Secret {
    pub fn new(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Debug for Secret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Secret([redacted])")
    }
}

pub fn is_valid_header_name(s: &str) -> bool {
    !s.is_empty() && HeaderName::from_bytes(s.as_bytes()).is_ok()
}

fn default_version() -> u32 {
    1
}
fn default_listen() -> String {
    "0.0.0.0:8080".into()
}
fn default_request_id_header() -> String {
    DEFAULT_REQUEST_ID_HEADER.into()
}
fn default_requests_per_minute() -> u32 {
    DEFAULT_RATE_LIMIT_PER_MIN
}
fn default_max_keys() -> usize {
    DEFAULT_MAX_KEYS
}
fn default_duration_samples() -> usize {
    DEFAULT_DURATION_SAMPLES
}
