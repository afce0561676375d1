//! Gateway config loader (strict YAML + environment overlay).
//!
//! Every field has a fallback, so an empty file (or no file at all) is a valid
//! configuration. Environment-style keys are applied on top; invalid values
//! keep the fallback and log a warning instead of failing startup.

pub mod schema;

use std::fs;
use std::net::IpAddr;

use reqgate_core::clock::clamp_int;
use reqgate_core::error::{ReqGateError, Result};
use reqgate_core::Environment;

use crate::obs::LogLevel;

pub use schema::{
    GatewayConfig, GatewaySection, MetricsSection, RateLimitSection, Secret, RATE_LIMIT_MAX,
    RATE_LIMIT_MIN,
};

pub const ENV_CONFIG_PATH: &str = "REQGATE_CONFIG";
pub const ENV_LISTEN: &str = "REQGATE_LISTEN";
pub const ENV_ENVIRONMENT: &str = "ENVIRONMENT";
pub const ENV_LOG_LEVEL: &str = "LOG_LEVEL";
pub const ENV_RATE_LIMIT: &str = "RATE_LIMIT_PER_MIN";
pub const ENV_REQUEST_ID_HEADER: &str = "REQUEST_ID_HEADER";
pub const ENV_API_KEY: &str = "API_KEY";
pub const ENV_TRUSTED_PROXIES: &str = "REQGATE_TRUSTED_PROXIES";

pub fn load_from_file(path: &str) -> Result<GatewayConfig> {
    let s = fs::read_to_string(path)
        .map_err(|e| ReqGateError::Internal(format!("read config failed ({path}): {e}")))?;
    load_from_str(&s)
}

pub fn load_from_str(s: &str) -> Result<GatewayConfig> {
    // an empty YAML document deserializes as unit, not as an empty mapping
    let cfg: GatewayConfig = if s.trim().is_empty() {
        GatewayConfig::default()
    } else {
        serde_yaml::from_str(s).map_err(|e| ReqGateError::Validation(format!("invalid yaml: {e}")))?
    };
    cfg.validate()?;
    Ok(cfg)
}

/// Overlay environment-style keys. `lookup` is usually `std::env::var(..).ok()`.
pub fn apply_env<F>(cfg: &mut GatewayConfig, lookup: F)
where
    F: Fn(&str) -> Option<String>,
{
    let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

    if let Some(v) = get(ENV_ENVIRONMENT) {
        match Environment::parse(&v) {
            Some(env) => cfg.gateway.environment = env,
            None => warn_invalid(ENV_ENVIRONMENT, &v, "unknown environment"),
        }
    }

    if let Some(v) = get(ENV_LOG_LEVEL) {
        match LogLevel::parse(&v) {
            Some(level) => cfg.gateway.log_level = level,
            None => warn_invalid(ENV_LOG_LEVEL, &v, "unknown log level"),
        }
    }

    if let Some(v) = get(ENV_RATE_LIMIT) {
        let current = i64::from(cfg.rate_limit.requests_per_minute);
        let rpm = clamp_int(Some(&v), RATE_LIMIT_MIN, RATE_LIMIT_MAX, current);
        // clamped into 1..=10_000, always fits
        cfg.rate_limit.requests_per_minute =
            u32::try_from(rpm).unwrap_or(schema::DEFAULT_RATE_LIMIT_PER_MIN);
    }

    if let Some(v) = get(ENV_REQUEST_ID_HEADER) {
        let name = v.to_ascii_lowercase();
        if schema::is_valid_header_name(&name) {
            cfg.gateway.request_id_header = name;
        } else {
            warn_invalid(ENV_REQUEST_ID_HEADER, &v, "invalid header name");
        }
    }

    if let Some(v) = get(ENV_TRUSTED_PROXIES) {
        match parse_ip_list(&v) {
            Some(ips) => cfg.gateway.trusted_proxies = ips,
            None => warn_invalid(ENV_TRUSTED_PROXIES, &v, "invalid proxy address list"),
        }
    }

    if let Some(v) = get(ENV_LISTEN) {
        cfg.gateway.listen = v;
    }

    if let Some(v) = get(ENV_API_KEY) {
        cfg.api_key = Some(Secret::new(v));
    }
}

fn parse_ip_list(v: &str) -> Option<Vec<IpAddr>> {
    v.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| s.parse().ok())
        .collect()
}

fn warn_invalid(key: &str, value: &str, what: &str) {
    tracing::warn!(key, value, "{what}; keeping fallback");
}

/// Binary entry: optional YAML file, then the process environment, then
/// validation.
pub fn load() -> Result<GatewayConfig> {
    let mut cfg = match std::env::var(ENV_CONFIG_PATH) {
        Ok(path) if !path.trim().is_empty() => load_from_file(path.trim())?,
        _ => GatewayConfig::default(),
    };
    apply_env(&mut cfg, |k| std::env::var(k).ok());
    cfg.validate()?;
    Ok(cfg)
}
