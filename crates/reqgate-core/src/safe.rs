//! Client-safe error translation.
//!
//! Every error that reaches the request boundary is translated exactly once
//! into a [`SafeError`]. The original error is for server-side logs only; the
//! translated form is what callers see.

use serde_json::json;

use crate::envelope::{ApiError, ApiResponse, Meta};
use crate::environment::Environment;
use crate::error::{ClientCode, ReqGateError};

pub const MSG_NOT_FOUND: &str = "Not Found";
pub const MSG_RATE_LIMITED: &str = "Too Many Requests";
pub const MSG_UPSTREAM: &str = "Upstream service error";
pub const MSG_INTERNAL: &str = "Internal Server Error";

#[derive(Debug, Clone, PartialEq)]
pub struct SafeError {
    pub http_status: u16,
    pub errors: Vec<ApiError>,
    /// Whether the original message was passed through to the caller.
    pub expose: bool,
}

fn kind_meta(code: ClientCode) -> Meta {
    let mut m = Meta::new();
    m.insert("kind".into(), json!(code.as_str()));
    m
}

impl SafeError {
    fn single(code: ClientCode, http_status: u16, message: String, expose: bool) -> Self {
        Self {
            http_status,
            errors: vec![ApiError::new(http_status, message).with_meta(kind_meta(code))],
            expose,
        }
    }

    pub fn translate(err: &ReqGateError, env: Environment) -> Self {
        let code = err.client_code();
        let status = code.http_status();
        match err {
            ReqGateError::Validation(msg) => Self::single(code, status, msg.clone(), true),
            ReqGateError::NotFound => Self::single(code, status, MSG_NOT_FOUND.into(), true),
            ReqGateError::RateLimited { retry_after_ms } => {
                let mut meta = kind_meta(code);
                meta.insert("retryAfterMs".into(), json!(retry_after_ms));
                meta.insert("retryAfterSec".into(), json!(retry_after_secs(*retry_after_ms)));
                Self {
                    http_status: status,
                    errors: vec![ApiError::new(status, MSG_RATE_LIMITED).with_meta(meta)],
                    expose: true,
                }
            }
            ReqGateError::Upstream(msg) => {
                if env.is_prod() {
                    Self::single(code, status, MSG_UPSTREAM.into(), false)
                } else {
                    Self::single(code, status, msg.clone(), true)
                }
            }
            ReqGateError::Internal(_) => Self::single(code, status, MSG_INTERNAL.into(), false),
        }
    }

    /// Translate a bare error status produced without a typed error
    /// (extractor rejections, unmatched routes). `reason` is the canonical
    /// status text; the status itself is preserved.
    pub fn from_status(status: u16, reason: &str) -> Self {
        match status {
            404 => Self::single(ClientCode::NotFound, 404, MSG_NOT_FOUND.into(), true),
            429 => Self::single(ClientCode::RateLimited, 429, MSG_RATE_LIMITED.into(), true),
            400..=499 => Self::single(ClientCode::Validation, status, reason.to_string(), true),
            _ => Self::single(ClientCode::Internal, status, MSG_INTERNAL.into(), false),
        }
    }

    pub fn into_response(self, meta: Option<Meta>) -> ApiResponse {
        ApiResponse::Err { errors: self.errors, meta }
    }

    /// Primary client-visible message.
    pub fn message(&self) -> &str {
        self.errors.first().map(|e| e.message.as_str()).unwrap_or(MSG_INTERNAL)
    }
}

/// Whole seconds to wait, rounded up, at least 1.
pub fn retry_after_secs(retry_after_ms: u64) -> u64 {
    retry_after_ms.div_ceil(1000).max(1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn upstream_detail_hidden_in_prod() {
        let err = ReqGateError::Upstream("DB timeout at host X".into());

        let prod = SafeError::translate(&err, Environment::Prod);
        assert_eq!(prod.http_status, 502);
        assert!(!prod.expose);
        assert!(!prod.message().contains("DB timeout"));
        assert!(!prod.message().contains("host X"));

        let dev = SafeError::translate(&err, Environment::Dev);
        assert!(dev.expose);
        assert!(dev.message().contains("DB timeout at host X"));

        let staging = SafeError::translate(&err, Environment::Staging);
        assert!(staging.message().contains("DB timeout"));
    }

    #[test]
    fn internal_never_exposed() {
        let err = ReqGateError::Internal("stack trace here".into());
        for env in [Environment::Dev, Environment::Staging, Environment::Prod] {
            let safe = SafeError::translate(&err, env);
            assert_eq!(safe.http_status, 500);
            assert_eq!(safe.message(), MSG_INTERNAL);
            assert!(!safe.expose);
        }
    }

    #[test]
    fn not_found_message_fixed() {
        let safe = SafeError::translate(&ReqGateError::NotFound, Environment::Dev);
        assert_eq!(safe.http_status, 404);
        assert_eq!(safe.message(), "Not Found");
    }

    #[test]
    fn validation_always_exposed() {
        let err = ReqGateError::Validation("name is required".into());
        let safe = SafeError::translate(&err, Environment::Prod);
        assert_eq!(safe.http_status, 400);
        assert_eq!(safe.message(), "name is required");
        assert!(safe.expose);
    }

    #[test]
    fn rate_limited_carries_retry_hint() {
        let safe = SafeError::translate(
            &ReqGateError::RateLimited { retry_after_ms: 1500 },
            Environment::Prod,
        );
        assert_eq!(safe.http_status, 429);
        let meta = safe.errors[0].meta.as_ref().map(|m| m["retryAfterSec"].clone());
        assert_eq!(meta, Some(json!(2)));
    }

    #[test]
    fn bare_status_translation() {
        assert_eq!(SafeError::from_status(404, "Not Found").message(), "Not Found");
        let m = SafeError::from_status(405, "Method Not Allowed");
        assert_eq!(m.http_status, 405);
        assert_eq!(m.message(), "Method Not Allowed");
        let s = SafeError::from_status(503, "Service Unavailable");
        assert_eq!(s.http_status, 503);
        assert_eq!(s.message(), MSG_INTERNAL);
    }

    #[test]
    fn retry_seconds_round_up() {
        assert_eq!(retry_after_secs(0), 1);
        assert_eq!(retry_after_secs(1000), 1);
        assert_eq!(retry_after_secs(1001), 2);
    }
}
