//! Shared error type across reqgate crates.

use thiserror::Error;

/// Client-facing error codes (stable API).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientCode {
    /// Malformed or missing input.
    Validation,
    /// Resource does not exist (or is not disclosed).
    NotFound,
    /// Admission denied by the rate limiter.
    RateLimited,
    /// A collaborator or network dependency failed.
    Upstream,
    /// Anything else.
    Internal,
}

impl ClientCode {
    /// String representation used in JSON responses.
    pub fn as_str(self) -> &'static str {
        match self {
            ClientCode::Validation => "VALIDATION",
            ClientCode::NotFound => "NOT_FOUND",
            ClientCode::RateLimited => "RATE_LIMITED",
            ClientCode::Upstream => "UPSTREAM",
            ClientCode::Internal => "INTERNAL",
        }
    }

    /// HTTP status carried by responses of this kind.
    pub fn http_status(self) -> u16 {
        match self {
            ClientCode::Validation => 400,
            ClientCode::NotFound => 404,
            ClientCode::RateLimited => 429,
            ClientCode::Upstream => 502,
            ClientCode::Internal => 500,
        }
    }
}

/// Shared result type.
pub type Result<T> = std::result::Result<T, ReqGateError>;

/// Unified error type used by handlers, config and the pipeline.
///
/// The `Display` text is the *server-side* description. What a caller sees is
/// decided by [`crate::SafeError::translate`].
#[derive(Debug, Clone, Error)]
pub enum ReqGateError {
    #[error("validation failed: {0}")]
    Validation(String),
    #[error("not found")]
    NotFound,
    #[error("rate limited (retry after {retry_after_ms}ms)")]
    RateLimited { retry_after_ms: u64 },
    #[error("upstream failure: {0}")]
    Upstream(String),
    #[error("internal: {0}")]
    Internal(String),
}

impl ReqGateError {
    /// Map internal error to a stable client-facing code.
    pub fn client_code(&self) -> ClientCode {
        match self {
            ReqGateError::Validation(_) => ClientCode::Validation,
            ReqGateError::NotFound => ClientCode::NotFound,
            ReqGateError::RateLimited { .. } => ClientCode::RateLimited,
            ReqGateError::Upstream(_) => ClientCode::Upstream,
            ReqGateError::Internal(_) => ClientCode::Internal,
        }
    }

    pub fn http_status(&self) -> u16 {
        self.client_code().http_status()
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;

    #[test]
    fn status_per_kind() {
        assert_eq!(ReqGateError::Validation("x".into()).http_status(), 400);
        assert_eq!(ReqGateError::NotFound.http_status(), 404);
        assert_eq!(ReqGateError::RateLimited { retry_after_ms: 5 }.http_status(), 429);
        assert_eq!(ReqGateError::Upstream("x".into()).http_status(), 502);
        assert_eq!(ReqGateError::Internal("x".into()).http_status(), 500);
    }

    #[test]
    fn display_keeps_server_detail() {
        let e = ReqGateError::Upstream("DB timeout at host X".into());
        assert_eq!(e.to_string(), "upstream failure: DB timeout at host X");
        assert_eq!(e.client_code().as_str(), "UPSTREAM");
    }
}
