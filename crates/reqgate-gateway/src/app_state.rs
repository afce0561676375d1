//! Shared application state for the reqgate pipeline.
//!
//! Owns the limiter, the metrics aggregator and the logger. Nothing here is a
//! process global: tests build as many isolated states as they need, and the
//! background sweeper stops when its guard is dropped.

use std::net::IpAddr;
use std::sync::Arc;
use std::time::Duration;

use reqgate_core::error::Result;
use reqgate_core::Environment;

use crate::config::GatewayConfig;
use crate::obs::{Logger, Metrics};
use crate::policy::{spawn_sweeper, FixedWindowLimiter, SweeperGuard};

#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
    limiter: Arc<FixedWindowLimiter>,
}

struct AppStateInner {
    cfg: GatewayConfig,
    metrics: Metrics,
    logger: Logger,
}

impl AppState {
    /// Build application state with a `tracing`-backed logger.
    pub fn new(cfg: GatewayConfig) -> Result<Self> {
        let logger = Logger::tracing(cfg.gateway.log_level);
        Self::with_logger(cfg, logger)
    }

    /// Build application state with a caller-supplied logger (tests, embedding).
    pub fn with_logger(cfg: GatewayConfig, logger: Logger) -> Result<Self> {
        cfg.validate()?;

        let logger = match &cfg.api_key {
            Some(key) => logger.with_secret(key.expose()),
            None => logger,
        };
        let limiter = Arc::new(FixedWindowLimiter::per_minute(
            cfg.rate_limit.requests_per_minute,
            cfg.rate_limit.max_keys,
        ));
        let metrics = Metrics::new(cfg.metrics.duration_samples);

        Ok(Self {
            inner: Arc::new(AppStateInner { cfg, metrics, logger }),
            limiter,
        })
    }

    pub fn environment(&self) -> Environment {
        self.inner.cfg.gateway.environment
    }

    pub fn request_id_header(&self) -> &str {
        &self.inner.cfg.gateway.request_id_header
    }

    pub fn trusted_proxies(&self) -> &[IpAddr] {
        &self.inner.cfg.gateway.trusted_proxies
    }

    pub fn limiter(&self) -> &FixedWindowLimiter {
        &self.limiter
    }

    pub fn metrics(&self) -> &Metrics {
        &self.inner.metrics
    }

    pub fn logger(&self) -> &Logger {
        &self.inner.logger
    }

    /// Sweep expired limiter windows once per window. Keep the guard alive
    /// for as long as the server runs; requires a tokio runtime.
    pub fn spawn_sweeper(&self) -> SweeperGuard {
        let every = Duration::from_millis(self.limiter.window_ms().unsigned_abs());
        spawn_sweeper(&self.limiter, every)
    }
}
