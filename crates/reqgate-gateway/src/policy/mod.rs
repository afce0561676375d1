//! Admission policy.
//!
//! Currently a single fixed-window limiter keyed by client identity; the
//! pipeline consults it before any handler runs.

pub mod rate_limit;

pub use rate_limit::{
    client_key, spawn_sweeper, Admission, FixedWindowLimiter, RateLimitState, SweeperGuard,
};
