//! In-process observability: request metrics and the structured logger.
//!
//! Nothing here is exported off-box; metrics are read through the ops
//! endpoints and log lines go wherever the `tracing` subscriber sends them.

pub mod log;
pub mod metrics;

pub use log::{fields, Fields, LogLevel, LogSink, Logger};
pub use metrics::{DurationSummary, Metrics, MetricsSnapshot};
