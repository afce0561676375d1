//! Leveled structured logger.
//!
//! One `Logger` lives in `AppState`; it filters by level, sanitizes fields and
//! hands a single structured line to a [`LogSink`]. The default sink forwards
//! to `tracing`, so the binary's subscriber decides formatting and output.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use reqgate_core::clock::now_ms;
use reqgate_core::log_value::{fields_to_json, LogValue, REDACTED};

pub const LOG_TARGET: &str = "reqgate";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

impl LogLevel {
    pub fn rank(self) -> u8 {
        match self {
            LogLevel::Debug => 10,
            LogLevel::Info => 20,
            LogLevel::Warn => 30,
            LogLevel::Error => 40,
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "debug" => Some(LogLevel::Debug),
            "info" => Some(LogLevel::Info),
            "warn" | "warning" => Some(LogLevel::Warn),
            "error" => Some(LogLevel::Error),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }
}

pub type Fields = BTreeMap<String, LogValue>;

/// Build a field set from literal pairs.
pub fn fields<const N: usize>(pairs: [(&str, LogValue); N]) -> Fields {
    pairs.into_iter().map(|(k, v)| (k.to_string(), v)).collect()
}

/// `tracing-subscriber` filter directive: a non-blank `RUST_LOG` wins,
/// otherwise the configured level applies to every target.
pub fn filter_directive(rust_log: Option<&str>, level: LogLevel) -> String {
    rust_log
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map_or_else(|| level.as_str().to_string(), str::to_string)
}

/// A rendered, already-sanitized log line.
#[derive(Debug, Clone)]
pub struct LogLine {
    pub ts_ms: i64,
    pub level: LogLevel,
    pub msg: String,
    pub fields: Map<String, Value>,
}

impl LogLine {
    pub fn to_json(&self) -> Value {
        let mut obj = Map::with_capacity(self.fields.len() + 3);
        obj.insert("ts".into(), Value::from(self.ts_ms));
        obj.insert("level".into(), Value::from(self.level.as_str()));
        obj.insert("msg".into(), Value::from(self.msg.clone()));
        for (k, v) in &self.fields {
            // reserved keys win
            obj.entry(k.clone()).or_insert_with(|| v.clone());
        }
        Value::Object(obj)
    }

    pub fn render(&self) -> String {
        self.to_json().to_string()
    }

    pub fn field(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }
}

/// Destination for log lines. Must not block the response path.
pub trait LogSink: Send + Sync {
    fn emit(&self, line: &LogLine);
}

/// Forwards lines to `tracing` at the matching level.
#[derive(Debug, Default)]
pub struct TracingSink;

impl LogSink for TracingSink {
    fn emit(&self, line: &LogLine) {
        let rendered = line.render();
        match line.level {
            LogLevel::Debug => tracing::debug!(target: LOG_TARGET, "{rendered}"),
            LogLevel::Info => tracing::info!(target: LOG_TARGET, "{rendered}"),
            LogLevel::Warn => tracing::warn!(target: LOG_TARGET, "{rendered}"),
            LogLevel::Error => tracing::error!(target: LOG_TARGET, "{rendered}"),
        }
    }
}

/// Keeps lines in memory. Intended for tests and diagnostics.
#[derive(Debug, Default)]
pub struct MemorySink {
    lines: Mutex<Vec<LogLine>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lines(&self) -> Vec<LogLine> {
        self.lines.lock().map(|g| g.clone()).unwrap_or_else(|p| p.into_inner().clone())
    }
}

impl LogSink for MemorySink {
    fn emit(&self, line: &LogLine) {
        let mut g = self.lines.lock().unwrap_or_else(|p| p.into_inner());
        g.push(line.clone());
    }
}

#[derive(Clone)]
pub struct Logger {
    min: LogLevel,
    sink: Arc<dyn LogSink>,
    secrets: Vec<String>,
}

impl std::fmt::Debug for Logger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Logger")
            .field("min", &self.min)
            .field("secrets", &self.secrets.len())
            .finish()
    }
}

impl Logger {
    pub fn new(min: LogLevel, sink: Arc<dyn LogSink>) -> Self {
        Self { min, sink, secrets: Vec::new() }
    }

    /// Logger backed by [`TracingSink`].
    pub fn tracing(min: LogLevel) -> Self {
        Self::new(min, Arc::new(TracingSink))
    }

    /// Scrub every occurrence of `secret` from emitted string values.
    pub fn with_secret(mut self, secret: impl Into<String>) -> Self {
        let s = secret.into();
        if !s.is_empty() {
            self.secrets.push(s);
        }
        self
    }

    pub fn min_level(&self) -> LogLevel {
        self.min
    }

    pub fn enabled(&self, level: LogLevel) -> bool {
        level.rank() >= self.min.rank()
    }

    pub fn log(&self, level: LogLevel, msg: &str, fields: Fields) {
        if !self.enabled(level) {
            return;
        }
        let mut fields = fields_to_json(&fields);
        let mut msg = msg.to_string();
        if !self.secrets.is_empty() {
            msg = self.scrub_str(&msg);
            for v in fields.values_mut() {
                self.scrub(v);
            }
        }
        self.sink.emit(&LogLine { ts_ms: now_ms(), level, msg, fields });
    }

    pub fn debug(&self, msg: &str, fields: Fields) {
        self.log(LogLevel::Debug, msg, fields);
    }

    pub fn info(&self, msg: &str, fields: Fields) {
        self.log(LogLevel::Info, msg, fields);
    }

    pub fn warn(&self, msg: &str, fields: Fields) {
        self.log(LogLevel::Warn, msg, fields);
    }

    pub fn error(&self, msg: &str, fields: Fields) {
        self.log(LogLevel::Error, msg, fields);
    }

    fn scrub_str(&self, s: &str) -> String {
        self.secrets
            .iter()
            .fold(s.to_string(), |acc, secret| acc.replace(secret.as_str(), REDACTED))
    }

    fn scrub(&self, v: &mut Value) {
        match v {
            Value::String(s) => *s = self.scrub_str(s),
            Value::Array(items) => items.iter_mut().for_each(|i| self.scrub(i)),
            Value::Object(map) => map.values_mut().for_each(|i| self.scrub(i)),
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn filter_directive_follows_configured_level() {
        assert_eq!(filter_directive(None, LogLevel::Debug), "debug");
        assert_eq!(filter_directive(Some("  "), LogLevel::Warn), "warn");
        assert_eq!(filter_directive(Some("reqgate=trace"), LogLevel::Info), "reqgate=trace");
    }

    fn capture(min: LogLevel) -> (Logger, Arc<MemorySink>) {
        let sink = Arc::new(MemorySink::new());
        (Logger::new(min, sink.clone()), sink)
    }

    #[test]
    fn ranks_are_ordered() {
        assert_eq!(LogLevel::Debug.rank(), 10);
        assert_eq!(LogLevel::Info.rank(), 20);
        assert_eq!(LogLevel::Warn.rank(), 30);
        assert_eq!(LogLevel::Error.rank(), 40);
        assert_eq!(LogLevel::parse("WARN"), Some(LogLevel::Warn));
        assert_eq!(LogLevel::parse("trace"), None);
    }

    #[test]
    fn filters_below_min_level() {
        let (log, sink) = capture(LogLevel::Warn);
        log.debug("d", Fields::new());
        log.info("i", Fields::new());
        log.warn("w", Fields::new());
        log.error("e", Fields::new());
        let msgs: Vec<String> = sink.lines().into_iter().map(|l| l.msg).collect();
        assert_eq!(msgs, vec!["w", "e"]);
    }

    #[test]
    fn line_is_single_json_object() {
        let (log, sink) = capture(LogLevel::Debug);
        log.info("request", fields([("status", LogValue::from(200u16)), ("msg", "shadow".into())]));
        let line = &sink.lines()[0];
        let v: Value = serde_json::from_str(&line.render()).unwrap_or(Value::Null);
        assert_eq!(v["level"], json!("info"));
        assert_eq!(v["msg"], json!("request"));
        assert_eq!(v["status"], json!(200));
    }

    #[test]
    fn secret_values_scrubbed() {
        let (log, sink) = capture(LogLevel::Debug);
        let log = log.with_secret("s3cr3t-key");
        log.error("key s3cr3t-key rejected", fields([("detail", "got s3cr3t-key".into())]));
        let line = &sink.lines()[0];
        assert!(!line.msg.contains("s3cr3t-key"));
        assert_eq!(line.field("detail"), Some(&json!("got [redacted]")));
    }

    #[test]
    fn secret_keys_redacted() {
        let (log, sink) = capture(LogLevel::Debug);
        log.info("x", fields([("authorization", "Bearer t".into())]));
        assert_eq!(sink.lines()[0].field("authorization"), Some(&json!(REDACTED)));
    }
}
