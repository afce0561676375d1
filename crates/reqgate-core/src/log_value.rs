//! Structured log field model.
//!
//! Log fields are a closed union converted to JSON by one recursive function.
//! Values JSON cannot carry (non-finite floats, arbitrary `Display` types,
//! error chains) are converted to their string form. Secret-looking keys are
//! redacted at every depth.

use std::collections::BTreeMap;
use std::fmt::Display;

use serde_json::{Map, Number, Value};

pub const REDACTED: &str = "[redacted]";
pub const MAX_STRING_CHARS: usize = 2048;

const SECRET_KEY_PARTS: [&str; 7] = [
    "authorization",
    "cookie",
    "password",
    "secret",
    "token",
    "api_key",
    "apikey",
];

#[derive(Debug, Clone, PartialEq)]
pub enum LogValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    List(Vec<LogValue>),
    Map(BTreeMap<String, LogValue>),
}

impl LogValue {
    /// String form of any `Display` value.
    pub fn display(v: impl Display) -> Self {
        LogValue::Str(v.to_string())
    }

    /// `{ message, source }` chain for an error.
    pub fn error(err: &(dyn std::error::Error + 'static)) -> Self {
        let mut map = BTreeMap::new();
        map.insert("message".to_string(), LogValue::Str(err.to_string()));
        if let Some(src) = err.source() {
            map.insert("source".to_string(), LogValue::error(src));
        }
        LogValue::Map(map)
    }
}

impl From<&str> for LogValue {
    fn from(v: &str) -> Self {
        LogValue::Str(v.to_string())
    }
}

impl From<String> for LogValue {
    fn from(v: String) -> Self {
        LogValue::Str(v)
    }
}

impl From<bool> for LogValue {
    fn from(v: bool) -> Self {
        LogValue::Bool(v)
    }
}

impl From<i64> for LogValue {
    fn from(v: i64) -> Self {
        LogValue::Int(v)
    }
}

impl From<u16> for LogValue {
    fn from(v: u16) -> Self {
        LogValue::Int(i64::from(v))
    }
}

impl From<u64> for LogValue {
    fn from(v: u64) -> Self {
        i64::try_from(v).map(LogValue::Int).unwrap_or_else(|_| LogValue::Str(v.to_string()))
    }
}

impl From<f64> for LogValue {
    fn from(v: f64) -> Self {
        LogValue::Float(v)
    }
}

impl<T: Into<LogValue>> From<Option<T>> for LogValue {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(LogValue::Null)
    }
}

impl<T: Into<LogValue>> From<Vec<T>> for LogValue {
    fn from(v: Vec<T>) -> Self {
        LogValue::List(v.into_iter().map(Into::into).collect())
    }
}

impl From<&Value> for LogValue {
    fn from(v: &Value) -> Self {
        match v {
            Value::Null => LogValue::Null,
            Value::Bool(b) => LogValue::Bool(*b),
            Value::Number(n) => n
                .as_i64()
                .map(LogValue::Int)
                .or_else(|| n.as_f64().map(LogValue::Float))
                .unwrap_or_else(|| LogValue::Str(n.to_string())),
            Value::String(s) => LogValue::Str(s.clone()),
            Value::Array(a) => LogValue::List(a.iter().map(LogValue::from).collect()),
            Value::Object(o) => {
                LogValue::Map(o.iter().map(|(k, v)| (k.clone(), LogValue::from(v))).collect())
            }
        }
    }
}

pub fn is_secret_key(key: &str) -> bool {
    let k = key.to_ascii_lowercase();
    SECRET_KEY_PARTS.iter().any(|p| k.contains(p))
}

fn truncate(s: &str) -> String {
    if s.chars().count() <= MAX_STRING_CHARS {
        return s.to_string();
    }
    let mut out: String = s.chars().take(MAX_STRING_CHARS).collect();
    out.push('…');
    out
}

/// Convert to JSON with redaction and truncation applied.
pub fn to_json(v: &LogValue) -> Value {
    match v {
        LogValue::Null => Value::Null,
        LogValue::Bool(b) => Value::Bool(*b),
        LogValue::Int(i) => Value::Number((*i).into()),
        LogValue::Float(f) => Number::from_f64(*f)
            .map(Value::Number)
            .unwrap_or_else(|| Value::String(f.to_string())),
        LogValue::Str(s) => Value::String(truncate(s)),
        LogValue::List(items) => Value::Array(items.iter().map(to_json).collect()),
        LogValue::Map(map) => Value::Object(fields_to_json(map)),
    }
}

/// Convert a field set, redacting secret-looking keys.
pub fn fields_to_json(fields: &BTreeMap<String, LogValue>) -> Map<String, Value> {
    fields
        .iter()
        .map(|(k, v)| {
            let v = if is_secret_key(k) { Value::String(REDACTED.into()) } else { to_json(v) };
            (k.clone(), v)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[derive(Debug)]
    struct Outer(Inner);
    #[derive(Debug)]
    struct Inner;

    impl Display for Outer {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            write!(f, "request failed")
        }
    }
    impl Display for Inner {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            write!(f, "socket closed")
        }
    }
    impl std::error::Error for Outer {
        fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
            Some(&self.0)
        }
    }
    impl std::error::Error for Inner {}

    #[test]
    fn non_finite_floats_become_strings() {
        assert_eq!(to_json(&LogValue::Float(f64::NAN)), json!("NaN"));
        assert_eq!(to_json(&LogValue::Float(f64::INFINITY)), json!("inf"));
        assert_eq!(to_json(&LogValue::Float(1.5)), json!(1.5));
    }

    #[test]
    fn error_chain_is_nested() {
        let v = to_json(&LogValue::error(&Outer(Inner)));
        assert_eq!(
            v,
            json!({"message": "request failed", "source": {"message": "socket closed"}})
        );
    }

    #[test]
    fn secrets_redacted_at_depth() {
        let mut inner = BTreeMap::new();
        inner.insert("Authorization".to_string(), LogValue::from("Bearer abc"));
        inner.insert("path".to_string(), LogValue::from("/tasks"));
        let mut fields = BTreeMap::new();
        fields.insert("headers".to_string(), LogValue::Map(inner));
        fields.insert("x_api_key".to_string(), LogValue::from("k"));

        let out = Value::Object(fields_to_json(&fields));
        assert_eq!(
            out,
            json!({"headers": {"Authorization": REDACTED, "path": "/tasks"}, "x_api_key": REDACTED})
        );
    }

    #[test]
    fn long_strings_truncated() {
        let long = "a".repeat(MAX_STRING_CHARS + 10);
        let Value::String(s) = to_json(&LogValue::from(long)) else {
            unreachable!("string in, string out");
        };
        assert_eq!(s.chars().count(), MAX_STRING_CHARS + 1);
        assert!(s.ends_with('…'));
    }

    #[test]
    fn json_values_convert() {
        let v = json!({"a": [1, 2.5, null, true], "b": "x"});
        assert_eq!(to_json(&LogValue::from(&v)), v);
    }

    #[test]
    fn large_u64_falls_back_to_string() {
        assert_eq!(LogValue::from(u64::MAX), LogValue::Str(u64::MAX.to_string()));
    }
}
