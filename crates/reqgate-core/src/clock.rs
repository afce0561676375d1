//! Clock and small numeric helpers.

use std::time::{SystemTime, UNIX_EPOCH};

use rand::Rng;

const BASE36: &[u8; 36] = b"0123456789abcdefghijklmnopqrstuvwxyz";

/// Wall-clock milliseconds since the Unix epoch (0 if the clock is behind it).
pub fn now_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}

/// Parse an optional integer and clamp it into `[min, max]`.
/// Missing or unparseable input yields `fallback` (also clamped).
pub fn clamp_int(raw: Option<&str>, min: i64, max: i64, fallback: i64) -> i64 {
    let v = raw
        .map(str::trim)
        .and_then(|s| s.parse::<i64>().ok())
        .unwrap_or(fallback);
    v.clamp(min, max)
}

/// Lowercase base36 rendering.
pub fn to_base36(mut n: u64) -> String {
    if n == 0 {
        return "0".to_string();
    }
    let mut buf = Vec::with_capacity(13);
    while n > 0 {
        buf.push(BASE36[(n % 36) as usize]);
        n /= 36;
    }
    buf.reverse();
    buf.into_iter().map(char::from).collect()
}

/// `len` random lowercase base36 characters.
pub fn random_base36(len: usize) -> String {
    let mut rng = rand::thread_rng();
    (0..len)
        .map(|_| char::from(BASE36[rng.gen_range(0..BASE36.len())]))
        .collect()
}
