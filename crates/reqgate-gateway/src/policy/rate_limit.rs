//! Fixed-window rate limiter keyed by client identity.
//!
//! Each key owns a `RateLimitState` inside a `DashMap`; the entry's shard lock
//! serializes concurrent requests for the same key, so no increment is lost.
//!
//! The window is fixed, not sliding: a burst straddling a boundary can admit up
//! to `2 * limit` requests within `window_ms` of wall-clock time.
//!
//! Memory is bounded by `max_keys`. Crossing it triggers one eviction pass
//! that brings the map down to a low-water mark (90% of `max_keys`): expired
//! windows go first (lossless: their next request would reset anyway), then
//! the oldest live windows.

use std::sync::atomic::{AtomicBool, AtomicI64, AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use dashmap::DashMap;
use tokio::task::JoinHandle;

use reqgate_core::clock::now_ms;

use crate::context::RequestContext;

pub const WINDOW_MS_PER_MINUTE: i64 = 60_000;
pub const DEFAULT_MAX_KEYS: usize = 10_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitState {
    pub window_start_ms: i64,
    pub count: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    Admit { remaining: u32, reset_at_ms: i64 },
    Reject { retry_after_ms: u64 },
}

impl Admission {
    pub fn is_admitted(&self) -> bool {
        matches!(self, Admission::Admit { .. })
    }
}

/// One step of the per-key state machine.
fn advance(state: &mut RateLimitState, now_ms: i64, limit: u32, window_ms: i64) -> Admission {
    if now_ms - state.window_start_ms >= window_ms {
        state.window_start_ms = now_ms;
        state.count = 0;
    }

    // keeps accruing while rejected: hard cap per window
    state.count = state.count.saturating_add(1);

    let reset_at_ms = state.window_start_ms + window_ms;
    if state.count > limit {
        let retry_after_ms = (reset_at_ms - now_ms).max(1) as u64;
        return Admission::Reject { retry_after_ms };
    }
    Admission::Admit { remaining: limit - state.count, reset_at_ms }
}

#[derive(Debug)]
pub struct FixedWindowLimiter {
    limit: u32,
    window_ms: i64,
    max_keys: usize,
    low_water: usize,
    windows: DashMap<String, RateLimitState>,
    evicting: AtomicBool,
    eviction_passes: AtomicU64,
    last_eviction_warn_ms: AtomicI64,
}

impl FixedWindowLimiter {
    pub fn new(limit: u32, window_ms: i64, max_keys: usize) -> Self {
        let max_keys = max_keys.max(1);
        Self {
            limit,
            window_ms: window_ms.max(1),
            max_keys,
            low_water: max_keys - max_keys / 10,
            windows: DashMap::new(),
            evicting: AtomicBool::new(false),
            eviction_passes: AtomicU64::new(0),
            last_eviction_warn_ms: AtomicI64::new(i64::MIN),
        }
    }

    pub fn per_minute(requests_per_minute: u32, max_keys: usize) -> Self {
        Self::new(requests_per_minute, WINDOW_MS_PER_MINUTE, max_keys)
    }

    pub fn limit(&self) -> u32 {
        self.limit
    }

    pub fn window_ms(&self) -> i64 {
        self.window_ms
    }

    pub fn len(&self) -> usize {
        self.windows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.windows.is_empty()
    }

    /// Number of capacity passes run so far.
    pub fn eviction_passes(&self) -> u64 {
        self.eviction_passes.load(Ordering::Relaxed)
    }

    pub fn state(&self, key: &str) -> Option<RateLimitState> {
        self.windows.get(key).map(|r| *r.value())
    }

    /// Admission decision for `key` at `now_ms`.
    pub fn check(&self, key: &str, now_ms: i64) -> Admission {
        if let Some(mut st) = self.windows.get_mut(key) {
            return advance(st.value_mut(), now_ms, self.limit, self.window_ms);
        }

        let mut inserted = false;
        let admission = {
            let mut entry = self.windows.entry(key.to_string()).or_insert_with(|| {
                inserted = true;
                RateLimitState { window_start_ms: now_ms, count: 0 }
            });
            advance(entry.value_mut(), now_ms, self.limit, self.window_ms)
        };

        // entry guard is released here; sweeping while holding it would deadlock
        if inserted && self.windows.len() > self.max_keys {
            self.enforce_capacity(now_ms);
        }
        admission
    }

    /// Drop keys whose window has expired. Returns how many were removed.
    pub fn sweep(&self, now_ms: i64) -> usize {
        let before = self.windows.len();
        let window_ms = self.window_ms;
        self.windows.retain(|_, s| now_ms - s.window_start_ms < window_ms);
        before.saturating_sub(self.windows.len())
    }

    fn enforce_capacity(&self, now_ms: i64) {
        // one pass at a time; concurrent inserters overshoot briefly instead of piling in
        if self
            .evicting
            .compare_exchange(false, true, Ordering::Acquire, Ordering::Relaxed)
            .is_err()
        {
            return;
        }
        self.eviction_passes.fetch_add(1, Ordering::Relaxed);

        let swept = self.sweep(now_ms);
        let len = self.windows.len();
        let evicted = len.saturating_sub(self.low_water);
        if evicted > 0 {
            let mut by_age: Vec<(i64, String)> = self
                .windows
                .iter()
                .map(|r| (r.value().window_start_ms, r.key().clone()))
                .collect();
            // partial selection, not a full sort
            if evicted < by_age.len() {
                by_age.select_nth_unstable(evicted - 1);
            }
            for (_, key) in by_age.into_iter().take(evicted) {
                self.windows.remove(&key);
            }
            self.warn_evicted(now_ms, swept, evicted);
        }

        self.evicting.store(false, Ordering::Release);
    }

    /// At most one warning per window.
    fn warn_evicted(&self, now_ms: i64, swept: usize, evicted: usize) {
        let last = self.last_eviction_warn_ms.load(Ordering::Relaxed);
        if now_ms.saturating_sub(last) < self.window_ms {
            return;
        }
        if self
            .last_eviction_warn_ms
            .compare_exchange(last, now_ms, Ordering::Relaxed, Ordering::Relaxed)
            .is_ok()
        {
            tracing::warn!(
                swept,
                evicted,
                max_keys = self.max_keys,
                low_water = self.low_water,
                "rate limit key map over capacity; evicted oldest windows"
            );
        }
    }
}

/// Aborts the background sweeper when dropped.
#[derive(Debug)]
pub struct SweeperGuard {
    handle: JoinHandle<()>,
}

impl Drop for SweeperGuard {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

/// Periodically sweep expired windows. Holds only a weak reference and exits
/// once the limiter is dropped. Must be called inside a tokio runtime.
pub fn spawn_sweeper(limiter: &Arc<FixedWindowLimiter>, every: Duration) -> SweeperGuard {
    let weak: Weak<FixedWindowLimiter> = Arc::downgrade(limiter);
    let handle = tokio::spawn(async move {
        let mut tick = tokio::time::interval(every);
        tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            tick.tick().await;
            let Some(limiter) = weak.upgrade() else { break };
            let removed = limiter.sweep(now_ms());
            if removed > 0 {
                tracing::debug!(removed, remaining = limiter.len(), "rate limit sweep");
            }
        }
    });
    SweeperGuard { handle }
}

/// Limiter key: client IP when known, else the request id, so every request
/// is attributable to some key.
pub fn client_key(ctx: &RequestContext) -> &str {
    ctx.client_ip.as_deref().unwrap_or(ctx.request_id.as_str())
}
