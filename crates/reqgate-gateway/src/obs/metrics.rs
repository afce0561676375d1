//! Request metrics aggregator.
//!
//! Counters are atomics inside `DashMap`s keyed by normalized route and status
//! code. Latency is kept as a bounded ring of recent samples (oldest evicted
//! first); summaries are computed on demand from a copy of the ring.

use std::collections::{BTreeMap, VecDeque};
use std::fmt::Write;
use std::hash::Hash;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use dashmap::DashMap;
use serde::Serialize;

pub const DEFAULT_DURATION_SAMPLES: usize = 1000;

/// Helper to escape label values.
fn escape_label(v: &str) -> String {
    v.replace('\\', "\\\\").replace('"', "\\\"").replace('\n', "\\n")
}

struct CounterMap<K: Eq + Hash> {
    map: DashMap<K, AtomicU64>,
}

impl<K: Eq + Hash + Clone + Ord> CounterMap<K> {
    fn new() -> Self {
        Self { map: DashMap::new() }
    }

    fn inc(&self, key: K) {
        self.map
            .entry(key)
            .or_insert_with(|| AtomicU64::new(0))
            .fetch_add(1, Ordering::Relaxed);
    }

    fn snapshot(&self) -> BTreeMap<K, u64> {
        self.map
            .iter()
            .map(|r| (r.key().clone(), r.value().load(Ordering::Relaxed)))
            .collect()
    }
}

/// Fixed-capacity ring of recent durations.
struct DurationRing {
    cap: usize,
    samples: Mutex<VecDeque<u64>>,
}

impl DurationRing {
    fn new(cap: usize) -> Self {
        let cap = cap.max(1);
        Self { cap, samples: Mutex::new(VecDeque::with_capacity(cap)) }
    }

    fn push(&self, v: u64) {
        let mut g = self.samples.lock().unwrap_or_else(|p| p.into_inner());
        if g.len() >= self.cap {
            g.pop_front();
        }
        g.push_back(v);
    }

    fn copy(&self) -> Vec<u64> {
        let g = self.samples.lock().unwrap_or_else(|p| p.into_inner());
        g.iter().copied().collect()
    }
}

/// Latency summary over the retained samples (milliseconds).
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct DurationSummary {
    pub count: usize,
    pub min: u64,
    pub max: u64,
    pub mean: f64,
    pub p50: u64,
    pub p90: u64,
    pub p99: u64,
}

impl DurationSummary {
    pub fn from_samples(samples: &[u64]) -> Self {
        if samples.is_empty() {
            return Self::default();
        }
        let mut sorted = samples.to_vec();
        sorted.sort_unstable();
        let sum: u128 = sorted.iter().map(|&v| u128::from(v)).sum();
        Self {
            count: sorted.len(),
            min: sorted[0],
            max: sorted[sorted.len() - 1],
            mean: sum as f64 / sorted.len() as f64,
            p50: percentile(&sorted, 50),
            p90: percentile(&sorted, 90),
            p99: percentile(&sorted, 99),
        }
    }
}

/// Nearest-rank percentile over a sorted, non-empty slice.
fn percentile(sorted: &[u64], p: u32) -> u64 {
    let n = sorted.len();
    let rank = (u64::from(p) * n as u64).div_ceil(100).max(1) as usize;
    sorted[rank.min(n) - 1]
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricsSnapshot {
    pub total: u64,
    pub by_route: BTreeMap<String, u64>,
    pub by_status: BTreeMap<u16, u64>,
    pub durations: DurationSummary,
}

pub struct Metrics {
    total: AtomicU64,
    by_route: CounterMap<String>,
    by_status: CounterMap<u16>,
    durations: DurationRing,
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new(DEFAULT_DURATION_SAMPLES)
    }
}

impl Metrics {
    pub fn new(duration_samples: usize) -> Self {
        Self {
            total: AtomicU64::new(0),
            by_route: CounterMap::new(),
            by_status: CounterMap::new(),
            durations: DurationRing::new(duration_samples),
        }
    }

    /// Record one finished request.
    pub fn record(&self, route: &str, status: u16, duration_ms: u64) {
        self.total.fetch_add(1, Ordering::Relaxed);
        self.by_route.inc(route.to_string());
        self.by_status.inc(status);
        self.durations.push(duration_ms);
    }

    pub fn total(&self) -> u64 {
        self.total.load(Ordering::Relaxed)
    }

    pub fn durations(&self) -> Vec<u64> {
        self.durations.copy()
    }

    pub fn duration_summary(&self) -> DurationSummary {
        DurationSummary::from_samples(&self.durations.copy())
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            total: self.total(),
            by_route: self.by_route.snapshot(),
            by_status: self.by_status.snapshot(),
            durations: self.duration_summary(),
        }
    }

    /// Render in Prometheus text exposition format.
    pub fn render_prometheus(&self) -> String {
        let snap = self.snapshot();
        let mut out = String::new();

        let _ = writeln!(out, "# TYPE reqgate_requests_total counter");
        let _ = writeln!(out, "reqgate_requests_total {}", snap.total);

        let _ = writeln!(out, "# TYPE reqgate_requests_by_route_total counter");
        for (route, n) in &snap.by_route {
            let _ = writeln!(
                out,
                "reqgate_requests_by_route_total{{route=\"{}\"}} {}",
                escape_label(route),
                n
            );
        }

        let _ = writeln!(out, "# TYPE reqgate_requests_by_status_total counter");
        for (status, n) in &snap.by_status {
            let _ = writeln!(
                out,
                "reqgate_requests_by_status_total{{status=\"{}\"}} {}",
                status, n
            );
        }

        let d = snap.durations;
        let _ = writeln!(out, "# TYPE reqgate_request_duration_ms summary");
        for (q, v) in [("0.5", d.p50), ("0.9", d.p90), ("0.99", d.p99)] {
            let _ = writeln!(out, "reqgate_request_duration_ms{{quantile=\"{}\"}} {}", q, v);
        }
        let _ = writeln!(out, "reqgate_request_duration_ms_count {}", d.count);
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn totals_match_breakdowns() {
        let m = Metrics::new(16);
        let cases = [("/tasks/:id", 200), ("/tasks", 201), ("/tasks/:id", 404), ("/tasks", 200)];
        for (i, (route, status)) in cases.iter().enumerate() {
            m.record(route, *status, i as u64);
        }
        let s = m.snapshot();
        assert_eq!(s.total, 4);
        assert_eq!(s.by_status.values().sum::<u64>(), 4);
        assert_eq!(s.by_route.values().sum::<u64>(), 4);
        assert_eq!(s.by_route.get("/tasks/:id"), Some(&2));
        assert_eq!(s.by_status.get(&200), Some(&2));
    }

    #[test]
    fn ring_evicts_oldest() {
        let m = Metrics::new(3);
        for v in [1, 2, 3, 4, 5] {
            m.record("/", 200, v);
        }
        assert_eq!(m.durations(), vec![3, 4, 5]);
        assert_eq!(m.total(), 5);
    }

    #[test]
    fn summary_percentiles() {
        let samples: Vec<u64> = (1..=100).collect();
        let s = DurationSummary::from_samples(&samples);
        assert_eq!(s.count, 100);
        assert_eq!(s.min, 1);
        assert_eq!(s.max, 100);
        assert_eq!(s.p50, 50);
        assert_eq!(s.p90, 90);
        assert_eq!(s.p99, 99);
        assert!((s.mean - 50.5).abs() < f64::EPSILON);

        assert_eq!(DurationSummary::from_samples(&[]), DurationSummary::default());
        assert_eq!(DurationSummary::from_samples(&[7]).p99, 7);
    }

    #[test]
    fn concurrent_records_are_not_lost() {
        let m = Arc::new(Metrics::new(10));
        let handles: Vec<_> = (0..8)
            .map(|t| {
                let m = Arc::clone(&m);
                std::thread::spawn(move || {
                    for i in 0..500 {
                        m.record(if i % 2 == 0 { "/a" } else { "/b" }, 200 + (t % 2), 1);
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        let s = m.snapshot();
        assert_eq!(s.total, 4000);
        assert_eq!(s.by_route.values().sum::<u64>(), 4000);
        assert_eq!(s.by_status.values().sum::<u64>(), 4000);
        assert_eq!(m.durations().len(), 10);
    }

    #[test]
    fn prometheus_output_escapes_labels() {
        let m = Metrics::new(4);
        m.record("/say/\"hi\"", 200, 3);
        let out = m.render_prometheus();
        assert!(out.contains("reqgate_requests_total 1"));
        assert!(out.contains(r#"reqgate_requests_by_route_total{route="/say/\"hi\""} 1"#));
        assert!(out.contains(r#"reqgate_requests_by_status_total{status="200"} 1"#));
        assert!(out.contains("reqgate_request_duration_ms_count 1"));
    }
}
