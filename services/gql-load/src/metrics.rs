//! Metrics collection and statistics.
//!
//! Counters and the status histogram are exact for the whole run. Latency
//! statistics come from a bounded ring of the most recently completed
//! samples and are recomputed on every snapshot.

use crate::runner::RequestOutcome;
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// Upper bound on the latency window.
pub const MAX_WINDOW: usize = 10_000;

/// Collects request outcomes during a run.
pub struct MetricsAggregator {
    inner: Mutex<Inner>,
    completed: AtomicU64,
}

struct Inner {
    requests_total: u64,
    requests_success: u64,
    requests_failed: u64,
    transport_errors: u64,
    status_codes: BTreeMap<u16, u64>,
    window: LatencyWindow,
}

/// Fixed-capacity ring of the latest latencies.
struct LatencyWindow {
    samples: Vec<Duration>,
    capacity: usize,
    next: usize,
}

impl LatencyWindow {
    fn new(capacity: usize) -> Self {
        Self {
            samples: Vec::with_capacity(capacity),
            capacity,
            next: 0,
        }
    }

    fn push(&mut self, latency: Duration) {
        if self.samples.len() < self.capacity {
            self.samples.push(latency);
        } else {
            self.samples[self.next] = latency;
        }
        self.next = (self.next + 1) % self.capacity;
    }
}

impl MetricsAggregator {
    /// Create an aggregator whose latency window holds `window` samples
    /// (clamped to `1..=MAX_WINDOW`).
    pub fn new(window: usize) -> Self {
        Self {
            inner: Mutex::new(Inner {
                requests_total: 0,
                requests_success: 0,
                requests_failed: 0,
                transport_errors: 0,
                status_codes: BTreeMap::new(),
                window: LatencyWindow::new(window.clamp(1, MAX_WINDOW)),
            }),
            completed: AtomicU64::new(0),
        }
    }

    /// Window sized for a run of `budget` requests.
    pub fn for_budget(budget: u64) -> Self {
        Self::new(budget.min(MAX_WINDOW as u64) as usize)
    }

    /// Fold one outcome into the counters and window.
    pub fn record(&self, outcome: &RequestOutcome) {
        {
            let mut inner = self.inner.lock();
            inner.requests_total += 1;
            if outcome.success {
                inner.requests_success += 1;
            } else {
                inner.requests_failed += 1;
            }
            if outcome.is_transport_error() {
                inner.transport_errors += 1;
            }
            if let Some(status) = outcome.status {
                *inner.status_codes.entry(status).or_insert(0) += 1;
            }
            if outcome.was_sent() {
                inner.window.push(outcome.latency);
            }
        }
        self.completed.fetch_add(1, Ordering::Relaxed);
    }

    /// Outcomes recorded so far, without taking the lock.
    pub fn completed(&self) -> u64 {
        self.completed.load(Ordering::Relaxed)
    }

    /// Compute a point-in-time summary. `elapsed` is the run's wall time.
    pub fn snapshot(&self, elapsed: Duration) -> MetricsSnapshot {
        let (mut samples, counts) = {
            let inner = self.inner.lock();
            (
                inner.window.samples.clone(),
                (
                    inner.requests_total,
                    inner.requests_success,
                    inner.requests_failed,
                    inner.transport_errors,
                    inner.status_codes.clone(),
                ),
            )
        };
        let (total, success, failed, transport_errors, status_codes) = counts;

        samples.sort_unstable();

        let secs = elapsed.as_secs_f64();
        let requests_per_second = if secs > 0.0 { total as f64 / secs } else { 0.0 };

        MetricsSnapshot {
            total,
            success,
            failed,
            transport_errors,
            status_codes,
            latency: LatencyStats::from_sorted(&samples),
            percentiles: Percentiles::from_sorted(&samples),
            requests_per_second,
            elapsed,
            window_len: samples.len(),
        }
    }
}

/// Immutable summary of a run as of some completed-request count.
#[derive(Debug, Clone, PartialEq)]
pub struct MetricsSnapshot {
    pub total: u64,
    pub success: u64,
    pub failed: u64,
    /// Failures where no HTTP response arrived.
    pub transport_errors: u64,
    pub status_codes: BTreeMap<u16, u64>,
    pub latency: LatencyStats,
    pub percentiles: Percentiles,
    pub requests_per_second: f64,
    pub elapsed: Duration,
    /// Number of samples the latency figures were computed from.
    pub window_len: usize,
}

impl MetricsSnapshot {
    /// Successful share of completed requests, in percent.
    pub fn success_rate(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            self.success as f64 / self.total as f64 * 100.0
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct LatencyStats {
    pub average: Duration,
    /// `None` when every sample is zero.
    pub harmonic_mean: Option<Duration>,
    pub min: Duration,
    pub max: Duration,
    pub range: Duration,
    /// Population standard deviation.
    pub std_dev: Duration,
}

impl LatencyStats {
    fn from_sorted(sorted: &[Duration]) -> Self {
        let (Some(&min), Some(&max)) = (sorted.first(), sorted.last()) else {
            return Self::default();
        };
        let n = sorted.len() as u128;

        let sum: u128 = sorted.iter().map(|d| d.as_nanos()).sum();
        let average = nanos(sum / n);

        let mean = sum as f64 / n as f64;
        let variance = sorted
            .iter()
            .map(|d| {
                let diff = d.as_nanos() as f64 - mean;
                diff * diff
            })
            .sum::<f64>()
            / n as f64;

        // Zero-length samples are left out rather than making the mean zero.
        let (nonzero, reciprocal_sum) = sorted
            .iter()
            .filter(|d| !d.is_zero())
            .fold((0u64, 0.0f64), |(count, acc), d| {
                (count + 1, acc + 1.0 / d.as_nanos() as f64)
            });
        let harmonic_mean =
            (nonzero > 0).then(|| Duration::from_nanos((nonzero as f64 / reciprocal_sum).round() as u64));

        Self {
            average,
            harmonic_mean,
            min,
            max,
            range: max - min,
            std_dev: Duration::from_nanos(variance.sqrt().round() as u64),
        }
    }
}

/// Nearest-rank latency percentiles.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Percentiles {
    pub p50: Duration,
    pub p75: Duration,
    pub p95: Duration,
    pub p99: Duration,
    pub p999: Duration,
}

impl Percentiles {
    fn from_sorted(sorted: &[Duration]) -> Self {
        Self {
            p50: nearest_rank(sorted, 500),
            p75: nearest_rank(sorted, 750),
            p95: nearest_rank(sorted, 950),
            p99: nearest_rank(sorted, 990),
            p999: nearest_rank(sorted, 999),
        }
    }
}

/// Value at rank `ceil(per_mille / 1000 * n)` of a sorted slice, no
/// interpolation. Zero for an empty slice.
fn nearest_rank(sorted: &[Duration], per_mille: usize) -> Duration {
    if sorted.is_empty() {
        return Duration::ZERO;
    }
    let n = sorted.len();
    let rank = (per_mille * n).div_ceil(1000).clamp(1, n);
    sorted[rank - 1]
}

fn nanos(n: u128) -> Duration {
    Duration::from_nanos(n.min(u64::MAX as u128) as u64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runner::RequestError;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn ms(v: u64) -> Duration {
        Duration::from_millis(v)
    }

    fn ok(latency: Duration) -> RequestOutcome {
        RequestOutcome {
            latency,
            status: Some(200),
            success: true,
            request_body: None,
            response_body: None,
            error: None,
        }
    }

    fn status(code: u16, latency: Duration) -> RequestOutcome {
        RequestOutcome {
            status: Some(code),
            success: code == 200,
            ..ok(latency)
        }
    }

    #[test]
    fn test_empty_snapshot() {
        let agg = MetricsAggregator::new(10);
        let snap = agg.snapshot(Duration::ZERO);
        assert_eq!(snap.total, 0);
        assert_eq!(snap.requests_per_second, 0.0);
        assert_eq!(snap.success_rate(), 0.0);
        assert_eq!(snap.latency, LatencyStats::default());
        assert_eq!(snap.percentiles, Percentiles::default());
    }

    #[test]
    fn test_counts_and_histogram() {
        let agg = MetricsAggregator::new(100);
        agg.record(&status(200, ms(10)));
        agg.record(&status(200, ms(20)));
        agg.record(&status(500, ms(30)));
        agg.record(&RequestOutcome {
            status: None,
            success: false,
            error: Some(RequestError::Transport("refused".into())),
            ..ok(ms(5))
        });

        let snap = agg.snapshot(ms(1000));
        assert_eq!(snap.total, 4);
        assert_eq!(snap.success, 2);
        assert_eq!(snap.failed, 2);
        assert_eq!(snap.transport_errors, 1);
        assert_eq!(snap.status_codes, BTreeMap::from([(200, 2), (500, 1)]));
        assert_eq!(snap.window_len, 4);
        assert_eq!(snap.requests_per_second, 4.0);
        assert_eq!(agg.completed(), 4);
    }

    #[test]
    fn test_payload_failure_counts_but_skips_window() {
        let agg = MetricsAggregator::new(10);
        agg.record(&RequestOutcome::payload_failure("bad float".into()));
        let snap = agg.snapshot(ms(1));
        assert_eq!(snap.total, 1);
        assert_eq!(snap.failed, 1);
        assert_eq!(snap.window_len, 0);
        assert!(snap.status_codes.is_empty());
    }

    #[test]
    fn test_latency_stats() {
        let agg = MetricsAggregator::new(10);
        for v in [10, 20, 30, 40] {
            agg.record(&ok(ms(v)));
        }
        let lat = agg.snapshot(ms(1)).latency;
        assert_eq!(lat.average, ms(25));
        assert_eq!(lat.min, ms(10));
        assert_eq!(lat.max, ms(40));
        assert_eq!(lat.range, ms(30));
        // sqrt(((15^2)*2 + (5^2)*2) / 4) = sqrt(125) ms
        let expected_std = (125.0f64).sqrt() * 1e6;
        assert!((lat.std_dev.as_nanos() as f64 - expected_std).abs() < 2.0);
        // 4 / (1/10 + 1/20 + 1/30 + 1/40) = 19.2ms
        let hmean = lat.harmonic_mean.unwrap();
        assert!((hmean.as_secs_f64() * 1000.0 - 19.2).abs() < 1e-3);
    }

    #[test]
    fn test_harmonic_mean_ignores_zero_samples() {
        let agg = MetricsAggregator::new(10);
        agg.record(&ok(Duration::ZERO));
        assert_eq!(agg.snapshot(ms(1)).latency.harmonic_mean, None);

        agg.record(&ok(ms(10)));
        assert_eq!(agg.snapshot(ms(1)).latency.harmonic_mean, Some(ms(10)));
    }

    #[test]
    fn test_nearest_rank_percentiles() {
        let agg = MetricsAggregator::new(1000);
        for v in 1..=1000 {
            agg.record(&ok(ms(v)));
        }
        let p = agg.snapshot(ms(1)).percentiles;
        assert_eq!(p.p50, ms(500));
        assert_eq!(p.p75, ms(750));
        assert_eq!(p.p95, ms(950));
        assert_eq!(p.p99, ms(990));
        assert_eq!(p.p999, ms(999));
    }

    #[test]
    fn test_single_sample_percentiles() {
        let agg = MetricsAggregator::new(5);
        agg.record(&ok(ms(7)));
        let snap = agg.snapshot(ms(1));
        assert_eq!(snap.percentiles.p50, ms(7));
        assert_eq!(snap.percentiles.p999, ms(7));
        assert_eq!(snap.latency.std_dev, Duration::ZERO);
    }

    #[test]
    fn test_window_keeps_most_recent() {
        let agg = MetricsAggregator::new(3);
        for v in [100, 200, 1, 2, 3] {
            agg.record(&ok(ms(v)));
        }
        let snap = agg.snapshot(ms(1));
        assert_eq!(snap.total, 5);
        assert_eq!(snap.window_len, 3);
        assert_eq!(snap.latency.max, ms(3));
        assert_eq!(snap.latency.min, ms(1));
    }

    #[test]
    fn test_window_capacity_bounds() {
        assert_eq!(MetricsAggregator::for_budget(50).inner.lock().window.capacity, 50);
        assert_eq!(
            MetricsAggregator::for_budget(1_000_000).inner.lock().window.capacity,
            MAX_WINDOW
        );
        assert_eq!(MetricsAggregator::new(0).inner.lock().window.capacity, 1);
    }

    #[test]
    fn test_ordering_invariants_random_samples() {
        let mut rng = StdRng::seed_from_u64(99);
        for round in 0..20 {
            let agg = MetricsAggregator::new(500);
            let n = rng.gen_range(1..800);
            for _ in 0..n {
                agg.record(&ok(Duration::from_micros(rng.gen_range(0..500_000))));
            }
            let snap = agg.snapshot(ms(1));
            let (l, p) = (snap.latency, snap.percentiles);
            assert!(l.min <= p.p50, "round {round}");
            assert!(p.p50 <= p.p75 && p.p75 <= p.p95 && p.p95 <= p.p99 && p.p99 <= p.p999);
            assert!(p.p999 <= l.max);
            assert!(l.min <= l.average && l.average <= l.max);
            assert_eq!(snap.success + snap.failed, snap.total);
        }
    }

    #[test]
    fn test_concurrent_record_is_exact() {
        let agg = std::sync::Arc::new(MetricsAggregator::new(100));
        let handles: Vec<_> = (0..8)
            .map(|t| {
                let agg = agg.clone();
                std::thread::spawn(move || {
                    for i in 0..1000 {
                        let code = if (t + i) % 2 == 0 { 200 } else { 503 };
                        agg.record(&status(code, ms(1)));
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        let snap = agg.snapshot(ms(1));
        assert_eq!(snap.total, 8000);
        assert_eq!(snap.status_codes.values().sum::<u64>(), 8000);
        assert_eq!(snap.status_codes[&200], 4000);
        assert_eq!(snap.success + snap.failed, 8000);
    }
}
