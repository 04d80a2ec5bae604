//! Per-upstream performance history.
//!
//! Every race reports attempt outcomes here and candidate selection reads
//! the scores back out. Records are created lazily on the first observed
//! attempt, live for the process lifetime, and are never persisted.

use std::collections::VecDeque;
use std::sync::Arc;

use dashmap::DashMap;

/// Number of recent successful latencies kept per endpoint.
const LATENCY_WINDOW: usize = 100;

/// Score handed to endpoints with no successful samples yet.
///
/// Keeps unseen endpoints competitive against proven-bad ones without
/// ranking them above proven-good ones.
pub const EXPLORATION_SCORE: f64 = 1000.0;

/// Rolling history for a single upstream.
#[derive(Debug)]
struct PerformanceRecord {
    latencies: VecDeque<f64>,
    success_rate: f64,
    total_requests: u64,
}

impl Default for PerformanceRecord {
    fn default() -> Self {
        Self {
            latencies: VecDeque::with_capacity(LATENCY_WINDOW),
            success_rate: 1.0,
            total_requests: 0,
        }
    }
}

/// Read-only view of an endpoint's record.
#[derive(Debug, Clone, Copy)]
pub struct RecordSnapshot {
    pub samples: usize,
    pub success_rate: f64,
    pub total_requests: u64,
}

/// Concurrency-safe store of per-endpoint latency and success history.
///
/// Keyed by resolver URL. Entries are sharded by the map, so races touching
/// different endpoints do not contend on one lock. Scores are heuristics;
/// a reader may observe a concurrent race's update mid-flight, which is
/// acceptable because selection only needs a rough ordering.
pub struct PerformanceTracker {
    records: DashMap<Arc<str>, PerformanceRecord>,
}

impl PerformanceTracker {
    pub fn new() -> Self {
        Self {
            records: DashMap::new(),
        }
    }

    /// Record one attempt outcome for `endpoint`.
    ///
    /// Successes push the observed latency into the rolling window, evicting
    /// the oldest sample past 100, and bump the success rate by 0.1 capped
    /// at 1.0. Failures leave the window untouched and decay the rate by
    /// 0.2, floored at 0.0. The request counter always advances.
    pub fn record(&self, endpoint: &Arc<str>, latency_ms: u64, success: bool) {
        let mut entry = self.records.entry(Arc::clone(endpoint)).or_default();
        entry.total_requests += 1;
        if success {
            if entry.latencies.len() >= LATENCY_WINDOW {
                entry.latencies.pop_front();
            }
            entry.latencies.push_back(latency_ms as f64);
            entry.success_rate = (entry.success_rate + 0.1).min(1.0);
        } else {
            entry.success_rate = (entry.success_rate - 0.2).max(0.0);
        }
    }

    /// Score used to rank candidates; lower is better.
    ///
    /// `avg_latency / success_rate` once an endpoint has successful samples.
    /// Unseen endpoints get [`EXPLORATION_SCORE`]. A success rate that has
    /// decayed to zero scores infinite, ranking below everything else.
    pub fn score(&self, endpoint: &str) -> f64 {
        let Some(record) = self.records.get(endpoint) else {
            return EXPLORATION_SCORE;
        };
        if record.latencies.is_empty() {
            return EXPLORATION_SCORE;
        }
        let avg = record.latencies.iter().sum::<f64>() / record.latencies.len() as f64;
        if record.success_rate <= 0.0 {
            f64::INFINITY
        } else {
            avg / record.success_rate
        }
    }

    /// Snapshot of an endpoint's record, if any attempt was recorded.
    pub fn snapshot(&self, endpoint: &str) -> Option<RecordSnapshot> {
        self.records.get(endpoint).map(|r| RecordSnapshot {
            samples: r.latencies.len(),
            success_rate: r.success_rate,
            total_requests: r.total_requests,
        })
    }
}

impl Default for PerformanceTracker {
    fn default() -> Self {
        Self::new()
    }
}
