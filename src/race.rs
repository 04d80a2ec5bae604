//! First-success racing across upstream candidates.
//!
//! One attempt task per candidate, all reporting into a single result
//! channel. The coordinator consumes the channel until the first success,
//! until every attempt has failed, or until the overall deadline fires.
//! Attempts still in flight when the race resolves are detached; they
//! report into the performance tracker when they finish, but a resolved
//! race never changes.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::Instant;
use tracing::debug;

use crate::tracker::PerformanceTracker;
use crate::upstream::DohTransport;

/// Result of racing one candidate set.
#[derive(Debug)]
pub enum RaceOutcome {
    /// First attempt to come back with a good status. Completion order
    /// decides this, not score.
    Success {
        endpoint: Arc<str>,
        latency_ms: u64,
        payload: Vec<u8>,
    },
    /// Every launched attempt terminated without a success.
    AllFailed { attempts: usize },
    /// The overall deadline elapsed with attempts still pending.
    Timeout,
    /// The candidate set was empty; nothing was launched.
    NoUpstreams,
}

enum AttemptReport {
    Success {
        endpoint: Arc<str>,
        latency_ms: u64,
        payload: Vec<u8>,
    },
    Failure,
}

/// Launches concurrent attempts and resolves races.
pub struct RaceCoordinator {
    transport: Arc<dyn DohTransport>,
    tracker: Arc<PerformanceTracker>,
}

impl RaceCoordinator {
    pub fn new(transport: Arc<dyn DohTransport>, tracker: Arc<PerformanceTracker>) -> Self {
        Self { transport, tracker }
    }

    /// Race `query` against every candidate, resolving on the first success.
    ///
    /// Each attempt is bounded by `per_attempt`; the race as a whole by
    /// `deadline`, which caps a slow straggler even when every other
    /// attempt failed quickly. Attempt outcomes are recorded into the
    /// tracker as they happen, the winner's before this returns.
    pub async fn race(
        &self,
        candidates: &[Arc<str>],
        query: &[u8],
        per_attempt: Duration,
        deadline: Duration,
    ) -> RaceOutcome {
        if candidates.is_empty() {
            return RaceOutcome::NoUpstreams;
        }

        let (tx, mut rx) = mpsc::channel(candidates.len());
        for endpoint in candidates {
            let transport = Arc::clone(&self.transport);
            let tracker = Arc::clone(&self.tracker);
            let endpoint = Arc::clone(endpoint);
            let query = query.to_vec();
            let tx = tx.clone();
            tokio::spawn(async move {
                let report = attempt(transport, tracker, endpoint, &query, per_attempt).await;
                // The receiver is gone once the race resolved; the outcome
                // was already recorded above, so a late report just drops.
                let _ = tx.send(report).await;
            });
        }
        drop(tx);

        let deadline_timer = tokio::time::sleep(deadline);
        tokio::pin!(deadline_timer);

        let mut failures = 0usize;
        loop {
            tokio::select! {
                _ = &mut deadline_timer => return RaceOutcome::Timeout,
                report = rx.recv() => match report {
                    Some(AttemptReport::Success { endpoint, latency_ms, payload }) => {
                        debug!(endpoint = endpoint.as_ref(), latency_ms, "race won");
                        return RaceOutcome::Success { endpoint, latency_ms, payload };
                    }
                    Some(AttemptReport::Failure) => {
                        failures += 1;
                        if failures == candidates.len() {
                            return RaceOutcome::AllFailed { attempts: failures };
                        }
                    }
                    None => return RaceOutcome::AllFailed { attempts: failures },
                },
            }
        }
    }
}

/// Run one upstream attempt and record its outcome.
async fn attempt(
    transport: Arc<dyn DohTransport>,
    tracker: Arc<PerformanceTracker>,
    endpoint: Arc<str>,
    query: &[u8],
    per_attempt: Duration,
) -> AttemptReport {
    let start = Instant::now();
    match tokio::time::timeout(per_attempt, transport.send(&endpoint, query)).await {
        Ok(Ok(payload)) => {
            let latency_ms = start.elapsed().as_millis() as u64;
            tracker.record(&endpoint, latency_ms, true);
            AttemptReport::Success {
                endpoint,
                latency_ms,
                payload,
            }
        }
        Ok(Err(error)) => {
            let latency_ms = start.elapsed().as_millis() as u64;
            debug!(endpoint = endpoint.as_ref(), %error, "attempt failed");
            tracker.record(&endpoint, latency_ms, false);
            AttemptReport::Failure
        }
        Err(_) => {
            debug!(endpoint = endpoint.as_ref(), "attempt timed out");
            tracker.record(&endpoint, per_attempt.as_millis() as u64, false);
            AttemptReport::Failure
        }
    }
}
