//! Query resolution flow.
//!
//! The HTTP layer hands a raw DNS message and a region hint here; the
//! resolver builds the candidate pool, races the best few, and escalates to
//! the full pool once when the first round fails.
//!
//! Transports handle the actual I/O, the resolver handles decisions.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::candidates;
use crate::config::{ATTEMPT_TIMEOUT, RACE_DEADLINE, RACE_WIDTH};
use crate::race::{RaceCoordinator, RaceOutcome};
use crate::region::{self, Region};
use crate::stats::Stats;
use crate::tracker::PerformanceTracker;
use crate::upstream::DohTransport;

pub struct Resolver {
    coordinator: RaceCoordinator,
    tracker: Arc<PerformanceTracker>,
    stats: Arc<Stats>,
    global: Vec<Arc<str>>,
    regional: Vec<(Region, Vec<Arc<str>>)>,
}

impl Resolver {
    /// Resolver over the built-in regional pools plus `global`.
    pub fn new(
        transport: Arc<dyn DohTransport>,
        tracker: Arc<PerformanceTracker>,
        stats: Arc<Stats>,
        global: Vec<Arc<str>>,
    ) -> Self {
        let regional = Region::ALL
            .iter()
            .map(|&r| {
                let pool = region::regional_upstreams(r)
                    .iter()
                    .map(|&url| Arc::from(url))
                    .collect();
                (r, pool)
            })
            .collect();
        Self::with_pools(transport, tracker, stats, global, regional)
    }

    /// Resolver with explicit regional pools.
    pub fn with_pools(
        transport: Arc<dyn DohTransport>,
        tracker: Arc<PerformanceTracker>,
        stats: Arc<Stats>,
        global: Vec<Arc<str>>,
        regional: Vec<(Region, Vec<Arc<str>>)>,
    ) -> Self {
        Self {
            coordinator: RaceCoordinator::new(transport, Arc::clone(&tracker)),
            tracker,
            stats,
            global,
            regional,
        }
    }

    fn regional_pool(&self, region: Region) -> &[Arc<str>] {
        self.regional
            .iter()
            .find(|(r, _)| *r == region)
            .map(|(_, pool)| pool.as_slice())
            .unwrap_or(&[])
    }

    /// Resolve one query: race the top-ranked candidates, then once more
    /// over the full pool if that round produced no answer.
    pub async fn resolve(&self, query: &[u8], region: Region) -> RaceOutcome {
        let pool = candidates::build(self.regional_pool(region), &self.global);
        if pool.is_empty() {
            return RaceOutcome::NoUpstreams;
        }

        let top = candidates::select_top(&self.tracker, &pool, RACE_WIDTH);
        debug!(?region, pool = pool.len(), racing = top.len(), "racing top candidates");
        let first = self
            .coordinator
            .race(&top, query, ATTEMPT_TIMEOUT, RACE_DEADLINE)
            .await;
        if matches!(first, RaceOutcome::Success { .. }) {
            return first;
        }

        // Second chance over everything, including endpoints that just
        // failed; a transient error in round one should not shrink the
        // fallback pool.
        warn!(?region, "top candidates failed, racing full pool");
        self.stats.note_fallback();
        self.coordinator
            .race(&pool, query, ATTEMPT_TIMEOUT, RACE_DEADLINE)
            .await
    }
}
