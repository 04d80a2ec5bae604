//! Candidate pool construction and ranking.
//!
//! A query's candidate set is the regional pool followed by the global
//! pool, deduplicated. Ranking reads tracker scores; it never decides race
//! winners, only who gets to run.

use std::cmp::Ordering;
use std::collections::HashSet;
use std::sync::Arc;

use crate::tracker::PerformanceTracker;

/// Ordered union of the regional and global pools, first occurrence wins.
pub fn build(regional: &[Arc<str>], global: &[Arc<str>]) -> Vec<Arc<str>> {
    let mut seen = HashSet::new();
    let mut set = Vec::with_capacity(regional.len() + global.len());
    for url in regional.iter().chain(global) {
        if seen.insert(url.as_ref()) {
            set.push(Arc::clone(url));
        }
    }
    set
}

/// The `k` best-scoring candidates, ascending by tracker score.
///
/// The sort is stable, so equal scores keep candidate-set order. Returns
/// fewer than `k` when the set is smaller; an empty set yields an empty
/// selection.
pub fn select_top(
    tracker: &PerformanceTracker,
    candidates: &[Arc<str>],
    k: usize,
) -> Vec<Arc<str>> {
    let mut scored: Vec<(f64, &Arc<str>)> = candidates
        .iter()
        .map(|url| (tracker.score(url), url))
        .collect();
    scored.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(Ordering::Equal));
    scored
        .into_iter()
        .take(k)
        .map(|(_, url)| Arc::clone(url))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn urls(list: &[&str]) -> Vec<Arc<str>> {
        list.iter().map(|&url| Arc::from(url)).collect()
    }

    #[test]
    fn build_dedups_keeping_first_occurrence() {
        let regional = urls(&["https://a/dns-query", "https://b/dns-query"]);
        let global = urls(&["https://b/dns-query", "https://c/dns-query"]);

        let set = build(&regional, &global);

        let got: Vec<&str> = set.iter().map(|url| url.as_ref()).collect();
        assert_eq!(
            got,
            ["https://a/dns-query", "https://b/dns-query", "https://c/dns-query"]
        );
    }

    #[test]
    fn build_with_empty_pools_is_empty() {
        assert!(build(&[], &[]).is_empty());
    }

    #[test]
    fn select_top_ranks_by_score() {
        let tracker = PerformanceTracker::new();
        let pool = urls(&["https://q/dns-query", "https://p/dns-query"]);

        // P averages 50ms with full success, Q only ever fails.
        for _ in 0..20 {
            tracker.record(&pool[1], 50, true);
            tracker.record(&pool[0], 50, false);
        }

        assert!(tracker.score("https://p/dns-query") < tracker.score("https://q/dns-query"));
        let top = select_top(&tracker, &pool, 1);
        assert_eq!(top.len(), 1);
        assert_eq!(top[0].as_ref(), "https://p/dns-query");
    }

    #[test]
    fn select_top_is_stable_for_unseen_endpoints() {
        let tracker = PerformanceTracker::new();
        let pool = urls(&["https://a/dns-query", "https://b/dns-query", "https://c/dns-query"]);

        let top = select_top(&tracker, &pool, 2);

        // All tied at the exploration score, so candidate order holds.
        let got: Vec<&str> = top.iter().map(|url| url.as_ref()).collect();
        assert_eq!(got, ["https://a/dns-query", "https://b/dns-query"]);
    }

    #[test]
    fn select_top_caps_at_set_size() {
        let tracker = PerformanceTracker::new();
        let pool = urls(&["https://a/dns-query"]);

        assert_eq!(select_top(&tracker, &pool, 5).len(), 1);
        assert!(select_top(&tracker, &[], 3).is_empty());
    }
}
