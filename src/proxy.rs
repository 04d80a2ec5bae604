//! Proxy orchestration.
//!
//! Wires the tracker, transport, resolver, and cache together and serves
//! the HTTP front end.

use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tracing::info;

use crate::cache::ResponseCache;
use crate::config::CACHE_TTL;
use crate::http::{self, AppState};
use crate::resolver::Resolver;
use crate::stats::Stats;
use crate::tracker::PerformanceTracker;
use crate::upstream::{DohClient, QueryMethod};

/// Configuration for the DoH proxy.
pub struct ProxyConfig {
    /// Local address to bind (e.g., 127.0.0.1:8053)
    pub bind_addr: SocketAddr,
    /// Upstream DoH resolver URLs (global pool, raced after regional)
    pub upstreams: Vec<Arc<str>>,
    /// How queries are carried to upstreams
    pub method: QueryMethod,
}

/// Run the DoH proxy with the given configuration.
///
/// Serves `/dns-query` on the bind address and races incoming queries
/// across the configured upstreams. Runs until the listener fails.
pub async fn run(config: ProxyConfig) -> io::Result<()> {
    let tracker = Arc::new(PerformanceTracker::new());
    let stats = Arc::new(Stats::new());
    let transport = Arc::new(DohClient::new(config.method));
    let resolver = Arc::new(Resolver::new(
        transport,
        Arc::clone(&tracker),
        Arc::clone(&stats),
        config.upstreams.clone(),
    ));
    let cache = Arc::new(ResponseCache::new(CACHE_TTL));

    let upstream_list: Vec<&str> = config.upstreams.iter().map(|url| url.as_ref()).collect();
    info!(bind = %config.bind_addr, upstreams = ?upstream_list, "doh proxy listening");

    let app = http::router(AppState {
        resolver,
        cache: Arc::clone(&cache),
        stats: Arc::clone(&stats),
    });
    let listener = tokio::net::TcpListener::bind(config.bind_addr).await?;

    // Log a stats summary every minute
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(60));
        interval.tick().await; // Skip first immediate tick
        loop {
            interval.tick().await;
            let snap = stats.snapshot_and_reset();
            info!(
                uptime_secs = snap.uptime_secs,
                cache_entries = cache.len(),
                requests = snap.requests,
                cache_hits = snap.cache_hits,
                answered = snap.answered,
                fallbacks = snap.fallbacks,
                failures = snap.failures,
                avg_response_ms = snap.avg_response_ms,
                "stats"
            );
        }
    });

    axum::serve(listener, app).await
}
