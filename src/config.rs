//! Proxy configuration.

use std::env;
use std::sync::Arc;
use std::time::Duration;

/// Environment variable holding a comma-separated upstream URL list.
pub const UPSTREAMS_ENV: &str = "DOH_UPSTREAMS";

/// Well-known resolvers used when no upstream list is configured.
pub const DEFAULT_UPSTREAMS: [&str; 4] = [
    "https://cloudflare-dns.com/dns-query",
    "https://dns.google/dns-query",
    "https://dns.quad9.net/dns-query",
    "https://dns.adguard-dns.com/dns-query",
];

/// How many top-ranked candidates the first race round fans out to.
pub const RACE_WIDTH: usize = 3;

/// Timeout applied to each individual upstream attempt.
pub const ATTEMPT_TIMEOUT: Duration = Duration::from_secs(4);

/// Hard ceiling on a whole race round.
pub const RACE_DEADLINE: Duration = Duration::from_secs(8);

/// How long successful responses stay in the edge cache.
pub const CACHE_TTL: Duration = Duration::from_secs(300);

/// Upstream resolver list from the environment, or the defaults.
///
/// `DOH_UPSTREAMS` is a comma-separated list of `https://` URLs. Entries are
/// trimmed and empty items skipped; any non-HTTPS entry invalidates the
/// whole list and the defaults are used instead.
pub fn configured_upstreams() -> Vec<Arc<str>> {
    match env::var(UPSTREAMS_ENV) {
        Ok(raw) => parse_upstreams(&raw).unwrap_or_else(default_upstreams),
        Err(_) => default_upstreams(),
    }
}

pub fn default_upstreams() -> Vec<Arc<str>> {
    DEFAULT_UPSTREAMS.iter().map(|&url| Arc::from(url)).collect()
}

fn parse_upstreams(raw: &str) -> Option<Vec<Arc<str>>> {
    let mut urls = Vec::new();
    for item in raw.split(',') {
        let item = item.trim();
        if item.is_empty() {
            continue;
        }
        if !item.starts_with("https://") {
            return None;
        }
        urls.push(Arc::from(item));
    }
    if urls.is_empty() { None } else { Some(urls) }
}
