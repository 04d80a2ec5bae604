//! Edge cache for successful DoH responses.

use rustc_hash::FxHashMap;
use std::sync::RwLock;
use std::time::{Duration, Instant};

struct CacheEntry {
    payload: Vec<u8>,
    expires_at: Instant,
}

/// TTL-based response cache keyed by the inbound request URI.
///
/// Both GET and POST responses are stored under the request URI alone, so
/// distinct POST bodies sent to the same URL share a single entry.
pub struct ResponseCache {
    entries: RwLock<FxHashMap<String, CacheEntry>>,
    ttl: Duration,
}

impl ResponseCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: RwLock::new(FxHashMap::default()),
            ttl,
        }
    }

    /// Look up a cached response; expired entries are evicted on the way out.
    pub fn get(&self, key: &str) -> Option<Vec<u8>> {
        let now = Instant::now();

        {
            let Ok(entries) = self.entries.read() else {
                return None;
            };
            match entries.get(key) {
                Some(entry) if now < entry.expires_at => return Some(entry.payload.clone()),
                Some(_) => {}
                None => return None,
            }
        }

        // The entry exists but expired; take the write lock only to evict.
        let Ok(mut entries) = self.entries.write() else {
            return None;
        };
        if let Some(entry) = entries.get(key) {
            if now >= entry.expires_at {
                entries.remove(key);
            }
        }
        None
    }

    pub fn put(&self, key: &str, payload: &[u8]) {
        let Ok(mut entries) = self.entries.write() else {
            return;
        };
        entries.insert(
            key.to_string(),
            CacheEntry {
                payload: payload.to_vec(),
                expires_at: Instant::now() + self.ttl,
            },
        );
    }

    pub fn len(&self) -> usize {
        self.entries.read().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
