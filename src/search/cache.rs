/*!
 * Search result caching.
 *
 * Catalog answers change rarely, so results are kept in memory for a fixed
 * lifetime (24 hours by default) to avoid hitting the catalogs on every
 * request for the same media and language.
 */

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use log::debug;
use parking_lot::RwLock;

use crate::media::MediaId;
use crate::providers::SubtitleDescriptor;

/// Cache key of one source's answer for one media and language
pub fn search_key(source: &str, media: &MediaId, lang: &str) -> String {
    format!(
        "{}_{}_{}_{}_{}",
        source,
        media.imdb_id(),
        media.season().map(|s| s.to_string()).unwrap_or_default(),
        media.episode().map(|e| e.to_string()).unwrap_or_default(),
        lang
    )
}

#[derive(Debug, Clone)]
struct CachedResults {
    results: Vec<SubtitleDescriptor>,
    stored_at: Instant,
}

/// Hit and miss counters
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CacheStats {
    pub hits: usize,
    pub misses: usize,
    pub hit_rate: f64,
}

/// TTL cache for search results
#[derive(Clone)]
pub struct SearchCache {
    /// Internal cache storage
    cache: Arc<RwLock<HashMap<String, CachedResults>>>,

    hits: Arc<AtomicUsize>,

    misses: Arc<AtomicUsize>,

    ttl: Duration,

    /// Whether caching is enabled
    enabled: bool,
}

impl SearchCache {
    pub fn new(ttl: Duration, enabled: bool) -> Self {
        Self {
            cache: Arc::new(RwLock::new(HashMap::new())),
            hits: Arc::new(AtomicUsize::new(0)),
            misses: Arc::new(AtomicUsize::new(0)),
            ttl,
            enabled,
        }
    }

    /// Fresh results for `key`; expired entries count as misses and are evicted
    pub fn get(&self, key: &str) -> Option<Vec<SubtitleDescriptor>> {
        if !self.enabled {
            return None;
        }

        let fresh = {
            let cache = self.cache.read();
            match cache.get(key) {
                Some(entry) if entry.stored_at.elapsed() < self.ttl => Some(entry.results.clone()),
                Some(_) => None,
                None => {
                    self.misses.fetch_add(1, Ordering::Relaxed);
                    debug!("Search cache miss for {}", key);
                    return None;
                }
            }
        };

        match fresh {
            Some(results) => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                debug!("Search cache hit for {} ({} results)", key, results.len());
                Some(results)
            }
            None => {
                self.cache.write().remove(key);
                self.misses.fetch_add(1, Ordering::Relaxed);
                debug!("Search cache entry for {} expired", key);
                None
            }
        }
    }

    pub fn store(&self, key: &str, results: &[SubtitleDescriptor]) {
        if !self.enabled {
            return;
        }

        self.cache.write().insert(
            key.to_string(),
            CachedResults {
                results: results.to_vec(),
                stored_at: Instant::now(),
            },
        );
        debug!("Cached {} search results for {}", results.len(), key);
    }

    /// Get cache statistics
    pub fn stats(&self) -> CacheStats {
        let hits = self.hits.load(Ordering::Relaxed);
        let misses = self.misses.load(Ordering::Relaxed);
        let total = hits + misses;

        let hit_rate = if total > 0 {
            hits as f64 / total as f64
        } else {
            0.0
        };

        CacheStats { hits, misses, hit_rate }
    }

    /// Clear the cache
    pub fn clear(&self) {
        self.cache.write().clear();
        self.hits.store(0, Ordering::Relaxed);
        self.misses.store(0, Ordering::Relaxed);
        debug!("Search cache cleared");
    }

    /// Get the number of entries in the cache
    pub fn len(&self) -> usize {
        self.cache.read().len()
    }

    /// Check if the cache is empty
    pub fn is_empty(&self) -> bool {
        self.cache.read().is_empty()
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }
}

impl Default for SearchCache {
    fn default() -> Self {
        Self::new(Duration::from_secs(86_400), true)
    }
}
