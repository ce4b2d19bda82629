// Search-response cache
// Providers rate-limit aggressively, so identical queries inside the TTL
// window are answered from memory. Entries expire on read and the oldest
// entry is evicted once the configured capacity is reached.

use crate::provider::{OfferProvider, ProviderError, SearchQuery, SearchResponse};
use async_trait::async_trait;
use dashmap::DashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};
use tracing::debug;

// Cache configuration options
#[derive(Debug, Clone)]
pub struct CacheConfig {
    pub max_entries: usize,
    pub default_ttl: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_entries: 512,
            default_ttl: Duration::from_secs(300),
        }
    }
}

#[derive(Debug, Default)]
struct CacheStats {
    hits: AtomicUsize,
    misses: AtomicUsize,
    expired: AtomicUsize,
    evictions: AtomicUsize,
    inserts: AtomicUsize,
}

// Snapshot of the counters for reporting
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct CacheStatsReport {
    pub hits: usize,
    pub misses: usize,
    pub expired: usize,
    pub evictions: usize,
    pub inserts: usize,
    pub entries: usize,
}

struct CacheEntry {
    response: SearchResponse,
    stored_at: Instant,
    ttl: Duration,
}

impl CacheEntry {
    fn is_expired(&self) -> bool {
        self.stored_at.elapsed() > self.ttl
    }
}

pub struct SearchCache {
    entries: DashMap<String, CacheEntry>,
    config: CacheConfig,
    stats: CacheStats,
}

impl SearchCache {
    pub fn new(config: CacheConfig) -> Self {
        Self {
            entries: DashMap::new(),
            config,
            stats: CacheStats::default(),
        }
    }

    pub fn store(&self, query: &SearchQuery, response: SearchResponse, ttl: Option<Duration>) {
        if self.entries.len() >= self.config.max_entries {
            self.evict_oldest();
        }
        self.entries.insert(
            query.cache_key(),
            CacheEntry {
                response,
                stored_at: Instant::now(),
                ttl: ttl.unwrap_or(self.config.default_ttl),
            },
        );
        self.stats.inserts.fetch_add(1, Ordering::SeqCst);
    }

    pub fn get(&self, query: &SearchQuery) -> Option<SearchResponse> {
        let key = query.cache_key();

        // The shard guard must be released before the expired entry is
        // removed, so the match only decides and the removal happens after
        match self.entries.get(&key) {
            Some(entry) if !entry.is_expired() => {
                self.stats.hits.fetch_add(1, Ordering::SeqCst);
                return Some(entry.response.clone());
            }
            Some(_) => {}
            None => {
                self.stats.misses.fetch_add(1, Ordering::SeqCst);
                return None;
            }
        }

        self.entries.remove(&key);
        self.stats.expired.fetch_add(1, Ordering::SeqCst);
        self.stats.misses.fetch_add(1, Ordering::SeqCst);
        None
    }

    // Drop every cached search for a route, e.g. after the provider reports
    // a schedule change
    pub fn invalidate_route(&self, origin: &str, destination: &str) -> usize {
        let prefix = format!("{}:{}:", origin, destination);
        let before = self.entries.len();
        self.entries.retain(|key, _| !key.starts_with(&prefix));
        let removed = before - self.entries.len();
        self.stats.evictions.fetch_add(removed, Ordering::SeqCst);
        removed
    }

    pub fn stats(&self) -> CacheStatsReport {
        CacheStatsReport {
            hits: self.stats.hits.load(Ordering::SeqCst),
            misses: self.stats.misses.load(Ordering::SeqCst),
            expired: self.stats.expired.load(Ordering::SeqCst),
            evictions: self.stats.evictions.load(Ordering::SeqCst),
            inserts: self.stats.inserts.load(Ordering::SeqCst),
            entries: self.entries.len(),
        }
    }

    fn evict_oldest(&self) {
        let oldest_key = self
            .entries
            .iter()
            .min_by_key(|entry| entry.value().stored_at)
            .map(|entry| entry.key().clone());

        if let Some(key) = oldest_key {
            self.entries.remove(&key);
            self.stats.evictions.fetch_add(1, Ordering::SeqCst);
            debug!(key = %key, "evicted oldest cache entry");
        }
    }
}

// Caching decorator over any provider. Misses go to the inner provider and
// the response is stored under the default TTL.
pub struct CachingProvider<P> {
    inner: P,
    cache: SearchCache,
}

impl<P> CachingProvider<P> {
    pub fn new(inner: P, config: CacheConfig) -> Self {
        Self {
            inner,
            cache: SearchCache::new(config),
        }
    }

    pub fn stats(&self) -> CacheStatsReport {
        self.cache.stats()
    }
}

#[async_trait]
impl<P: OfferProvider> OfferProvider for CachingProvider<P> {
    async fn search_offers(&self, query: &SearchQuery) -> Result<SearchResponse, ProviderError> {
        if let Some(cached) = self.cache.get(query) {
            debug!(key = %query.cache_key(), "serving search from cache");
            return Ok(cached);
        }
        let response = self.inner.search_offers(query).await?;
        self.cache.store(query, response.clone(), None);
        Ok(response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::mock_provider::MockProvider;
    use chrono::NaiveDate;
    use std::thread;

    fn query_for(origin: &str, destination: &str, day: u32) -> SearchQuery {
        SearchQuery {
            origin: origin.to_string(),
            destination: destination.to_string(),
            departure_date: NaiveDate::from_ymd_opt(2025, 9, day).expect("valid date"),
            adults: 1,
            currency: "USD".to_string(),
        }
    }

    fn empty_response() -> SearchResponse {
        SearchResponse {
            offers: vec![],
            offers_rejected: 0,
        }
    }

    #[test]
    fn test_hit_and_miss_accounting() {
        let cache = SearchCache::new(CacheConfig::default());
        let query = query_for("LAX", "JFK", 1);

        assert!(cache.get(&query).is_none());
        cache.store(&query, empty_response(), None);
        assert!(cache.get(&query).is_some());

        let stats = cache.stats();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.inserts, 1);
        assert_eq!(stats.entries, 1);
    }

    #[test]
    fn test_entries_expire_after_their_ttl() {
        let cache = SearchCache::new(CacheConfig::default());
        let query = query_for("LAX", "JFK", 1);

        cache.store(&query, empty_response(), Some(Duration::from_millis(50)));
        assert!(cache.get(&query).is_some());

        thread::sleep(Duration::from_millis(80));
        assert!(cache.get(&query).is_none());

        let stats = cache.stats();
        assert_eq!(stats.expired, 1);
        assert_eq!(stats.entries, 0);
    }

    #[test]
    fn test_capacity_evicts_the_oldest_entry() {
        let cache = SearchCache::new(CacheConfig {
            max_entries: 2,
            ..CacheConfig::default()
        });

        cache.store(&query_for("LAX", "JFK", 1), empty_response(), None);
        cache.store(&query_for("LAX", "JFK", 2), empty_response(), None);
        cache.store(&query_for("LAX", "JFK", 3), empty_response(), None);

        let stats = cache.stats();
        assert_eq!(stats.evictions, 1);
        assert_eq!(stats.entries, 2);
        assert!(cache.get(&query_for("LAX", "JFK", 1)).is_none());
        assert!(cache.get(&query_for("LAX", "JFK", 3)).is_some());
    }

    #[test]
    fn test_invalidate_route_leaves_other_routes_alone() {
        let cache = SearchCache::new(CacheConfig::default());
        cache.store(&query_for("LAX", "JFK", 1), empty_response(), None);
        cache.store(&query_for("LAX", "JFK", 2), empty_response(), None);
        cache.store(&query_for("SFO", "ORD", 1), empty_response(), None);

        assert_eq!(cache.invalidate_route("LAX", "JFK"), 2);
        assert!(cache.get(&query_for("SFO", "ORD", 1)).is_some());
    }

    #[tokio::test]
    async fn test_caching_provider_calls_inner_once() {
        let provider = CachingProvider::new(MockProvider::new(), CacheConfig::default());
        let query = query_for("LAX", "JFK", 1);

        provider.search_offers(&query).await.expect("first search");
        provider.search_offers(&query).await.expect("second search");

        // Second call never reached the inner provider
        assert_eq!(provider.inner.calls(), 1);
        assert_eq!(provider.stats().hits, 1);
    }

    #[tokio::test]
    async fn test_caching_provider_does_not_cache_failures() {
        let mock = MockProvider::new();
        mock.fail_next_requests(1);
        let provider = CachingProvider::new(mock, CacheConfig::default());
        let query = query_for("LAX", "JFK", 1);

        assert!(provider.search_offers(&query).await.is_err());
        assert!(provider.search_offers(&query).await.is_ok());
        assert_eq!(provider.inner.calls(), 2);
    }
}
