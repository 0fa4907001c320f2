use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::info;

/// Tracks cache and file-processing counters for one loader/search stack.
///
/// Clones share the same underlying counters, so a matcher and a loader
/// handed the same metrics handle contribute to one set of numbers.
#[derive(Debug, Clone)]
pub struct SearchMetrics {
    // Content cache
    content_hits: Arc<AtomicU64>,
    content_misses: Arc<AtomicU64>,
    content_bytes_cached: Arc<AtomicU64>,

    // Compiled-pattern cache
    pattern_hits: Arc<AtomicU64>,
    pattern_misses: Arc<AtomicU64>,
    pattern_cache_size: Arc<AtomicU64>,

    // Per-file failures recovered during loading
    load_failures: Arc<AtomicU64>,
}

impl SearchMetrics {
    /// Creates a new SearchMetrics instance
    pub fn new() -> Self {
        Self {
            content_hits: Arc::new(AtomicU64::new(0)),
            content_misses: Arc::new(AtomicU64::new(0)),
            content_bytes_cached: Arc::new(AtomicU64::new(0)),
            pattern_hits: Arc::new(AtomicU64::new(0)),
            pattern_misses: Arc::new(AtomicU64::new(0)),
            pattern_cache_size: Arc::new(AtomicU64::new(0)),
            load_failures: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Records a content read served from a record's cache
    pub fn record_content_hit(&self) {
        self.content_hits.fetch_add(1, Ordering::Relaxed);
    }

    /// Records a content load that had to touch the filesystem
    pub fn record_content_miss(&self, bytes: u64) {
        self.content_misses.fetch_add(1, Ordering::Relaxed);
        self.content_bytes_cached.fetch_add(bytes, Ordering::Relaxed);
    }

    /// Records bytes released when a cached record is refilled
    pub fn record_content_evicted(&self, bytes: u64) {
        self.content_bytes_cached.fetch_sub(bytes, Ordering::Relaxed);
    }

    /// Records a compiled-pattern cache operation
    pub fn record_pattern_cache(&self, size_delta: i64, hit: bool) {
        if size_delta > 0 {
            self.pattern_cache_size
                .fetch_add(size_delta as u64, Ordering::Relaxed);
        } else {
            self.pattern_cache_size
                .fetch_sub((-size_delta) as u64, Ordering::Relaxed);
        }

        if hit {
            self.pattern_hits.fetch_add(1, Ordering::Relaxed);
        } else {
            self.pattern_misses.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Records a per-file load failure
    pub fn record_load_failure(&self) {
        self.load_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn content_hits(&self) -> u64 {
        self.content_hits.load(Ordering::Relaxed)
    }

    pub fn content_misses(&self) -> u64 {
        self.content_misses.load(Ordering::Relaxed)
    }

    pub fn pattern_hits(&self) -> u64 {
        self.pattern_hits.load(Ordering::Relaxed)
    }

    pub fn pattern_misses(&self) -> u64 {
        self.pattern_misses.load(Ordering::Relaxed)
    }

    /// Gets a point-in-time snapshot of all counters
    pub fn get_stats(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            content_hits: self.content_hits.load(Ordering::Relaxed),
            content_misses: self.content_misses.load(Ordering::Relaxed),
            content_bytes_cached: self.content_bytes_cached.load(Ordering::Relaxed),
            pattern_hits: self.pattern_hits.load(Ordering::Relaxed),
            pattern_misses: self.pattern_misses.load(Ordering::Relaxed),
            pattern_cache_size: self.pattern_cache_size.load(Ordering::Relaxed),
            load_failures: self.load_failures.load(Ordering::Relaxed),
        }
    }

    /// Logs current cache statistics
    pub fn log_stats(&self) {
        let stats = self.get_stats();
        info!(
            "Cache stats:\n\
             Content hits/misses: {}/{}\n\
             Content bytes cached: {}\n\
             Pattern hits/misses: {}/{}\n\
             Load failures: {}",
            stats.content_hits,
            stats.content_misses,
            stats.content_bytes_cached,
            stats.pattern_hits,
            stats.pattern_misses,
            stats.load_failures
        );
    }
}

impl Default for SearchMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Point-in-time view of the search counters
#[derive(Debug, Clone, Copy)]
pub struct MetricsSnapshot {
    pub content_hits: u64,
    pub content_misses: u64,
    pub content_bytes_cached: u64,
    pub pattern_hits: u64,
    pub pattern_misses: u64,
    pub pattern_cache_size: u64,
    pub load_failures: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_content_cache_tracking() {
        let metrics = SearchMetrics::new();

        metrics.record_content_miss(1000);
        metrics.record_content_hit();
        metrics.record_content_hit();

        let stats = metrics.get_stats();
        assert_eq!(stats.content_hits, 2);
        assert_eq!(stats.content_misses, 1);
        assert_eq!(stats.content_bytes_cached, 1000);
    }

    #[test]
    fn test_eviction_reduces_cached_bytes() {
        let metrics = SearchMetrics::new();

        metrics.record_content_miss(500);
        metrics.record_content_evicted(500);
        metrics.record_content_miss(300);

        let stats = metrics.get_stats();
        assert_eq!(stats.content_bytes_cached, 300);
        assert_eq!(stats.content_misses, 2);
    }

    #[test]
    fn test_pattern_cache_tracking() {
        let metrics = SearchMetrics::new();

        metrics.record_pattern_cache(100, false);
        let stats = metrics.get_stats();
        assert_eq!(stats.pattern_cache_size, 100);
        assert_eq!(stats.pattern_hits, 0);
        assert_eq!(stats.pattern_misses, 1);

        metrics.record_pattern_cache(0, true);
        let stats = metrics.get_stats();
        assert_eq!(stats.pattern_hits, 1);
        assert_eq!(stats.pattern_misses, 1);
    }

    #[test]
    fn test_clones_share_counters() {
        let metrics = SearchMetrics::new();
        let clone = metrics.clone();

        clone.record_load_failure();
        metrics.record_load_failure();

        assert_eq!(metrics.get_stats().load_failures, 2);
    }
}
