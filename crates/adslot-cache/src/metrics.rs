//! Counters for cache observability.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

/// Metrics for the ad lifecycle cache.
#[derive(Debug, Default)]
pub struct CacheMetrics {
    /// Calls to `load`.
    pub load_requests: AtomicU64,
    /// Loads actually forwarded to the provider.
    pub provider_requests: AtomicU64,
    /// Loads answered from a fresh cached ad.
    pub cache_hits: AtomicU64,
    /// Loads suppressed because one was already in flight.
    pub dedup_hits: AtomicU64,
    pub load_successes: AtomicU64,
    pub load_failures: AtomicU64,
    pub timeouts: AtomicU64,
    /// Entries evicted because they outlived the freshness window.
    pub expirations: AtomicU64,
    /// Calls to `show`.
    pub show_requests: AtomicU64,
    /// Shows with nothing usable cached.
    pub show_misses: AtomicU64,
    pub shown: AtomicU64,
    pub dismissed: AtomicU64,
    pub show_failures: AtomicU64,
    /// Errors or panics caught around the provider's display call.
    pub host_exceptions: AtomicU64,
}

impl CacheMetrics {
    /// Create new metrics instance.
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub(crate) fn incr(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    /// Get a snapshot of current metrics.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            load_requests: self.load_requests.load(Ordering::Relaxed),
            provider_requests: self.provider_requests.load(Ordering::Relaxed),
            cache_hits: self.cache_hits.load(Ordering::Relaxed),
            dedup_hits: self.dedup_hits.load(Ordering::Relaxed),
            load_successes: self.load_successes.load(Ordering::Relaxed),
            load_failures: self.load_failures.load(Ordering::Relaxed),
            timeouts: self.timeouts.load(Ordering::Relaxed),
            expirations: self.expirations.load(Ordering::Relaxed),
            show_requests: self.show_requests.load(Ordering::Relaxed),
            show_misses: self.show_misses.load(Ordering::Relaxed),
            shown: self.shown.load(Ordering::Relaxed),
            dismissed: self.dismissed.load(Ordering::Relaxed),
            show_failures: self.show_failures.load(Ordering::Relaxed),
            host_exceptions: self.host_exceptions.load(Ordering::Relaxed),
        }
    }
}

/// A point-in-time snapshot of metrics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub load_requests: u64,
    pub provider_requests: u64,
    pub cache_hits: u64,
    pub dedup_hits: u64,
    pub load_successes: u64,
    pub load_failures: u64,
    pub timeouts: u64,
    pub expirations: u64,
    pub show_requests: u64,
    pub show_misses: u64,
    pub shown: u64,
    pub dismissed: u64,
    pub show_failures: u64,
    pub host_exceptions: u64,
}

impl MetricsSnapshot {
    /// Share of loads served without contacting the provider.
    pub fn hit_ratio(&self) -> f64 {
        if self.load_requests == 0 {
            return 0.0;
        }
        self.cache_hits as f64 / self.load_requests as f64
    }
}
