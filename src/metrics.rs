use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

/// Collects runtime statistics about index operations using lock-free atomic counters.
#[derive(Debug, Default)]
pub struct MetricsCollector {
    train_count: AtomicU64,
    records_trained: AtomicU64,
    search_count: AtomicU64,
    total_candidates_examined: AtomicU64,
    total_search_time_ns: AtomicU64,
    bucket_hits: AtomicU64,
    bucket_misses: AtomicU64,
}

impl MetricsCollector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_train(&self, records: u64) {
        self.train_count.fetch_add(1, Ordering::Relaxed);
        self.records_trained.fetch_add(records, Ordering::Relaxed);
    }

    pub fn record_search(&self, candidates: u64, duration_ns: u64) {
        self.search_count.fetch_add(1, Ordering::Relaxed);
        self.total_candidates_examined
            .fetch_add(candidates, Ordering::Relaxed);
        self.total_search_time_ns
            .fetch_add(duration_ns, Ordering::Relaxed);
    }

    pub fn record_bucket_hit(&self) {
        self.bucket_hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_bucket_miss(&self) {
        self.bucket_misses.fetch_add(1, Ordering::Relaxed);
    }

    /// Take a point-in-time snapshot of all metrics.
    pub fn snapshot(&self) -> MetricsSnapshot {
        let search_count = self.search_count.load(Ordering::Relaxed);
        let total_search_time_ns = self.total_search_time_ns.load(Ordering::Relaxed);
        let total_candidates = self.total_candidates_examined.load(Ordering::Relaxed);
        let hits = self.bucket_hits.load(Ordering::Relaxed);
        let misses = self.bucket_misses.load(Ordering::Relaxed);

        MetricsSnapshot {
            train_count: self.train_count.load(Ordering::Relaxed),
            records_trained: self.records_trained.load(Ordering::Relaxed),
            search_count,
            avg_search_time_us: if search_count > 0 {
                total_search_time_ns as f64 / search_count as f64 / 1000.0
            } else {
                0.0
            },
            avg_candidates_per_search: if search_count > 0 {
                total_candidates as f64 / search_count as f64
            } else {
                0.0
            },
            hit_rate: if hits + misses > 0 {
                hits as f64 / (hits + misses) as f64
            } else {
                0.0
            },
        }
    }

    /// Reset all counters to zero.
    pub fn reset(&self) {
        self.train_count.store(0, Ordering::Relaxed);
        self.records_trained.store(0, Ordering::Relaxed);
        self.search_count.store(0, Ordering::Relaxed);
        self.total_candidates_examined.store(0, Ordering::Relaxed);
        self.total_search_time_ns.store(0, Ordering::Relaxed);
        self.bucket_hits.store(0, Ordering::Relaxed);
        self.bucket_misses.store(0, Ordering::Relaxed);
    }
}

/// A point-in-time snapshot of index metrics.
#[derive(Debug, Clone)]
pub struct MetricsSnapshot {
    pub train_count: u64,
    pub records_trained: u64,
    pub search_count: u64,
    pub avg_search_time_us: f64,
    pub avg_candidates_per_search: f64,
    /// Fraction of bucket probes that found at least one candidate.
    pub hit_rate: f64,
}

impl std::fmt::Display for MetricsSnapshot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Trains: {} ({} records), Searches: {}, Avg search: {:.2}us, Avg candidates: {:.1}, Hit rate: {:.1}%",
            self.train_count,
            self.records_trained,
            self.search_count,
            self.avg_search_time_us,
            self.avg_candidates_per_search,
            self.hit_rate * 100.0,
        )
    }
}

/// RAII timer for measuring operation durations.
pub(crate) struct SearchTimer {
    start: Instant,
}

impl SearchTimer {
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    pub fn elapsed_ns(&self) -> u64 {
        self.start.elapsed().as_nanos() as u64
    }
}
