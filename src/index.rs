use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use hashbrown::HashSet;
use parking_lot::RwLock;
use rayon::prelude::*;
use tracing::debug;

use crate::distance::{DistanceMetric, Metric};
use crate::error::{LshError, Result};
use crate::hash::{Hasher, HasherConfig};
use crate::metrics::{MetricsCollector, MetricsSnapshot, SearchTimer};
use crate::scaler::StandardScaler;
use crate::store::{BucketKey, MemoryStore, Store, StoreStats};
use crate::topk::TopKHeap;
use crate::vecmath::{asum, TOL};

/// A vector with its caller-assigned unique identifier.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Record {
    pub id: String,
    pub vec: Vec<f64>,
}

/// A stored record together with its distance to the query vector.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Neighbor {
    pub record: Record,
    pub dist: f64,
}

/// Runtime configuration of the index.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct IndexConfig {
    /// Number of records handed to each training worker.
    pub batch_size: usize,
    /// Per-dimension shift applied before hashing.
    pub bias: Option<Vec<f64>>,
    /// Per-dimension scale applied before hashing. Missing or near-zero std
    /// switches the hasher into cross-origin mode.
    pub std: Option<Vec<f64>>,
    /// Hard cap on candidates collected from the store per query.
    pub max_candidates: usize,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            batch_size: 1_000,
            bias: None,
            std: None,
            max_candidates: 5_000,
        }
    }
}

/// Combined configuration for [`LshIndex`] construction.
#[derive(Debug, Clone, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Config {
    pub index: IndexConfig,
    pub hasher: HasherConfig,
}

// ---------------------------------------------------------------------------
// LshIndex
// ---------------------------------------------------------------------------

/// A locality-sensitive hashing index for approximate nearest-neighbor search.
///
/// Owns the hasher, the scaler and a handle to the bucket store. Training
/// fans out over record batches; searching is single-threaded per call and
/// bounded by `max_candidates`.
pub struct LshIndex {
    config: RwLock<IndexConfig>,
    hasher: Hasher,
    scaler: StandardScaler,
    store: Arc<dyn Store>,
    metric: Arc<dyn Metric>,
    metrics: Option<Arc<MetricsCollector>>,
}

impl std::fmt::Debug for LshIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LshIndex")
            .field("dims", &self.hasher.dims())
            .field("n_planes", &self.hasher.n_planes())
            .field("n_permutations", &self.hasher.n_permutations())
            .field("config", &*self.config.read())
            .field("has_metrics", &self.metrics.is_some())
            .finish()
    }
}

impl LshIndex {
    /// Start building an index with the builder pattern.
    pub fn builder() -> LshIndexBuilder {
        LshIndexBuilder::new()
    }

    /// Create an index over the given store and metric.
    ///
    /// Samples all hyperplanes deterministically from `config.hasher.seed`.
    /// When `std` is missing, empty or near-zero, the hasher is forced into
    /// cross-origin mode.
    pub fn new(config: Config, store: Arc<dyn Store>, metric: Arc<dyn Metric>) -> Result<Self> {
        Self::new_with_metrics(config, store, metric, false)
    }

    fn new_with_metrics(
        mut config: Config,
        store: Arc<dyn Store>,
        metric: Arc<dyn Metric>,
        enable_metrics: bool,
    ) -> Result<Self> {
        if config.index.batch_size == 0 {
            return Err(LshError::InvalidConfig("batch_size must be >= 1".into()));
        }
        if config.index.max_candidates == 0 {
            return Err(LshError::InvalidConfig(
                "max_candidates must be >= 1".into(),
            ));
        }

        // Empty stat vectors behave as absent ones.
        if matches!(&config.index.bias, Some(b) if b.is_empty()) {
            config.index.bias = None;
        }
        if matches!(&config.index.std, Some(s) if s.is_empty()) {
            config.index.std = None;
        }

        let dims = config.hasher.dims;
        for (name, stat) in [("bias", &config.index.bias), ("std", &config.index.std)] {
            if let Some(stat) = stat {
                if stat.len() != dims {
                    return Err(LshError::InvalidConfig(format!(
                        "{name} has length {}, expected {dims}",
                        stat.len()
                    )));
                }
            }
        }

        let std_usable = config
            .index
            .std
            .as_deref()
            .is_some_and(|s| asum(s) >= TOL);
        if !std_usable {
            config.hasher.is_cross_origin = true;
        }

        let scaler = StandardScaler::new(
            config.index.bias.clone(),
            config.index.std.clone(),
            dims,
        );
        let hasher = Hasher::generate(config.hasher)?;

        let metrics = enable_metrics.then(|| Arc::new(MetricsCollector::new()));

        Ok(Self {
            config: RwLock::new(config.index),
            hasher,
            scaler,
            store,
            metric,
            metrics,
        })
    }

    // ------------------------------------------------------------------
    // Training
    // ------------------------------------------------------------------

    /// Clear the store and repopulate it from `records`.
    ///
    /// Records are partitioned into contiguous batches of `batch_size`, one
    /// worker per batch, all joined before returning. The raw vector is
    /// stored; only hashing sees the scaled one. On failure the store is left
    /// partially populated and the index must be retrained before use.
    pub fn train(&self, records: &[Record]) -> Result<()> {
        self.train_with_cancel(records, &AtomicBool::new(false))
    }

    /// Like [`LshIndex::train`], but checks `cancel` at each batch boundary:
    /// once it is set, no new batches start and the call returns
    /// [`LshError::TrainCancelled`] after in-flight batches quiesce.
    pub fn train_with_cancel(&self, records: &[Record], cancel: &AtomicBool) -> Result<()> {
        let batch_size = self.config.read().batch_size;
        self.store.clear()?;

        let dims = self.hasher.dims();
        debug!(
            records = records.len(),
            batch_size, "training index"
        );

        records.par_chunks(batch_size).try_for_each(|batch| {
            if cancel.load(Ordering::Relaxed) {
                return Err(LshError::TrainCancelled);
            }
            let mut scratch = vec![0.0f64; dims];
            for rec in batch {
                if rec.vec.len() != dims {
                    return Err(LshError::DimensionMismatch {
                        expected: dims,
                        got: rec.vec.len(),
                    });
                }
                self.scaler.scale(&rec.vec, &mut scratch);
                let hashes = self.hasher.get_hashes(&scratch);
                self.store.set_vector(&rec.id, &rec.vec)?;
                for (perm, &hash) in hashes.iter().enumerate() {
                    self.store.set_hash(BucketKey::new(perm as u32, hash), &rec.id)?;
                }
            }
            Ok(())
        })?;

        if let Some(m) = &self.metrics {
            m.record_train(records.len() as u64);
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Search
    // ------------------------------------------------------------------

    /// Return up to `max_nn` stored records within `distance_thrsh` of
    /// `query`, sorted by ascending distance (ties by collection order).
    ///
    /// Buckets are probed permutation by permutation until the candidate cap
    /// is reached; an absent bucket is skipped, a missing candidate vector is
    /// an error.
    pub fn search(
        &self,
        query: &[f64],
        max_nn: usize,
        distance_thrsh: f64,
    ) -> Result<Vec<Neighbor>> {
        let timer = self.metrics.as_ref().map(|_| SearchTimer::new());
        let max_candidates = self.config.read().max_candidates;

        let dims = self.hasher.dims();
        if query.len() != dims {
            return Err(LshError::DimensionMismatch {
                expected: dims,
                got: query.len(),
            });
        }
        if max_nn == 0 {
            return Ok(Vec::new());
        }

        let mut scaled = vec![0.0f64; dims];
        self.scaler.scale(query, &mut scaled);
        let hashes = self.hasher.get_hashes(&scaled);

        let mut seen: HashSet<String> = HashSet::new();
        let mut heap = TopKHeap::new();
        let mut examined = 0u64;

        for (perm, &hash) in hashes.iter().enumerate() {
            if heap.len() >= max_candidates {
                break;
            }
            let iter = match self.store.get_hash_iter(BucketKey::new(perm as u32, hash)) {
                Ok(iter) => {
                    if let Some(m) = &self.metrics {
                        m.record_bucket_hit();
                    }
                    iter
                }
                // The query point may hash into a bucket nothing was stored in.
                Err(LshError::NotFound(_)) => {
                    if let Some(m) = &self.metrics {
                        m.record_bucket_miss();
                    }
                    continue;
                }
                Err(e) => return Err(e),
            };
            for id in iter {
                if heap.len() >= max_candidates {
                    break;
                }
                if seen.contains(&id) {
                    continue;
                }
                let vec = self.store.get_vector(&id)?;
                let dist = self.metric.get_dist(&vec, query);
                if dist.is_nan() {
                    return Err(LshError::Distance(format!(
                        "metric returned NaN for id {id}"
                    )));
                }
                examined += 1;
                if dist <= distance_thrsh {
                    seen.insert(id.clone());
                    heap.push(Neighbor {
                        record: Record { id, vec },
                        dist,
                    });
                }
            }
        }

        let mut closest = Vec::with_capacity(max_nn.min(heap.len()));
        while closest.len() < max_nn {
            match heap.pop() {
                Some(neighbor) => closest.push(neighbor),
                None => break,
            }
        }

        debug!(
            examined,
            returned = closest.len(),
            "search finished"
        );
        if let Some(m) = &self.metrics {
            if let Some(t) = timer {
                m.record_search(examined, t.elapsed_ns());
            }
        }
        Ok(closest)
    }

    // ------------------------------------------------------------------
    // Hasher serialization
    // ------------------------------------------------------------------

    /// Serialize the hasher's planes into a self-describing byte blob.
    pub fn dump_hasher(&self) -> Vec<u8> {
        self.hasher.dump()
    }

    /// Replace the hasher's planes from a blob produced by
    /// [`LshIndex::dump_hasher`]. Fails unless the blob's shape matches the
    /// current config.
    pub fn load_hasher(&self, bytes: &[u8]) -> Result<()> {
        self.hasher.load(bytes)
    }

    // ------------------------------------------------------------------
    // Introspection
    // ------------------------------------------------------------------

    /// Return a clone of the current runtime configuration.
    pub fn config(&self) -> IndexConfig {
        self.config.read().clone()
    }

    /// The hasher's effective configuration (reflects the cross-origin
    /// auto-switch and any loaded blob).
    pub fn hasher_config(&self) -> HasherConfig {
        self.hasher.config()
    }

    /// Bucket sizing counters, when the store can provide them.
    pub fn stats(&self) -> Option<StoreStats> {
        self.store.stats()
    }

    /// Snapshot of runtime metrics (`None` if metrics were not enabled).
    pub fn metrics(&self) -> Option<MetricsSnapshot> {
        self.metrics.as_ref().map(|m| m.snapshot())
    }

    /// Reset metrics counters.
    pub fn reset_metrics(&self) {
        if let Some(m) = &self.metrics {
            m.reset();
        }
    }
}

// ---------------------------------------------------------------------------
// Builder
// ---------------------------------------------------------------------------

/// Fluent builder for [`LshIndex`].
pub struct LshIndexBuilder {
    config: Config,
    store: Option<Arc<dyn Store>>,
    metric: Arc<dyn Metric>,
    enable_metrics: bool,
}

impl Default for LshIndexBuilder {
    fn default() -> Self {
        Self {
            config: Config::default(),
            store: None,
            metric: Arc::new(DistanceMetric::Euclidean),
            enable_metrics: false,
        }
    }
}

impl LshIndexBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn dims(mut self, dims: usize) -> Self {
        self.config.hasher.dims = dims;
        self
    }

    pub fn n_planes(mut self, n: usize) -> Self {
        self.config.hasher.n_planes = n;
        self
    }

    pub fn n_permutations(mut self, n: usize) -> Self {
        self.config.hasher.n_permutations = n;
        self
    }

    pub fn bias_mag(mut self, mag: f64) -> Self {
        self.config.hasher.bias_mag = mag;
        self
    }

    pub fn seed(mut self, seed: u64) -> Self {
        self.config.hasher.seed = seed;
        self
    }

    pub fn batch_size(mut self, n: usize) -> Self {
        self.config.index.batch_size = n;
        self
    }

    pub fn max_candidates(mut self, n: usize) -> Self {
        self.config.index.max_candidates = n;
        self
    }

    pub fn bias(mut self, bias: Vec<f64>) -> Self {
        self.config.index.bias = Some(bias);
        self
    }

    pub fn std(mut self, std: Vec<f64>) -> Self {
        self.config.index.std = Some(std);
        self
    }

    pub fn store(mut self, store: Arc<dyn Store>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn metric<M: Metric + 'static>(mut self, metric: M) -> Self {
        self.metric = Arc::new(metric);
        self
    }

    pub fn enable_metrics(mut self) -> Self {
        self.enable_metrics = true;
        self
    }

    /// Build the index, returning an error on invalid configuration.
    pub fn build(self) -> Result<LshIndex> {
        let store = self
            .store
            .unwrap_or_else(|| Arc::new(MemoryStore::new()));
        LshIndex::new_with_metrics(self.config, store, self.metric, self.enable_metrics)
    }
}
