use std::fmt;

use hashbrown::{HashMap, HashSet};
use parking_lot::RwLock;

use crate::error::{LshError, Result};

/// Canonical key of one bucket: a permutation index paired with an L-bit
/// code from that permutation's planes. Codes from different permutations
/// never share a bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct BucketKey {
    pub perm: u32,
    pub hash: u64,
}

impl BucketKey {
    pub fn new(perm: u32, hash: u64) -> Self {
        Self { perm, hash }
    }

    /// Parse the `"{perm}_{hash}"` form produced by [`fmt::Display`].
    pub fn decode(s: &str) -> Option<Self> {
        let (perm, hash) = s.split_once('_')?;
        Some(Self {
            perm: perm.parse().ok()?,
            hash: hash.parse().ok()?,
        })
    }
}

// Flattened form for string-keyed backends.
impl fmt::Display for BucketKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{}", self.perm, self.hash)
    }
}

/// Snapshot iterator over the ids of one bucket.
///
/// The snapshot is taken when the iterator is created; concurrent writes to
/// the bucket are not reflected.
pub struct BucketIter {
    ids: std::vec::IntoIter<String>,
}

impl BucketIter {
    pub fn new(ids: Vec<String>) -> Self {
        Self {
            ids: ids.into_iter(),
        }
    }
}

impl Iterator for BucketIter {
    type Item = String;

    fn next(&mut self) -> Option<String> {
        self.ids.next()
    }
}

/// Sizing counters reported by backends that can observe their own buckets.
#[derive(Debug, Clone, Default)]
pub struct StoreStats {
    pub num_vectors: usize,
    pub num_buckets: usize,
    pub avg_bucket_size: f64,
    pub max_bucket_size: usize,
}

/// Bucket storage consumed by the index: vectors by id, and id-sets keyed by
/// bucket.
///
/// Backends own their synchronization; `set_vector` and `set_hash` are
/// called concurrently from training workers. `get_hash_iter` returning
/// [`LshError::NotFound`] is expected at query time and recovered by the
/// index.
pub trait Store: Send + Sync {
    /// Remove all vectors and all bucket memberships.
    fn clear(&self) -> Result<()>;

    /// Associate `id` with a copy of `vec`, overwriting any previous entry.
    fn set_vector(&self, id: &str, vec: &[f64]) -> Result<()>;

    /// Fetch the stored vector for `id`, or [`LshError::NotFound`].
    fn get_vector(&self, id: &str) -> Result<Vec<f64>>;

    /// Add `id` to the bucket's id-set; adding twice is a no-op.
    fn set_hash(&self, key: BucketKey, id: &str) -> Result<()>;

    /// Snapshot the ids of one bucket, or [`LshError::NotFound`] when the
    /// bucket does not exist.
    fn get_hash_iter(&self, key: BucketKey) -> Result<BucketIter>;

    /// Bucket sizing counters, for backends that can provide them.
    fn stats(&self) -> Option<StoreStats> {
        None
    }
}

// ---------------------------------------------------------------------------
// In-memory backend
// ---------------------------------------------------------------------------

#[derive(Default)]
struct MemoryInner {
    vectors: HashMap<String, Vec<f64>>,
    buckets: HashMap<BucketKey, HashSet<String>>,
}

/// Hash-map backed store, the default backend.
///
/// Bucket snapshots are yielded in lexicographic id order, so two identically
/// trained indices enumerate candidates identically regardless of the
/// interleaving of training workers.
#[derive(Default)]
pub struct MemoryStore {
    inner: RwLock<MemoryInner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Store for MemoryStore {
    fn clear(&self) -> Result<()> {
        let mut inner = self.inner.write();
        inner.vectors.clear();
        inner.buckets.clear();
        Ok(())
    }

    fn set_vector(&self, id: &str, vec: &[f64]) -> Result<()> {
        self.inner.write().vectors.insert(id.to_owned(), vec.to_vec());
        Ok(())
    }

    fn get_vector(&self, id: &str) -> Result<Vec<f64>> {
        self.inner
            .read()
            .vectors
            .get(id)
            .cloned()
            .ok_or_else(|| LshError::NotFound(format!("vector {id}")))
    }

    fn set_hash(&self, key: BucketKey, id: &str) -> Result<()> {
        self.inner
            .write()
            .buckets
            .entry(key)
            .or_default()
            .insert(id.to_owned());
        Ok(())
    }

    fn get_hash_iter(&self, key: BucketKey) -> Result<BucketIter> {
        let inner = self.inner.read();
        let bucket = inner
            .buckets
            .get(&key)
            .ok_or_else(|| LshError::NotFound(format!("bucket {key}")))?;
        let mut ids: Vec<String> = bucket.iter().cloned().collect();
        ids.sort_unstable();
        Ok(BucketIter::new(ids))
    }

    fn stats(&self) -> Option<StoreStats> {
        let inner = self.inner.read();
        let num_buckets = inner.buckets.len();
        let total: usize = inner.buckets.values().map(|b| b.len()).sum();
        let max_bucket_size = inner.buckets.values().map(|b| b.len()).max().unwrap_or(0);
        Some(StoreStats {
            num_vectors: inner.vectors.len(),
            num_buckets,
            avg_bucket_size: if num_buckets > 0 {
                total as f64 / num_buckets as f64
            } else {
                0.0
            },
            max_bucket_size,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bucket_key_codec() {
        let key = BucketKey::new(3, 0xdeadbeef);
        let s = key.to_string();
        assert_eq!(s, format!("3_{}", 0xdeadbeefu64));
        assert_eq!(BucketKey::decode(&s), Some(key));
        assert_eq!(BucketKey::decode("garbage"), None);
        assert_eq!(BucketKey::decode("1_notanumber"), None);
    }

    #[test]
    fn test_vector_round_trip() {
        let store = MemoryStore::new();
        store.set_vector("a", &[1.0, 2.0]).unwrap();
        assert_eq!(store.get_vector("a").unwrap(), vec![1.0, 2.0]);
        store.set_vector("a", &[3.0]).unwrap();
        assert_eq!(store.get_vector("a").unwrap(), vec![3.0]);
    }

    #[test]
    fn test_get_vector_missing() {
        let store = MemoryStore::new();
        assert!(matches!(
            store.get_vector("nope"),
            Err(LshError::NotFound(_))
        ));
    }

    #[test]
    fn test_set_hash_idempotent() {
        let store = MemoryStore::new();
        let key = BucketKey::new(0, 7);
        store.set_hash(key, "a").unwrap();
        store.set_hash(key, "a").unwrap();
        store.set_hash(key, "b").unwrap();
        let ids: Vec<String> = store.get_hash_iter(key).unwrap().collect();
        assert_eq!(ids, vec!["a".to_owned(), "b".to_owned()]);
    }

    #[test]
    fn test_missing_bucket_is_not_found() {
        let store = MemoryStore::new();
        assert!(matches!(
            store.get_hash_iter(BucketKey::new(0, 1)),
            Err(LshError::NotFound(_))
        ));
    }

    #[test]
    fn test_buckets_isolated_by_permutation() {
        let store = MemoryStore::new();
        store.set_hash(BucketKey::new(0, 7), "a").unwrap();
        store.set_hash(BucketKey::new(1, 7), "b").unwrap();
        let p0: Vec<String> = store.get_hash_iter(BucketKey::new(0, 7)).unwrap().collect();
        assert_eq!(p0, vec!["a".to_owned()]);
    }

    #[test]
    fn test_iterator_is_snapshot() {
        let store = MemoryStore::new();
        let key = BucketKey::new(0, 1);
        store.set_hash(key, "a").unwrap();
        let iter = store.get_hash_iter(key).unwrap();
        store.set_hash(key, "b").unwrap();
        assert_eq!(iter.count(), 1);
    }

    #[test]
    fn test_clear_removes_everything() {
        let store = MemoryStore::new();
        store.set_vector("a", &[1.0]).unwrap();
        store.set_hash(BucketKey::new(0, 1), "a").unwrap();
        store.clear().unwrap();
        assert!(store.get_vector("a").is_err());
        assert!(store.get_hash_iter(BucketKey::new(0, 1)).is_err());
        let stats = store.stats().unwrap();
        assert_eq!(stats.num_vectors, 0);
        assert_eq!(stats.num_buckets, 0);
    }
}
