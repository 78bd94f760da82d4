//! # lshann
//!
//! An approximate nearest-neighbor (ANN) index for dense `f64` vectors based
//! on random-hyperplane Locality-Sensitive Hashing.
//!
//! Vectors are mapped to one L-bit code per permutation (P independent
//! families of L hyperplanes); records sharing a `(permutation, code)` bucket
//! with the query become candidates, which are re-ranked exactly under a
//! pluggable [`Metric`] and collected through a bounded top-K heap.
//!
//! ## Quick start
//!
//! ```rust
//! use lshann::{LshIndex, Record};
//!
//! let index = LshIndex::builder()
//!     .dims(128)
//!     .n_planes(16)
//!     .n_permutations(8)
//!     .seed(42)
//!     .build()
//!     .unwrap();
//!
//! let records: Vec<Record> = (0..100)
//!     .map(|i| Record {
//!         id: format!("doc-{i}"),
//!         vec: vec![i as f64 * 0.01; 128],
//!     })
//!     .collect();
//! index.train(&records).unwrap();
//!
//! let neighbors = index.search(&records[0].vec, 5, f64::INFINITY).unwrap();
//! for n in &neighbors {
//!     println!("id={} dist={:.4}", n.record.id, n.dist);
//! }
//! ```
//!
//! ## Design
//!
//! | Piece | Role |
//! |---------|------------------------------------------------------------|
//! | [`Hasher`] | P x L random hyperplanes, bit-exact dump/load            |
//! | [`StandardScaler`] | `(v - bias) / std` into the hashing space        |
//! | [`Store`]  | pluggable bucket storage ([`MemoryStore`] by default)    |
//! | [`Metric`] | pluggable distance ([`DistanceMetric`] built-ins)        |
//! | [`LshIndex`] | parallel batched training, bounded candidate search    |
//!
//! Training fans out one rayon worker per record batch; search is
//! single-threaded per call. The store is the only shared mutable state and
//! owns its synchronization.
//!
//! ## Feature flags
//!
//! | Flag    | Effect                                         |
//! |---------|------------------------------------------------|
//! | `serde` | Serialize/Deserialize on public config types    |

pub mod distance;
pub mod error;
pub mod hash;
pub mod index;
pub mod metrics;
pub mod persistence;
pub mod scaler;
pub mod store;
pub mod topk;
pub mod vecmath;

// Re-exports for convenience.
pub use distance::{DistanceMetric, Metric};
pub use error::{LshError, Result};
pub use hash::{Hasher, HasherConfig, MAX_PLANES};
pub use index::{Config, IndexConfig, LshIndex, LshIndexBuilder, Neighbor, Record};
pub use metrics::{MetricsCollector, MetricsSnapshot};
pub use scaler::StandardScaler;
pub use store::{BucketIter, BucketKey, MemoryStore, Store, StoreStats};
pub use topk::TopKHeap;
