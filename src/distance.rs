use crate::vecmath::{self, dot};

/// Distance function used to rank candidates.
///
/// Implementations must be symmetric, non-negative and total on finite
/// inputs. A true metric is not required (cosine distance is fine), but a
/// `NaN` result is treated as a bug by the index and surfaced as an error.
pub trait Metric: Send + Sync {
    fn get_dist(&self, l: &[f64], r: &[f64]) -> f64;
}

/// Built-in distance metrics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum DistanceMetric {
    /// Cosine distance: 1 - cos(a, b). Range [0, 2]. 0 = identical direction.
    Cosine,
    /// Euclidean (L2) distance. Range [0, inf).
    Euclidean,
}

impl Metric for DistanceMetric {
    fn get_dist(&self, l: &[f64], r: &[f64]) -> f64 {
        match self {
            DistanceMetric::Cosine => cosine_distance(l, r),
            DistanceMetric::Euclidean => euclidean_distance(l, r),
        }
    }
}

/// Cosine distance: 1 - cos(a, b).
pub fn cosine_distance(a: &[f64], b: &[f64]) -> f64 {
    let denom = vecmath::l2_norm(a) * vecmath::l2_norm(b);
    if denom < vecmath::TOL {
        return 1.0;
    }
    1.0 - (dot(a, b) / denom)
}

/// Euclidean (L2) distance between two vectors.
pub fn euclidean_distance(a: &[f64], b: &[f64]) -> f64 {
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| {
            let d = x - y;
            d * d
        })
        .sum::<f64>()
        .sqrt()
}
