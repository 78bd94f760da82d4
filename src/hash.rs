use ndarray::Array1;
use parking_lot::RwLock;
use rand::distributions::Uniform;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::StandardNormal;

use crate::error::{LshError, Result};
use crate::vecmath::{l2_norm, TOL};

/// Upper bound on hash bits per permutation; codes are packed into a `u64`.
pub const MAX_PLANES: usize = 64;

const MAGIC: &[u8; 4] = b"LSHH";
const FORMAT_VERSION: u8 = 1;
const HEADER_LEN: usize = 14;

/// Configuration for the random-hyperplane hasher.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct HasherConfig {
    /// Dimensionality of hashed vectors.
    pub dims: usize,
    /// Number of planes (hash bits) per permutation (1..=64).
    pub n_planes: usize,
    /// Number of independent permutations.
    pub n_permutations: usize,
    /// Half-width of the uniform bias range used in cross-origin mode.
    pub bias_mag: f64,
    /// Whether planes carry a random offset instead of passing through the origin.
    pub is_cross_origin: bool,
    /// RNG seed; equal configs generate byte-identical hashers.
    pub seed: u64,
}

impl Default for HasherConfig {
    fn default() -> Self {
        Self {
            dims: 0,
            n_planes: 16,
            n_permutations: 8,
            bias_mag: 1.0,
            is_cross_origin: false,
            seed: 0,
        }
    }
}

/// One hyperplane `{x : normal . x + bias = 0}`; the sign side assigns a bit.
#[derive(Debug, Clone)]
struct Plane {
    normal: Array1<f64>,
    bias: f64,
}

/// A family of `n_planes` hyperplanes producing one L-bit code.
#[derive(Debug, Clone)]
struct Permutation {
    planes: Vec<Plane>,
}

struct HasherInner {
    is_cross_origin: bool,
    permutations: Vec<Permutation>,
}

/// Random-hyperplane hasher: maps a vector to one L-bit code per permutation.
///
/// Bit `j` of a code is 1 iff `normal_j . v + bias_j >= 0` (ties at zero go
/// to 1). Planes are sampled once at construction and replaced only through
/// [`Hasher::load`].
pub struct Hasher {
    dims: usize,
    n_planes: usize,
    n_permutations: usize,
    bias_mag: f64,
    seed: u64,
    inner: RwLock<HasherInner>,
}

impl Hasher {
    /// Sample all `P * L` planes deterministically from `config.seed`.
    pub fn generate(config: HasherConfig) -> Result<Self> {
        validate_config(&config)?;

        let mut rng = StdRng::seed_from_u64(config.seed);
        let bias_range = Uniform::new_inclusive(-config.bias_mag, config.bias_mag);

        let permutations = (0..config.n_permutations)
            .map(|_| Permutation {
                planes: (0..config.n_planes)
                    .map(|_| {
                        let normal = sample_normal(&mut rng, config.dims);
                        let bias = if config.is_cross_origin {
                            rng.sample(bias_range)
                        } else {
                            0.0
                        };
                        Plane { normal, bias }
                    })
                    .collect(),
            })
            .collect();

        Ok(Self {
            dims: config.dims,
            n_planes: config.n_planes,
            n_permutations: config.n_permutations,
            bias_mag: config.bias_mag,
            seed: config.seed,
            inner: RwLock::new(HasherInner {
                is_cross_origin: config.is_cross_origin,
                permutations,
            }),
        })
    }

    /// Compute one code per permutation for a vector of length `dims`.
    pub fn get_hashes(&self, v: &[f64]) -> Vec<u64> {
        let view = ndarray::aview1(v);
        let inner = self.inner.read();
        inner
            .permutations
            .iter()
            .map(|perm| {
                let mut code = 0u64;
                for (j, plane) in perm.planes.iter().enumerate() {
                    if view.dot(&plane.normal) + plane.bias >= 0.0 {
                        code |= 1u64 << j;
                    }
                }
                code
            })
            .collect()
    }

    pub fn dims(&self) -> usize {
        self.dims
    }

    pub fn n_planes(&self) -> usize {
        self.n_planes
    }

    pub fn n_permutations(&self) -> usize {
        self.n_permutations
    }

    /// Effective mode after construction or the last [`Hasher::load`].
    pub fn is_cross_origin(&self) -> bool {
        self.inner.read().is_cross_origin
    }

    /// Serialize all planes into a self-describing byte blob.
    ///
    /// Layout: `"LSHH"`, version byte, `dims` (u32 LE), `n_planes` (u16 LE),
    /// `n_permutations` (u16 LE), flags byte (bit0 = cross-origin), then for
    /// each of the `P * L` planes the normal as `dims` LE f64 followed by one
    /// LE f64 bias. `dump -> load -> dump` is bit-identical.
    pub fn dump(&self) -> Vec<u8> {
        let inner = self.inner.read();
        let plane_len = (self.dims + 1) * 8;
        let mut out =
            Vec::with_capacity(HEADER_LEN + self.n_permutations * self.n_planes * plane_len);

        out.extend_from_slice(MAGIC);
        out.push(FORMAT_VERSION);
        out.extend_from_slice(&(self.dims as u32).to_le_bytes());
        out.extend_from_slice(&(self.n_planes as u16).to_le_bytes());
        out.extend_from_slice(&(self.n_permutations as u16).to_le_bytes());
        out.push(inner.is_cross_origin as u8);

        for perm in &inner.permutations {
            for plane in &perm.planes {
                for x in plane.normal.iter() {
                    out.extend_from_slice(&x.to_le_bytes());
                }
                out.extend_from_slice(&plane.bias.to_le_bytes());
            }
        }
        out
    }

    /// Validate a blob against the current shape and atomically replace all
    /// planes with its contents.
    pub fn load(&self, bytes: &[u8]) -> Result<()> {
        if bytes.len() < HEADER_LEN {
            return Err(LshError::SerializationMismatch(format!(
                "blob too short: {} bytes",
                bytes.len()
            )));
        }
        if &bytes[0..4] != MAGIC {
            return Err(LshError::SerializationMismatch("bad magic tag".into()));
        }
        if bytes[4] != FORMAT_VERSION {
            return Err(LshError::SerializationMismatch(format!(
                "unsupported version {}",
                bytes[4]
            )));
        }

        let dims = u32::from_le_bytes(bytes[5..9].try_into().unwrap()) as usize;
        let n_planes = u16::from_le_bytes(bytes[9..11].try_into().unwrap()) as usize;
        let n_permutations = u16::from_le_bytes(bytes[11..13].try_into().unwrap()) as usize;
        let is_cross_origin = bytes[13] & 1 != 0;

        if dims != self.dims || n_planes != self.n_planes || n_permutations != self.n_permutations
        {
            return Err(LshError::SerializationMismatch(format!(
                "shape {}x{}x{} does not match configured {}x{}x{}",
                n_permutations, n_planes, dims, self.n_permutations, self.n_planes, self.dims
            )));
        }

        let plane_len = (dims + 1) * 8;
        let expected = HEADER_LEN + n_permutations * n_planes * plane_len;
        if bytes.len() != expected {
            return Err(LshError::SerializationMismatch(format!(
                "expected {} bytes, got {}",
                expected,
                bytes.len()
            )));
        }

        let mut offset = HEADER_LEN;
        let mut permutations = Vec::with_capacity(n_permutations);
        for _ in 0..n_permutations {
            let mut planes = Vec::with_capacity(n_planes);
            for _ in 0..n_planes {
                let mut normal = Vec::with_capacity(dims);
                for _ in 0..dims {
                    normal.push(f64::from_le_bytes(
                        bytes[offset..offset + 8].try_into().unwrap(),
                    ));
                    offset += 8;
                }
                let bias =
                    f64::from_le_bytes(bytes[offset..offset + 8].try_into().unwrap());
                offset += 8;
                planes.push(Plane {
                    normal: Array1::from_vec(normal),
                    bias,
                });
            }
            permutations.push(Permutation { planes });
        }

        tracing::debug!(
            n_permutations,
            n_planes,
            dims,
            is_cross_origin,
            "hasher planes replaced from blob"
        );
        *self.inner.write() = HasherInner {
            is_cross_origin,
            permutations,
        };
        Ok(())
    }

    /// Rebuild the config this hasher was generated with, reflecting the
    /// currently effective cross-origin mode.
    pub fn config(&self) -> HasherConfig {
        HasherConfig {
            dims: self.dims,
            n_planes: self.n_planes,
            n_permutations: self.n_permutations,
            bias_mag: self.bias_mag,
            is_cross_origin: self.inner.read().is_cross_origin,
            seed: self.seed,
        }
    }
}

fn validate_config(config: &HasherConfig) -> Result<()> {
    if config.dims < 1 {
        return Err(LshError::InvalidConfig("dims must be >= 1".into()));
    }
    if config.dims > u32::MAX as usize {
        return Err(LshError::InvalidConfig("dims must fit in u32".into()));
    }
    if config.n_planes < 1 || config.n_planes > MAX_PLANES {
        return Err(LshError::InvalidConfig(format!(
            "n_planes must be in 1..={MAX_PLANES}, got {}",
            config.n_planes
        )));
    }
    if config.n_permutations < 1 {
        return Err(LshError::InvalidConfig(
            "n_permutations must be >= 1".into(),
        ));
    }
    if config.n_permutations > u16::MAX as usize {
        return Err(LshError::InvalidConfig(
            "n_permutations must fit in u16".into(),
        ));
    }
    if !(config.bias_mag >= 0.0 && config.bias_mag.is_finite()) {
        return Err(LshError::InvalidConfig(
            "bias_mag must be finite and >= 0".into(),
        ));
    }
    Ok(())
}

// Degenerate (near-zero) normals are rejected and resampled.
fn sample_normal(rng: &mut StdRng, dims: usize) -> Array1<f64> {
    loop {
        let v: Vec<f64> = (0..dims).map(|_| rng.sample(StandardNormal)).collect();
        if l2_norm(&v) > TOL {
            return Array1::from_vec(v);
        }
    }
}
