use crate::vecmath::{axpy, TOL};

/// Elementwise affine transform `(v - bias) / std` mapping raw vectors into
/// the hasher's working space.
///
/// Components of `std` at or below tolerance are skipped, so those
/// coordinates are only shifted. A missing `bias` acts as the zero vector; a
/// missing `std` leaves magnitudes untouched.
#[derive(Debug, Clone)]
pub struct StandardScaler {
    bias: Option<Vec<f64>>,
    std: Option<Vec<f64>>,
    dims: usize,
}

impl StandardScaler {
    pub fn new(bias: Option<Vec<f64>>, std: Option<Vec<f64>>, dims: usize) -> Self {
        Self { bias, std, dims }
    }

    pub fn dims(&self) -> usize {
        self.dims
    }

    /// Scale `v` into the caller-provided buffer `out`. Pure and
    /// allocation-free; both slices must have length `dims`.
    pub fn scale(&self, v: &[f64], out: &mut [f64]) {
        out.copy_from_slice(v);
        if let Some(bias) = &self.bias {
            axpy(-1.0, bias, out);
        }
        if let Some(std) = &self.std {
            for (o, s) in out.iter_mut().zip(std.iter()) {
                if *s > TOL {
                    *o /= s;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scale_full() {
        let scaler = StandardScaler::new(
            Some(vec![1.0, 2.0]),
            Some(vec![2.0, 4.0]),
            2,
        );
        let mut out = [0.0; 2];
        scaler.scale(&[3.0, 10.0], &mut out);
        assert_eq!(out, [1.0, 2.0]);
    }

    #[test]
    fn test_scale_no_bias() {
        let scaler = StandardScaler::new(None, Some(vec![2.0, 2.0]), 2);
        let mut out = [0.0; 2];
        scaler.scale(&[4.0, 6.0], &mut out);
        assert_eq!(out, [2.0, 3.0]);
    }

    #[test]
    fn test_scale_identity() {
        let scaler = StandardScaler::new(None, None, 3);
        let mut out = [0.0; 3];
        scaler.scale(&[1.0, -2.0, 3.5], &mut out);
        assert_eq!(out, [1.0, -2.0, 3.5]);
    }

    #[test]
    fn test_zero_std_component_only_shifts() {
        let scaler = StandardScaler::new(
            Some(vec![1.0, 1.0]),
            Some(vec![0.0, 2.0]),
            2,
        );
        let mut out = [0.0; 2];
        scaler.scale(&[5.0, 5.0], &mut out);
        assert_eq!(out, [4.0, 2.0]);
    }
}
