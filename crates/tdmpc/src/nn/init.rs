//! Weight initializers, driven by explicit keys.

use ndarray::{Array1, Array2};
use rand::Rng;
use rand_distr::StandardNormal;

use crate::rng::Key;

/// LeCun normal init: `N(0, 1/fan_in)`.
pub fn lecun_normal(key: Key, out_dim: usize, in_dim: usize) -> Array2<f32> {
    let std = (1.0 / in_dim as f32).sqrt();
    let mut rng = key.rng();
    Array2::from_shape_fn((out_dim, in_dim), |_| {
        let n: f32 = rng.sample(StandardNormal);
        n * std
    })
}

/// Truncated normal init: `N(0, std^2)` resampled to two standard deviations.
pub fn trunc_normal(key: Key, out_dim: usize, in_dim: usize, std: f32) -> Array2<f32> {
    let mut rng = key.rng();
    Array2::from_shape_fn((out_dim, in_dim), |_| {
        loop {
            let n: f32 = rng.sample(StandardNormal);
            if n.abs() <= 2.0 {
                return n * std;
            }
        }
    })
}

/// All-zero weight matrix. Used for final reward/value/continue projections
/// so freshly created heads predict the distribution midpoint.
pub fn zeros(out_dim: usize, in_dim: usize) -> Array2<f32> {
    Array2::zeros((out_dim, in_dim))
}

/// Zero bias vector.
pub fn zero_bias(dim: usize) -> Array1<f32> {
    Array1::zeros(dim)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lecun_scale() {
        let w = lecun_normal(Key::new(0), 64, 256);
        let var = w.iter().map(|x| x * x).sum::<f32>() / w.len() as f32;
        // fan_in 256 -> variance ~ 1/256
        assert!((var - 1.0 / 256.0).abs() < 1.0 / 512.0, "var {}", var);
    }

    #[test]
    fn test_trunc_normal_bounded() {
        let w = trunc_normal(Key::new(1), 32, 32, 0.02);
        assert!(w.iter().all(|x| x.abs() <= 0.04 + 1e-7));
        assert!(w.iter().any(|&x| x != 0.0));
    }

    #[test]
    fn test_init_is_reproducible() {
        let a = lecun_normal(Key::new(9), 8, 8);
        let b = lecun_normal(Key::new(9), 8, 8);
        assert_eq!(a, b);
    }
}
