//! Diagonal-covariance Gaussian used by the policy head.

use ndarray::Array1;
use rand::Rng;
use rand_distr::StandardNormal;

use crate::rng::Key;

const LOG_2PI: f32 = 1.837_877_1;

/// Gaussian with independent coordinates.
#[derive(Clone, Debug)]
pub struct DiagGaussian {
    pub mean: Array1<f32>,
    pub std: Array1<f32>,
}

impl DiagGaussian {
    pub fn new(mean: Array1<f32>, std: Array1<f32>) -> Self {
        debug_assert_eq!(mean.len(), std.len());
        Self { mean, std }
    }

    /// Draw one sample. A zero-std coordinate returns its mean exactly, so a
    /// fully collapsed distribution samples deterministically.
    pub fn sample(&self, key: Key) -> Array1<f32> {
        let mut rng = key.rng();
        Array1::from_iter(self.mean.iter().zip(self.std.iter()).map(|(&m, &s)| {
            let eps: f32 = rng.sample(StandardNormal);
            m + s * eps
        }))
    }

    /// Joint log-density at `x`.
    ///
    /// If any coordinate has zero std the density is degenerate; this returns
    /// `f32::INFINITY` as a documented sentinel instead of dividing by zero
    /// (the point mass case only arises when sampling returned the mean).
    pub fn log_prob(&self, x: &Array1<f32>) -> f32 {
        debug_assert_eq!(x.len(), self.mean.len());
        if self.std.iter().any(|&s| s <= 0.0) {
            return f32::INFINITY;
        }
        let mut acc = 0.0;
        for ((&v, &m), &s) in x.iter().zip(self.mean.iter()).zip(self.std.iter()) {
            let z = (v - m) / s;
            acc += -0.5 * z * z - s.ln() - 0.5 * LOG_2PI;
        }
        acc
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::arr1;

    #[test]
    fn test_standard_normal_log_prob() {
        let d = DiagGaussian::new(arr1(&[0.0]), arr1(&[1.0]));
        let lp = d.log_prob(&arr1(&[0.0]));
        assert!((lp + 0.9189).abs() < 1e-4);
    }

    #[test]
    fn test_log_prob_sums_over_coordinates() {
        let d = DiagGaussian::new(arr1(&[0.0, 0.0]), arr1(&[1.0, 1.0]));
        let lp = d.log_prob(&arr1(&[0.0, 0.0]));
        assert!((lp + 2.0 * 0.9189).abs() < 1e-3);
    }

    #[test]
    fn test_zero_std_samples_mean() {
        let d = DiagGaussian::new(arr1(&[0.3, -0.7]), arr1(&[0.0, 0.0]));
        let s = d.sample(Key::new(123));
        assert_eq!(s, arr1(&[0.3, -0.7]));
        assert_eq!(d.log_prob(&s), f32::INFINITY);
    }

    #[test]
    fn test_sample_is_keyed() {
        let d = DiagGaussian::new(arr1(&[0.0]), arr1(&[1.0]));
        assert_eq!(d.sample(Key::new(1)), d.sample(Key::new(1)));
        assert_ne!(d.sample(Key::new(1)), d.sample(Key::new(2)));
    }

    #[test]
    fn test_sample_tracks_scale() {
        let d = DiagGaussian::new(arr1(&[0.0]), arr1(&[1e-6]));
        let s = d.sample(Key::new(4));
        assert!(s[0].abs() < 1e-4);
    }
}
