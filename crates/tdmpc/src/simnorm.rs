//! Simplicial normalization of latent vectors.

use ndarray::Array1;

/// Project a vector onto a product of probability simplices.
///
/// Partitions `v` into consecutive groups of `group_size`, applies a softmax
/// within each group, and reconcatenates in order. Every latent state in the
/// model passes through this projection, so each `group_size`-block sums to 1
/// with non-negative entries by construction.
///
/// The caller guarantees `v.len() % group_size == 0`; the model validates the
/// latent/simnorm dimension ratio once at construction.
pub fn simnorm(v: &Array1<f32>, group_size: usize) -> Array1<f32> {
    debug_assert!(group_size > 0 && v.len() % group_size == 0);
    let mut out = Array1::zeros(v.len());
    for g in 0..v.len() / group_size {
        let start = g * group_size;
        let block = v.slice(ndarray::s![start..start + group_size]);
        let max = block.iter().copied().fold(f32::NEG_INFINITY, f32::max);
        let mut sum = 0.0;
        for (i, &x) in block.iter().enumerate() {
            let e = (x - max).exp();
            out[start + i] = e;
            sum += e;
        }
        for i in start..start + group_size {
            out[i] /= sum;
        }
    }
    out
}
