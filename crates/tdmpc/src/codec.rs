//! Two-hot distributional scalar codec.
//!
//! Rewards and values are regressed as probability distributions over
//! `num_bins` bin centers equally spaced in symlog space between
//! `symlog(low)` and `symlog(high)`. [`two_hot`] encodes a scalar target,
//! [`two_hot_inv`] decodes predicted logits back to a scalar; the pair is
//! mutually inverse so losses computed against encodings stay consistent with
//! decoded planning values.
//!
//! Precondition for both: `num_bins >= 2` (bin spacing divides by
//! `num_bins - 1`). This is validated once at model construction, not per
//! call.

use ndarray::Array1;

use crate::math::{softmax, symexp, symlog};

/// Encode a scalar as a two-hot probability vector over symlog-spaced bins.
///
/// The symlog-compressed value is clamped to `[symlog(low), symlog(high)]`
/// and its mass split between the two adjacent bin centers in proportion to
/// proximity. Exactly one or two entries are non-zero.
pub fn two_hot(x: f32, low: f32, high: f32, num_bins: usize) -> Array1<f32> {
    let bin_low = symlog(low);
    let bin_high = symlog(high);
    let spacing = (bin_high - bin_low) / (num_bins - 1) as f32;

    let x = symlog(x).clamp(bin_low, bin_high);
    let pos = (x - bin_low) / spacing;
    let idx = (pos.floor() as usize).min(num_bins - 2);
    let frac = (pos - idx as f32).clamp(0.0, 1.0);

    let mut out = Array1::zeros(num_bins);
    out[idx] = 1.0 - frac;
    out[idx + 1] = frac;
    out
}

/// Decode logits to a scalar: softmax, expectation over symlog-spaced bin
/// centers, symexp back to linear scale.
///
/// Differentiable end-to-end as a pure function of `logits`; the result
/// always lies in `[low, high]` up to floating-point tolerance.
pub fn two_hot_inv(logits: &Array1<f32>, low: f32, high: f32, num_bins: usize) -> f32 {
    debug_assert_eq!(logits.len(), num_bins);
    let bin_low = symlog(low);
    let bin_high = symlog(high);
    let spacing = (bin_high - bin_low) / (num_bins - 1) as f32;

    let probs = softmax(logits);
    let mut acc = 0.0;
    for (i, &p) in probs.iter().enumerate() {
        acc += p * (bin_low + i as f32 * spacing);
    }
    symexp(acc)
}
