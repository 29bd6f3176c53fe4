//! Scalar numeric transforms shared across the model.

use ndarray::Array1;

/// Signed logarithmic compression: `sign(x) * ln(1 + |x|)`.
///
/// Keeps wide-dynamic-range signals resolvable with few bins; exact inverse
/// of [`symexp`].
pub fn symlog(x: f32) -> f32 {
    x.signum() * x.abs().ln_1p()
}

/// Inverse of [`symlog`]: `sign(x) * (exp(|x|) - 1)`.
pub fn symexp(x: f32) -> f32 {
    x.signum() * (x.abs().exp() - 1.0)
}

/// Numerically stable softplus: `ln(1 + exp(x))`.
pub fn softplus(x: f32) -> f32 {
    if x > 20.0 {
        x
    } else {
        x.exp().ln_1p()
    }
}

/// Mish activation: `x * tanh(softplus(x))`.
pub fn mish(x: f32) -> f32 {
    x * softplus(x).tanh()
}

/// Logistic sigmoid.
pub fn sigmoid(x: f32) -> f32 {
    1.0 / (1.0 + (-x).exp())
}

/// Softmax over a vector, stabilized by max subtraction.
pub fn softmax(x: &Array1<f32>) -> Array1<f32> {
    let max = x.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    let exp = x.mapv(|v| (v - max).exp());
    let sum = exp.sum();
    exp / sum
}
