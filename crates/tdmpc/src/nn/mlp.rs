//! Sequential feed-forward stacks.

use ndarray::{Array1, ArrayViewD, ArrayViewMutD};
use rand::Rng;

use super::{init, ParamSet};
use crate::math::mish;
use crate::rng::Key;

const LAYER_NORM_EPS: f32 = 1e-6;

/// Initializer for the final projection of a head.
#[derive(Clone, Copy, Debug)]
pub enum DenseInit {
    /// LeCun normal, `N(0, 1/fan_in)`.
    LecunNormal,
    /// Truncated normal with the given standard deviation.
    TruncNormal(f32),
    /// All zeros.
    Zeros,
}

/// One layer of a head stack.
#[derive(Clone, Copy, Debug)]
pub enum LayerSpec {
    /// Linear -> layer norm -> optional mish -> optional dropout.
    Normed {
        in_dim: usize,
        out_dim: usize,
        dropout: f32,
        activate: bool,
    },
    /// Plain linear projection.
    Dense {
        in_dim: usize,
        out_dim: usize,
        init: DenseInit,
    },
}

impl LayerSpec {
    /// Normalized linear layer with mish activation.
    pub fn normed(in_dim: usize, out_dim: usize) -> Self {
        LayerSpec::Normed {
            in_dim,
            out_dim,
            dropout: 0.0,
            activate: true,
        }
    }

    /// Normalized linear layer with mish activation and dropout.
    pub fn normed_dropout(in_dim: usize, out_dim: usize, dropout: f32) -> Self {
        LayerSpec::Normed {
            in_dim,
            out_dim,
            dropout,
            activate: true,
        }
    }

    /// Normalized linear layer without activation.
    pub fn normed_linear(in_dim: usize, out_dim: usize) -> Self {
        LayerSpec::Normed {
            in_dim,
            out_dim,
            dropout: 0.0,
            activate: false,
        }
    }

    /// Plain linear projection.
    pub fn dense(in_dim: usize, out_dim: usize, init: DenseInit) -> Self {
        LayerSpec::Dense { in_dim, out_dim, init }
    }

    pub fn in_dim(&self) -> usize {
        match *self {
            LayerSpec::Normed { in_dim, .. } | LayerSpec::Dense { in_dim, .. } => in_dim,
        }
    }

    pub fn out_dim(&self) -> usize {
        match *self {
            LayerSpec::Normed { out_dim, .. } | LayerSpec::Dense { out_dim, .. } => out_dim,
        }
    }
}

/// Parameters of one layer.
#[derive(Clone, Debug)]
pub enum LayerParams {
    Normed {
        weight: ndarray::Array2<f32>,
        bias: Array1<f32>,
        gamma: Array1<f32>,
        beta: Array1<f32>,
    },
    Dense {
        weight: ndarray::Array2<f32>,
        bias: Array1<f32>,
    },
}

impl LayerParams {
    fn views(&self) -> Vec<ArrayViewD<'_, f32>> {
        match self {
            LayerParams::Normed {
                weight,
                bias,
                gamma,
                beta,
            } => vec![
                weight.view().into_dyn(),
                bias.view().into_dyn(),
                gamma.view().into_dyn(),
                beta.view().into_dyn(),
            ],
            LayerParams::Dense { weight, bias } => {
                vec![weight.view().into_dyn(), bias.view().into_dyn()]
            }
        }
    }

    fn views_mut(&mut self) -> Vec<ArrayViewMutD<'_, f32>> {
        match self {
            LayerParams::Normed {
                weight,
                bias,
                gamma,
                beta,
            } => vec![
                weight.view_mut().into_dyn(),
                bias.view_mut().into_dyn(),
                gamma.view_mut().into_dyn(),
                beta.view_mut().into_dyn(),
            ],
            LayerParams::Dense { weight, bias } => {
                vec![weight.view_mut().into_dyn(), bias.view_mut().into_dyn()]
            }
        }
    }
}

/// Immutable architecture descriptor for a sequential stack.
#[derive(Clone, Debug)]
pub struct Mlp {
    layers: Vec<LayerSpec>,
}

/// Parameters of an [`Mlp`], one entry per layer.
#[derive(Clone, Debug)]
pub struct MlpParams {
    pub layers: Vec<LayerParams>,
}

impl Mlp {
    /// Build a stack from layer specs. Adjacent layer dims must chain.
    pub fn new(layers: Vec<LayerSpec>) -> Self {
        debug_assert!(!layers.is_empty());
        for w in layers.windows(2) {
            debug_assert_eq!(w[0].out_dim(), w[1].in_dim(), "layer dims must chain");
        }
        Mlp { layers }
    }

    pub fn in_dim(&self) -> usize {
        self.layers[0].in_dim()
    }

    pub fn out_dim(&self) -> usize {
        self.layers[self.layers.len() - 1].out_dim()
    }

    /// Initialize parameters, one sub-key per layer.
    pub fn init(&self, key: Key) -> MlpParams {
        let layers = self
            .layers
            .iter()
            .enumerate()
            .map(|(i, spec)| {
                let k = key.fold_in(i as u64);
                match *spec {
                    LayerSpec::Normed {
                        in_dim, out_dim, ..
                    } => LayerParams::Normed {
                        weight: init::lecun_normal(k, out_dim, in_dim),
                        bias: init::zero_bias(out_dim),
                        gamma: Array1::ones(out_dim),
                        beta: init::zero_bias(out_dim),
                    },
                    LayerSpec::Dense {
                        in_dim,
                        out_dim,
                        init: di,
                    } => LayerParams::Dense {
                        weight: match di {
                            DenseInit::LecunNormal => init::lecun_normal(k, out_dim, in_dim),
                            DenseInit::TruncNormal(std) => {
                                init::trunc_normal(k, out_dim, in_dim, std)
                            }
                            DenseInit::Zeros => init::zeros(out_dim, in_dim),
                        },
                        bias: init::zero_bias(out_dim),
                    },
                }
            })
            .collect();
        MlpParams { layers }
    }

    /// Forward pass. `key` drives dropout in layers that use it; pass `None`
    /// for a deterministic application.
    pub fn apply(&self, params: &MlpParams, x: &Array1<f32>, key: Option<Key>) -> Array1<f32> {
        debug_assert_eq!(params.layers.len(), self.layers.len());
        debug_assert_eq!(x.len(), self.in_dim());
        let mut h = x.clone();
        for (i, (spec, lp)) in self.layers.iter().zip(&params.layers).enumerate() {
            h = match (spec, lp) {
                (
                    LayerSpec::Normed {
                        dropout, activate, ..
                    },
                    LayerParams::Normed {
                        weight,
                        bias,
                        gamma,
                        beta,
                    },
                ) => {
                    let y = weight.dot(&h) + bias;
                    let mut y = layer_norm(&y, gamma, beta);
                    if *activate {
                        y.mapv_inplace(mish);
                    }
                    if *dropout > 0.0 {
                        if let Some(key) = key {
                            apply_dropout(&mut y, *dropout, key.fold_in(i as u64));
                        }
                    }
                    y
                }
                (LayerSpec::Dense { .. }, LayerParams::Dense { weight, bias }) => {
                    weight.dot(&h) + bias
                }
                _ => unreachable!("layer spec/params structure mismatch"),
            };
        }
        h
    }
}

fn layer_norm(y: &Array1<f32>, gamma: &Array1<f32>, beta: &Array1<f32>) -> Array1<f32> {
    let mean = y.mean().unwrap_or(0.0);
    let var = y.mapv(|v| (v - mean) * (v - mean)).mean().unwrap_or(0.0);
    let inv = 1.0 / (var + LAYER_NORM_EPS).sqrt();
    Array1::from_iter(
        y.iter()
            .zip(gamma.iter())
            .zip(beta.iter())
            .map(|((&v, &g), &b)| g * (v - mean) * inv + b),
    )
}

/// Inverted dropout: zero with probability `rate`, scale survivors.
fn apply_dropout(y: &mut Array1<f32>, rate: f32, key: Key) {
    let mut rng = key.rng();
    let keep = 1.0 - rate;
    for v in y.iter_mut() {
        if rng.gen::<f32>() < rate {
            *v = 0.0;
        } else {
            *v /= keep;
        }
    }
}

impl ParamSet for MlpParams {
    fn tensors(&self) -> Vec<ArrayViewD<'_, f32>> {
        self.layers.iter().flat_map(|l| l.views()).collect()
    }

    fn tensors_mut(&mut self) -> Vec<ArrayViewMutD<'_, f32>> {
        self.layers.iter_mut().flat_map(|l| l.views_mut()).collect()
    }
}
