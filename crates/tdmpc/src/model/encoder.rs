//! Encoder collaborator contract.

use ndarray::{Array1, ArrayD};

use crate::nn::{DenseInit, LayerSpec, Mlp, MlpParams, ParamSet};
use crate::rng::Key;

/// Observation encoder supplied to the world model.
///
/// The model does not define the encoder's internal architecture; anything
/// that can initialize its own parameters and map an observation to a raw
/// latent vector of the model's `latent_dim` qualifies. The key drives any
/// internal stochastic regularization.
pub trait Encoder {
    type Params: ParamSet;

    /// Width of the produced raw latent vector. Must equal the model's
    /// `latent_dim`; checked once at model construction.
    fn output_dim(&self) -> usize;

    /// Initialize encoder parameters from a key.
    fn init(&self, key: Key) -> Self::Params;

    /// Map an observation to a raw (pre-simnorm) latent vector.
    fn apply(&self, params: &Self::Params, obs: &ArrayD<f32>, key: Key) -> Array1<f32>;
}

/// Simple MLP encoder over flattened observations.
#[derive(Clone, Debug)]
pub struct MlpEncoder {
    net: Mlp,
    obs_dim: usize,
}

impl MlpEncoder {
    pub fn new(obs_dim: usize, hidden_dim: usize, latent_dim: usize) -> Self {
        let net = Mlp::new(vec![
            LayerSpec::normed(obs_dim, hidden_dim),
            LayerSpec::dense(hidden_dim, latent_dim, DenseInit::LecunNormal),
        ]);
        Self { net, obs_dim }
    }
}

impl Encoder for MlpEncoder {
    type Params = MlpParams;

    fn output_dim(&self) -> usize {
        self.net.out_dim()
    }

    fn init(&self, key: Key) -> MlpParams {
        self.net.init(key)
    }

    fn apply(&self, params: &MlpParams, obs: &ArrayD<f32>, key: Key) -> Array1<f32> {
        let flat = Array1::from_iter(obs.iter().copied());
        debug_assert_eq!(flat.len(), self.obs_dim);
        self.net.apply(params, &flat, Some(key))
    }
}
