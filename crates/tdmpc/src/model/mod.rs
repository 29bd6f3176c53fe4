//! World model facade.
//!
//! Aggregates the encoder plus five heads (dynamics, reward, policy, value
//! ensemble, optional continuation) and a frozen target copy of the value
//! ensemble, and enforces the shared conventions across all of them: latent
//! states live on a product of `simnorm_dim`-simplices, rewards and values
//! are regressed through the two-hot codec over `[symlog_min, symlog_max]`,
//! and actions are squashed-Gaussian samples in `[-1, 1]`.
//!
//! Every public operation is a pure function of the model, explicit
//! parameters, and an optional key; the trainer owns the sequencing of
//! gradient steps and target updates.

mod encoder;

pub use encoder::{Encoder, MlpEncoder};

use ndarray::{s, Array1, Array2, ArrayD};
use serde::{Deserialize, Serialize};

use crate::codec::two_hot_inv;
use crate::dist::DiagGaussian;
use crate::math::{sigmoid, symlog};
use crate::nn::{
    DenseInit, Ensemble, EnsembleParams, LayerSpec, Mlp, MlpParams, ParamSet,
};
use crate::optim::{AdamW, GradPipeline};
use crate::rng::Key;
use crate::simnorm::simnorm;
use crate::{ModelError, Result};

/// Lower bound on the policy's per-coordinate log standard deviation.
pub const MIN_LOG_STD: f32 = -5.0;
/// Upper bound on the policy's per-coordinate log standard deviation.
pub const MAX_LOG_STD: f32 = 1.0;

/// World model configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct WorldModelConfig {
    /// Action vector width
    pub action_dim: usize,
    /// Latent state width
    pub latent_dim: usize,
    /// Simplex group size; must divide `latent_dim`
    pub simnorm_dim: usize,
    /// Number of value-ensemble members
    pub num_value_nets: usize,
    /// Bin count for two-hot reward/value regression; at least 2
    pub num_bins: usize,
    /// Lower bound of the decodable scalar range
    pub symlog_min: f32,
    /// Upper bound of the decodable scalar range
    pub symlog_max: f32,
    /// Dropout rate inside value-ensemble members
    pub value_dropout: f32,
    /// Whether to build the episode-continuation head
    pub predict_continues: bool,
    /// Whether observations are symlog-compressed before encoding
    pub symlog_obs: bool,
    /// AdamW learning rate shared by all trainable heads
    pub learning_rate: f32,
    /// Global gradient-norm clip shared by all trainable heads
    pub max_grad_norm: f32,
    /// AdamW decoupled weight decay
    pub weight_decay: f32,
}

impl Default for WorldModelConfig {
    fn default() -> Self {
        Self {
            action_dim: 1,
            latent_dim: 512,
            simnorm_dim: 8,
            num_value_nets: 5,
            num_bins: 101,
            symlog_min: -10.0,
            symlog_max: 10.0,
            value_dropout: 0.01,
            predict_continues: false,
            symlog_obs: false,
            learning_rate: 3e-4,
            max_grad_norm: 20.0,
            weight_decay: 1e-4,
        }
    }
}

impl WorldModelConfig {
    fn validate(&self) -> Result<()> {
        if self.num_bins < 2 {
            return Err(ModelError::Config(format!(
                "num_bins must be at least 2, got {}",
                self.num_bins
            )));
        }
        if self.simnorm_dim == 0 || self.latent_dim % self.simnorm_dim != 0 {
            return Err(ModelError::Config(format!(
                "latent_dim {} must be divisible by simnorm_dim {}",
                self.latent_dim, self.simnorm_dim
            )));
        }
        if self.num_value_nets == 0 {
            return Err(ModelError::Config(
                "num_value_nets must be at least 1".to_string(),
            ));
        }
        if self.action_dim == 0 {
            return Err(ModelError::Config("action_dim must be positive".to_string()));
        }
        if !(self.symlog_min < self.symlog_max) {
            return Err(ModelError::Config(format!(
                "symlog range [{}, {}] is empty",
                self.symlog_min, self.symlog_max
            )));
        }
        Ok(())
    }

    fn optimizer(&self) -> AdamW {
        AdamW {
            learning_rate: self.learning_rate,
            weight_decay: self.weight_decay,
            ..AdamW::default()
        }
    }
}

/// A head's parameters plus its optimizer chain.
///
/// The target value head is built [`frozen`](Head::frozen): it has no
/// pipeline and its parameters change only through
/// [`WorldModel::update_target`].
#[derive(Clone, Debug)]
pub struct Head<P: ParamSet> {
    pub params: P,
    opt: Option<GradPipeline<P>>,
}

impl<P: ParamSet> Head<P> {
    fn trainable(params: P, cfg: AdamW, max_grad_norm: f32) -> Self {
        let opt = GradPipeline::new(&params, cfg, max_grad_norm);
        Self {
            params,
            opt: Some(opt),
        }
    }

    fn frozen(params: P) -> Self {
        Self { params, opt: None }
    }

    pub fn is_trainable(&self) -> bool {
        self.opt.is_some()
    }

    /// Run one optimizer step with externally computed gradients.
    ///
    /// Returns the number of non-finite gradient components that were zeroed.
    /// A frozen head ignores gradients entirely.
    pub fn apply_gradients(&mut self, grads: P) -> usize {
        match &mut self.opt {
            Some(opt) => opt.step(&mut self.params, grads),
            None => 0,
        }
    }
}

/// Output of one policy query.
#[derive(Clone, Debug)]
pub struct PolicyOutput {
    /// Sampled action, clipped elementwise to `[-1, 1]`
    pub action: Array1<f32>,
    /// Post-tanh distribution mean, in `[-1, 1]`
    pub mean: Array1<f32>,
    /// Per-coordinate log std, in `[MIN_LOG_STD, MAX_LOG_STD]`
    pub log_std: Array1<f32>,
    /// Joint Gaussian log-density of the pre-clip sample.
    ///
    /// Not corrected for the `[-1, 1]` clip; `f32::INFINITY` when the caller
    /// collapsed the distribution with `std_scale = 0`.
    pub log_prob: f32,
}

/// Episode-continuation head, present only when the model was configured
/// with `predict_continues`.
#[derive(Clone, Debug)]
pub struct Continuation {
    net: Mlp,
    pub head: Head<MlpParams>,
}

impl Continuation {
    /// Continuation probability and its raw logit for a latent state.
    pub fn predict(&self, z: &Array1<f32>, params: &MlpParams) -> (f32, f32) {
        let logit = self.net.apply(params, z, None)[0];
        (sigmoid(logit), logit)
    }
}

/// The aggregate world model.
///
/// Heads are public so the trainer can read canonical parameters, feed
/// gradients through [`Head::apply_gradients`], and pass target parameters
/// into [`value`](WorldModel::value) for bootstrap targets.
pub struct WorldModel<E: Encoder> {
    encoder_net: E,
    pub encoder: Head<E::Params>,
    dynamics_net: Mlp,
    pub dynamics_model: Head<MlpParams>,
    reward_net: Mlp,
    pub reward_model: Head<MlpParams>,
    policy_net: Mlp,
    pub policy_model: Head<MlpParams>,
    value_net: Ensemble,
    pub value_model: Head<EnsembleParams>,
    pub target_value_model: Head<EnsembleParams>,
    pub continue_model: Option<Continuation>,
    cfg: WorldModelConfig,
}

impl<E: Encoder> WorldModel<E> {
    /// Build a fully initialized model.
    ///
    /// The root key splits into one sub-key per head so each head's
    /// initialization is reproducible and decoupled from the others. The
    /// target value head starts as an exact copy of the value ensemble.
    ///
    /// Fails with [`ModelError::Config`] on invalid dimension ratios and with
    /// [`ModelError::ShapeMismatch`] when the encoder's output width differs
    /// from `latent_dim`.
    pub fn create(cfg: WorldModelConfig, encoder: E, key: Key) -> Result<Self> {
        cfg.validate()?;
        if encoder.output_dim() != cfg.latent_dim {
            return Err(ModelError::ShapeMismatch {
                expected: vec![cfg.latent_dim],
                actual: vec![encoder.output_dim()],
            });
        }

        let [encoder_key, dynamics_key, reward_key, value_key, policy_key, continue_key] =
            key.split();
        let opt = cfg.optimizer();
        let (d, a, bins) = (cfg.latent_dim, cfg.action_dim, cfg.num_bins);

        let encoder_head = Head::trainable(encoder.init(encoder_key), opt, cfg.max_grad_norm);

        let dynamics_net = Mlp::new(vec![
            LayerSpec::normed(d + a, d),
            LayerSpec::normed(d, d),
            LayerSpec::normed_linear(d, d),
        ]);
        let dynamics_model =
            Head::trainable(dynamics_net.init(dynamics_key), opt, cfg.max_grad_norm);

        let reward_net = Mlp::new(vec![
            LayerSpec::normed(d + a, d),
            LayerSpec::normed(d, d),
            LayerSpec::dense(d, bins, DenseInit::Zeros),
        ]);
        let reward_model = Head::trainable(reward_net.init(reward_key), opt, cfg.max_grad_norm);

        let policy_net = Mlp::new(vec![
            LayerSpec::normed(d, d),
            LayerSpec::normed(d, d),
            LayerSpec::dense(d, 2 * a, DenseInit::TruncNormal(0.02)),
        ]);
        let policy_model = Head::trainable(policy_net.init(policy_key), opt, cfg.max_grad_norm);

        let value_net = Ensemble::new(
            Mlp::new(vec![
                LayerSpec::normed_dropout(d, d, cfg.value_dropout),
                LayerSpec::normed_dropout(d, d, cfg.value_dropout),
                LayerSpec::dense(d, bins, DenseInit::Zeros),
            ]),
            cfg.num_value_nets,
        );
        let value_params = value_net.init(value_key);
        let target_value_model = Head::frozen(value_params.clone());
        let value_model = Head::trainable(value_params, opt, cfg.max_grad_norm);

        let continue_model = if cfg.predict_continues {
            let net = Mlp::new(vec![
                LayerSpec::normed(d, d),
                LayerSpec::normed(d, d),
                LayerSpec::dense(d, 1, DenseInit::Zeros),
            ]);
            let head = Head::trainable(net.init(continue_key), opt, cfg.max_grad_norm);
            Some(Continuation { net, head })
        } else {
            None
        };

        log::debug!(
            "created world model: latent {}x{} simplices, {} bins, {} value nets, {} dynamics params",
            d / cfg.simnorm_dim,
            cfg.simnorm_dim,
            bins,
            cfg.num_value_nets,
            dynamics_model.params.num_params(),
        );

        Ok(Self {
            encoder_net: encoder,
            encoder: encoder_head,
            dynamics_net,
            dynamics_model,
            reward_net,
            reward_model,
            policy_net,
            policy_model,
            value_net,
            value_model,
            target_value_model,
            continue_model,
            cfg,
        })
    }

    pub fn config(&self) -> &WorldModelConfig {
        &self.cfg
    }

    pub fn encoder_net(&self) -> &E {
        &self.encoder_net
    }

    /// Encode an observation into a simplex-normalized latent state.
    ///
    /// When the model was configured with `symlog_obs`, every leaf of the
    /// observation is symlog-compressed first. The key drives only the
    /// encoder's internal stochastic regularization.
    pub fn encode(&self, obs: &ArrayD<f32>, params: &E::Params, key: Key) -> Array1<f32> {
        let z = if self.cfg.symlog_obs {
            let obs = obs.mapv(symlog);
            self.encoder_net.apply(params, &obs, key)
        } else {
            self.encoder_net.apply(params, obs, key)
        };
        simnorm(&z, self.cfg.simnorm_dim)
    }

    /// Predict the next latent state for `(z, a)`. Deterministic.
    pub fn next(&self, z: &Array1<f32>, a: &Array1<f32>, params: &MlpParams) -> Array1<f32> {
        let za = concat(z, a);
        let z_next = self.dynamics_net.apply(params, &za, None);
        simnorm(&z_next, self.cfg.simnorm_dim)
    }

    /// Predict the transition reward for `(z, a)`.
    ///
    /// Returns the decoded scalar together with the raw bin logits; the
    /// scalar is always the codec decoding of exactly those logits.
    pub fn reward(&self, z: &Array1<f32>, a: &Array1<f32>, params: &MlpParams) -> (f32, Array1<f32>) {
        let za = concat(z, a);
        let logits = self.reward_net.apply(params, &za, None);
        let reward = two_hot_inv(&logits, self.cfg.symlog_min, self.cfg.symlog_max, self.cfg.num_bins);
        (reward, logits)
    }

    /// Sample an action from the squashed-Gaussian policy at `z`.
    ///
    /// The policy head's output splits into a tanh-squashed mean and a log
    /// std rescaled into `[MIN_LOG_STD, MAX_LOG_STD]`; `std_scale` multiplies
    /// the std to anneal exploration (0 collapses sampling onto the mean).
    pub fn sample_actions(
        &self,
        z: &Array1<f32>,
        params: &MlpParams,
        std_scale: f32,
        key: Key,
    ) -> PolicyOutput {
        let out = self.policy_net.apply(params, z, None);
        let a = self.cfg.action_dim;
        let mean = out.slice(s![..a]).mapv(f32::tanh);
        let log_std = out
            .slice(s![a..])
            .mapv(|x| MIN_LOG_STD + (MAX_LOG_STD - MIN_LOG_STD) * 0.5 * (x.tanh() + 1.0));
        let std = log_std.mapv(|x| std_scale * x.exp());

        let dist = DiagGaussian::new(mean.clone(), std);
        let sample = dist.sample(key);
        let log_prob = dist.log_prob(&sample);

        PolicyOutput {
            action: sample.mapv(|x| x.clamp(-1.0, 1.0)),
            mean,
            log_std,
            log_prob,
        }
    }

    /// Evaluate the value ensemble at `z`.
    ///
    /// Pass `self.value_model.params` for live estimates or
    /// `self.target_value_model.params` for bootstrap targets. Returns the
    /// per-member decoded values and the raw `[num_value_nets, num_bins]`
    /// logits; the key drives the members' dropout.
    pub fn value(
        &self,
        z: &Array1<f32>,
        params: &EnsembleParams,
        key: Key,
    ) -> (Array1<f32>, Array2<f32>) {
        let logits = self.value_net.apply(params, z, Some(key));
        let values = Array1::from_iter(logits.rows().into_iter().map(|row| {
            two_hot_inv(
                &row.to_owned(),
                self.cfg.symlog_min,
                self.cfg.symlog_max,
                self.cfg.num_bins,
            )
        }));
        (values, logits)
    }

    /// Blend the live value ensemble into the target:
    /// `target <- (1 - tau) * target + tau * live`.
    ///
    /// The trainer invokes this on its own cadence; there is no path back to
    /// an exactly synced target other than `tau = 1`.
    pub fn update_target(&mut self, tau: f32) {
        crate::optim::ema_blend(
            &mut self.target_value_model.params,
            &self.value_model.params,
            tau,
        );
    }
}

fn concat(z: &Array1<f32>, a: &Array1<f32>) -> Array1<f32> {
    Array1::from_iter(z.iter().chain(a.iter()).copied())
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::IxDyn;

    fn test_config() -> WorldModelConfig {
        WorldModelConfig {
            action_dim: 2,
            latent_dim: 8,
            simnorm_dim: 4,
            num_value_nets: 3,
            num_bins: 11,
            value_dropout: 0.0,
            ..Default::default()
        }
    }

    fn test_model() -> WorldModel<MlpEncoder> {
        let cfg = test_config();
        let encoder = MlpEncoder::new(6, 16, cfg.latent_dim);
        WorldModel::create(cfg, encoder, Key::new(0)).unwrap()
    }

    #[test]
    fn test_rejects_indivisible_latent() {
        let cfg = WorldModelConfig {
            latent_dim: 10,
            simnorm_dim: 4,
            ..test_config()
        };
        let encoder = MlpEncoder::new(6, 16, 10);
        assert!(matches!(
            WorldModel::create(cfg, encoder, Key::new(0)),
            Err(ModelError::Config(_))
        ));
    }

    #[test]
    fn test_rejects_single_bin() {
        let cfg = WorldModelConfig {
            num_bins: 1,
            ..test_config()
        };
        let encoder = MlpEncoder::new(6, 16, 8);
        assert!(matches!(
            WorldModel::create(cfg, encoder, Key::new(0)),
            Err(ModelError::Config(_))
        ));
    }

    #[test]
    fn test_rejects_encoder_width_mismatch() {
        let encoder = MlpEncoder::new(6, 16, 12);
        assert!(matches!(
            WorldModel::create(test_config(), encoder, Key::new(0)),
            Err(ModelError::ShapeMismatch { .. })
        ));
    }

    #[test]
    fn test_target_synced_at_creation() {
        let model = test_model();
        let live = model.value_model.params.tensors();
        let target = model.target_value_model.params.tensors();
        assert_eq!(live.len(), target.len());
        for (l, t) in live.iter().zip(target.iter()) {
            assert_eq!(l, t);
        }
        assert!(model.value_model.is_trainable());
        assert!(!model.target_value_model.is_trainable());
    }

    #[test]
    fn test_target_tracks_live_with_full_tau() {
        let mut model = test_model();
        // Nudge the live ensemble away from the target.
        let mut grads = model.value_model.params.zeros_like();
        for mut t in grads.tensors_mut() {
            t.fill(0.1);
        }
        model.value_model.apply_gradients(grads);
        model.update_target(1.0);
        for (l, t) in model
            .value_model
            .params
            .tensors()
            .iter()
            .zip(model.target_value_model.params.tensors().iter())
        {
            assert_eq!(l, t);
        }
    }

    #[test]
    fn test_frozen_target_ignores_gradients() {
        let mut model = test_model();
        let before = model.target_value_model.params.clone();
        let mut grads = model.target_value_model.params.zeros_like();
        for mut t in grads.tensors_mut() {
            t.fill(123.0);
        }
        model.target_value_model.apply_gradients(grads);
        for (b, a) in before
            .tensors()
            .iter()
            .zip(model.target_value_model.params.tensors().iter())
        {
            assert_eq!(b, a);
        }
    }

    #[test]
    fn test_continue_head_is_optional() {
        let model = test_model();
        assert!(model.continue_model.is_none());

        let cfg = WorldModelConfig {
            predict_continues: true,
            ..test_config()
        };
        let encoder = MlpEncoder::new(6, 16, 8);
        let model = WorldModel::create(cfg, encoder, Key::new(0)).unwrap();
        let cont = model.continue_model.as_ref().unwrap();
        let z = Array1::from_elem(8, 0.25);
        let (prob, logit) = cont.predict(&z, &cont.head.params);
        // Zero-init final layer -> logit 0 -> probability one half.
        assert_eq!(logit, 0.0);
        assert!((prob - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_zero_std_scale_returns_mean() {
        let model = test_model();
        let z = Array1::from_elem(8, 0.25);
        let out_a = model.sample_actions(&z, &model.policy_model.params, 0.0, Key::new(1));
        let out_b = model.sample_actions(&z, &model.policy_model.params, 0.0, Key::new(999));
        assert_eq!(out_a.action, out_a.mean);
        assert_eq!(out_a.action, out_b.action);
        assert_eq!(out_a.log_prob, f32::INFINITY);
    }

    #[test]
    fn test_symlog_obs_changes_encoding() {
        let cfg = WorldModelConfig {
            symlog_obs: true,
            ..test_config()
        };
        let encoder = MlpEncoder::new(6, 16, 8);
        let with = WorldModel::create(cfg, encoder, Key::new(0)).unwrap();
        let without = test_model();

        let obs = ArrayD::from_elem(IxDyn(&[6]), 5.0);
        let za = with.encode(&obs, &with.encoder.params, Key::new(2));
        let zb = without.encode(&obs, &without.encoder.params, Key::new(2));
        assert_ne!(za, zb);

        // symlog is the identity at zero, so zero observations agree.
        let zero = ArrayD::zeros(IxDyn(&[6]));
        let za = with.encode(&zero, &with.encoder.params, Key::new(2));
        let zb = without.encode(&zero, &without.encoder.params, Key::new(2));
        assert_eq!(za, zb);
    }
}
