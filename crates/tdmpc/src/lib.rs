//! # tdmpc
//!
//! A latent world model for TD-MPC-style model-based reinforcement learning.
//!
//! ## Overview
//!
//! The crate provides:
//! - A [`model::WorldModel`] facade with `encode`/`next`/`reward`/
//!   `sample_actions`/`value` operations over a shared latent space
//! - Simplex-normalized latent states and two-hot distributional scalar
//!   regression for rewards and values
//! - Per-head parameter/optimizer bundles with a zero-nans → clip → AdamW
//!   gradient pipeline and an EMA-tracked target value ensemble
//! - Explicit splittable randomness keys instead of global RNG state
//!
//! The outer training loop, losses, planner, and replay storage are external
//! collaborators: every public operation here is a pure function of the model
//! configuration, explicit parameters, and an optional randomness key.
//!
//! ## Quick Start
//!
//! ```rust
//! use tdmpc::prelude::*;
//!
//! let cfg = WorldModelConfig {
//!     action_dim: 2,
//!     latent_dim: 8,
//!     simnorm_dim: 4,
//!     ..Default::default()
//! };
//! let encoder = MlpEncoder::new(4, 16, cfg.latent_dim);
//! let model = WorldModel::create(cfg, encoder, Key::new(0)).unwrap();
//!
//! let obs = ndarray::ArrayD::zeros(ndarray::IxDyn(&[4]));
//! let z = model.encode(&obs, &model.encoder.params, Key::new(1));
//! assert_eq!(z.len(), 8);
//! ```

pub mod codec;
pub mod dist;
pub mod math;
pub mod model;
pub mod nn;
pub mod optim;
pub mod rng;
pub mod simnorm;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::codec::{two_hot, two_hot_inv};
    pub use crate::dist::DiagGaussian;
    pub use crate::model::{
        Encoder, Head, MlpEncoder, PolicyOutput, WorldModel, WorldModelConfig, MAX_LOG_STD,
        MIN_LOG_STD,
    };
    pub use crate::nn::{Ensemble, Mlp, ParamSet};
    pub use crate::optim::{ema_blend, AdamW, GradPipeline};
    pub use crate::rng::Key;
    pub use crate::simnorm::simnorm;
    pub use crate::{ModelError, Result};
}

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Error types for the library
#[derive(Debug, thiserror::Error)]
pub enum ModelError {
    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Shape mismatch: expected {expected:?}, got {actual:?}")]
    ShapeMismatch {
        expected: Vec<usize>,
        actual: Vec<usize>,
    },
}

pub type Result<T> = core::result::Result<T, ModelError>;
