//! Feed-forward parameter structures and their forward application.
//!
//! Heads are small sequential stacks of normalized linear layers with a final
//! plain projection. Architectures ([`Mlp`], [`Ensemble`]) are immutable
//! descriptors; parameters live in separate value-type structs so a training
//! step or a target-network snapshot is an ordinary clone-and-replace.

mod ensemble;
pub mod init;
mod mlp;

pub use ensemble::{Ensemble, EnsembleParams};
pub use mlp::{DenseInit, LayerParams, LayerSpec, Mlp, MlpParams};

use ndarray::{ArrayViewD, ArrayViewMutD};

/// Uniform tensor access over a nested parameter structure.
///
/// The seam the optimizer pipeline and EMA blending operate through: any two
/// structurally identical values yield their tensors in the same order, so
/// parameters, gradients, and optimizer moments can be walked in lockstep.
pub trait ParamSet: Clone {
    /// Shared views of every tensor, in a stable order.
    fn tensors(&self) -> Vec<ArrayViewD<'_, f32>>;

    /// Mutable views of every tensor, in the same order as [`tensors`].
    ///
    /// [`tensors`]: ParamSet::tensors
    fn tensors_mut(&mut self) -> Vec<ArrayViewMutD<'_, f32>>;

    /// A structurally identical value with every tensor zeroed.
    fn zeros_like(&self) -> Self {
        let mut out = self.clone();
        for mut t in out.tensors_mut() {
            t.fill(0.0);
        }
        out
    }

    /// Total number of scalar parameters.
    fn num_params(&self) -> usize {
        self.tensors().iter().map(|t| t.len()).sum()
    }
}
