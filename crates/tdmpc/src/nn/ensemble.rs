//! Ensembles of independently parameterized copies of one architecture.

use ndarray::{Array1, Array2, ArrayViewD, ArrayViewMutD};

use super::{Mlp, MlpParams, ParamSet};
use crate::rng::Key;

/// `num_members` structurally identical sub-networks evaluated on the same
/// input in a single apply call. Parameters are stored stacked behind one
/// [`EnsembleParams`] value so the whole ensemble snapshots, steps, and EMA
/// blends as a unit.
#[derive(Clone, Debug)]
pub struct Ensemble {
    member: Mlp,
    num_members: usize,
}

/// Stacked parameters of an [`Ensemble`], one entry per member.
#[derive(Clone, Debug)]
pub struct EnsembleParams {
    pub members: Vec<MlpParams>,
}

impl Ensemble {
    pub fn new(member: Mlp, num_members: usize) -> Self {
        debug_assert!(num_members >= 1);
        Ensemble {
            member,
            num_members,
        }
    }

    pub fn num_members(&self) -> usize {
        self.num_members
    }

    pub fn out_dim(&self) -> usize {
        self.member.out_dim()
    }

    /// Initialize every member independently from per-member sub-keys.
    pub fn init(&self, key: Key) -> EnsembleParams {
        let members = (0..self.num_members)
            .map(|i| self.member.init(key.fold_in(i as u64)))
            .collect();
        EnsembleParams { members }
    }

    /// Apply all members to `x`, returning a `[num_members, out_dim]` matrix.
    ///
    /// Each member's dropout draws from its own sub-key so regularization
    /// noise is decorrelated across the ensemble.
    pub fn apply(&self, params: &EnsembleParams, x: &Array1<f32>, key: Option<Key>) -> Array2<f32> {
        debug_assert_eq!(params.members.len(), self.num_members);
        let mut out = Array2::zeros((self.num_members, self.member.out_dim()));
        for (i, member_params) in params.members.iter().enumerate() {
            let y = self
                .member
                .apply(member_params, x, key.map(|k| k.fold_in(i as u64)));
            out.row_mut(i).assign(&y);
        }
        out
    }
}

impl ParamSet for EnsembleParams {
    fn tensors(&self) -> Vec<ArrayViewD<'_, f32>> {
        self.members.iter().flat_map(|m| m.tensors()).collect()
    }

    fn tensors_mut(&mut self) -> Vec<ArrayViewMutD<'_, f32>> {
        self.members
            .iter_mut()
            .flat_map(|m| m.tensors_mut())
            .collect()
    }
}
