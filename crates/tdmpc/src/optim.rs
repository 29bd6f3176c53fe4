//! Per-head gradient pipeline and target-network blending.
//!
//! Every trainable head owns one [`GradPipeline`]; a step runs three stages
//! in order:
//! 1. replace non-finite gradient components with zero (the distributional
//!    losses occasionally blow up; recovery is local and counted),
//! 2. clip the global gradient norm,
//! 3. AdamW update with decoupled weight decay.
//!
//! The target value head has no pipeline at all; it changes only through
//! [`ema_blend`].

use ndarray::Zip;

use crate::nn::ParamSet;

/// AdamW hyperparameters.
#[derive(Clone, Copy, Debug)]
pub struct AdamW {
    pub learning_rate: f32,
    pub beta1: f32,
    pub beta2: f32,
    pub eps: f32,
    pub weight_decay: f32,
}

impl Default for AdamW {
    fn default() -> Self {
        Self {
            learning_rate: 3e-4,
            beta1: 0.9,
            beta2: 0.999,
            eps: 1e-8,
            weight_decay: 1e-4,
        }
    }
}

/// Optimizer chain for one head: zero-nans -> global-norm clip -> AdamW.
#[derive(Clone, Debug)]
pub struct GradPipeline<P: ParamSet> {
    cfg: AdamW,
    max_grad_norm: f32,
    m: P,
    v: P,
    step: u64,
}

impl<P: ParamSet> GradPipeline<P> {
    /// Build a pipeline whose moment buffers mirror `template`.
    pub fn new(template: &P, cfg: AdamW, max_grad_norm: f32) -> Self {
        Self {
            cfg,
            max_grad_norm,
            m: template.zeros_like(),
            v: template.zeros_like(),
            step: 0,
        }
    }

    /// Number of optimizer steps taken so far.
    pub fn steps(&self) -> u64 {
        self.step
    }

    /// Apply one gradient step to `params` in place.
    ///
    /// Returns the number of gradient components that were non-finite and
    /// zeroed, so the caller can track instability without the step failing.
    pub fn step(&mut self, params: &mut P, mut grads: P) -> usize {
        let zeroed = zero_non_finite(&mut grads);
        if zeroed > 0 {
            log::debug!("zeroed {} non-finite gradient components", zeroed);
        }
        clip_global_norm(&mut grads, self.max_grad_norm);

        self.step += 1;
        let AdamW {
            learning_rate,
            beta1,
            beta2,
            eps,
            weight_decay,
        } = self.cfg;
        let bc1 = 1.0 - beta1.powi(self.step as i32);
        let bc2 = 1.0 - beta2.powi(self.step as i32);

        let mut p_t = params.tensors_mut();
        let g_t = grads.tensors();
        let mut m_t = self.m.tensors_mut();
        let mut v_t = self.v.tensors_mut();
        debug_assert_eq!(p_t.len(), g_t.len());
        for i in 0..p_t.len() {
            Zip::from(&mut p_t[i])
                .and(&g_t[i])
                .and(&mut m_t[i])
                .and(&mut v_t[i])
                .for_each(|p, &g, m, v| {
                    *m = beta1 * *m + (1.0 - beta1) * g;
                    *v = beta2 * *v + (1.0 - beta2) * g * g;
                    let m_hat = *m / bc1;
                    let v_hat = *v / bc2;
                    *p -= learning_rate * (m_hat / (v_hat.sqrt() + eps) + weight_decay * *p);
                });
        }
        zeroed
    }
}

fn zero_non_finite<P: ParamSet>(grads: &mut P) -> usize {
    let mut zeroed = 0;
    for mut g in grads.tensors_mut() {
        for x in g.iter_mut() {
            if !x.is_finite() {
                *x = 0.0;
                zeroed += 1;
            }
        }
    }
    zeroed
}

fn clip_global_norm<P: ParamSet>(grads: &mut P, max_norm: f32) {
    let mut sq = 0.0f32;
    for g in grads.tensors() {
        sq += g.iter().map(|x| x * x).sum::<f32>();
    }
    let norm = sq.sqrt();
    if norm > max_norm {
        let coef = max_norm / (norm + 1e-6);
        for mut g in grads.tensors_mut() {
            g.mapv_inplace(|x| x * coef);
        }
    }
}

/// Exponential moving average blend: `target <- (1 - tau) * target + tau * live`.
///
/// `tau = 1` copies the live parameters exactly; `tau = 0` is a no-op.
pub fn ema_blend<P: ParamSet>(target: &mut P, live: &P, tau: f32) {
    let mut t_t = target.tensors_mut();
    let l_t = live.tensors();
    debug_assert_eq!(t_t.len(), l_t.len());
    for i in 0..t_t.len() {
        Zip::from(&mut t_t[i]).and(&l_t[i]).for_each(|t, &l| {
            *t = (1.0 - tau) * *t + tau * l;
        });
    }
}
