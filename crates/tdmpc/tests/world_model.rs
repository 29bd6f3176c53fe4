//! End-to-end checks on the assembled world model.

use ndarray::{Array1, ArrayD, IxDyn};
use tdmpc::prelude::*;

const OBS_DIM: usize = 6;

fn config() -> WorldModelConfig {
    WorldModelConfig {
        action_dim: 2,
        latent_dim: 8,
        simnorm_dim: 4,
        num_value_nets: 3,
        num_bins: 11,
        symlog_min: -10.0,
        symlog_max: 10.0,
        predict_continues: false,
        value_dropout: 0.0,
        ..Default::default()
    }
}

fn model() -> WorldModel<MlpEncoder> {
    let cfg = config();
    let encoder = MlpEncoder::new(OBS_DIM, 32, cfg.latent_dim);
    WorldModel::create(cfg, encoder, Key::new(7)).unwrap()
}

fn assert_simplex_blocks(z: &Array1<f32>, group: usize) {
    assert_eq!(z.len() % group, 0);
    for g in 0..z.len() / group {
        let block = z.slice(ndarray::s![g * group..(g + 1) * group]);
        let sum: f32 = block.sum();
        assert!((sum - 1.0).abs() < 1e-5, "block {} sums to {}", g, sum);
        assert!(block.iter().all(|&x| x >= 0.0));
    }
}

#[test]
fn encode_rollout_preserves_simplex_invariant() {
    let m = model();
    let [enc_key, val_key, act_key] = Key::new(1).split();

    let obs = ArrayD::zeros(IxDyn(&[OBS_DIM]));
    let z = m.encode(&obs, &m.encoder.params, enc_key);
    assert_eq!(z.len(), 8);
    assert_simplex_blocks(&z, 4);

    let a = Array1::zeros(2);
    let z_next = m.next(&z, &a, &m.dynamics_model.params);
    assert_eq!(z_next.len(), 8);
    assert_simplex_blocks(&z_next, 4);

    let (values, logits) = m.value(&z_next, &m.value_model.params, val_key);
    assert_eq!(values.len(), 3);
    assert_eq!(logits.shape(), &[3, 11]);
    for &v in values.iter() {
        assert!((-10.0..=10.0).contains(&v), "value {} out of range", v);
    }

    // Several imagined steps keep the invariant alive.
    let mut z = z_next;
    for i in 0..5 {
        let out = m.sample_actions(&z, &m.policy_model.params, 1.0, act_key.fold_in(i));
        assert!(out.action.iter().all(|&x| (-1.0..=1.0).contains(&x)));
        z = m.next(&z, &out.action, &m.dynamics_model.params);
        assert_simplex_blocks(&z, 4);
    }
}

#[test]
fn reward_scalar_matches_its_logits() {
    let m = model();
    let obs = ArrayD::from_elem(IxDyn(&[OBS_DIM]), 0.4);
    let z = m.encode(&obs, &m.encoder.params, Key::new(3));
    let a = Array1::from_elem(2, -0.5);

    let (r, logits) = m.reward(&z, &a, &m.reward_model.params);
    let decoded = two_hot_inv(&logits, -10.0, 10.0, 11);
    assert_eq!(r, decoded);
    assert!((-10.0..=10.0).contains(&r));
}

#[test]
fn value_scalars_match_their_logits() {
    let m = model();
    let obs = ArrayD::from_elem(IxDyn(&[OBS_DIM]), -0.2);
    let z = m.encode(&obs, &m.encoder.params, Key::new(5));

    let key = Key::new(6);
    let (values, logits) = m.value(&z, &m.value_model.params, key);
    for (i, &v) in values.iter().enumerate() {
        let decoded = two_hot_inv(&logits.row(i).to_owned(), -10.0, 10.0, 11);
        assert_eq!(v, decoded);
    }
}

#[test]
fn target_value_agrees_until_diverged() {
    let mut m = model();
    let obs = ArrayD::zeros(IxDyn(&[OBS_DIM]));
    let z = m.encode(&obs, &m.encoder.params, Key::new(0));

    let key = Key::new(11);
    let (live, _) = m.value(&z, &m.value_model.params, key);
    let (target, _) = m.value(&z, &m.target_value_model.params, key);
    assert_eq!(live, target);

    // One gradient step on the live ensemble breaks the agreement...
    let mut grads = m.value_model.params.zeros_like();
    for mut t in grads.tensors_mut() {
        t.fill(0.05);
    }
    m.value_model.apply_gradients(grads);
    let (live, _) = m.value(&z, &m.value_model.params, key);
    let (target, _) = m.value(&z, &m.target_value_model.params, key);
    assert_ne!(live, target);

    // ...and a tau=1 EMA update restores it exactly.
    m.update_target(1.0);
    let (target, _) = m.value(&z, &m.target_value_model.params, key);
    assert_eq!(live, target);
}

#[test]
fn deterministic_sampling_at_zero_std_scale() {
    let m = model();
    let obs = ArrayD::from_elem(IxDyn(&[OBS_DIM]), 1.0);
    let z = m.encode(&obs, &m.encoder.params, Key::new(2));

    let a = m.sample_actions(&z, &m.policy_model.params, 0.0, Key::new(100));
    let b = m.sample_actions(&z, &m.policy_model.params, 0.0, Key::new(200));
    assert_eq!(a.action, a.mean);
    assert_eq!(a.action, b.action);
    for &ls in a.log_std.iter() {
        assert!((MIN_LOG_STD..=MAX_LOG_STD).contains(&ls));
    }
}

#[test]
fn policy_log_prob_is_the_uncorrected_gaussian_density() {
    // The returned log_prob is the pre-clip diagonal Gaussian density; it
    // carries no tanh/clip change-of-variables term. This pins down that
    // (deliberate) behavior so a future squashing correction shows up as a
    // test change, not a silent semantic shift.
    let m = model();
    let obs = ArrayD::from_elem(IxDyn(&[OBS_DIM]), 0.1);
    let z = m.encode(&obs, &m.encoder.params, Key::new(4));

    let std_scale = 0.1;
    let out = m.sample_actions(&z, &m.policy_model.params, std_scale, Key::new(8));
    // Fresh policy heads keep the mean near 0, so the sample is unclipped
    // and we can reconstruct the density from the returned pieces.
    assert!(out.action.iter().all(|&x| x.abs() < 1.0));

    let mut expected = 0.0f32;
    for ((&a, &mu), &ls) in out
        .action
        .iter()
        .zip(out.mean.iter())
        .zip(out.log_std.iter())
    {
        let s = std_scale * ls.exp();
        let d = (a - mu) / s;
        expected += -0.5 * d * d - s.ln() - 0.5 * (2.0 * std::f32::consts::PI).ln();
    }
    assert!(
        (out.log_prob - expected).abs() < 1e-3,
        "log_prob {} vs gaussian density {}",
        out.log_prob,
        expected
    );
}

#[test]
fn model_creation_is_reproducible() {
    let cfg = config();
    let a = WorldModel::create(cfg.clone(), MlpEncoder::new(OBS_DIM, 32, 8), Key::new(7)).unwrap();
    let b = WorldModel::create(cfg, MlpEncoder::new(OBS_DIM, 32, 8), Key::new(7)).unwrap();

    let obs = ArrayD::from_elem(IxDyn(&[OBS_DIM]), 0.3);
    let za = a.encode(&obs, &a.encoder.params, Key::new(1));
    let zb = b.encode(&obs, &b.encoder.params, Key::new(1));
    assert_eq!(za, zb);

    let ra = a.reward(&za, &Array1::zeros(2), &a.reward_model.params);
    let rb = b.reward(&zb, &Array1::zeros(2), &b.reward_model.params);
    assert_eq!(ra.0, rb.0);
}

#[test]
fn head_initializations_are_decoupled() {
    // Same root key, different heads: zero-init final layers make reward
    // logits from fresh heads all-zero while the dynamics head is not.
    let m = model();
    let z = Array1::from_elem(8, 0.125);
    let a = Array1::zeros(2);

    let (_, reward_logits) = m.reward(&z, &a, &m.reward_model.params);
    assert!(reward_logits.iter().all(|&x| x == 0.0));

    let z_next = m.next(&z, &a, &m.dynamics_model.params);
    assert_ne!(z, z_next);
}
