// ============================================================
// Layer 5 — Focal Loss
// ============================================================
// Lin et al. (2017): FL(p_t) = -(1 - p_t)^γ · log(p_t)
//
// The modulating factor (1 - p_t)^γ shrinks the loss of
// examples the model already gets right with high confidence,
// so training concentrates on hard examples. γ = 0 gives plain
// cross-entropy.
//
// Scores are always passed through log_softmax first. For the
// classifier the scores are already log-probabilities, and
// log_softmax of a log-probability vector that sums to one is
// the identity, so the same criterion serves both callers:
//
//   forward_target  scores [N, C] + target distribution [N, C]
//   forward_index   logits [N, C] + target class ids   [N]
//
// Both return the per-example loss [N]; reduction is the
// caller's job.

use burn::{prelude::*, tensor::activation::log_softmax};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FocalLoss {
    pub gamma: f64,
}

impl FocalLoss {
    pub fn new(gamma: f64) -> Self {
        Self { gamma }
    }

    /// Loss against a target distribution (one-hot gold labels).
    pub fn forward_target<B: Backend>(&self, scores: Tensor<B, 2>, target: Tensor<B, 2>) -> Tensor<B, 1> {
        let [n, _] = scores.dims();
        let log_p  = log_softmax(scores, 1);
        let terms  = self.modulate(log_p) * target;
        terms.sum_dim(1).neg().reshape([n])
    }

    /// Loss against integer class ids.
    pub fn forward_index<B: Backend>(&self, logits: Tensor<B, 2>, targets: Tensor<B, 1, Int>) -> Tensor<B, 1> {
        let [n, _] = logits.dims();
        let log_p  = log_softmax(logits, 1).gather(1, targets.reshape([n, 1]));
        self.modulate(log_p).neg().reshape([n])
    }

    /// (1 - p)^γ · log p, elementwise.
    fn modulate<B: Backend>(&self, log_p: Tensor<B, 2>) -> Tensor<B, 2> {
        if self.gamma == 0.0 {
            return log_p;
        }
        let weight = log_p.clone().exp().neg().add_scalar(1.0).powf_scalar(self.gamma);
        weight * log_p
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;

    type TB = NdArray;

    fn values(t: Tensor<TB, 1>) -> Vec<f32> {
        t.into_data().convert::<f32>().to_vec().unwrap()
    }

    #[test]
    fn test_gamma_zero_is_cross_entropy() {
        let device = Default::default();
        let logits = Tensor::<TB, 2>::from_floats([[2.0, 1.0, 0.1], [0.0, 0.0, 0.0]], &device);
        let target = Tensor::<TB, 1, Int>::from_ints([0, 2], &device);

        let loss = values(FocalLoss::new(0.0).forward_index(logits, target));

        let p0 = 2f32.exp() / (2f32.exp() + 1f32.exp() + 0.1f32.exp());
        assert!((loss[0] + p0.ln()).abs() < 1e-5);
        assert!((loss[1] - 3f32.ln()).abs() < 1e-5);
    }

    #[test]
    fn test_index_and_onehot_agree() {
        let device = Default::default();
        let logits = Tensor::<TB, 2>::from_floats([[0.3, -1.2, 2.0], [1.5, 0.2, -0.4]], &device);
        let ids    = Tensor::<TB, 1, Int>::from_ints([1, 0], &device);
        let onehot = Tensor::<TB, 2>::from_floats([[0.0, 1.0, 0.0], [1.0, 0.0, 0.0]], &device);

        let focal = FocalLoss::new(2.0);
        let a = values(focal.forward_index(logits.clone(), ids));
        let b = values(focal.forward_target(logits, onehot));
        for (x, y) in a.iter().zip(&b) {
            assert!((x - y).abs() < 1e-5);
        }
    }

    #[test]
    fn test_focusing_downweights_easy_examples() {
        let device = Default::default();
        // Confident and correct: p ≈ 0.98
        let logits = Tensor::<TB, 2>::from_floats([[5.0, 1.0, 0.0]], &device);
        let ids    = Tensor::<TB, 1, Int>::from_ints([0], &device);

        let ce    = values(FocalLoss::new(0.0).forward_index(logits.clone(), ids.clone()))[0];
        let focal = values(FocalLoss::new(2.0).forward_index(logits, ids))[0];
        assert!(focal < ce * 0.01);
        assert!(focal > 0.0);
    }

    #[test]
    fn test_log_probability_input_is_stable() {
        let device = Default::default();
        // Log-probabilities in, log_softmax leaves them unchanged
        let probs: [f32; 3] = [0.7, 0.2, 0.1];
        let log_p = Tensor::<TB, 2>::from_floats([[probs[0].ln(), probs[1].ln(), probs[2].ln()]], &device);
        let onehot = Tensor::<TB, 2>::from_floats([[0.0, 1.0, 0.0]], &device);

        let loss = values(FocalLoss::new(0.0).forward_target(log_p, onehot))[0];
        assert!((loss + 0.2f32.ln()).abs() < 1e-5);
    }
}
