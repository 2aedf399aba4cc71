// ============================================================
// Layer 5 — Parameter Groups
// ============================================================
// Weight decay is applied to every parameter except biases and
// LayerNorm weights. Parameters are matched by name, so every
// model lists its parameters under HuggingFace-style names:
//
//   bert.encoder.layer.3.attention.output.LayerNorm.weight
//   bert.encoder.layer.3.intermediate.dense.bias
//   classifier.weight
//
// Burn tracks gradients by ParamId. After backward, the single
// GradientsParams is split into two by moving the no-decay ids
// out, and each half is handed to its own optimizer.

use burn::{
    module::ParamId,
    nn::{attention::MultiHeadAttention, Embedding, Linear},
    optim::GradientsParams,
    prelude::*,
};

use crate::ml::model::LayerNorm;

/// Name substrings that exclude a parameter from weight decay.
pub const NO_DECAY_PATTERNS: [&str; 2] = ["bias", "LayerNorm.weight"];

#[derive(Debug, Clone, PartialEq)]
pub struct NamedParam {
    pub name: String,
    pub id:   ParamId,
    /// Tensor rank, needed to move the gradient between groups
    pub rank: usize,
}

/// A module that can list its parameters by name.
pub trait NamedParams {
    fn named_params(&self) -> Vec<NamedParam>;
}

pub fn is_no_decay(name: &str) -> bool {
    NO_DECAY_PATTERNS.iter().any(|p| name.contains(p))
}

// ─── Collectors ───────────────────────────────────────────────────────────────

pub fn push_linear<B: Backend>(out: &mut Vec<NamedParam>, prefix: &str, linear: &Linear<B>) {
    out.push(NamedParam { name: format!("{prefix}.weight"), id: linear.weight.id.clone(), rank: 2 });
    if let Some(bias) = &linear.bias {
        out.push(NamedParam { name: format!("{prefix}.bias"), id: bias.id.clone(), rank: 1 });
    }
}

pub fn push_embedding<B: Backend>(out: &mut Vec<NamedParam>, prefix: &str, embedding: &Embedding<B>) {
    out.push(NamedParam { name: format!("{prefix}.weight"), id: embedding.weight.id.clone(), rank: 2 });
}

pub fn push_layer_norm<B: Backend>(out: &mut Vec<NamedParam>, prefix: &str, norm: &LayerNorm<B>) {
    out.push(NamedParam { name: format!("{prefix}.weight"), id: norm.weight.id.clone(), rank: 1 });
    out.push(NamedParam { name: format!("{prefix}.bias"), id: norm.bias.id.clone(), rank: 1 });
}

/// Query/key/value under `{prefix}.self`, output projection under
/// `{output_prefix}.dense`.
pub fn push_attention<B: Backend>(
    out:           &mut Vec<NamedParam>,
    prefix:        &str,
    output_prefix: &str,
    attention:     &MultiHeadAttention<B>,
) {
    push_linear(out, &format!("{prefix}.self.query"), &attention.query);
    push_linear(out, &format!("{prefix}.self.key"), &attention.key);
    push_linear(out, &format!("{prefix}.self.value"), &attention.value);
    push_linear(out, &format!("{output_prefix}.dense"), &attention.output);
}

// ─── Groups ───────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default)]
pub struct ParamGroups {
    pub decay:    Vec<NamedParam>,
    pub no_decay: Vec<NamedParam>,
}

impl ParamGroups {
    pub fn new(params: Vec<NamedParam>) -> Self {
        let (no_decay, decay) = params.into_iter().partition(|p| is_no_decay(&p.name));
        Self { decay, no_decay }
    }

    pub fn of<M: NamedParams>(model: &M) -> Self {
        Self::new(model.named_params())
    }

    /// Split gradients into (decay, no_decay). `B` is the inner
    /// backend the gradients live on.
    pub fn split<B: Backend>(&self, grads: GradientsParams) -> (GradientsParams, GradientsParams) {
        let mut decay    = grads;
        let mut no_decay = GradientsParams::new();
        for p in &self.no_decay {
            match p.rank {
                1 => move_grad::<B, 1>(&mut decay, &mut no_decay, p.id.clone()),
                2 => move_grad::<B, 2>(&mut decay, &mut no_decay, p.id.clone()),
                3 => move_grad::<B, 3>(&mut decay, &mut no_decay, p.id.clone()),
                rank => tracing::warn!("Parameter {} has unsupported rank {rank}", p.name),
            }
        }
        (decay, no_decay)
    }
}

fn move_grad<B: Backend, const D: usize>(from: &mut GradientsParams, to: &mut GradientsParams, id: ParamId) {
    if let Some(grad) = from.remove::<B, D>(id.clone()) {
        to.register::<B, D>(id, grad);
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::{Autodiff, NdArray};
    use burn::nn::LinearConfig;

    #[test]
    fn test_name_patterns() {
        assert!(is_no_decay("bert.encoder.layer.0.attention.output.LayerNorm.weight"));
        assert!(is_no_decay("bert.encoder.layer.0.output.LayerNorm.bias"));
        assert!(is_no_decay("classifier.bias"));
        assert!(!is_no_decay("classifier.weight"));
        assert!(!is_no_decay("bert.embeddings.word_embeddings.weight"));
    }

    #[test]
    fn test_split_moves_bias_gradients() {
        type TB = Autodiff<NdArray>;
        let device = Default::default();
        let linear = LinearConfig::new(2, 2).init::<TB>(&device);

        let mut named = Vec::new();
        push_linear(&mut named, "classifier", &linear);
        let groups = ParamGroups::new(named);
        assert_eq!(groups.decay.len(), 1);
        assert_eq!(groups.no_decay.len(), 1);

        let x     = Tensor::<TB, 2>::from_floats([[1.0, 2.0]], &device);
        let grads = linear.forward(x).sum().backward();
        let grads = GradientsParams::from_grads(grads, &linear);

        let (decay, no_decay) = groups.split::<NdArray>(grads);
        let weight_id = linear.weight.id.clone();
        let bias_id   = linear.bias.as_ref().unwrap().id.clone();

        assert!(decay.get::<NdArray, 2>(weight_id.clone()).is_some());
        assert!(decay.get::<NdArray, 1>(bias_id.clone()).is_none());
        assert!(no_decay.get::<NdArray, 1>(bias_id.clone()).is_some());
        assert!(no_decay.get::<NdArray, 2>(weight_id.clone()).is_none());
    }
}
