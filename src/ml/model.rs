use burn::{
    module::Param,
    nn::{
        attention::{MhaInput, MultiHeadAttention, MultiHeadAttentionConfig},
        Dropout, DropoutConfig,
        Embedding, EmbeddingConfig,
        Linear, LinearConfig,
    },
    prelude::*,
    tensor::activation::{gelu, tanh},
};

use crate::domain::label::NUM_NLI_CLASSES;
use crate::ml::generative::{DecoderBlock, T5ForNli};
use crate::ml::grad::grad_mul_const;
use crate::ml::params::{
    push_attention, push_embedding, push_layer_norm, push_linear, NamedParam, NamedParams,
};

// NOTE: #[derive(Config)] already generates Clone and Serialize/Deserialize
// internally — do NOT add them again or you get conflicting impls.
#[derive(Config, Debug)]
pub struct NliModelConfig {
    pub vocab_size:  usize,
    pub max_seq_len: usize,
    #[config(default = 256)]
    pub d_model:     usize,
    #[config(default = 4)]
    pub num_heads:   usize,
    #[config(default = 4)]
    pub num_layers:  usize,
    #[config(default = 2)]
    pub num_decoder_layers: usize,
    #[config(default = 1024)]
    pub d_ff:        usize,
    #[config(default = 0.1)]
    pub hidden_dropout: f64,
    #[config(default = 0.1)]
    pub attention_dropout: f64,
    #[config(default = 0.1)]
    pub classifier_dropout: f64,
    /// Gradient multiplier on the pooled representation
    #[config(default = 1.0)]
    pub encoder_grad_scale: f64,
    #[config(default = 2)]
    pub type_vocab_size: usize,
    #[config(default = 1e-12)]
    pub layer_norm_eps: f64,
}

impl NliModelConfig {
    pub fn init_classifier<B: Backend>(&self, device: &B::Device) -> BertForNli<B> {
        BertForNli {
            encoder:    self.init_encoder(device),
            pooler:     LinearConfig::new(self.d_model, self.d_model).init(device),
            classifier: LinearConfig::new(self.d_model, NUM_NLI_CLASSES).init(device),
            dropout:    DropoutConfig::new(self.classifier_dropout).init(),
            encoder_grad_scale: self.encoder_grad_scale,
        }
    }

    pub fn init_generative<B: Backend>(&self, pad_token: u32, device: &B::Device) -> T5ForNli<B> {
        let decoder_layers = (0..self.num_decoder_layers)
            .map(|_| self.build_decoder_block(device))
            .collect();
        T5ForNli {
            encoder:            self.init_encoder(device),
            decoder_embeddings: self.build_embeddings(device),
            decoder_layers,
            lm_head:            LinearConfig::new(self.d_model, self.vocab_size).with_bias(false).init(device),
            pad_token:          pad_token as usize,
        }
    }

    fn init_encoder<B: Backend>(&self, device: &B::Device) -> Encoder<B> {
        let layers = (0..self.num_layers).map(|_| self.build_encoder_block(device)).collect();
        Encoder { embeddings: self.build_embeddings(device), layers }
    }

    fn build_embeddings<B: Backend>(&self, device: &B::Device) -> Embeddings<B> {
        Embeddings {
            word_embeddings:       EmbeddingConfig::new(self.vocab_size, self.d_model).init(device),
            position_embeddings:   EmbeddingConfig::new(self.max_seq_len, self.d_model).init(device),
            token_type_embeddings: EmbeddingConfig::new(self.type_vocab_size, self.d_model).init(device),
            norm:                  LayerNorm::new(self.d_model, self.layer_norm_eps, device),
            dropout:               DropoutConfig::new(self.hidden_dropout).init(),
        }
    }

    pub(crate) fn build_attention<B: Backend>(&self, device: &B::Device) -> MultiHeadAttention<B> {
        MultiHeadAttentionConfig::new(self.d_model, self.num_heads)
            .with_dropout(self.attention_dropout)
            .init(device)
    }

    fn build_encoder_block<B: Backend>(&self, device: &B::Device) -> EncoderBlock<B> {
        EncoderBlock {
            attention:      self.build_attention(device),
            attention_norm: LayerNorm::new(self.d_model, self.layer_norm_eps, device),
            intermediate:   LinearConfig::new(self.d_model, self.d_ff).init(device),
            output:         LinearConfig::new(self.d_ff, self.d_model).init(device),
            output_norm:    LayerNorm::new(self.d_model, self.layer_norm_eps, device),
            dropout:        DropoutConfig::new(self.hidden_dropout).init(),
        }
    }

    fn build_decoder_block<B: Backend>(&self, device: &B::Device) -> DecoderBlock<B> {
        DecoderBlock {
            self_attention:       self.build_attention(device),
            self_attention_norm:  LayerNorm::new(self.d_model, self.layer_norm_eps, device),
            cross_attention:      self.build_attention(device),
            cross_attention_norm: LayerNorm::new(self.d_model, self.layer_norm_eps, device),
            intermediate:         LinearConfig::new(self.d_model, self.d_ff).init(device),
            output:               LinearConfig::new(self.d_ff, self.d_model).init(device),
            output_norm:          LayerNorm::new(self.d_model, self.layer_norm_eps, device),
            dropout:              DropoutConfig::new(self.hidden_dropout).init(),
        }
    }
}

/// Layer normalisation over the last dimension with the
/// parameters exposed as `weight` / `bias`.
#[derive(Module, Debug)]
pub struct LayerNorm<B: Backend> {
    pub weight: Param<Tensor<B, 1>>,
    pub bias:   Param<Tensor<B, 1>>,
    epsilon:    f64,
}

impl<B: Backend> LayerNorm<B> {
    pub fn new(d_model: usize, epsilon: f64, device: &B::Device) -> Self {
        Self {
            weight: Param::from_tensor(Tensor::ones([d_model], device)),
            bias:   Param::from_tensor(Tensor::zeros([d_model], device)),
            epsilon,
        }
    }

    pub fn forward<const D: usize>(&self, x: Tensor<B, D>) -> Tensor<B, D> {
        let (var, mean) = x.clone().var_mean_bias(D - 1);
        let normed = x.sub(mean).div(var.add_scalar(self.epsilon).sqrt());
        normed
            .mul(self.weight.val().unsqueeze())
            .add(self.bias.val().unsqueeze())
    }
}

#[derive(Module, Debug)]
pub struct Embeddings<B: Backend> {
    pub word_embeddings:       Embedding<B>,
    pub position_embeddings:   Embedding<B>,
    pub token_type_embeddings: Embedding<B>,
    pub norm:                  LayerNorm<B>,
    pub dropout:               Dropout,
}

impl<B: Backend> Embeddings<B> {
    /// input_ids, token_type_ids: [batch, seq_len] → [batch, seq_len, d_model]
    pub fn forward(&self, input_ids: Tensor<B, 2, Int>, token_type_ids: Tensor<B, 2, Int>) -> Tensor<B, 3> {
        let [batch_size, seq_len] = input_ids.dims();
        let device = input_ids.device();

        // Self-attention is permutation-invariant, so position must be injected explicitly.
        let positions = Tensor::<B, 1, Int>::arange(0..seq_len as i64, &device)
            .unsqueeze::<2>()
            .expand([batch_size, seq_len]);

        let x = self.word_embeddings.forward(input_ids)
            + self.position_embeddings.forward(positions)
            + self.token_type_embeddings.forward(token_type_ids);
        self.dropout.forward(self.norm.forward(x))
    }

    pub(crate) fn collect(&self, prefix: &str, out: &mut Vec<NamedParam>) {
        push_embedding(out, &format!("{prefix}.word_embeddings"), &self.word_embeddings);
        push_embedding(out, &format!("{prefix}.position_embeddings"), &self.position_embeddings);
        push_embedding(out, &format!("{prefix}.token_type_embeddings"), &self.token_type_embeddings);
        push_layer_norm(out, &format!("{prefix}.LayerNorm"), &self.norm);
    }
}

/// Post-norm transformer encoder block (BERT layout).
#[derive(Module, Debug)]
pub struct EncoderBlock<B: Backend> {
    pub attention:      MultiHeadAttention<B>,
    pub attention_norm: LayerNorm<B>,
    pub intermediate:   Linear<B>,
    pub output:         Linear<B>,
    pub output_norm:    LayerNorm<B>,
    pub dropout:        Dropout,
}

impl<B: Backend> EncoderBlock<B> {
    /// `mask_pad` is true at padding positions.
    pub fn forward(&self, x: Tensor<B, 3>, mask_pad: Tensor<B, 2, Bool>) -> Tensor<B, 3> {
        let attn_output = self
            .attention
            .forward(MhaInput::self_attn(x.clone()).mask_pad(mask_pad))
            .context;
        let x = self.attention_norm.forward(x + self.dropout.forward(attn_output));
        let ffn_out = self.output.forward(gelu(self.intermediate.forward(x.clone())));
        self.output_norm.forward(x + self.dropout.forward(ffn_out))
    }

    fn collect(&self, prefix: &str, out: &mut Vec<NamedParam>) {
        push_attention(out, &format!("{prefix}.attention"), &format!("{prefix}.attention.output"), &self.attention);
        push_layer_norm(out, &format!("{prefix}.attention.output.LayerNorm"), &self.attention_norm);
        push_linear(out, &format!("{prefix}.intermediate.dense"), &self.intermediate);
        push_linear(out, &format!("{prefix}.output.dense"), &self.output);
        push_layer_norm(out, &format!("{prefix}.output.LayerNorm"), &self.output_norm);
    }
}

#[derive(Module, Debug)]
pub struct Encoder<B: Backend> {
    pub embeddings: Embeddings<B>,
    pub layers:     Vec<EncoderBlock<B>>,
}

impl<B: Backend> Encoder<B> {
    /// Returns hidden states [batch, seq_len, d_model] and the
    /// padding mask derived from `attention_mask`.
    pub fn forward(
        &self,
        input_ids:      Tensor<B, 2, Int>,
        token_type_ids: Tensor<B, 2, Int>,
        attention_mask: Tensor<B, 2, Int>,
    ) -> (Tensor<B, 3>, Tensor<B, 2, Bool>) {
        let mask_pad = attention_mask.equal_elem(0);
        let mut x = self.embeddings.forward(input_ids, token_type_ids);
        for layer in &self.layers {
            x = layer.forward(x, mask_pad.clone());
        }
        (x, mask_pad)
    }

    pub(crate) fn collect(&self, prefix: &str, out: &mut Vec<NamedParam>) {
        self.embeddings.collect(&format!("{prefix}.embeddings"), out);
        for (i, layer) in self.layers.iter().enumerate() {
            layer.collect(&format!("{prefix}.encoder.layer.{i}"), out);
        }
    }
}

/// Encoder with a pooled [CLS] representation and a three-way
/// classification head.
#[derive(Module, Debug)]
pub struct BertForNli<B: Backend> {
    pub encoder:    Encoder<B>,
    pub pooler:     Linear<B>,
    pub classifier: Linear<B>,
    pub dropout:    Dropout,
    pub encoder_grad_scale: f64,
}

impl<B: Backend> BertForNli<B> {
    /// → logits [batch, 3]
    pub fn forward(
        &self,
        input_ids:      Tensor<B, 2, Int>,
        token_type_ids: Tensor<B, 2, Int>,
        attention_mask: Tensor<B, 2, Int>,
    ) -> Tensor<B, 2> {
        let (hidden, _) = self.encoder.forward(input_ids, token_type_ids, attention_mask);
        let [batch_size, _, d_model] = hidden.dims();

        let cls    = hidden.slice([0..batch_size, 0..1, 0..d_model]).reshape([batch_size, d_model]);
        let pooled = tanh(self.pooler.forward(cls));
        let pooled = grad_mul_const(pooled, self.encoder_grad_scale);

        self.classifier.forward(self.dropout.forward(pooled))
    }
}

impl<B: Backend> NamedParams for BertForNli<B> {
    fn named_params(&self) -> Vec<NamedParam> {
        let mut out = Vec::new();
        self.encoder.collect("bert", &mut out);
        push_linear(&mut out, "bert.pooler.dense", &self.pooler);
        push_linear(&mut out, "classifier", &self.classifier);
        out
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use crate::ml::params::{is_no_decay, ParamGroups};
    use burn::backend::NdArray;
    use std::collections::HashSet;

    type TB = NdArray;

    fn tiny_config() -> NliModelConfig {
        NliModelConfig::new(120, 8)
            .with_d_model(16)
            .with_num_heads(2)
            .with_num_layers(2)
            .with_num_decoder_layers(1)
            .with_d_ff(32)
    }

    fn ids(device: &<TB as Backend>::Device) -> (Tensor<TB, 2, Int>, Tensor<TB, 2, Int>, Tensor<TB, 2, Int>) {
        let input = Tensor::<TB, 1, Int>::from_ints([101, 5, 6, 102, 7, 102, 0, 0, 101, 8, 102, 9, 102, 0, 0, 0], device)
            .reshape([2, 8]);
        let types = Tensor::<TB, 1, Int>::from_ints([0, 0, 0, 0, 1, 1, 0, 0, 0, 0, 0, 1, 1, 0, 0, 0], device)
            .reshape([2, 8]);
        let mask = Tensor::<TB, 1, Int>::from_ints([1, 1, 1, 1, 1, 1, 0, 0, 1, 1, 1, 1, 1, 0, 0, 0], device)
            .reshape([2, 8]);
        (input, types, mask)
    }

    #[test]
    fn test_classifier_output_shape() {
        let device = Default::default();
        let model  = tiny_config().init_classifier::<TB>(&device);
        let (input, types, mask) = ids(&device);
        assert_eq!(model.forward(input, types, mask).dims(), [2, 3]);
    }

    #[test]
    fn test_layer_norm_normalises_last_dim() {
        let device = Default::default();
        let norm   = LayerNorm::<TB>::new(4, 1e-12, &device);
        let x      = Tensor::<TB, 2>::from_floats([[1.0, 2.0, 3.0, 4.0]], &device);
        let y: Vec<f32> = norm.forward(x).into_data().convert::<f32>().to_vec().unwrap();

        let mean: f32 = y.iter().sum::<f32>() / 4.0;
        let var:  f32 = y.iter().map(|v| (v - mean).powi(2)).sum::<f32>() / 4.0;
        assert!(mean.abs() < 1e-5);
        assert!((var - 1.0).abs() < 1e-4);
    }

    #[test]
    fn test_named_params_cover_every_parameter() {
        let device = Default::default();
        let model  = tiny_config().init_classifier::<TB>(&device);
        let named  = model.named_params();

        // embeddings 3 + norm 2, per layer 8 + 2 + 2 + 2 + 2, pooler 2, classifier 2
        assert_eq!(named.len(), 5 + 2 * 16 + 4);

        let unique: HashSet<_> = named.iter().map(|p| p.id.clone()).collect();
        assert_eq!(unique.len(), named.len());
    }

    #[test]
    fn test_no_decay_group_is_biases_and_norm_weights() {
        let device = Default::default();
        let model  = tiny_config().init_classifier::<TB>(&device);
        let groups = ParamGroups::of(&model);

        assert!(groups.no_decay.iter().all(|p| p.name.ends_with("bias") || p.name.ends_with("LayerNorm.weight")));
        assert!(groups.decay.iter().all(|p| !is_no_decay(&p.name)));
        assert!(groups.no_decay.iter().any(|p| p.name == "bert.encoder.layer.1.output.LayerNorm.weight"));
        assert!(groups.decay.iter().any(|p| p.name == "bert.embeddings.word_embeddings.weight"));
    }
}
