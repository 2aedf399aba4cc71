// ============================================================
// Layer 5 — Encoder-Decoder Model
// ============================================================
// Text-to-text NLI: the encoder reads
//   "mnli hypothesis: <h> premise: <p>" </s>
// and the decoder is trained to emit the label word
// ("entailment" / "neutral" / "contradiction") followed by </s>.
//
// Training is teacher-forced: the decoder input is the target
// shifted right by one with the pad token as start symbol, and
// a causal mask stops each position from seeing later tokens.
//
//   target         [e1, e2, </s>, pad, pad]
//   decoder input  [pad, e1, e2, </s>, pad]

use burn::{
    nn::{
        attention::{generate_autoregressive_mask, MhaInput, MultiHeadAttention},
        Dropout, Linear,
    },
    prelude::*,
    tensor::activation::gelu,
};

use crate::ml::model::{Embeddings, Encoder, LayerNorm};
use crate::ml::params::{push_attention, push_layer_norm, push_linear, NamedParam, NamedParams};

/// Post-norm decoder block: causal self-attention,
/// cross-attention over the encoder output, feed-forward.
#[derive(Module, Debug)]
pub struct DecoderBlock<B: Backend> {
    pub self_attention:       MultiHeadAttention<B>,
    pub self_attention_norm:  LayerNorm<B>,
    pub cross_attention:      MultiHeadAttention<B>,
    pub cross_attention_norm: LayerNorm<B>,
    pub intermediate:         Linear<B>,
    pub output:               Linear<B>,
    pub output_norm:          LayerNorm<B>,
    pub dropout:              Dropout,
}

impl<B: Backend> DecoderBlock<B> {
    pub fn forward(
        &self,
        x:           Tensor<B, 3>,
        memory:      Tensor<B, 3>,
        memory_mask: Tensor<B, 2, Bool>,
        causal_mask: Tensor<B, 3, Bool>,
    ) -> Tensor<B, 3> {
        let attn = self
            .self_attention
            .forward(MhaInput::self_attn(x.clone()).mask_attn(causal_mask))
            .context;
        let x = self.self_attention_norm.forward(x + self.dropout.forward(attn));

        let cross = self
            .cross_attention
            .forward(MhaInput::new(x.clone(), memory.clone(), memory).mask_pad(memory_mask))
            .context;
        let x = self.cross_attention_norm.forward(x + self.dropout.forward(cross));

        let ffn_out = self.output.forward(gelu(self.intermediate.forward(x.clone())));
        self.output_norm.forward(x + self.dropout.forward(ffn_out))
    }

    fn collect(&self, prefix: &str, out: &mut Vec<NamedParam>) {
        push_attention(out, &format!("{prefix}.attention"), &format!("{prefix}.attention.output"), &self.self_attention);
        push_layer_norm(out, &format!("{prefix}.attention.output.LayerNorm"), &self.self_attention_norm);
        push_attention(out, &format!("{prefix}.crossattention"), &format!("{prefix}.crossattention.output"), &self.cross_attention);
        push_layer_norm(out, &format!("{prefix}.crossattention.output.LayerNorm"), &self.cross_attention_norm);
        push_linear(out, &format!("{prefix}.intermediate.dense"), &self.intermediate);
        push_linear(out, &format!("{prefix}.output.dense"), &self.output);
        push_layer_norm(out, &format!("{prefix}.output.LayerNorm"), &self.output_norm);
    }
}

#[derive(Module, Debug)]
pub struct T5ForNli<B: Backend> {
    pub encoder:            Encoder<B>,
    pub decoder_embeddings: Embeddings<B>,
    pub decoder_layers:     Vec<DecoderBlock<B>>,
    pub lm_head:            Linear<B>,
    pub pad_token:          usize,
}

impl<B: Backend> T5ForNli<B> {
    /// → logits [batch, target_len, vocab_size]
    pub fn forward(
        &self,
        input_ids:      Tensor<B, 2, Int>,
        attention_mask: Tensor<B, 2, Int>,
        target_ids:     Tensor<B, 2, Int>,
    ) -> Tensor<B, 3> {
        let token_types   = input_ids.zeros_like();
        let (memory, pad) = self.encoder.forward(input_ids, token_types, attention_mask);

        let [batch_size, target_len] = target_ids.dims();
        let device = target_ids.device();

        let decoder_input = self.shift_right(target_ids);
        let decoder_types = decoder_input.zeros_like();
        let causal = generate_autoregressive_mask::<B>(batch_size, target_len, &device);

        let mut x = self.decoder_embeddings.forward(decoder_input, decoder_types);
        for layer in &self.decoder_layers {
            x = layer.forward(x, memory.clone(), pad.clone(), causal.clone());
        }
        self.lm_head.forward(x)
    }

    /// Prepend the start symbol (pad) and drop the last token.
    pub fn shift_right(&self, target_ids: Tensor<B, 2, Int>) -> Tensor<B, 2, Int> {
        let [batch_size, target_len] = target_ids.dims();
        let device = target_ids.device();
        let start  = Tensor::<B, 2, Int>::full([batch_size, 1], self.pad_token as i64, &device);
        let body   = target_ids.slice([0..batch_size, 0..target_len - 1]);
        Tensor::cat(vec![start, body], 1)
    }
}

impl<B: Backend> NamedParams for T5ForNli<B> {
    fn named_params(&self) -> Vec<NamedParam> {
        let mut out = Vec::new();
        self.encoder.collect("encoder", &mut out);
        self.decoder_embeddings.collect("decoder.embeddings", &mut out);
        for (i, layer) in self.decoder_layers.iter().enumerate() {
            layer.collect(&format!("decoder.layer.{i}"), &mut out);
        }
        push_linear(&mut out, "lm_head", &self.lm_head);
        out
    }
}
