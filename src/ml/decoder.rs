// ============================================================
// Layer 5 — Cross-Modal Decoder
// ============================================================
// Text tokens (BERT embeddings) are the decoder's target stream;
// the audio encoder output is the memory they attend over.
//
//   e_outputs [B, T', d_mfcc] ─ Linear ─► [B, T', d_text]
//   trg       [B, S,  d_text] ─ PositionalEncoder ─► N × DecoderLayer ─► Norm
//
// The attention map handed back is the cross-attention of the
// LAST decoder layer: [B, heads, S, T'].

use burn::{
    nn::{LayerNorm, Linear, LinearConfig},
    prelude::*,
};

use crate::ml::layers::{norm, DecoderLayer, DecoderLayerConfig, PositionalEncoder, PositionalEncoderConfig};

#[derive(Config, Debug)]
pub struct CrossDecoderConfig {
    pub d_text:                usize,
    pub d_mfcc:                usize,
    pub n_layers:              usize,
    pub heads:                 usize,
    pub bert_embedding_length: usize,
    #[config(default = 2048)]
    pub d_ff:                  usize,
    #[config(default = 0.1)]
    pub dropout:               f64,
}

impl CrossDecoderConfig {
    pub fn init<B: Backend>(&self, device: &B::Device) -> CrossDecoder<B> {
        let layer_cfg = DecoderLayerConfig::new(self.d_text, self.heads)
            .with_d_ff(self.d_ff)
            .with_dropout(self.dropout);
        CrossDecoder {
            linear: LinearConfig::new(self.d_mfcc, self.d_text).init(device),
            pe: PositionalEncoderConfig::new(self.d_text, self.bert_embedding_length)
                .with_dropout(self.dropout)
                .init(),
            layers: (0..self.n_layers).map(|_| layer_cfg.init(device)).collect(),
            norm:   norm(self.d_text, device),
        }
    }
}

#[derive(Module, Debug)]
pub struct CrossDecoder<B: Backend> {
    pub linear: Linear<B>,
    pub pe:     PositionalEncoder,
    pub layers: Vec<DecoderLayer<B>>,
    pub norm:   LayerNorm<B>,
}

impl<B: Backend> CrossDecoder<B> {
    /// Construction guarantees at least one layer, so the attention
    /// map is always produced by a real layer.
    pub fn forward(
        &self,
        trg:       Tensor<B, 3>,
        e_outputs: Tensor<B, 3>,
        src_mask:  Option<Tensor<B, 2, Bool>>,
        trg_mask:  Option<Tensor<B, 2, Bool>>,
    ) -> (Tensor<B, 3>, Tensor<B, 4>) {
        let memory = self.linear.forward(e_outputs);
        let [batch, src_len, _] = memory.dims();
        let [_, trg_len, _] = trg.dims();

        let mut x = self.pe.forward(trg);
        let mut attention_map = Tensor::zeros([batch, 1, trg_len, src_len], &memory.device());
        for layer in &self.layers {
            let (out, weights) = layer.forward(x, memory.clone(), src_mask.clone(), trg_mask.clone());
            x = out;
            attention_map = weights;
        }
        (self.norm.forward(x), attention_map)
    }
}
