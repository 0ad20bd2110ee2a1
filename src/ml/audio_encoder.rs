// ============================================================
// Layer 5 — Audio Encoder
// ============================================================
// Transformer encoder over the sub-sampled acoustic frames:
//
//   frames [B, T', d_mfcc] → PositionalEncoder → N × EncoderLayer → Norm
//
// max_mfcc_length bounds T' (the length AFTER sub-sampling).

use burn::{nn::LayerNorm, prelude::*};

use crate::ml::layers::{norm, EncoderLayer, EncoderLayerConfig, PositionalEncoder, PositionalEncoderConfig};

#[derive(Config, Debug)]
pub struct AudioEncoderConfig {
    pub d_mfcc:          usize,
    pub max_mfcc_length: usize,
    pub n_layers:        usize,
    pub heads:           usize,
    #[config(default = 2048)]
    pub d_ff:            usize,
    #[config(default = 0.1)]
    pub dropout:         f64,
}

impl AudioEncoderConfig {
    pub fn init<B: Backend>(&self, device: &B::Device) -> AudioEncoder<B> {
        let layer_cfg = EncoderLayerConfig::new(self.d_mfcc, self.heads)
            .with_d_ff(self.d_ff)
            .with_dropout(self.dropout);
        AudioEncoder {
            pe: PositionalEncoderConfig::new(self.d_mfcc, self.max_mfcc_length)
                .with_dropout(self.dropout)
                .init(),
            layers: (0..self.n_layers).map(|_| layer_cfg.init(device)).collect(),
            norm:   norm(self.d_mfcc, device),
        }
    }
}

#[derive(Module, Debug)]
pub struct AudioEncoder<B: Backend> {
    pub pe:     PositionalEncoder,
    pub layers: Vec<EncoderLayer<B>>,
    pub norm:   LayerNorm<B>,
}

impl<B: Backend> AudioEncoder<B> {
    pub fn forward(&self, src: Tensor<B, 3>, audio_mask: Option<Tensor<B, 2, Bool>>) -> Tensor<B, 3> {
        let mut x = self.pe.forward(src);
        for layer in &self.layers {
            x = layer.forward(x, audio_mask.clone());
        }
        self.norm.forward(x)
    }

    pub fn max_len(&self) -> usize {
        self.pe.max_seq_len
    }
}
