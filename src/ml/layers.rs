// ============================================================
// Layer 5 — Transformer Building Blocks
// ============================================================
// The pieces every stack in the model is assembled from:
//
//   PositionalEncoder — scales the input by √d_model and adds
//                       fixed sinusoids, then dropout
//   FeedForward       — Linear → ReLU → Dropout → Linear
//   EncoderLayer      — pre-norm self-attention + feed-forward
//   DecoderLayer      — pre-norm self-attention, cross-attention
//                       over the encoder output, feed-forward
//
// All layers are pre-norm: each sub-layer sees norm(x) and its
// output is added back onto the un-normalised residual stream.
//
// Masks follow Burn's convention: `true` marks a PADDED position.
//
// Reference: Vaswani et al. (2017) Attention Is All You Need
//            Burn Book §3 (Building Blocks)

use burn::{
    nn::{
        attention::{MhaInput, MultiHeadAttention, MultiHeadAttentionConfig},
        Dropout, DropoutConfig,
        LayerNorm, LayerNormConfig,
        Linear, LinearConfig,
    },
    prelude::*,
    tensor::{activation::relu, TensorData},
};

/// Epsilon shared by every `Norm` in the transformer stacks.
pub const NORM_EPS: f64 = 1e-6;

/// Layer normalisation over the last dimension.
pub fn norm<B: Backend>(d_model: usize, device: &B::Device) -> LayerNorm<B> {
    LayerNormConfig::new(d_model).with_epsilon(NORM_EPS).init(device)
}

/// Row-major `[len, d_model]` table of sinusoidal position codes.
/// Even columns hold sin, odd columns cos, of pos / 10000^(2i/d).
pub fn sinusoid_table(len: usize, d_model: usize) -> Vec<f32> {
    let mut table = vec![0.0f32; len * d_model];
    for pos in 0..len {
        let row = &mut table[pos * d_model..(pos + 1) * d_model];
        for i in (0..d_model).step_by(2) {
            let angle = pos as f64 / 10000f64.powf(i as f64 / d_model as f64);
            row[i] = angle.sin() as f32;
            if i + 1 < d_model {
                row[i + 1] = angle.cos() as f32;
            }
        }
    }
    table
}

// ─── PositionalEncoder ────────────────────────────────────────────────────────
#[derive(Config, Debug)]
pub struct PositionalEncoderConfig {
    pub d_model:     usize,
    pub max_seq_len: usize,
    #[config(default = 0.1)]
    pub dropout:     f64,
}

impl PositionalEncoderConfig {
    pub fn init(&self) -> PositionalEncoder {
        PositionalEncoder {
            dropout:     DropoutConfig::new(self.dropout).init(),
            d_model:     self.d_model,
            max_seq_len: self.max_seq_len,
        }
    }
}

/// The sinusoid table is rebuilt per call for the actual sequence
/// length, so the module holds no tensors and is backend-free.
#[derive(Module, Clone, Debug)]
pub struct PositionalEncoder {
    pub dropout:     Dropout,
    pub d_model:     usize,
    pub max_seq_len: usize,
}

impl PositionalEncoder {
    /// x: [batch, seq_len, d_model] → same shape
    pub fn forward<B: Backend>(&self, x: Tensor<B, 3>) -> Tensor<B, 3> {
        let [_, seq_len, d_model] = x.dims();
        assert!(
            seq_len <= self.max_seq_len,
            "sequence of {seq_len} positions exceeds the positional table of {}",
            self.max_seq_len
        );

        let pe = Tensor::<B, 2>::from_data(
            TensorData::new(sinusoid_table(seq_len, d_model), [seq_len, d_model]),
            &x.device(),
        )
        .unsqueeze::<3>(); // [1, seq_len, d_model] broadcasts over the batch

        let x = x.mul_scalar((self.d_model as f64).sqrt()) + pe;
        self.dropout.forward(x)
    }
}

// ─── FeedForward ──────────────────────────────────────────────────────────────
#[derive(Config, Debug)]
pub struct FeedForwardConfig {
    pub d_model: usize,
    #[config(default = 2048)]
    pub d_ff:    usize,
    #[config(default = 0.1)]
    pub dropout: f64,
}

impl FeedForwardConfig {
    pub fn init<B: Backend>(&self, device: &B::Device) -> FeedForward<B> {
        FeedForward {
            linear1: LinearConfig::new(self.d_model, self.d_ff).init(device),
            linear2: LinearConfig::new(self.d_ff, self.d_model).init(device),
            dropout: DropoutConfig::new(self.dropout).init(),
        }
    }
}

#[derive(Module, Debug)]
pub struct FeedForward<B: Backend> {
    pub linear1: Linear<B>,
    pub linear2: Linear<B>,
    pub dropout: Dropout,
}

impl<B: Backend> FeedForward<B> {
    pub fn forward(&self, x: Tensor<B, 3>) -> Tensor<B, 3> {
        let h = self.dropout.forward(relu(self.linear1.forward(x)));
        self.linear2.forward(h)
    }
}

// ─── EncoderLayer ─────────────────────────────────────────────────────────────
#[derive(Config, Debug)]
pub struct EncoderLayerConfig {
    pub d_model: usize,
    pub heads:   usize,
    #[config(default = 2048)]
    pub d_ff:    usize,
    #[config(default = 0.1)]
    pub dropout: f64,
}

impl EncoderLayerConfig {
    pub fn init<B: Backend>(&self, device: &B::Device) -> EncoderLayer<B> {
        EncoderLayer {
            norm1:     norm(self.d_model, device),
            norm2:     norm(self.d_model, device),
            self_attn: MultiHeadAttentionConfig::new(self.d_model, self.heads)
                .with_dropout(self.dropout)
                .init(device),
            ff: FeedForwardConfig::new(self.d_model)
                .with_d_ff(self.d_ff)
                .with_dropout(self.dropout)
                .init(device),
            dropout1: DropoutConfig::new(self.dropout).init(),
            dropout2: DropoutConfig::new(self.dropout).init(),
        }
    }
}

#[derive(Module, Debug)]
pub struct EncoderLayer<B: Backend> {
    pub norm1:     LayerNorm<B>,
    pub norm2:     LayerNorm<B>,
    pub self_attn: MultiHeadAttention<B>,
    pub ff:        FeedForward<B>,
    pub dropout1:  Dropout,
    pub dropout2:  Dropout,
}

impl<B: Backend> EncoderLayer<B> {
    /// x: [batch, seq_len, d_model], mask: [batch, seq_len] (true = pad)
    pub fn forward(&self, x: Tensor<B, 3>, mask: Option<Tensor<B, 2, Bool>>) -> Tensor<B, 3> {
        let h = self.norm1.forward(x.clone());
        let mut input = MhaInput::self_attn(h);
        if let Some(mask) = mask {
            input = input.mask_pad(mask);
        }
        let x = x + self.dropout1.forward(self.self_attn.forward(input).context);

        let h = self.norm2.forward(x.clone());
        x + self.dropout2.forward(self.ff.forward(h))
    }
}

// ─── DecoderLayer ─────────────────────────────────────────────────────────────
#[derive(Config, Debug)]
pub struct DecoderLayerConfig {
    pub d_model: usize,
    pub heads:   usize,
    #[config(default = 2048)]
    pub d_ff:    usize,
    #[config(default = 0.1)]
    pub dropout: f64,
}

impl DecoderLayerConfig {
    pub fn init<B: Backend>(&self, device: &B::Device) -> DecoderLayer<B> {
        let attn = || {
            MultiHeadAttentionConfig::new(self.d_model, self.heads)
                .with_dropout(self.dropout)
                .init(device)
        };
        DecoderLayer {
            norm1:      norm(self.d_model, device),
            norm2:      norm(self.d_model, device),
            norm3:      norm(self.d_model, device),
            self_attn:  attn(),
            cross_attn: attn(),
            ff: FeedForwardConfig::new(self.d_model)
                .with_d_ff(self.d_ff)
                .with_dropout(self.dropout)
                .init(device),
            dropout1: DropoutConfig::new(self.dropout).init(),
            dropout2: DropoutConfig::new(self.dropout).init(),
            dropout3: DropoutConfig::new(self.dropout).init(),
        }
    }
}

#[derive(Module, Debug)]
pub struct DecoderLayer<B: Backend> {
    pub norm1:      LayerNorm<B>,
    pub norm2:      LayerNorm<B>,
    pub norm3:      LayerNorm<B>,
    pub self_attn:  MultiHeadAttention<B>,
    pub cross_attn: MultiHeadAttention<B>,
    pub ff:         FeedForward<B>,
    pub dropout1:   Dropout,
    pub dropout2:   Dropout,
    pub dropout3:   Dropout,
}

impl<B: Backend> DecoderLayer<B> {
    /// x:         [batch, trg_len, d_model]  (queries)
    /// e_outputs: [batch, src_len, d_model]  (keys / values)
    ///
    /// Returns the updated stream and the cross-attention weights,
    /// [batch, heads, trg_len, src_len].
    pub fn forward(
        &self,
        x:         Tensor<B, 3>,
        e_outputs: Tensor<B, 3>,
        src_mask:  Option<Tensor<B, 2, Bool>>,
        trg_mask:  Option<Tensor<B, 2, Bool>>,
    ) -> (Tensor<B, 3>, Tensor<B, 4>) {
        let h = self.norm1.forward(x.clone());
        let mut input = MhaInput::self_attn(h);
        if let Some(mask) = trg_mask {
            input = input.mask_pad(mask);
        }
        let x = x + self.dropout1.forward(self.self_attn.forward(input).context);

        let h = self.norm2.forward(x.clone());
        let mut input = MhaInput::new(h, e_outputs.clone(), e_outputs);
        if let Some(mask) = src_mask {
            input = input.mask_pad(mask);
        }
        let cross = self.cross_attn.forward(input);
        let x = x + self.dropout2.forward(cross.context);

        let h = self.norm3.forward(x.clone());
        let x = x + self.dropout3.forward(self.ff.forward(h));
        (x, cross.weights)
    }
}
