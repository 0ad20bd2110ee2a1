// ============================================================
// Layer 5 — Conformer Encoder
// ============================================================
// Speech encoder used as the model's sub-sampling front end.
//
//   Conv2dSubsampling (4x shorter, + positional encoding)
//       │
//       ▼
//   num_blocks × ConformerBlock
//       │
//       ▼
//   after_norm
//
// One block, pre-norm, with macaron feed-forward:
//
//   x = x + ½·FFN(norm(x))            (macaron half-step)
//   x = x + MHSA(norm(x))
//   x = x + ConvModule(norm(x))
//   x = x + ½·FFN(norm(x))
//   x = norm_final(x)
//
// ConvModule: pointwise conv (C→2C) → GLU → depthwise conv
//             → LayerNorm → Swish → pointwise conv (C→C)
//
// Reference: Gulati et al. (2020) Conformer: Convolution-augmented
//            Transformer for Speech Recognition

use burn::{
    nn::{
        attention::{MhaInput, MultiHeadAttention, MultiHeadAttentionConfig},
        conv::{Conv1d, Conv1dConfig},
        Dropout, DropoutConfig,
        LayerNorm, LayerNormConfig,
        Linear, LinearConfig,
        PaddingConfig1d,
    },
    prelude::*,
    tensor::activation::{sigmoid, silu},
};

use crate::ml::subsampling::{Conv2dSubsampling, Conv2dSubsamplingConfig};

const CONFORMER_NORM_EPS: f64 = 1e-12;

fn conformer_norm<B: Backend>(dim: usize, device: &B::Device) -> LayerNorm<B> {
    LayerNormConfig::new(dim).with_epsilon(CONFORMER_NORM_EPS).init(device)
}

#[derive(Config, Debug)]
pub struct ConformerConfig {
    /// Input feature dimension per frame.
    pub idim:                    usize,
    #[config(default = 256)]
    pub attention_dim:           usize,
    #[config(default = 4)]
    pub attention_heads:         usize,
    #[config(default = 2048)]
    pub linear_units:            usize,
    #[config(default = 12)]
    pub num_blocks:              usize,
    #[config(default = 0.1)]
    pub dropout_rate:            f64,
    #[config(default = 0.1)]
    pub positional_dropout_rate: f64,
    #[config(default = 0.0)]
    pub attention_dropout_rate:  f64,
    #[config(default = true)]
    pub macaron_style:           bool,
    #[config(default = true)]
    pub use_cnn_module:          bool,
    #[config(default = 31)]
    pub cnn_module_kernel:       usize,
    /// Longest sub-sampled sequence the positional encoding accepts.
    #[config(default = 5000)]
    pub max_len:                 usize,
}

impl ConformerConfig {
    pub fn init<B: Backend>(&self, device: &B::Device) -> ConformerEncoder<B> {
        let embed = Conv2dSubsamplingConfig::new(self.idim, self.attention_dim)
            .with_dropout(self.positional_dropout_rate)
            .with_max_len(self.max_len)
            .init(device);
        ConformerEncoder {
            embed,
            encoders:   (0..self.num_blocks).map(|_| self.init_block(device)).collect(),
            after_norm: conformer_norm(self.attention_dim, device),
        }
    }

    fn init_block<B: Backend>(&self, device: &B::Device) -> ConformerBlock<B> {
        let dim = self.attention_dim;
        let ffn = || ConformerFeedForward {
            w_1:     LinearConfig::new(dim, self.linear_units).init(device),
            w_2:     LinearConfig::new(self.linear_units, dim).init(device),
            dropout: DropoutConfig::new(self.dropout_rate).init(),
        };

        let (ff_macaron, norm_ff_macaron) = if self.macaron_style {
            (Some(ffn()), Some(conformer_norm(dim, device)))
        } else {
            (None, None)
        };
        let (conv_module, norm_conv, norm_final) = if self.use_cnn_module {
            (
                Some(self.init_conv_module(device)),
                Some(conformer_norm(dim, device)),
                Some(conformer_norm(dim, device)),
            )
        } else {
            (None, None, None)
        };

        ConformerBlock {
            ff_macaron,
            norm_ff_macaron,
            self_attn: MultiHeadAttentionConfig::new(dim, self.attention_heads)
                .with_dropout(self.attention_dropout_rate)
                .init(device),
            norm_mha: conformer_norm(dim, device),
            conv_module,
            norm_conv,
            feed_forward: ffn(),
            norm_ff:      conformer_norm(dim, device),
            norm_final,
            dropout:      DropoutConfig::new(self.dropout_rate).init(),
        }
    }

    fn init_conv_module<B: Backend>(&self, device: &B::Device) -> ConvolutionModule<B> {
        let dim = self.attention_dim;
        ConvolutionModule {
            pointwise_conv1: Conv1dConfig::new(dim, 2 * dim, 1).init(device),
            depthwise_conv: Conv1dConfig::new(dim, dim, self.cnn_module_kernel)
                .with_groups(dim)
                .with_padding(PaddingConfig1d::Explicit((self.cnn_module_kernel - 1) / 2))
                .init(device),
            norm:            conformer_norm(dim, device),
            pointwise_conv2: Conv1dConfig::new(dim, dim, 1).init(device),
        }
    }
}

// ─── Feed-forward (Swish) ─────────────────────────────────────────────────────
#[derive(Module, Debug)]
pub struct ConformerFeedForward<B: Backend> {
    pub w_1:     Linear<B>,
    pub w_2:     Linear<B>,
    pub dropout: Dropout,
}

impl<B: Backend> ConformerFeedForward<B> {
    pub fn forward(&self, x: Tensor<B, 3>) -> Tensor<B, 3> {
        self.w_2.forward(self.dropout.forward(silu(self.w_1.forward(x))))
    }
}

// ─── Convolution module ───────────────────────────────────────────────────────
#[derive(Module, Debug)]
pub struct ConvolutionModule<B: Backend> {
    pub pointwise_conv1: Conv1d<B>,
    pub depthwise_conv:  Conv1d<B>,
    pub norm:            LayerNorm<B>,
    pub pointwise_conv2: Conv1d<B>,
}

impl<B: Backend> ConvolutionModule<B> {
    /// x: [batch, frames, channels] → same shape
    ///
    /// Pad frames are zeroed before the depthwise conv so they read
    /// like the conv's own zero padding.
    pub fn forward(&self, x: Tensor<B, 3>, pad_mask: Tensor<B, 2, Bool>) -> Tensor<B, 3> {
        // Conv1d works on [batch, channels, frames]
        let x = self.pointwise_conv1.forward(x.swap_dims(1, 2));

        // GLU over the channel axis: first half gated by sigmoid(second half)
        let [batch, channels2, frames] = x.dims();
        let half  = channels2 / 2;
        let value = x.clone().slice([0..batch, 0..half, 0..frames]);
        let gate  = x.slice([0..batch, half..channels2, 0..frames]);
        let keep = pad_mask.bool_not().float().unsqueeze_dim::<3>(1);
        let x = value * sigmoid(gate) * keep;

        let x = self.depthwise_conv.forward(x);
        let x = self.norm.forward(x.swap_dims(1, 2)).swap_dims(1, 2);
        let x = self.pointwise_conv2.forward(silu(x));
        x.swap_dims(1, 2)
    }
}

// ─── ConformerBlock ───────────────────────────────────────────────────────────
#[derive(Module, Debug)]
pub struct ConformerBlock<B: Backend> {
    pub ff_macaron:      Option<ConformerFeedForward<B>>,
    pub norm_ff_macaron: Option<LayerNorm<B>>,
    pub self_attn:       MultiHeadAttention<B>,
    pub norm_mha:        LayerNorm<B>,
    pub conv_module:     Option<ConvolutionModule<B>>,
    pub norm_conv:       Option<LayerNorm<B>>,
    pub feed_forward:    ConformerFeedForward<B>,
    pub norm_ff:         LayerNorm<B>,
    pub norm_final:      Option<LayerNorm<B>>,
    pub dropout:         Dropout,
}

impl<B: Backend> ConformerBlock<B> {
    pub fn forward(&self, x: Tensor<B, 3>, pad_mask: Tensor<B, 2, Bool>) -> Tensor<B, 3> {
        let mut x = x;
        let mut ff_scale = 1.0;

        if let (Some(ff), Some(norm)) = (&self.ff_macaron, &self.norm_ff_macaron) {
            let h = ff.forward(norm.forward(x.clone()));
            x = x + self.dropout.forward(h).mul_scalar(0.5);
            ff_scale = 0.5;
        }

        let h = self.norm_mha.forward(x.clone());
        let attn = self.self_attn.forward(MhaInput::self_attn(h).mask_pad(pad_mask.clone())).context;
        x = x + self.dropout.forward(attn);

        if let (Some(conv), Some(norm)) = (&self.conv_module, &self.norm_conv) {
            let h = conv.forward(norm.forward(x.clone()), pad_mask.clone());
            x = x + self.dropout.forward(h);
        }

        let h = self.feed_forward.forward(self.norm_ff.forward(x.clone()));
        x = x + self.dropout.forward(h).mul_scalar(ff_scale);

        match &self.norm_final {
            Some(norm) => norm.forward(x),
            None       => x,
        }
    }
}

// ─── ConformerEncoder ─────────────────────────────────────────────────────────
#[derive(Module, Debug)]
pub struct ConformerEncoder<B: Backend> {
    pub embed:      Conv2dSubsampling<B>,
    pub encoders:   Vec<ConformerBlock<B>>,
    pub after_norm: LayerNorm<B>,
}

impl<B: Backend> ConformerEncoder<B> {
    /// x: [batch, frames, idim], pad_mask: [batch, frames]
    /// → ([batch, frames', attention_dim], [batch, frames'])
    pub fn forward(&self, x: Tensor<B, 3>, pad_mask: Tensor<B, 2, Bool>) -> (Tensor<B, 3>, Tensor<B, 2, Bool>) {
        let (mut x, mask) = self.embed.forward(x, pad_mask);
        for block in &self.encoders {
            x = block.forward(x, mask.clone());
        }
        (self.after_norm.forward(x), mask)
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use crate::ml::subsampling::{make_pad_mask, subsampled_len};
    use burn::backend::NdArray;
    use burn::tensor::Distribution;

    type TestBackend = NdArray;

    fn tiny() -> ConformerConfig {
        ConformerConfig::new(16)
            .with_attention_dim(8)
            .with_attention_heads(2)
            .with_linear_units(16)
            .with_num_blocks(2)
            .with_cnn_module_kernel(5)
    }

    #[test]
    fn test_defaults_match_reference_setup() {
        let cfg = ConformerConfig::new(83);
        assert_eq!(cfg.attention_dim, 256);
        assert_eq!(cfg.attention_heads, 4);
        assert_eq!(cfg.num_blocks, 12);
        assert_eq!(cfg.cnn_module_kernel, 31);
        assert!(cfg.macaron_style && cfg.use_cnn_module);
    }

    #[test]
    fn test_conv_module_keeps_shape() {
        let device = Default::default();
        let conv = tiny().init_conv_module::<TestBackend>(&device);
        let x = Tensor::<TestBackend, 3>::random([2, 9, 8], Distribution::Default, &device);
        let pad = make_pad_mask(Tensor::<TestBackend, 1, Int>::from_ints([9, 6], &device), 9);
        assert_eq!(conv.forward(x, pad).dims(), [2, 9, 8]);
    }

    #[test]
    fn test_conv_module_ignores_pad_frames() {
        let device = Default::default();
        let conv = tiny().init_conv_module::<TestBackend>(&device);
        let real = Tensor::<TestBackend, 3>::random([1, 6, 8], Distribution::Default, &device);
        let junk = Tensor::<TestBackend, 3>::random([1, 3, 8], Distribution::Default, &device);

        let alone = conv.forward(
            real.clone(),
            make_pad_mask(Tensor::<TestBackend, 1, Int>::from_ints([6], &device), 6),
        );
        let padded = conv.forward(
            Tensor::cat(vec![real, junk], 1),
            make_pad_mask(Tensor::<TestBackend, 1, Int>::from_ints([6], &device), 9),
        );

        let a: Vec<f32> = alone.into_data().iter::<f32>().collect();
        let b: Vec<f32> = padded.slice([0..1, 0..6, 0..8]).into_data().iter::<f32>().collect();
        for (x, y) in a.iter().zip(&b) {
            assert!((x - y).abs() < 1e-5, "{x} vs {y}");
        }
    }

    #[test]
    fn test_encoder_output_and_mask() {
        let device = Default::default();
        let enc = tiny().init::<TestBackend>(&device);
        assert_eq!(enc.encoders.len(), 2);

        let x = Tensor::<TestBackend, 3>::random([2, 40, 16], Distribution::Default, &device);
        let pad = make_pad_mask(Tensor::<TestBackend, 1, Int>::from_ints([40, 20], &device), 40);
        let (out, mask) = enc.forward(x, pad);

        let t = subsampled_len(40);
        assert_eq!(out.dims(), [2, t, 8]);
        assert_eq!(mask.dims(), [2, t]);
    }

    #[test]
    fn test_plain_blocks_without_macaron_or_conv() {
        let device = Default::default();
        let enc = tiny()
            .with_macaron_style(false)
            .with_use_cnn_module(false)
            .init::<TestBackend>(&device);
        assert!(enc.encoders[0].ff_macaron.is_none());
        assert!(enc.encoders[0].conv_module.is_none());

        let x = Tensor::<TestBackend, 3>::random([1, 20, 16], Distribution::Default, &device);
        let pad = make_pad_mask(Tensor::<TestBackend, 1, Int>::from_ints([20], &device), 20);
        let (out, _) = enc.forward(x, pad);
        assert_eq!(out.dims(), [1, subsampled_len(20), 8]);
    }
}
