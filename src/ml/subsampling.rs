// ============================================================
// Layer 5 — Convolutional Sub-sampling
// ============================================================
// Shortens the acoustic frame sequence 4x before any attention
// runs over it:
//
//   [B, T, F] → unsqueeze → [B, 1, T, F]
//             → Conv2d(1→odim, k=3, s=2) → ReLU
//             → Conv2d(odim→odim, k=3, s=2) → ReLU   [B, odim, T', F']
//             → flatten channels × F'                 [B, T', odim·F']
//             → Linear → PositionalEncoder            [B, T', odim]
//
// Each valid-padding stride-2 conv maps n → ⌊(n-1)/2⌋, so
// T' = ⌊(⌊(T-1)/2⌋ - 1)/2⌋ and the same for the feature axis.
//
// SubSampler is the front of the model: either a full Conformer
// encoder (which embeds this module) or this module alone.

use std::{fmt, str::FromStr};

use burn::{
    nn::{
        conv::{Conv2d, Conv2dConfig},
        Linear, LinearConfig,
    },
    prelude::*,
    tensor::activation::relu,
};
use serde::{Deserialize, Serialize};

use crate::ml::conformer::ConformerEncoder;
use crate::ml::layers::{PositionalEncoder, PositionalEncoderConfig};

/// Length of an axis after the two stride-2 convolutions.
pub fn subsampled_len(n: usize) -> usize {
    let once = n.saturating_sub(1) / 2;
    once.saturating_sub(1) / 2
}

/// The same arithmetic applied per sequence on an Int tensor.
pub fn subsample_lengths<B: Backend>(lengths: Tensor<B, 1, Int>) -> Tensor<B, 1, Int> {
    let once = lengths.sub_scalar(1).clamp_min(0).div_scalar(2);
    once.sub_scalar(1).clamp_min(0).div_scalar(2)
}

/// lengths: [batch] → [batch, max_len], `true` at positions >= length.
pub fn make_pad_mask<B: Backend>(lengths: Tensor<B, 1, Int>, max_len: usize) -> Tensor<B, 2, Bool> {
    let [batch] = lengths.dims();
    let positions = Tensor::<B, 1, Int>::arange(0..max_len as i64, &lengths.device())
        .reshape([1, max_len])
        .expand([batch, max_len]);
    let lengths = lengths.reshape([batch, 1]).expand([batch, max_len]);
    positions.greater_equal(lengths)
}

/// Number of non-padded steps per row of a pad mask.
pub fn mask_lengths<B: Backend>(pad_mask: Tensor<B, 2, Bool>) -> Tensor<B, 1, Int> {
    let [batch, _] = pad_mask.dims();
    pad_mask.bool_not().int().sum_dim(1).reshape([batch])
}

// ─── Conv2dSubsampling ────────────────────────────────────────────────────────
#[derive(Config, Debug)]
pub struct Conv2dSubsamplingConfig {
    pub idim:    usize,
    pub odim:    usize,
    /// Dropout applied after the positional encoding.
    #[config(default = 0.1)]
    pub dropout: f64,
    #[config(default = 5000)]
    pub max_len: usize,
}

impl Conv2dSubsamplingConfig {
    pub fn init<B: Backend>(&self, device: &B::Device) -> Conv2dSubsampling<B> {
        let freq = subsampled_len(self.idim);
        Conv2dSubsampling {
            conv1: Conv2dConfig::new([1, self.odim], [3, 3])
                .with_stride([2, 2])
                .init(device),
            conv2: Conv2dConfig::new([self.odim, self.odim], [3, 3])
                .with_stride([2, 2])
                .init(device),
            out: LinearConfig::new(self.odim * freq, self.odim).init(device),
            pe:  PositionalEncoderConfig::new(self.odim, self.max_len)
                .with_dropout(self.dropout)
                .init(),
        }
    }
}

#[derive(Module, Debug)]
pub struct Conv2dSubsampling<B: Backend> {
    pub conv1: Conv2d<B>,
    pub conv2: Conv2d<B>,
    pub out:   Linear<B>,
    pub pe:    PositionalEncoder,
}

impl<B: Backend> Conv2dSubsampling<B> {
    /// x: [batch, frames, idim], pad_mask: [batch, frames]
    /// → ([batch, frames', odim], [batch, frames'])
    pub fn forward(&self, x: Tensor<B, 3>, pad_mask: Tensor<B, 2, Bool>) -> (Tensor<B, 3>, Tensor<B, 2, Bool>) {
        let x = x.unsqueeze_dim::<4>(1);
        let x = relu(self.conv1.forward(x));
        let x = relu(self.conv2.forward(x));

        let [batch, channels, frames, freq] = x.dims();
        let x = x.swap_dims(1, 2).reshape([batch, frames, channels * freq]);
        let x = self.pe.forward(self.out.forward(x));

        let lengths = subsample_lengths(mask_lengths(pad_mask));
        (x, make_pad_mask(lengths, frames))
    }
}

// ─── SubSampler ───────────────────────────────────────────────────────────────
/// Which front end the model is built with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubsamplingKind {
    /// Conv2d front end followed by Conformer blocks.
    #[default]
    Conformer,
    /// Conv2d front end only.
    Conv2d,
}

impl fmt::Display for SubsamplingKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Conformer => f.write_str("conformer"),
            Self::Conv2d    => f.write_str("conv2d"),
        }
    }
}

impl FromStr for SubsamplingKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "conformer" => Ok(Self::Conformer),
            "conv2d" | "cnn" => Ok(Self::Conv2d),
            other => Err(format!("unknown sub-sampling '{other}' (expected conformer or conv2d)")),
        }
    }
}

#[derive(Module, Debug)]
pub enum SubSampler<B: Backend> {
    Conformer(ConformerEncoder<B>),
    Conv2d(Conv2dSubsampling<B>),
}

impl<B: Backend> SubSampler<B> {
    pub fn forward(&self, x: Tensor<B, 3>, pad_mask: Tensor<B, 2, Bool>) -> (Tensor<B, 3>, Tensor<B, 2, Bool>) {
        match self {
            Self::Conformer(encoder) => encoder.forward(x, pad_mask),
            Self::Conv2d(conv)       => conv.forward(x, pad_mask),
        }
    }

    pub fn kind(&self) -> SubsamplingKind {
        match self {
            Self::Conformer(_) => SubsamplingKind::Conformer,
            Self::Conv2d(_)    => SubsamplingKind::Conv2d,
        }
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;
    use burn::tensor::Distribution;

    type TestBackend = NdArray;

    #[test]
    fn test_subsampled_len() {
        assert_eq!(subsampled_len(0), 0);
        assert_eq!(subsampled_len(6), 0);
        assert_eq!(subsampled_len(7), 1);
        assert_eq!(subsampled_len(83), 20);
        assert_eq!(subsampled_len(100), 24);
    }

    #[test]
    fn test_tensor_lengths_match_scalar_formula() {
        let device = Default::default();
        let lengths = Tensor::<TestBackend, 1, Int>::from_ints([100, 7, 2], &device);
        let out: Vec<i64> = subsample_lengths(lengths).into_data().iter::<i64>().collect();
        assert_eq!(out, vec![24, 1, 0]);
    }

    #[test]
    fn test_make_pad_mask() {
        let device = Default::default();
        let lengths = Tensor::<TestBackend, 1, Int>::from_ints([3, 1], &device);
        let mask: Vec<bool> = make_pad_mask(lengths, 4).into_data().iter::<bool>().collect();
        assert_eq!(mask, vec![false, false, false, true, false, true, true, true]);
    }

    #[test]
    fn test_conv2d_subsampling_shapes() {
        let device = Default::default();
        let sub = Conv2dSubsamplingConfig::new(16, 8).init::<TestBackend>(&device);

        let x = Tensor::<TestBackend, 3>::random([2, 30, 16], Distribution::Default, &device);
        // Second utterance has only 15 real frames
        let frames = Tensor::<TestBackend, 1, Int>::from_ints([30, 15], &device);
        let pad = make_pad_mask(frames, 30);

        let (out, mask) = sub.forward(x, pad);
        assert_eq!(out.dims(), [2, subsampled_len(30), 8]);

        let lengths: Vec<i64> = mask_lengths(mask).into_data().iter::<i64>().collect();
        assert_eq!(lengths, vec![subsampled_len(30) as i64, subsampled_len(15) as i64]);
    }

    #[test]
    fn test_kind_parsing() {
        assert_eq!("Conformer".parse::<SubsamplingKind>(), Ok(SubsamplingKind::Conformer));
        assert_eq!("cnn".parse::<SubsamplingKind>(), Ok(SubsamplingKind::Conv2d));
        assert!("vgg".parse::<SubsamplingKind>().is_err());
        assert_eq!(SubsamplingKind::Conv2d.to_string(), "conv2d");
    }
}
