// ============================================================
// Layer 5 — Prosody Extractor
// ============================================================
// The full model graph:
//
//   mfcc ─► SubSampler ─► AudioEncoder ──────────────┐ e_outputs
//                                                    ▼
//   input_ids ─► BERT ─► embeddings ─► CrossDecoder ─► Linear ─► logits
//                                           │
//                                           └─► cross-attention map
//
// get_model() is the only constructor: it validates the config
// first, so an invalid width/head/dropout combination is an
// error value instead of a panic deep inside burn.

use burn::{
    nn::{Linear, LinearConfig},
    prelude::*,
};

use crate::ml::{
    audio_encoder::AudioEncoder,
    bert::BertModel,
    config::ProsodyConfig,
    decoder::CrossDecoder,
    error::ModelError,
    subsampling::{SubSampler, SubsamplingKind},
};

#[derive(Module, Debug)]
pub struct ProsodyExtractor<B: Backend> {
    pub sub_sampling:  SubSampler<B>,
    pub audio_encoder: AudioEncoder<B>,
    pub bert:          BertModel<B>,
    pub cross_decoder: CrossDecoder<B>,
    pub out:           Linear<B>,
    pub mask_padding:  bool,
}

pub struct ProsodyOutput<B: Backend> {
    /// [batch, seq_len, num_tags]
    pub logits:    Tensor<B, 3>,
    /// Cross-attention of the last decoder layer, [batch, heads, seq_len, frames']
    pub attention: Tensor<B, 4>,
    /// Pad mask of the sub-sampled audio, [batch, frames']
    pub audio_pad_mask: Tensor<B, 2, Bool>,
}

/// Validate `cfg` and build a freshly initialised model on `device`.
pub fn get_model<B: Backend>(cfg: &ProsodyConfig, device: &B::Device) -> Result<ProsodyExtractor<B>, ModelError> {
    cfg.validate()?;

    let sub_sampling = match cfg.subsampling {
        SubsamplingKind::Conformer => SubSampler::Conformer(cfg.conformer_config().init(device)),
        SubsamplingKind::Conv2d    => SubSampler::Conv2d(cfg.conv_subsampling_config().init(device)),
    };

    let model = ProsodyExtractor {
        sub_sampling,
        audio_encoder: cfg.audio_encoder_config().init(device),
        bert:          cfg.bert.model_config().init(device),
        cross_decoder: cfg.cross_decoder_config().init(device),
        out:           LinearConfig::new(cfg.d_text, cfg.num_tags).init(device),
        mask_padding:  cfg.mask_padding,
    };

    tracing::debug!(
        "Built prosody model: {} sub-sampling, {} layers, {} params",
        cfg.subsampling,
        cfg.n_layers,
        model.num_params()
    );
    Ok(model)
}

impl<B: Backend> ProsodyExtractor<B> {
    /// mfcc:           [batch, frames, feature_dim]
    /// input_ids:      [batch, seq_len]
    /// attention_mask: [batch, seq_len]  1 = token, 0 = pad
    /// mfcc_mask:      [batch, frames]   1 = frame, 0 = pad
    ///
    /// Encoder and decoder attention see padding unless the model
    /// was built with `mask_padding`.
    pub fn forward(
        &self,
        mfcc:           Tensor<B, 3>,
        input_ids:      Tensor<B, 2, Int>,
        attention_mask: Tensor<B, 2, Int>,
        mfcc_mask:      Tensor<B, 2, Int>,
    ) -> ProsodyOutput<B> {
        self.forward_with(mfcc, input_ids, attention_mask, mfcc_mask, self.mask_padding)
    }

    /// Same as `forward` with padding always masked, so each item's
    /// output does not depend on the rest of its batch.
    pub fn forward_masked(
        &self,
        mfcc:           Tensor<B, 3>,
        input_ids:      Tensor<B, 2, Int>,
        attention_mask: Tensor<B, 2, Int>,
        mfcc_mask:      Tensor<B, 2, Int>,
    ) -> ProsodyOutput<B> {
        self.forward_with(mfcc, input_ids, attention_mask, mfcc_mask, true)
    }

    fn forward_with(
        &self,
        mfcc:           Tensor<B, 3>,
        input_ids:      Tensor<B, 2, Int>,
        attention_mask: Tensor<B, 2, Int>,
        mfcc_mask:      Tensor<B, 2, Int>,
        masked:         bool,
    ) -> ProsodyOutput<B> {
        let (sampled, audio_pad) = self.sub_sampling.forward(mfcc, mfcc_mask.equal_elem(0));

        let (audio_mask, src_mask, trg_mask) = if masked {
            (
                Some(audio_pad.clone()),
                Some(audio_pad.clone()),
                Some(attention_mask.clone().equal_elem(0)),
            )
        } else {
            (None, None, None)
        };

        let audio_e_out = self.audio_encoder.forward(sampled, audio_mask);
        let embeddings = self.bert.forward(input_ids, attention_mask);
        let (cross_out, attention) = self.cross_decoder.forward(embeddings, audio_e_out, src_mask, trg_mask);

        ProsodyOutput {
            logits: self.out.forward(cross_out),
            attention,
            audio_pad_mask: audio_pad,
        }
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::ml::{bert::BertConfig, conformer::ConformerConfig, subsampling::subsampled_len};
    use burn::backend::NdArray;
    use burn::tensor::Distribution;

    pub type TestBackend = NdArray;

    /// A model small enough to run a forward pass in a unit test.
    pub fn tiny_config() -> ProsodyConfig {
        ProsodyConfig {
            feature_dim:           16,
            d_mfcc:                8,
            d_text:                12,
            max_mfcc_length:       64,
            bert_embedding_length: 16,
            n_layers:              2,
            heads:                 2,
            d_ff:                  16,
            dropout:               0.1,
            num_tags:              4,
            batch_size:            2,
            conformer: ConformerConfig::new(16)
                .with_attention_dim(8)
                .with_attention_heads(2)
                .with_linear_units(16)
                .with_num_blocks(1)
                .with_cnn_module_kernel(3),
            bert: BertConfig {
                vocab_size:              40,
                hidden_size:             12,
                num_hidden_layers:       1,
                num_attention_heads:     2,
                intermediate_size:       24,
                max_position_embeddings: 16,
                ..BertConfig::default()
            },
            ..ProsodyConfig::default()
        }
    }

    fn inputs(
        device: &<TestBackend as Backend>::Device,
    ) -> (Tensor<TestBackend, 3>, Tensor<TestBackend, 2, Int>, Tensor<TestBackend, 2, Int>, Tensor<TestBackend, 2, Int>) {
        let mfcc = Tensor::random([2, 30, 16], Distribution::Default, device);
        let ids  = Tensor::from_ints([[2, 5, 9, 11, 3, 0], [2, 7, 3, 0, 0, 0]], device);
        let attn = Tensor::from_ints([[1, 1, 1, 1, 1, 0], [1, 1, 1, 0, 0, 0]], device);
        let mut frame_mask = vec![1i32; 60];
        frame_mask[30 + 20..].iter_mut().for_each(|m| *m = 0);
        let mfcc_mask = Tensor::<TestBackend, 1, Int>::from_ints(frame_mask.as_slice(), device).reshape([2, 30]);
        (mfcc, ids, attn, mfcc_mask)
    }

    #[test]
    fn test_logits_shape_conformer() {
        let device = Default::default();
        let model = get_model::<TestBackend>(&tiny_config(), &device).unwrap();
        let (mfcc, ids, attn, mask) = inputs(&device);

        let out = model.forward(mfcc, ids, attn, mask);
        assert_eq!(out.logits.dims(), [2, 6, 4]);
        assert_eq!(out.attention.dims(), [2, 2, 6, subsampled_len(30)]);
        assert_eq!(out.audio_pad_mask.dims(), [2, subsampled_len(30)]);
    }

    #[test]
    fn test_logits_shape_conv2d_with_masking() {
        let device = Default::default();
        let cfg = ProsodyConfig {
            subsampling:  SubsamplingKind::Conv2d,
            mask_padding: true,
            ..tiny_config()
        };
        let model = get_model::<TestBackend>(&cfg, &device).unwrap();
        assert_eq!(model.sub_sampling.kind(), SubsamplingKind::Conv2d);

        let (mfcc, ids, attn, mask) = inputs(&device);
        let out = model.forward(mfcc, ids, attn, mask);
        assert_eq!(out.logits.dims(), [2, 6, 4]);
    }

    #[test]
    fn test_masked_frames_get_no_attention() {
        let device = Default::default();
        let cfg = ProsodyConfig { mask_padding: true, dropout: 0.0, ..tiny_config() };
        let model = get_model::<TestBackend>(&cfg, &device).unwrap();
        let (mfcc, ids, attn, mask) = inputs(&device);

        let out = model.forward(mfcc, ids, attn, mask);
        let frames = subsampled_len(30);
        let valid  = subsampled_len(20);
        let [_, heads, seq_len, _] = out.attention.dims();
        // Second utterance: weights on frames past its length are ~0
        let tail: Vec<f32> = out
            .attention
            .slice([1..2, 0..heads, 0..seq_len, valid..frames])
            .into_data()
            .iter::<f32>()
            .collect();
        assert!(tail.iter().all(|w| *w < 1e-3));
    }

    #[test]
    fn test_positional_table_follows_max_mfcc_length() {
        let device = Default::default();
        for kind in [SubsamplingKind::Conformer, SubsamplingKind::Conv2d] {
            let cfg = ProsodyConfig { subsampling: kind, max_mfcc_length: 6000, ..tiny_config() };
            let model = get_model::<TestBackend>(&cfg, &device).unwrap();
            let pe = match &model.sub_sampling {
                SubSampler::Conformer(enc) => &enc.embed.pe,
                SubSampler::Conv2d(sub)    => &sub.pe,
            };
            assert_eq!(pe.max_seq_len, 6000, "{kind}");
        }
    }

    #[test]
    fn test_construction_rejects_high_dropout() {
        let device = Default::default();
        let cfg = ProsodyConfig { dropout: 1.5, ..tiny_config() };
        let err = get_model::<TestBackend>(&cfg, &device).unwrap_err();
        assert_eq!(err, ModelError::InvalidDropout(1.5));
    }

    #[test]
    fn test_construction_rejects_indivisible_width() {
        let device = Default::default();
        let cfg = ProsodyConfig { heads: 5, ..tiny_config() };
        assert!(matches!(
            get_model::<TestBackend>(&cfg, &device),
            Err(ModelError::HeadsNotDivisible { .. })
        ));
    }
}
