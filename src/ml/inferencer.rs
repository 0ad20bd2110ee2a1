// ============================================================
// Layer 5 — Tagger
// ============================================================
// Runs the model on already tokenised, normalised samples and
// turns its raw outputs into per-token decisions:
//
//   logits    [N, S, num_tags] ─► softmax ─► argmax tag + probability
//   attention [N, H, S, T']    ─► mean over heads ─► argmax frame
//
// Padding is always masked here, so a sample gets the same tags
// whatever else shares its batch.
//
// Every sample is checked against the model's limits before it
// is batched, so an over-long or malformed utterance is a
// ModelError naming the utterance rather than a shape panic
// inside the backend.

use anyhow::Result;
use burn::{prelude::*, tensor::activation::softmax};

use crate::data::{batcher::ProsodyBatcher, dataset::ProsodySample};
use crate::infra::checkpoint::CheckpointManager;
use crate::ml::{
    config::ProsodyConfig,
    error::ModelError,
    model::{get_model, ProsodyExtractor},
    subsampling::subsampled_len,
};

/// Decisions for every token of one sample, special tokens included.
#[derive(Debug, Clone, PartialEq)]
pub struct TagPrediction {
    pub tags:   Vec<usize>,
    pub scores: Vec<f32>,
    /// Most attended sub-sampled audio frame per token
    pub frames: Vec<usize>,
}

pub struct Tagger<B: Backend> {
    model:   ProsodyExtractor<B>,
    config:  ProsodyConfig,
    batcher: ProsodyBatcher<B>,
}

impl<B: Backend> Tagger<B> {
    pub fn new(model: ProsodyExtractor<B>, config: ProsodyConfig, device: B::Device) -> Self {
        Self { model, config, batcher: ProsodyBatcher::new(device) }
    }

    /// Rebuild the saved architecture and load its weights.
    pub fn from_checkpoint(ckpt: &CheckpointManager, device: B::Device) -> Result<Self> {
        let config = ckpt.load_config()?;
        let model = get_model::<B>(&config, &device)?;
        let model = ckpt.load_model(model, &device)?;
        Ok(Self::new(model, config, device))
    }

    pub fn config(&self) -> &ProsodyConfig {
        &self.config
    }

    pub fn model(&self) -> &ProsodyExtractor<B> {
        &self.model
    }

    pub fn device(&self) -> &B::Device {
        &self.batcher.device
    }

    /// Reject a sample the model cannot take.
    pub fn check(&self, sample: &ProsodySample) -> Result<(), ModelError> {
        let cfg = &self.config;

        if sample.num_tokens() == 0 {
            return Err(ModelError::NoTokens { id: sample.id.clone() });
        }

        if let Some(frame) = sample.frames.iter().find(|f| f.len() != cfg.feature_dim) {
            return Err(ModelError::FeatureDimMismatch {
                id:       sample.id.clone(),
                expected: cfg.feature_dim,
                found:    frame.len(),
            });
        }

        let audio_len = subsampled_len(sample.num_frames());
        if audio_len == 0 {
            return Err(ModelError::TooFewFrames {
                id:     sample.id.clone(),
                frames: sample.num_frames(),
            });
        }
        if audio_len > cfg.max_mfcc_length {
            return Err(ModelError::SequenceTooLong {
                what: "sub-sampled audio",
                len:  audio_len,
                max:  cfg.max_mfcc_length,
            });
        }

        if sample.num_tokens() > cfg.max_tokens() {
            return Err(ModelError::SequenceTooLong {
                what: "token sequence",
                len:  sample.num_tokens(),
                max:  cfg.max_tokens(),
            });
        }

        if let Some(&token_id) = sample
            .input_ids
            .iter()
            .find(|&&t| t as usize >= cfg.bert.vocab_size)
        {
            return Err(ModelError::TokenOutOfVocab {
                id: sample.id.clone(),
                token_id,
                vocab_size: cfg.bert.vocab_size,
            });
        }

        Ok(())
    }

    /// Tag every sample in one forward pass.
    pub fn predict(&self, samples: &[ProsodySample]) -> Result<Vec<TagPrediction>, ModelError> {
        if samples.is_empty() {
            return Ok(Vec::new());
        }
        for sample in samples {
            self.check(sample)?;
        }

        let batch = self.batcher.batch(samples);
        let out = self.model.forward_masked(batch.mfcc, batch.input_ids, batch.attention_mask, batch.mfcc_mask);

        let [_, seq_len, num_tags] = out.logits.dims();
        let [_, _, _, frames] = out.attention.dims();

        let probs: Vec<f32> = softmax(out.logits, 2).into_data().iter::<f32>().collect();
        let attn: Vec<f32> = out.attention.mean_dim(1).into_data().iter::<f32>().collect();

        let predictions = samples
            .iter()
            .enumerate()
            .map(|(b, sample)| {
                let valid_frames = subsampled_len(sample.num_frames()).min(frames);
                let mut pred = TagPrediction {
                    tags:   Vec::with_capacity(sample.num_tokens()),
                    scores: Vec::with_capacity(sample.num_tokens()),
                    frames: Vec::with_capacity(sample.num_tokens()),
                };
                for s in 0..sample.num_tokens() {
                    let row = (b * seq_len + s) * num_tags;
                    let (tag, score) = argmax(&probs[row..row + num_tags]);
                    let row = (b * seq_len + s) * frames;
                    let (frame, _) = argmax(&attn[row..row + valid_frames]);
                    pred.tags.push(tag);
                    pred.scores.push(score);
                    pred.frames.push(frame);
                }
                pred
            })
            .collect();

        tracing::debug!("Tagged batch of {} ({} tokens x {} frames)", samples.len(), seq_len, frames);
        Ok(predictions)
    }
}

/// Index and value of the largest element; first one wins on ties.
fn argmax(values: &[f32]) -> (usize, f32) {
    values
        .iter()
        .copied()
        .enumerate()
        .fold((0, f32::NEG_INFINITY), |best, (i, v)| if v > best.1 { (i, v) } else { best })
}
