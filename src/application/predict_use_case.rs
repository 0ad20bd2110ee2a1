// ============================================================
// Layer 2 — Predict Use Case
// ============================================================
// Tags the tokens of utterances with a saved model:
//   1. Rebuild the model from the checkpoint directory
//   2. Clean each transcript and tokenise it ([CLS] … [SEP])
//   3. Normalise the feature frames (CMVN)
//   4. Run the Tagger in batches of `batch_size`
//   5. Drop special tokens and attach tag names
//
// predict_all skips an utterance the model cannot take with a
// warning and carries on with the rest.

use anyhow::{Context, Result};
use burn::prelude::*;
use std::path::Path;
use tokenizers::Tokenizer;

use crate::data::{dataset::{ProsodyDataset, ProsodySample}, preprocessor::Preprocessor};
use crate::domain::{
    tags::{TagSet, TaggedToken, TaggedUtterance},
    traits::ProsodyPredictor,
    utterance::Utterance,
};
use crate::infra::{checkpoint::CheckpointManager, tokenizer_store::TokenizerStore};
use crate::ml::inferencer::{TagPrediction, Tagger};

pub struct PredictUseCase<B: Backend> {
    tokenizer:    Tokenizer,
    tagger:       Tagger<B>,
    preprocessor: Preprocessor,
    tags:         TagSet,
    batch_size:   usize,
}

impl<B: Backend> PredictUseCase<B> {
    /// `batch_size` of None falls back to the one stored in the config.
    pub fn new(checkpoint_dir: &Path, batch_size: Option<usize>, device: B::Device) -> Result<Self> {
        let ckpt   = CheckpointManager::new(checkpoint_dir)?;
        let tagger = Tagger::<B>::from_checkpoint(&ckpt, device)?;
        let cfg    = tagger.config();

        let tokenizer  = TokenizerStore::new(&cfg.tokenizer_dir).load_or_build()?;
        let tags       = cfg.tag_set();
        let batch_size = batch_size.unwrap_or(cfg.batch_size).max(1);

        tracing::info!(
            "Model ready: {} sub-sampling, {} tags, batch size {}",
            cfg.subsampling,
            tags.len(),
            batch_size
        );
        Ok(Self { tokenizer, tagger, preprocessor: Preprocessor::new(), tags, batch_size })
    }

    /// Clean, tokenise and normalise one utterance.
    pub fn prepare(&self, utterance: &Utterance) -> Result<ProsodySample> {
        let text = self.preprocessor.clean_text(&utterance.text);
        let enc = self
            .tokenizer
            .encode(text.as_str(), true)
            .map_err(|e| anyhow::anyhow!("Cannot tokenise '{}': {e}", utterance.id))?;

        let mut frames = utterance.frames.clone();
        if utterance.is_rectangular() {
            self.preprocessor.normalize_frames(&mut frames);
        }

        Ok(ProsodySample {
            id:             utterance.id.clone(),
            frames,
            input_ids:      enc.get_ids().to_vec(),
            attention_mask: enc.get_attention_mask().to_vec(),
            tokens:         enc.get_tokens().to_vec(),
            special:        enc.get_special_tokens_mask().iter().map(|&m| m == 1).collect(),
        })
    }

    fn to_tagged(&self, sample: &ProsodySample, pred: &TagPrediction) -> Vec<TaggedToken> {
        (0..sample.num_tokens())
            .filter(|&i| !sample.special[i])
            .map(|i| TaggedToken {
                token: sample.tokens[i].clone(),
                tag:   self.tags.name(pred.tags[i]),
                score: pred.scores[i],
                frame: pred.frames[i],
            })
            .collect()
    }
}

impl<B: Backend> ProsodyPredictor for PredictUseCase<B> {
    fn predict(&self, utterance: &Utterance) -> Result<Vec<TaggedToken>> {
        let sample = self.prepare(utterance)?;
        let preds = self.tagger.predict(std::slice::from_ref(&sample))?;
        Ok(preds.first().map(|p| self.to_tagged(&sample, p)).unwrap_or_default())
    }

    fn predict_all(&self, utterances: &[Utterance]) -> Result<Vec<TaggedUtterance>> {
        let mut samples = Vec::with_capacity(utterances.len());
        for utt in utterances {
            let checked = self
                .prepare(utt)
                .and_then(|s| self.tagger.check(&s).map(|_| s).map_err(Into::into));
            match checked {
                Ok(sample) => samples.push(sample),
                Err(e)     => tracing::warn!("Skipping '{}': {:#}", utt.id, e),
            }
        }

        let dataset = ProsodyDataset::new(samples);
        if dataset.is_empty() {
            tracing::warn!("None of {} utterances could be tagged", utterances.len());
            return Ok(Vec::new());
        }

        let mut out = Vec::with_capacity(dataset.len());
        for (i, batch) in dataset.batches(self.batch_size).enumerate() {
            tracing::debug!("Batch {} ({} utterances)", i + 1, batch.len());
            let preds = self
                .tagger
                .predict(batch)
                .with_context(|| format!("Batch {} failed", i + 1))?;
            out.extend(batch.iter().zip(&preds).map(|(s, p)| TaggedUtterance {
                id:     s.id.clone(),
                tokens: self.to_tagged(s, p),
            }));
        }
        Ok(out)
    }
}
