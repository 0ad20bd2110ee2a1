// ============================================================
// Layer 2 — Inspect Use Case
// ============================================================
// Rebuilds the model from a checkpoint directory, counts the
// parameters of each component and runs one forward pass on
// random input of the requested size, so a config can be
// checked for shape errors without any real data.

use anyhow::Result;
use burn::{prelude::*, tensor::Distribution};
use std::path::Path;

use crate::data::dataset::ProsodySample;
use crate::infra::checkpoint::CheckpointManager;
use crate::ml::{inferencer::Tagger, model::get_model};

#[derive(Debug, Clone, PartialEq)]
pub struct InspectReport {
    /// (component, parameter count), whole model last
    pub params:       Vec<(&'static str, usize)>,
    pub logits_shape: [usize; 3],
    pub attn_shape:   [usize; 4],
    /// False when no weights were saved and the model is random
    pub loaded:       bool,
}

pub struct InspectUseCase;

impl InspectUseCase {
    pub fn execute<B: Backend>(
        checkpoint_dir: &Path,
        frames:         usize,
        tokens:         usize,
        device:         B::Device,
    ) -> Result<InspectReport> {
        let ckpt   = CheckpointManager::new(checkpoint_dir)?;
        let loaded = ckpt.has_model::<B>();
        let tagger = if loaded {
            Tagger::<B>::from_checkpoint(&ckpt, device)?
        } else {
            tracing::warn!("No saved weights in '{}', inspecting a random model", ckpt.dir().display());
            let cfg = ckpt.load_config()?;
            let model = get_model::<B>(&cfg, &device)?;
            Tagger::new(model, cfg, device)
        };

        let cfg = tagger.config();
        let model = tagger.model();
        let device = tagger.device();

        // Same limits the Tagger enforces on real utterances
        let random_input = ProsodySample {
            id:             "random".to_string(),
            frames:         vec![vec![0.0; cfg.feature_dim]; frames],
            input_ids:      vec![0; tokens],
            attention_mask: vec![1; tokens],
            tokens:         vec![String::new(); tokens],
            special:        vec![false; tokens],
        };
        tagger.check(&random_input)?;

        let params = vec![
            ("sub-sampling",  model.sub_sampling.num_params()),
            ("audio encoder", model.audio_encoder.num_params()),
            ("bert",          model.bert.num_params()),
            ("cross decoder", model.cross_decoder.num_params()),
            ("output head",   model.out.num_params()),
            ("total",         model.num_params()),
        ];
        for (name, count) in &params {
            tracing::info!("{:<14} {:>12} params", name, count);
        }

        let mfcc = Tensor::<B, 3>::random([1, frames, cfg.feature_dim], Distribution::Normal(0.0, 1.0), device);
        let input_ids = Tensor::<B, 2, Int>::random(
            [1, tokens],
            Distribution::Uniform(0.0, cfg.bert.vocab_size as f64),
            device,
        );
        let attention_mask = Tensor::<B, 2, Int>::ones([1, tokens], device);
        let mfcc_mask = Tensor::<B, 2, Int>::ones([1, frames], device);

        let out = model.forward(mfcc, input_ids, attention_mask, mfcc_mask);
        let report = InspectReport {
            params,
            logits_shape: out.logits.dims(),
            attn_shape:   out.attention.dims(),
            loaded,
        };
        tracing::info!("logits {:?}, attention {:?}", report.logits_shape, report.attn_shape);
        Ok(report)
    }
}
