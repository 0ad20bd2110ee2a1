// ============================================================
// Layer 2 — Init Use Case
// ============================================================
// Creates a checkpoint directory the other commands can load:
//   1. Validate the config (invalid widths never reach burn)
//   2. Build the model with fresh weights
//   3. Load pretrained ASR encoder / BERT weights when configured
//   4. Save prosody_config.json and model.mpk

use anyhow::Result;
use burn::prelude::*;
use std::path::PathBuf;

use crate::infra::checkpoint::CheckpointManager;
use crate::ml::{config::ProsodyConfig, model::get_model};

pub struct InitUseCase {
    checkpoint_dir: PathBuf,
    config:         ProsodyConfig,
}

impl InitUseCase {
    pub fn new(checkpoint_dir: impl Into<PathBuf>, config: ProsodyConfig) -> Self {
        Self { checkpoint_dir: checkpoint_dir.into(), config }
    }

    /// Returns the number of parameters of the saved model.
    pub fn execute<B: Backend>(&self, device: &B::Device) -> Result<usize> {
        let cfg  = &self.config;
        let ckpt = CheckpointManager::new(&self.checkpoint_dir)?;

        let mut model = get_model::<B>(cfg, device)?;
        if let Some(path) = &cfg.asr_path {
            model = ckpt.load_asr_encoder(model, path, device)?;
        }
        if let Some(path) = &cfg.bert_checkpoint {
            model = ckpt.load_bert(model, path, device)?;
        }

        ckpt.save_config(cfg)?;
        ckpt.save_model(&model)?;

        let params = model.num_params();
        tracing::info!(
            "Initialised {} parameter model in '{}'",
            params,
            self.checkpoint_dir.display()
        );
        Ok(params)
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use crate::ml::{
        error::ModelError,
        model::tests::{tiny_config, TestBackend},
    };
    use crate::infra::checkpoint::WeightsRecorder;
    use burn::record::Recorder;

    #[test]
    fn test_writes_loadable_checkpoint() {
        let dir = tempfile::tempdir().unwrap();
        let params = InitUseCase::new(dir.path(), tiny_config())
            .execute::<TestBackend>(&Default::default())
            .unwrap();
        assert!(params > 0);

        let ckpt = CheckpointManager::new(dir.path()).unwrap();
        assert!(ckpt.has_model::<TestBackend>());
        assert!(dir.path().join("model.mpk").exists());
        assert_eq!(ckpt.load_config().unwrap().num_tags, 4);
    }

    #[test]
    fn test_invalid_config_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = ProsodyConfig { dropout: 1.0, ..tiny_config() };
        let err = InitUseCase::new(dir.path(), cfg)
            .execute::<TestBackend>(&Default::default())
            .unwrap_err();

        assert_eq!(err.downcast_ref::<ModelError>(), Some(&ModelError::InvalidDropout(1.0)));
        assert!(!CheckpointManager::new(dir.path()).unwrap().has_model::<TestBackend>());
    }

    #[test]
    fn test_loads_pretrained_asr_encoder() {
        let device = Default::default();
        let dir = tempfile::tempdir().unwrap();
        let cfg = tiny_config();

        let donor = cfg.conformer.init::<TestBackend>(&device);
        let asr = dir.path().join("asr");
        WeightsRecorder::new().record(donor.clone().into_record(), asr.clone()).unwrap();

        let cfg = ProsodyConfig { asr_path: Some(asr.with_extension("mpk")), ..cfg };
        let out = dir.path().join("ckpt");
        InitUseCase::new(&out, cfg.clone()).execute::<TestBackend>(&device).unwrap();

        let ckpt = CheckpointManager::new(&out).unwrap();
        let model = ckpt
            .load_model(get_model::<TestBackend>(&cfg, &device).unwrap(), &device)
            .unwrap();
        let crate::ml::subsampling::SubSampler::Conformer(enc) = model.sub_sampling else {
            panic!("expected conformer front end");
        };
        let a: Vec<f32> = donor.after_norm.gamma.val().into_data().iter::<f32>().collect();
        let b: Vec<f32> = enc.after_norm.gamma.val().into_data().iter::<f32>().collect();
        assert_eq!(a, b);
        let a: Vec<f32> = donor.embed.out.weight.val().into_data().iter::<f32>().collect();
        let b: Vec<f32> = enc.embed.out.weight.val().into_data().iter::<f32>().collect();
        assert_eq!(a, b);
    }
}
