// ============================================================
// Layer 6 — Checkpoint Manager
// ============================================================
// Saves and restores the model with Burn's named MessagePack
// recorder at full precision.
//
// What lives in a checkpoint directory:
//   prosody_config.json  — every hyperparameter of the model
//   model.mpk            — all parameters of ProsodyExtractor
//
// The config is needed to rebuild the exact architecture before
// weights are loaded into it; a record only loads into a module
// of the same shape.
//
// Two more loaders take weights for a single component from a
// standalone record file:
//   load_asr_encoder → the conformer sub-sampler
//   load_bert        → the BERT encoder
//
// Burn's recorders append their own extension, so record paths
// are accepted with or without the trailing ".mpk".
//
// Reference: Burn Book §5 (Records and Checkpointing)

use anyhow::{bail, Context, Result};
use burn::{
    prelude::*,
    record::{FileRecorder, FullPrecisionSettings, NamedMpkFileRecorder, Recorder},
};
use std::{
    fs,
    path::{Path, PathBuf},
};

use crate::ml::{
    bert::BertModel,
    config::ProsodyConfig,
    conformer::ConformerEncoder,
    error::ModelError,
    model::ProsodyExtractor,
    subsampling::SubSampler,
};

const CONFIG_FILE: &str = "prosody_config.json";
const MODEL_STEM: &str = "model";

/// Recorder for the whole model and for pretrained component weights.
pub type WeightsRecorder = NamedMpkFileRecorder<FullPrecisionSettings>;

/// File extension the recorder appends, without the dot.
fn record_ext<B: Backend>() -> &'static str {
    <WeightsRecorder as FileRecorder<B>>::file_extension()
}

pub struct CheckpointManager {
    dir: PathBuf,
}

impl CheckpointManager {
    /// Point at `dir`, creating it when it does not exist yet.
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)
            .with_context(|| format!("Cannot create checkpoint directory '{}'", dir.display()))?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    // ─── Config ───────────────────────────────────────────────────────────────
    pub fn save_config(&self, cfg: &ProsodyConfig) -> Result<()> {
        let path = self.dir.join(CONFIG_FILE);
        let json = serde_json::to_string_pretty(cfg)?;
        fs::write(&path, json)
            .with_context(|| format!("Cannot write config to '{}'", path.display()))?;

        tracing::debug!("Saved model config to '{}'", path.display());
        Ok(())
    }

    pub fn load_config(&self) -> Result<ProsodyConfig> {
        let path = self.dir.join(CONFIG_FILE);
        let json = fs::read_to_string(&path).with_context(|| {
            format!(
                "Cannot read config from '{}'. Run 'init' first.",
                path.display()
            )
        })?;
        serde_json::from_str(&json)
            .with_context(|| format!("Invalid model config '{}'", path.display()))
    }

    // ─── Whole model ──────────────────────────────────────────────────────────
    pub fn has_model<B: Backend>(&self) -> bool {
        self.dir
            .join(MODEL_STEM)
            .with_extension(record_ext::<B>())
            .exists()
    }

    pub fn save_model<B: Backend>(&self, model: &ProsodyExtractor<B>) -> Result<()> {
        let path = self.dir.join(MODEL_STEM);
        WeightsRecorder::new()
            .record(model.clone().into_record(), path.clone())
            .with_context(|| format!("Failed to save model to '{}'", path.display()))?;

        tracing::debug!("Saved model weights to '{}.{}'", path.display(), record_ext::<B>());
        Ok(())
    }

    /// Load saved weights into `model`, which must have been built
    /// from the config stored next to them.
    pub fn load_model<B: Backend>(
        &self,
        model:  ProsodyExtractor<B>,
        device: &B::Device,
    ) -> Result<ProsodyExtractor<B>> {
        let path = self.dir.join(MODEL_STEM);
        let record = WeightsRecorder::new()
            .load(path.clone(), device)
            .with_context(|| {
                format!(
                    "Cannot load model '{}.{}'. Run 'init' first.",
                    path.display(),
                    record_ext::<B>()
                )
            })?;

        tracing::info!("Loaded model weights from '{}'", self.dir.display());
        Ok(model.load_record(record))
    }

    // ─── Components ───────────────────────────────────────────────────────────
    /// Load pretrained ASR encoder weights into the conformer sub-sampler.
    pub fn load_asr_encoder<B: Backend>(
        &self,
        mut model: ProsodyExtractor<B>,
        path:      &Path,
        device:    &B::Device,
    ) -> Result<ProsodyExtractor<B>> {
        let encoder = match model.sub_sampling {
            SubSampler::Conformer(encoder) => encoder,
            SubSampler::Conv2d(_) => bail!(ModelError::AsrWithoutConformer),
        };

        let record: <ConformerEncoder<B> as Module<B>>::Record = WeightsRecorder::new()
            .load(record_stem::<B>(path), device)
            .with_context(|| format!("Cannot load ASR encoder weights '{}'", path.display()))?;

        tracing::info!("Loaded ASR encoder weights from '{}'", path.display());
        model.sub_sampling = SubSampler::Conformer(encoder.load_record(record));
        Ok(model)
    }

    pub fn load_bert<B: Backend>(
        &self,
        mut model: ProsodyExtractor<B>,
        path:      &Path,
        device:    &B::Device,
    ) -> Result<ProsodyExtractor<B>> {
        let record: <BertModel<B> as Module<B>>::Record = WeightsRecorder::new()
            .load(record_stem::<B>(path), device)
            .with_context(|| format!("Cannot load BERT weights '{}'", path.display()))?;

        tracing::info!("Loaded BERT weights from '{}'", path.display());
        model.bert = model.bert.load_record(record);
        Ok(model)
    }
}

/// `dir/asr.mpk` and `dir/asr` both name the record `dir/asr`.
fn record_stem<B: Backend>(path: &Path) -> PathBuf {
    if path.extension().and_then(|e| e.to_str()) == Some(record_ext::<B>()) {
        path.with_extension("")
    } else {
        path.to_path_buf()
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use crate::ml::{
        model::{get_model, tests::{tiny_config, TestBackend}},
        subsampling::SubsamplingKind,
    };

    #[test]
    fn test_config_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let ckpt = CheckpointManager::new(dir.path()).unwrap();
        let cfg = ProsodyConfig { num_tags: 7, ..tiny_config() };

        ckpt.save_config(&cfg).unwrap();
        let back = ckpt.load_config().unwrap();
        assert_eq!(back.num_tags, 7);
        assert_eq!(back.d_mfcc, cfg.d_mfcc);
        assert_eq!(back.bert, cfg.bert);
    }

    #[test]
    fn test_missing_config_mentions_init() {
        let dir = tempfile::tempdir().unwrap();
        let ckpt = CheckpointManager::new(dir.path()).unwrap();
        let err = ckpt.load_config().unwrap_err();
        assert!(err.to_string().contains("Run 'init' first"));
    }

    #[test]
    fn test_model_roundtrip_keeps_weights() {
        let device = Default::default();
        let dir = tempfile::tempdir().unwrap();
        let ckpt = CheckpointManager::new(dir.path()).unwrap();
        let cfg = tiny_config();

        let saved = get_model::<TestBackend>(&cfg, &device).unwrap();
        assert!(!ckpt.has_model::<TestBackend>());
        ckpt.save_model(&saved).unwrap();
        assert!(ckpt.has_model::<TestBackend>());
        assert!(dir.path().join("model.mpk").exists());

        let fresh = get_model::<TestBackend>(&cfg, &device).unwrap();
        let loaded = ckpt.load_model(fresh, &device).unwrap();

        let a: Vec<f32> = saved.out.weight.val().into_data().iter::<f32>().collect();
        let b: Vec<f32> = loaded.out.weight.val().into_data().iter::<f32>().collect();
        assert_eq!(a, b);
    }

    #[test]
    fn test_bert_weights_load_from_standalone_record() {
        let device = Default::default();
        let dir = tempfile::tempdir().unwrap();
        let ckpt = CheckpointManager::new(dir.path()).unwrap();
        let cfg = tiny_config();

        let donor = get_model::<TestBackend>(&cfg, &device).unwrap();
        WeightsRecorder::new()
            .record(donor.bert.clone().into_record(), dir.path().join("bert"))
            .unwrap();

        let model = get_model::<TestBackend>(&cfg, &device).unwrap();
        let model = ckpt
            .load_bert(model, &dir.path().join("bert.mpk"), &device)
            .unwrap();

        let a: Vec<f32> = donor.bert.word_embeddings.weight.val().into_data().iter::<f32>().collect();
        let b: Vec<f32> = model.bert.word_embeddings.weight.val().into_data().iter::<f32>().collect();
        assert_eq!(a, b);
    }

    #[test]
    fn test_asr_weights_rejected_for_conv2d() {
        let device = Default::default();
        let dir = tempfile::tempdir().unwrap();
        let ckpt = CheckpointManager::new(dir.path()).unwrap();
        let cfg = ProsodyConfig { subsampling: SubsamplingKind::Conv2d, ..tiny_config() };

        let model = get_model::<TestBackend>(&cfg, &device).unwrap();
        let err = ckpt
            .load_asr_encoder(model, &dir.path().join("asr"), &device)
            .unwrap_err();
        assert_eq!(err.downcast_ref::<ModelError>(), Some(&ModelError::AsrWithoutConformer));
    }

    #[test]
    fn test_record_stem_strips_extension() {
        assert_eq!(record_stem::<TestBackend>(Path::new("w/asr.mpk")), PathBuf::from("w/asr"));
        assert_eq!(record_stem::<TestBackend>(Path::new("w/asr")), PathBuf::from("w/asr"));
        assert_eq!(record_stem::<TestBackend>(Path::new("w/asr.v2")), PathBuf::from("w/asr.v2"));
    }
}
