// ============================================================
// Layer 1 — CLI Commands and Arguments
// ============================================================
// Defines the three subcommands: `init`, `inspect` and `predict`
// and all their flags.
//
// Reference: Rust Book §12 (Building a CLI Program)

use anyhow::Result;
use clap::{Args, Subcommand};
use std::path::PathBuf;

use crate::ml::{
    bert::BertConfig,
    conformer::ConformerConfig,
    config::ProsodyConfig,
    subsampling::SubsamplingKind,
};

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Write a model config and freshly initialised weights
    Init(InitArgs),

    /// Count parameters and run the model on random input
    Inspect(InspectArgs),

    /// Tag the tokens of utterance feature files
    Predict(PredictArgs),
}

#[derive(Args, Debug)]
pub struct InitArgs {
    /// Directory to write prosody_config.json and model.mpk into
    #[arg(long, default_value = "checkpoints")]
    pub checkpoint_dir: PathBuf,

    /// Hugging Face BERT config.json; bert-base when omitted
    #[arg(long)]
    pub bert_config: Option<PathBuf>,

    /// Pretrained BERT weights (burn record) to load
    #[arg(long)]
    pub bert_checkpoint: Option<PathBuf>,

    /// Pretrained conformer ASR encoder weights (burn record) to load
    #[arg(long)]
    pub asr_path: Option<PathBuf>,

    /// Directory holding tokenizer.json or vocab.txt
    #[arg(long, default_value = "bert")]
    pub tokenizer_dir: PathBuf,

    /// Audio front end: conformer or conv2d
    #[arg(long, default_value_t = SubsamplingKind::Conformer)]
    pub subsampling: SubsamplingKind,

    #[arg(long, default_value_t = 5)]
    pub num_tags: usize,

    /// Comma-separated tag names, one per tag
    #[arg(long, value_delimiter = ',')]
    pub tag_names: Vec<String>,

    /// Width of one acoustic frame
    #[arg(long, default_value_t = 83)]
    pub feature_dim: usize,

    /// Width of the audio stream after sub-sampling
    #[arg(long, default_value_t = 256)]
    pub d_mfcc: usize,

    /// Longest audio sequence after sub-sampling
    #[arg(long, default_value_t = 1024)]
    pub max_mfcc_length: usize,

    /// Layers in the audio encoder and in the cross decoder
    #[arg(long, default_value_t = 6)]
    pub n_layers: usize,

    /// Attention heads; d_mfcc and the BERT width must both divide by it
    #[arg(long, default_value_t = 8)]
    pub heads: usize,

    #[arg(long, default_value_t = 2048)]
    pub d_ff: usize,

    #[arg(long, default_value_t = 0.1)]
    pub dropout: f64,

    /// Conformer blocks in the sub-sampling encoder
    #[arg(long, default_value_t = 12)]
    pub conformer_blocks: usize,

    /// Pass pad masks to the audio encoder and the decoder
    #[arg(long)]
    pub mask_padding: bool,

    /// Default batch size stored for `predict`
    #[arg(long, default_value_t = 8)]
    pub batch_size: usize,
}

impl InitArgs {
    /// Build the model config; the text width follows the BERT config.
    pub fn into_config(self) -> Result<ProsodyConfig> {
        let bert = match &self.bert_config {
            Some(path) => BertConfig::from_file(path)?,
            None => BertConfig::default(),
        };

        Ok(ProsodyConfig {
            feature_dim:           self.feature_dim,
            d_mfcc:                self.d_mfcc,
            d_text:                bert.hidden_size,
            max_mfcc_length:       self.max_mfcc_length,
            bert_embedding_length: bert.max_position_embeddings,
            n_layers:              self.n_layers,
            heads:                 self.heads,
            d_ff:                  self.d_ff,
            dropout:               self.dropout,
            num_tags:              self.num_tags,
            batch_size:            self.batch_size,
            mask_padding:          self.mask_padding,
            subsampling:           self.subsampling,
            conformer: ConformerConfig::new(self.feature_dim)
                .with_attention_dim(self.d_mfcc)
                .with_num_blocks(self.conformer_blocks),
            bert,
            tokenizer_dir:         self.tokenizer_dir,
            bert_checkpoint:       self.bert_checkpoint,
            asr_path:              self.asr_path,
            tag_names:             self.tag_names,
        })
    }
}

#[derive(Args, Debug)]
pub struct InspectArgs {
    #[arg(long, default_value = "checkpoints")]
    pub checkpoint_dir: PathBuf,

    /// Frames of the random input (before sub-sampling)
    #[arg(long, default_value_t = 400)]
    pub frames: usize,

    /// Tokens of the random input
    #[arg(long, default_value_t = 32)]
    pub tokens: usize,

    /// Run on the CPU (NdArray) instead of the GPU (Wgpu)
    #[arg(long)]
    pub cpu: bool,
}

#[derive(Args, Debug)]
pub struct PredictArgs {
    #[arg(long, default_value = "checkpoints")]
    pub checkpoint_dir: PathBuf,

    /// Utterance JSON file, or a directory of them
    #[arg(long)]
    pub features: PathBuf,

    /// Overrides the batch size stored in the config
    #[arg(long)]
    pub batch_size: Option<usize>,

    /// Run on the CPU (NdArray) instead of the GPU (Wgpu)
    #[arg(long)]
    pub cpu: bool,
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::Cli;
    use clap::Parser;

    fn init_args(argv: &[&str]) -> InitArgs {
        match Cli::parse_from(argv).command {
            Commands::Init(args) => args,
            other => panic!("expected init, got {other:?}"),
        }
    }

    #[test]
    fn test_init_defaults_give_a_valid_config() {
        let cfg = init_args(&["prosody-tagger", "init"]).into_config().unwrap();
        assert_eq!(cfg.validate(), Ok(()));
        assert_eq!(cfg.d_text, 768);
        assert_eq!(cfg.subsampling, SubsamplingKind::Conformer);
    }

    #[test]
    fn test_init_flags() {
        let cfg = init_args(&[
            "prosody-tagger", "init",
            "--subsampling", "cnn",
            "--num-tags", "3",
            "--tag-names", "none,minor,major",
        ])
        .into_config()
        .unwrap();
        assert_eq!(cfg.subsampling, SubsamplingKind::Conv2d);
        assert_eq!(cfg.tag_set().name(2), "major");
        assert_eq!(cfg.validate(), Ok(()));
    }

    #[test]
    fn test_text_width_follows_bert_config() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{"hidden_size": 312, "num_attention_heads": 12}"#).unwrap();

        let cfg = init_args(&["prosody-tagger", "init", "--bert-config", path.to_str().unwrap()])
            .into_config()
            .unwrap();
        assert_eq!(cfg.d_text, 312);
    }

    #[test]
    fn test_predict_requires_features() {
        assert!(Cli::try_parse_from(["prosody-tagger", "predict"]).is_err());
        let cli = Cli::parse_from(["prosody-tagger", "predict", "--features", "f.json", "--cpu"]);
        assert!(matches!(cli.command, Commands::Predict(PredictArgs { cpu: true, batch_size: None, .. })));
    }
}
