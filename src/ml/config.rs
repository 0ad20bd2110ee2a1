// ============================================================
// Layer 5 — Model Configuration
// ============================================================
// Every hyperparameter needed to rebuild the model, in one
// serialisable struct. It is written next to the checkpoint as
// prosody_config.json so inference reconstructs the exact same
// architecture before loading weights into it.
//
// validate() is the gate in front of construction: get_model()
// never builds a model from a config that fails it.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::domain::tags::TagSet;
use crate::ml::{
    audio_encoder::AudioEncoderConfig,
    bert::BertConfig,
    conformer::ConformerConfig,
    decoder::CrossDecoderConfig,
    error::ModelError,
    subsampling::{subsampled_len, Conv2dSubsamplingConfig, SubsamplingKind},
};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProsodyConfig {
    /// Width of one acoustic frame (83 = 80 fbank + 3 pitch)
    pub feature_dim:           usize,
    /// Width of the audio stream after sub-sampling
    pub d_mfcc:                usize,
    /// Width of the text stream; must equal the BERT hidden size
    pub d_text:                usize,
    /// Longest audio sequence AFTER sub-sampling
    pub max_mfcc_length:       usize,
    /// Longest token sequence, special tokens included
    pub bert_embedding_length: usize,
    /// Layers in the audio encoder and in the cross decoder
    pub n_layers:              usize,
    pub heads:                 usize,
    pub d_ff:                  usize,
    pub dropout:               f64,
    pub num_tags:              usize,
    pub batch_size:            usize,
    /// Pass pad masks to the audio encoder and decoder attention
    #[serde(default)]
    pub mask_padding:          bool,
    pub subsampling:           SubsamplingKind,
    pub conformer:             ConformerConfig,
    pub bert:                  BertConfig,
    /// Directory holding tokenizer.json or vocab.txt
    pub tokenizer_dir:         PathBuf,
    /// Pretrained BERT weights (burn record) loaded at init
    #[serde(default)]
    pub bert_checkpoint:       Option<PathBuf>,
    /// Pretrained conformer weights (burn record) loaded at init
    #[serde(default)]
    pub asr_path:              Option<PathBuf>,
    #[serde(default)]
    pub tag_names:             Vec<String>,
}

impl Default for ProsodyConfig {
    fn default() -> Self {
        Self {
            feature_dim:           83,
            d_mfcc:                256,
            d_text:                768,
            max_mfcc_length:       1024,
            bert_embedding_length: 512,
            n_layers:              6,
            heads:                 8,
            d_ff:                  2048,
            dropout:               0.1,
            num_tags:              5,
            batch_size:            8,
            mask_padding:          false,
            subsampling:           SubsamplingKind::Conformer,
            conformer:             ConformerConfig::new(83),
            bert:                  BertConfig::default(),
            tokenizer_dir:         PathBuf::from("bert"),
            bert_checkpoint:       None,
            asr_path:              None,
            tag_names:             Vec::new(),
        }
    }
}

impl ProsodyConfig {
    /// Check every constraint construction relies on.
    pub fn validate(&self) -> Result<(), ModelError> {
        check_dropout(self.dropout)?;
        check_dropout(self.bert.hidden_dropout_prob)?;

        check_nonzero(self.heads, "heads")?;
        check_nonzero(self.n_layers, "n_layers")?;
        check_nonzero(self.num_tags, "num_tags")?;
        check_nonzero(self.max_mfcc_length, "max_mfcc_length")?;
        check_nonzero(self.bert_embedding_length, "bert_embedding_length")?;
        check_nonzero(self.bert.num_attention_heads, "bert num_attention_heads")?;

        check_heads("audio encoder", self.d_mfcc, self.heads)?;
        check_heads("cross decoder", self.d_text, self.heads)?;
        check_heads("BERT", self.bert.hidden_size, self.bert.num_attention_heads)?;

        if self.bert.hidden_size != self.d_text {
            return Err(ModelError::WidthMismatch {
                what:     "BERT hidden size vs d_text",
                expected: self.d_text,
                found:    self.bert.hidden_size,
            });
        }

        if subsampled_len(self.feature_dim) == 0 {
            return Err(ModelError::FeatureDimTooSmall(self.feature_dim));
        }

        match self.subsampling {
            SubsamplingKind::Conformer => {
                let c = &self.conformer;
                check_dropout(c.dropout_rate)?;
                check_dropout(c.positional_dropout_rate)?;
                check_dropout(c.attention_dropout_rate)?;
                check_nonzero(c.attention_heads, "conformer attention_heads")?;
                check_nonzero(c.cnn_module_kernel, "conformer cnn_module_kernel")?;
                check_heads("conformer", c.attention_dim, c.attention_heads)?;
                if c.attention_dim != self.d_mfcc {
                    return Err(ModelError::WidthMismatch {
                        what:     "conformer attention_dim vs d_mfcc",
                        expected: self.d_mfcc,
                        found:    c.attention_dim,
                    });
                }
                if c.idim != self.feature_dim {
                    return Err(ModelError::WidthMismatch {
                        what:     "conformer idim vs feature_dim",
                        expected: self.feature_dim,
                        found:    c.idim,
                    });
                }
            }
            SubsamplingKind::Conv2d => {
                if self.asr_path.is_some() {
                    return Err(ModelError::AsrWithoutConformer);
                }
            }
        }

        if !self.tag_names.is_empty() && self.tag_names.len() != self.num_tags {
            return Err(ModelError::TagNamesMismatch {
                num_tags: self.num_tags,
                names:    self.tag_names.len(),
            });
        }

        Ok(())
    }

    /// Longest token sequence the model accepts: the smaller of the
    /// decoder's positional table and BERT's position embeddings.
    pub fn max_tokens(&self) -> usize {
        self.bert_embedding_length.min(self.bert.max_position_embeddings)
    }

    pub fn tag_set(&self) -> TagSet {
        if self.tag_names.is_empty() {
            TagSet::numbered(self.num_tags)
        } else {
            TagSet::new(self.tag_names.clone())
        }
    }

    pub fn audio_encoder_config(&self) -> AudioEncoderConfig {
        AudioEncoderConfig::new(self.d_mfcc, self.max_mfcc_length, self.n_layers, self.heads)
            .with_d_ff(self.d_ff)
            .with_dropout(self.dropout)
    }

    pub fn cross_decoder_config(&self) -> CrossDecoderConfig {
        CrossDecoderConfig::new(
            self.d_text,
            self.d_mfcc,
            self.n_layers,
            self.heads,
            self.bert_embedding_length,
        )
        .with_d_ff(self.d_ff)
        .with_dropout(self.dropout)
    }

    /// Both front ends take sub-sampled sequences up to `max_mfcc_length`.
    pub fn conformer_config(&self) -> ConformerConfig {
        self.conformer.clone().with_max_len(self.max_mfcc_length)
    }

    pub fn conv_subsampling_config(&self) -> Conv2dSubsamplingConfig {
        Conv2dSubsamplingConfig::new(self.feature_dim, self.d_mfcc)
            .with_dropout(self.dropout)
            .with_max_len(self.max_mfcc_length)
    }
}

fn check_dropout(p: f64) -> Result<(), ModelError> {
    if (0.0..1.0).contains(&p) {
        Ok(())
    } else {
        Err(ModelError::InvalidDropout(p))
    }
}

fn check_nonzero(value: usize, what: &'static str) -> Result<(), ModelError> {
    if value == 0 {
        Err(ModelError::Zero { what })
    } else {
        Ok(())
    }
}

fn check_heads(component: &'static str, dim: usize, heads: usize) -> Result<(), ModelError> {
    if dim % heads == 0 {
        Ok(())
    } else {
        Err(ModelError::HeadsNotDivisible { component, dim, heads })
    }
}
