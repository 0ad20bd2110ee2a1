// ============================================================
// Layer 5 — BERT Language Encoder
// ============================================================
// Supplies one contextual embedding per input token.
//
//   input_ids ─► word + position + token-type embeddings
//             ─► LayerNorm ─► Dropout
//             ─► N × post-norm transformer layer (GELU FFN)
//             ─► last_hidden_state [B, S, hidden_size]
//
// The architecture is read from a Hugging Face `config.json`
// (BertConfig); the burn-side module config is BertModelConfig.
// All text is a single segment, so token-type ids are zero.
//
// Reference: Devlin et al. (2019) BERT

use std::path::Path;

use anyhow::{Context, Result};
use burn::{
    nn::{
        transformer::{TransformerEncoder, TransformerEncoderConfig, TransformerEncoderInput},
        Dropout, DropoutConfig,
        Embedding, EmbeddingConfig,
        LayerNorm, LayerNormConfig,
    },
    prelude::*,
};
use serde::{Deserialize, Serialize};

// ─── Hugging Face config.json ─────────────────────────────────────────────────
/// Fields of a Hugging Face BERT `config.json` the model is built
/// from. Unknown keys are ignored, missing keys fall back to
/// bert-base values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BertConfig {
    pub vocab_size:                   usize,
    pub hidden_size:                  usize,
    pub num_hidden_layers:            usize,
    pub num_attention_heads:          usize,
    pub intermediate_size:            usize,
    pub hidden_dropout_prob:          f64,
    pub max_position_embeddings:      usize,
    pub type_vocab_size:              usize,
    /// Only reaches the embedding norm; burn's encoder layers use
    /// their own fixed epsilon.
    pub layer_norm_eps:               f64,
}

impl Default for BertConfig {
    fn default() -> Self {
        Self {
            vocab_size:                   30522,
            hidden_size:                  768,
            num_hidden_layers:            12,
            num_attention_heads:          12,
            intermediate_size:            3072,
            hidden_dropout_prob:          0.1,
            max_position_embeddings:      512,
            type_vocab_size:              2,
            layer_norm_eps:               1e-12,
        }
    }
}

impl BertConfig {
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path)
            .with_context(|| format!("Cannot read BERT config '{}'", path.display()))?;
        serde_json::from_str(&json)
            .with_context(|| format!("Invalid BERT config '{}'", path.display()))
    }

    pub fn model_config(&self) -> BertModelConfig {
        BertModelConfig::new(
            self.vocab_size,
            self.hidden_size,
            self.num_hidden_layers,
            self.num_attention_heads,
            self.intermediate_size,
            self.max_position_embeddings,
        )
        .with_type_vocab_size(self.type_vocab_size)
        .with_dropout(self.hidden_dropout_prob)
        .with_layer_norm_eps(self.layer_norm_eps)
    }
}

// ─── Burn module ──────────────────────────────────────────────────────────────
#[derive(Config, Debug)]
pub struct BertModelConfig {
    pub vocab_size:              usize,
    pub hidden_size:             usize,
    pub num_hidden_layers:       usize,
    pub num_attention_heads:     usize,
    pub intermediate_size:       usize,
    pub max_position_embeddings: usize,
    #[config(default = 2)]
    pub type_vocab_size:         usize,
    #[config(default = 0.1)]
    pub dropout:                 f64,
    #[config(default = 1e-12)]
    pub layer_norm_eps:          f64,
}

impl BertModelConfig {
    pub fn init<B: Backend>(&self, device: &B::Device) -> BertModel<B> {
        BertModel {
            word_embeddings:       EmbeddingConfig::new(self.vocab_size, self.hidden_size).init(device),
            position_embeddings:   EmbeddingConfig::new(self.max_position_embeddings, self.hidden_size).init(device),
            token_type_embeddings: EmbeddingConfig::new(self.type_vocab_size, self.hidden_size).init(device),
            embedding_norm: LayerNormConfig::new(self.hidden_size)
                .with_epsilon(self.layer_norm_eps)
                .init(device),
            dropout: DropoutConfig::new(self.dropout).init(),
            encoder: TransformerEncoderConfig::new(
                self.hidden_size,
                self.intermediate_size,
                self.num_attention_heads,
                self.num_hidden_layers,
            )
            .with_dropout(self.dropout)
            .with_norm_first(false)
            .init(device),
        }
    }
}

#[derive(Module, Debug)]
pub struct BertModel<B: Backend> {
    pub word_embeddings:       Embedding<B>,
    pub position_embeddings:   Embedding<B>,
    pub token_type_embeddings: Embedding<B>,
    pub embedding_norm:        LayerNorm<B>,
    pub dropout:               Dropout,
    pub encoder:               TransformerEncoder<B>,
}

impl<B: Backend> BertModel<B> {
    /// input_ids, attention_mask: [batch, seq_len] (mask 1 = token, 0 = pad)
    /// → last hidden state [batch, seq_len, hidden_size]
    pub fn forward(&self, input_ids: Tensor<B, 2, Int>, attention_mask: Tensor<B, 2, Int>) -> Tensor<B, 3> {
        let [batch_size, seq_len] = input_ids.dims();
        let device = input_ids.device();

        let positions = Tensor::<B, 1, Int>::arange(0..seq_len as i64, &device)
            .unsqueeze::<2>()
            .expand([batch_size, seq_len]);
        let token_types = Tensor::<B, 2, Int>::zeros([batch_size, seq_len], &device);

        let x = self.word_embeddings.forward(input_ids)
            + self.position_embeddings.forward(positions)
            + self.token_type_embeddings.forward(token_types);
        let x = self.dropout.forward(self.embedding_norm.forward(x));

        let pad_mask = attention_mask.equal_elem(0);
        self.encoder.forward(TransformerEncoderInput::new(x).mask_pad(pad_mask))
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;

    #[test]
    fn test_partial_config_json_uses_defaults() {
        let json = r#"{
            "architectures": ["BertForMaskedLM"],
            "hidden_size": 312,
            "num_attention_heads": 12,
            "vocab_size": 21128
        }"#;
        let cfg: BertConfig = serde_json::from_str(json).unwrap();
        assert_eq!(cfg.hidden_size, 312);
        assert_eq!(cfg.vocab_size, 21128);
        assert_eq!(cfg.num_hidden_layers, 12);
        assert_eq!(cfg.max_position_embeddings, 512);
    }

    #[test]
    fn test_full_hf_config_parses() {
        let json = r#"{
            "attention_probs_dropout_prob": 0.1,
            "hidden_act": "gelu",
            "hidden_dropout_prob": 0.1,
            "hidden_size": 768,
            "intermediate_size": 3072,
            "layer_norm_eps": 1e-12,
            "max_position_embeddings": 512,
            "model_type": "bert",
            "num_attention_heads": 12,
            "num_hidden_layers": 12,
            "pad_token_id": 0,
            "type_vocab_size": 2,
            "vocab_size": 30522
        }"#;
        let cfg: BertConfig = serde_json::from_str(json).unwrap();
        assert_eq!(cfg, BertConfig::default());
    }

    #[test]
    fn test_from_file_reports_missing_file() {
        let err = BertConfig::from_file("/definitely/not/here/config.json").unwrap_err();
        assert!(err.to_string().contains("Cannot read BERT config"));
    }

    #[test]
    fn test_last_hidden_state_shape() {
        let device = Default::default();
        let bert = BertModelConfig::new(50, 16, 2, 4, 32, 20).init::<NdArray>(&device);

        let ids  = Tensor::<NdArray, 2, Int>::from_ints([[2, 7, 9, 3, 0], [2, 4, 3, 0, 0]], &device);
        let mask = Tensor::<NdArray, 2, Int>::from_ints([[1, 1, 1, 1, 0], [1, 1, 1, 0, 0]], &device);
        assert_eq!(bert.forward(ids, mask).dims(), [2, 5, 16]);
    }
}
