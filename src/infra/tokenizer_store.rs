// ============================================================
// Layer 6 — Tokenizer Store
// ============================================================
// Supplies the BERT WordPiece tokenizer the text branch needs.
//
// A Hugging Face BERT checkpoint ships either a ready-made
// tokenizer.json or only a vocab.txt (one token per line, the
// line number is the id). For the second case the tokenizer
// JSON is assembled by hand and loaded back with
// Tokenizer::from_file, which avoids building the pipeline
// through the typed builder API.
//
//   normalizer      BertNormalizer (lowercase, CJK split)
//   pre_tokenizer   BertPreTokenizer
//   model           WordPiece, "##" continuation prefix
//   post_processor  [CLS] $A [SEP]

use anyhow::{bail, Context, Result};
use std::{fs, path::PathBuf};
use tokenizers::Tokenizer;

const TOKENIZER_FILE: &str = "tokenizer.json";
const VOCAB_FILE: &str = "vocab.txt";

pub struct TokenizerStore {
    dir: PathBuf,
}

impl TokenizerStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Load tokenizer.json, building it from vocab.txt when missing.
    pub fn load_or_build(&self) -> Result<Tokenizer> {
        if self.dir.join(TOKENIZER_FILE).exists() {
            tracing::info!("Loading tokenizer from '{}'", self.dir.display());
            self.load()
        } else {
            self.build_from_vocab()
        }
    }

    pub fn load(&self) -> Result<Tokenizer> {
        let path = self.dir.join(TOKENIZER_FILE);
        Tokenizer::from_file(&path)
            .map_err(|e| anyhow::anyhow!("Cannot load tokenizer from '{}': {}", path.display(), e))
    }

    fn build_from_vocab(&self) -> Result<Tokenizer> {
        let vocab_path = self.dir.join(VOCAB_FILE);
        let text = fs::read_to_string(&vocab_path).with_context(|| {
            format!(
                "No {TOKENIZER_FILE} or {VOCAB_FILE} in '{}'",
                self.dir.display()
            )
        })?;

        let mut vocab = serde_json::Map::new();
        for (id, token) in text.lines().enumerate() {
            let token = token.trim_end_matches('\r');
            if !token.is_empty() && !vocab.contains_key(token) {
                vocab.insert(token.to_string(), serde_json::json!(id));
            }
        }

        let id_of = |token: &str| -> Result<u64> {
            match vocab.get(token).and_then(|v| v.as_u64()) {
                Some(id) => Ok(id),
                None => bail!("'{}' is missing {token}", vocab_path.display()),
            }
        };
        let cls = id_of("[CLS]")?;
        let sep = id_of("[SEP]")?;
        id_of("[UNK]")?;

        let added_tokens: Vec<serde_json::Value> = ["[PAD]", "[UNK]", "[CLS]", "[SEP]", "[MASK]"]
            .iter()
            .filter_map(|t| vocab.get(*t).map(|id| (t, id.clone())))
            .map(|(t, id)| {
                serde_json::json!({
                    "id": id, "content": t, "single_word": false, "lstrip": false,
                    "rstrip": false, "normalized": false, "special": true
                })
            })
            .collect();

        let vocab_size = vocab.len();
        let tokenizer_json = serde_json::json!({
            "version": "1.0",
            "truncation": null,
            "padding": null,
            "added_tokens": added_tokens,
            "normalizer": {
                "type": "BertNormalizer",
                "clean_text": true,
                "handle_chinese_chars": true,
                "strip_accents": null,
                "lowercase": true
            },
            "pre_tokenizer": { "type": "BertPreTokenizer" },
            "post_processor": {
                "type": "BertProcessing",
                "sep": ["[SEP]", sep],
                "cls": ["[CLS]", cls]
            },
            "decoder": { "type": "WordPiece", "prefix": "##", "cleanup": true },
            "model": {
                "type": "WordPiece",
                "unk_token": "[UNK]",
                "continuing_subword_prefix": "##",
                "max_input_chars_per_word": 100,
                "vocab": vocab
            }
        });

        let tok_path = self.dir.join(TOKENIZER_FILE);
        fs::write(&tok_path, serde_json::to_string_pretty(&tokenizer_json)?)
            .with_context(|| format!("Cannot write '{}'", tok_path.display()))?;

        tracing::info!(
            "Built WordPiece tokenizer ({} tokens) at '{}'",
            vocab_size,
            tok_path.display()
        );
        self.load()
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;

    const VOCAB: &str = "[PAD]\n[UNK]\n[CLS]\n[SEP]\n[MASK]\nthe\ncat\nsat\n##s\n";

    #[test]
    fn test_builds_wordpiece_from_vocab() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join(VOCAB_FILE), VOCAB).unwrap();

        let tok = TokenizerStore::new(dir.path()).load_or_build().unwrap();
        assert!(dir.path().join(TOKENIZER_FILE).exists());

        let enc = tok.encode("The cats sat", true).unwrap();
        assert_eq!(enc.get_ids(), &[2, 5, 6, 8, 7, 3]);
        assert_eq!(enc.get_tokens()[3], "##s");
        assert_eq!(enc.get_special_tokens_mask(), &[1, 0, 0, 0, 0, 1]);
    }

    #[test]
    fn test_unknown_word_maps_to_unk() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join(VOCAB_FILE), VOCAB).unwrap();

        let tok = TokenizerStore::new(dir.path()).load_or_build().unwrap();
        let enc = tok.encode("dog", true).unwrap();
        assert_eq!(enc.get_ids(), &[2, 1, 3]);
    }

    #[test]
    fn test_vocab_without_cls_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join(VOCAB_FILE), "[UNK]\n[SEP]\nthe\n").unwrap();
        let err = TokenizerStore::new(dir.path()).load_or_build().unwrap_err();
        assert!(err.to_string().contains("[CLS]"));
    }

    #[test]
    fn test_missing_files_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(TokenizerStore::new(dir.path()).load_or_build().is_err());
    }
}
