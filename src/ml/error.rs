// ============================================================
// Layer 5 — Model Errors
// ============================================================
// Everything that can stop a model from being built or fed.
// Construction-time checks come first, then the checks the
// Tagger runs on each sample before the forward pass.

use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum ModelError {
    /// Multi-head attention splits the width evenly across heads.
    #[error("{component} width {dim} is not divisible by {heads} attention heads")]
    HeadsNotDivisible {
        component: &'static str,
        dim:       usize,
        heads:     usize,
    },

    #[error("dropout rate must be in [0, 1), got {0}")]
    InvalidDropout(f64),

    #[error("{what} must be at least 1")]
    Zero { what: &'static str },

    #[error("{what}: expected width {expected}, found {found}")]
    WidthMismatch {
        what:     &'static str,
        expected: usize,
        found:    usize,
    },

    #[error("feature dimension {0} is too small for two stride-2 convolutions (need at least 7)")]
    FeatureDimTooSmall(usize),

    #[error("{names} tag names configured for {num_tags} tags")]
    TagNamesMismatch { num_tags: usize, names: usize },

    #[error("pretrained ASR weights only fit the conformer sub-sampler")]
    AsrWithoutConformer,

    #[error("{what} length {len} exceeds the maximum of {max}")]
    SequenceTooLong {
        what: &'static str,
        len:  usize,
        max:  usize,
    },

    #[error("utterance '{id}' has feature dimension {found}, model expects {expected}")]
    FeatureDimMismatch {
        id:       String,
        expected: usize,
        found:    usize,
    },

    #[error("utterance '{id}' is too short: {frames} frames leave nothing after sub-sampling")]
    TooFewFrames { id: String, frames: usize },

    #[error("utterance '{id}': token id {token_id} is outside the BERT vocabulary of {vocab_size}")]
    TokenOutOfVocab {
        id:         String,
        token_id:   u32,
        vocab_size: usize,
    },

    #[error("utterance '{id}' has no tokens")]
    NoTokens { id: String },
}
