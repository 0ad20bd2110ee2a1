// ============================================================
// Layer 3 — Prosody Tags
// ============================================================
// A prosody tag is a discrete label attached to one text token,
// e.g. the strength of the prosodic boundary after it.
//
// The model only knows tag INDICES (0..num_tags); TagSet maps
// them back to human-readable names for output.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagSet {
    names: Vec<String>,
}

impl TagSet {
    pub fn new(names: Vec<String>) -> Self {
        Self { names }
    }

    /// Names `tag_0 .. tag_{n-1}` for a model configured without names.
    pub fn numbered(num_tags: usize) -> Self {
        Self::new((0..num_tags).map(|i| format!("tag_{i}")).collect())
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    /// Name of a tag index; indices outside the set are rendered numerically.
    pub fn name(&self, index: usize) -> String {
        self.names
            .get(index)
            .cloned()
            .unwrap_or_else(|| format!("tag_{index}"))
    }
}

/// Model output for one (non-special) text token.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaggedToken {
    /// Token text as produced by the tokenizer
    pub token: String,

    /// Predicted tag name
    pub tag: String,

    /// Softmax probability of the predicted tag, in [0, 1]
    pub score: f32,

    /// Sub-sampled audio frame this token attends to most
    pub frame: usize,
}

/// Tagged tokens of one utterance, keyed by its id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaggedUtterance {
    pub id:     String,
    pub tokens: Vec<TaggedToken>,
}
