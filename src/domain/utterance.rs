// ============================================================
// Layer 3 — Utterance Domain Type
// ============================================================
// One recorded sentence: its transcript and the acoustic
// feature frames extracted from the audio (MFCC or filterbank,
// one row per 10 ms frame, every row the same width).
//
// Feature extraction happens upstream; by the time an
// Utterance exists the frames are plain numbers.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Utterance {
    /// Identifier kept for traceability in the output
    pub id: String,

    /// Transcript whose tokens receive prosody tags
    pub text: String,

    /// Acoustic frames, [num_frames][feature_dim]
    pub frames: Vec<Vec<f32>>,
}

impl Utterance {
    pub fn new(id: impl Into<String>, text: impl Into<String>, frames: Vec<Vec<f32>>) -> Self {
        Self {
            id:   id.into(),
            text: text.into(),
            frames,
        }
    }

    pub fn num_frames(&self) -> usize {
        self.frames.len()
    }

    /// Width of the first frame, or 0 for an utterance without frames.
    pub fn feature_dim(&self) -> usize {
        self.frames.first().map_or(0, Vec::len)
    }

    /// True when every frame has the same width.
    pub fn is_rectangular(&self) -> bool {
        let dim = self.feature_dim();
        self.frames.iter().all(|f| f.len() == dim)
    }
}
