// ============================================================
// Layer 3 — Core Traits (Abstractions)
// ============================================================
// The application layer talks to these traits, not to the
// concrete loader or model, so either side can be replaced.

use anyhow::Result;

use crate::domain::{
    tags::{TaggedToken, TaggedUtterance},
    utterance::Utterance,
};

// ─── FeatureSource ────────────────────────────────────────────────────────────
/// Anything that can hand over utterances with extracted features.
///
/// Implementations:
///   - FeatureLoader → JSON utterance files on disk
pub trait FeatureSource {
    fn load_all(&self) -> Result<Vec<Utterance>>;
}

// ─── ProsodyPredictor ─────────────────────────────────────────────────────────
/// Anything that can tag the tokens of an utterance.
///
/// Implementations:
///   - PredictUseCase → the cross-modal transformer model
pub trait ProsodyPredictor {
    /// One TaggedToken per non-special token of the transcript.
    fn predict(&self, utterance: &Utterance) -> Result<Vec<TaggedToken>>;

    /// Tag several utterances, skipping (with a warning) any that
    /// cannot be tagged. The default runs them one at a time.
    fn predict_all(&self, utterances: &[Utterance]) -> Result<Vec<TaggedUtterance>> {
        let mut out = Vec::with_capacity(utterances.len());
        for utt in utterances {
            match self.predict(utt) {
                Ok(tokens) => out.push(TaggedUtterance { id: utt.id.clone(), tokens }),
                Err(e)     => tracing::warn!("Skipping '{}': {:#}", utt.id, e),
            }
        }
        Ok(out)
    }
}
