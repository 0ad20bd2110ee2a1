// ============================================================
// Layer 4 — Data Pipeline
// ============================================================
// Everything between utterance files on disk and the tensors
// the model consumes:
//
//   *.json utterances
//       │
//       ▼
//   FeatureLoader     → reads id, transcript and feature frames
//       │
//       ▼
//   Preprocessor      → cleans the transcript, CMVN on the frames
//       │
//       ▼
//   Tokenizer         → transcript to [CLS] … [SEP] token ids
//       │
//       ▼
//   ProsodySample     → one utterance ready for batching
//       │
//       ▼
//   ProsodyBatcher    → pads samples into tensor batches
//
// Reference: Burn Book §4 (Datasets and Dataloaders)

/// Loads utterance JSON files
pub mod loader;

/// Transcript cleanup and feature normalisation
pub mod preprocessor;

/// ProsodySample and the in-memory dataset
pub mod dataset;

/// Pads samples into a ProsodyBatch
pub mod batcher;
