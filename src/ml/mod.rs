// ============================================================
// Layer 5 — ML / Model Layer (Burn)
// ============================================================
// All Burn module code lives here; the other layers only see
// ProsodyConfig, ProsodyExtractor and the Tagger.
//
//   layers.rs        — positional encoding, feed-forward, pre-norm
//                      encoder and decoder layers
//   subsampling.rs   — Conv2d 4x sub-sampling, pad-mask helpers,
//                      the SubSampler front end
//   conformer.rs     — Conformer encoder (macaron FFN, conv module)
//   audio_encoder.rs — transformer stack over the audio frames
//   bert.rs          — BERT text encoder and its HF config.json
//   decoder.rs       — text queries attending to the audio
//   model.rs         — the full ProsodyExtractor graph
//   config.rs        — serialisable hyperparameters + validation
//   inferencer.rs    — Tagger: checks, batching, argmax decoding
//
// Reference: Burn Book §3 (Building Blocks)
//            Vaswani et al. (2017) Attention Is All You Need
//            Gulati et al. (2020) Conformer
//            Devlin et al. (2019) BERT

pub mod error;

pub mod layers;

pub mod subsampling;

pub mod conformer;

pub mod audio_encoder;

pub mod bert;

pub mod decoder;

pub mod config;

/// Full prosody model and its constructor
pub mod model;

/// Runs the model on prepared samples
pub mod inferencer;
