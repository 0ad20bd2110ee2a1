// ============================================================
// Layer 6 — Infrastructure Layer
// ============================================================
// Persistence shared by the init, inspect and predict flows:
//
//   checkpoint.rs      — prosody_config.json plus the model
//                        record (full-precision MessagePack), and
//                        loaders for pretrained ASR / BERT
//                        component weights.
//
//   tokenizer_store.rs — the BERT WordPiece tokenizer, loaded
//                        from tokenizer.json or assembled from
//                        a vocab.txt.
//
// Reference: Burn Book §5 (Checkpointing)

/// Model config and weight persistence
pub mod checkpoint;

/// BERT tokenizer loading
pub mod tokenizer_store;
