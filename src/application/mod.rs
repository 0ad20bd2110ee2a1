// ============================================================
// Layer 2 — Application / Use Cases
// ============================================================
// Each use case coordinates the other layers for one command.
//
// Rules for this layer:
//   - No model code here (that's Layer 5)
//   - No printing here (that's Layer 1)
//   - File access goes through Layers 4 and 6
//
// Reference: Clean Architecture pattern
//            Rust Book §7 (Module System)

// Build and save a fresh model
pub mod init_use_case;

// Parameter counts and a shape check on random input
pub mod inspect_use_case;

// Tag utterance files with a saved model
pub mod predict_use_case;
