// ============================================================
// Layer 3 — Domain Layer
// ============================================================
// Plain Rust structs and traits describing what the system
// works with: utterances going in, tagged tokens coming out.
//
// Rules for this layer:
//   - NO Burn framework types allowed here
//   - NO file I/O
//   - Only plain Rust structs, enums, and traits
//
// Reference: Rust Book §5 (Structs), §10 (Traits)

// One spoken utterance: transcript plus acoustic frames
pub mod utterance;

// Tag vocabulary and per-token predictions
pub mod tags;

// Core abstractions (traits) that other layers implement
pub mod traits;
