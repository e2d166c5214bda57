// ============================================================
// Layer 3 — Domain Layer
// ============================================================
// Plain Rust types that define what the pipeline talks about:
// examples, labels, prediction records, and the error taxonomy.
//
// Rules for this layer:
//   - NO Burn framework types
//   - NO file I/O
//   - Only plain structs, enums, and traits
//
// Reference: Rust Book §5 (Structs), §10 (Traits)

// A labelled sentence and its binary label
pub mod example;

// Gold/predicted pairs and the decision threshold
pub mod prediction;

// Fatal error kinds raised by the pipeline
pub mod error;

// Core abstractions (traits) that other layers implement
pub mod traits;
