// ============================================================
// Layer 6 — Infrastructure Layer
// ============================================================
// Everything that touches the filesystem outside the corpus:
//
//   pretrained.rs — Pretrained encoder artefacts
//                   Loads a HuggingFace snapshot: config.json,
//                   safetensors / PyTorch weights (burn-store)
//                   and the tokenizer for a named encoder.
//
//   metrics.rs    — Epoch log
//                   Writes per-epoch training loss and time
//                   to a CSV file.
//
//   report.rs     — Classification report
//                   Computes precision / recall / F1 /
//                   support and writes the final table.
//
// Reference: Rust Book §7 (Modules)
//            Burn Book §5 (Checkpointing)

/// Pretrained encoder, weights and tokenizer loading
pub mod pretrained;

/// Per-epoch training CSV log
pub mod metrics;

/// Evaluation metrics and report file
pub mod report;
