// ============================================================
// Layer 5 — ML / Model Layer (Burn)
// ============================================================
// All Burn model, training and evaluation code lives here.
//
//   encoder.rs   — Transformer text encoder
//                  Token, position and segment embeddings,
//                  N encoder blocks, first-token pooler.
//
//   head.rs      — Binary classification head
//                  pooled vector → Linear(H, 1) → sigmoid,
//                  plus the BCE loss.
//
//   parallel.rs  — Shard planning and the fork-join helper
//                  used to run one replica per device.
//
//   trainer.rs   — Data-parallel training engine
//                  Shard, forward/backward per replica,
//                  weighted gradient sync, one AdamW step.
//
//   evaluator.rs — Evaluation engine
//                  No-grad forward pass over the test split,
//                  thresholding into prediction records.
//
// Reference: Burn Book §3 (Building Blocks)
//            Burn Book §5 (Training)
//            Vaswani et al. (2017) Attention Is All You Need
//            Devlin et al. (2019) BERT

/// Transformer encoder with a pooled output
pub mod encoder;

/// Encoder + linear projection + sigmoid
pub mod head;

/// Shards and scoped-thread fork-join
pub mod parallel;

/// Multi-replica training loop
pub mod trainer;

/// Thresholded predictions over a held-out split
pub mod evaluator;
