// ============================================================
// Layer 4 — Data Pipeline
// ============================================================
// Everything between the JSON corpus files and the tensor
// batches the model consumes.
//
// The pipeline flows in this order:
//
//   JSON corpus file
//       │
//       ▼
//   JsonCorpus        → parses records, validates labels
//       │
//       ▼
//   ExampleStore      → owns every Example, indexed access
//       │
//       ▼
//   BatchSampler      → per-epoch index chunks (seeded shuffle)
//       │
//       ▼
//   Collator          → tokenises one chunk, pads it to the
//                       longest sequence in that chunk only
//       │
//       ▼
//   MiniBatch         → ids / mask / segments + labels
//
// Reference: Burn Book §4 (Datasets and Dataloaders)
//            Rust Book §13 (Iterators and Closures)

/// Reads `{text, label}` records from a JSON array file
pub mod loader;

/// In-memory example store (implements Burn's Dataset trait)
pub mod dataset;

/// Per-epoch batch index generation
pub mod sampler;

/// Tokenisation and dynamic padding into tensors
pub mod batcher;
