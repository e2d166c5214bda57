// ============================================================
// Layer 3 — Core Traits (Abstractions)
// ============================================================
// The corpus is an external collaborator. The rest of the
// pipeline only sees ExampleSource, so a JSON file, an
// in-memory fixture, or any other store can feed it.
//
// Reference: Rust Book §10 (Traits: Defining Shared Behaviour)

use crate::domain::error::PipelineError;
use crate::domain::example::Example;

// ─── ExampleSource ────────────────────────────────────────────────────────────
/// Anything that can produce the full, ordered list of labelled examples.
///
/// Implementations:
///   - JsonCorpus → a JSON array of `{text, label}` records on disk
///   - Vec<Example> → in-memory fixtures
pub trait ExampleSource {
    /// Human-readable name used in diagnostics.
    fn name(&self) -> String;

    /// Load every example, failing on the first malformed record.
    fn load_all(&self) -> Result<Vec<Example>, PipelineError>;
}

impl ExampleSource for Vec<Example> {
    fn name(&self) -> String {
        "<memory>".to_string()
    }

    fn load_all(&self) -> Result<Vec<Example>, PipelineError> {
        Ok(self.clone())
    }
}
