// ============================================================
// Layer 3 — Pipeline Error Taxonomy
// ============================================================
// Every failure the pipeline can raise on its own. All of them
// are fatal: the application layer wraps them with the phase
// (load / collate / train step / evaluate / report) and returns
// them from main.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum PipelineError {
    /// Bad or missing fields in a corpus file.
    #[error("corpus format error in '{source_name}': {message}")]
    CorpusFormat { source_name: String, message: String },

    /// The tokenizer rejected a batch of texts.
    #[error("tokenization error: {0}")]
    Tokenization(String),

    /// Loss or gradient became NaN or infinite.
    #[error("numeric instability at step {step}: {what} is {value}")]
    NumericInstability { step: usize, what: String, value: f64 },

    /// A replica could not complete its shard (device memory or compute).
    #[error("resource exhaustion on replica {replica}: {message}")]
    ResourceExhaustion { replica: usize, message: String },
}

impl PipelineError {
    pub fn corpus(source_name: impl Into<String>, message: impl Into<String>) -> Self {
        PipelineError::CorpusFormat {
            source_name: source_name.into(),
            message:     message.into(),
        }
    }
}
