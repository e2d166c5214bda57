// ============================================================
// Layer 4 — Corpus Loader
// ============================================================
// Reads one corpus split from a JSON file.
//
// Expected layout: a JSON array of records
//   [
//     {"text": "재밌어요", "label": 1},
//     {"text": "별로",     "label": "0"},
//     ...
//   ]
//
// The label may be an integer or a string holding an integer,
// and must be 0 or 1. Extra fields are ignored. Any malformed
// record fails the whole load; nothing is skipped.
//
// Reference: serde_json documentation (untagged enums)

use serde::Deserialize;
use std::{fs, path::PathBuf};

use crate::domain::error::PipelineError;
use crate::domain::example::{Example, Label};
use crate::domain::traits::ExampleSource;

#[derive(Debug, Deserialize)]
struct RawRecord {
    text:  String,
    label: RawLabel,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawLabel {
    Int(i64),
    Text(String),
}

impl RawLabel {
    fn resolve(&self) -> Option<Label> {
        match self {
            RawLabel::Int(v)  => Label::from_int(*v),
            RawLabel::Text(s) => s.trim().parse::<i64>().ok().and_then(Label::from_int),
        }
    }
}

/// A JSON corpus file on disk.
pub struct JsonCorpus {
    path: PathBuf,
}

impl JsonCorpus {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Parse corpus JSON from memory. `name` is used in error messages.
    pub fn parse(name: &str, json: &str) -> Result<Vec<Example>, PipelineError> {
        let records: Vec<serde_json::Value> = serde_json::from_str(json)
            .map_err(|e| PipelineError::corpus(name, format!("expected a JSON array of records: {e}")))?;

        records
            .into_iter()
            .enumerate()
            .map(|(index, value)| {
                let raw: RawRecord = serde_json::from_value(value)
                    .map_err(|e| PipelineError::corpus(name, format!("record {index}: {e}")))?;
                let label = raw.label.resolve().ok_or_else(|| {
                    PipelineError::corpus(
                        name,
                        format!("record {index}: label {:?} is not 0 or 1", raw.label),
                    )
                })?;
                Ok(Example::new(raw.text, label))
            })
            .collect()
    }
}

impl ExampleSource for JsonCorpus {
    fn name(&self) -> String {
        self.path.display().to_string()
    }

    fn load_all(&self) -> Result<Vec<Example>, PipelineError> {
        let name = self.name();
        let json = fs::read_to_string(&self.path)
            .map_err(|e| PipelineError::corpus(&name, format!("cannot read file: {e}")))?;
        let examples = Self::parse(&name, &json)?;
        tracing::debug!("Parsed {} records from '{}'", examples.len(), name);
        Ok(examples)
    }
}
