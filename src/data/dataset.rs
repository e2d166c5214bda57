use burn::data::dataset::Dataset;

use crate::domain::error::PipelineError;
use crate::domain::example::{Example, Label};
use crate::domain::traits::ExampleSource;

/// All examples of one corpus split, loaded eagerly and read-only afterwards.
pub struct ExampleStore {
    examples: Vec<Example>,
}

impl ExampleStore {
    pub fn new(examples: Vec<Example>) -> Self {
        Self { examples }
    }

    pub fn load(source: &impl ExampleSource) -> Result<Self, PipelineError> {
        let store = Self::new(source.load_all()?);
        let (negative, positive) = store.class_counts();
        tracing::info!(
            "Loaded {} examples from '{}' ({} negative, {} positive)",
            store.size(),
            source.name(),
            negative,
            positive,
        );
        Ok(store)
    }

    pub fn size(&self) -> usize {
        self.examples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.examples.is_empty()
    }

    /// Borrowing accessor used by the collator; `Dataset::get` clones.
    pub fn example(&self, index: usize) -> Option<&Example> {
        self.examples.get(index)
    }

    /// (negative, positive) counts.
    pub fn class_counts(&self) -> (usize, usize) {
        let positive = self.examples.iter().filter(|e| e.label == Label::Positive).count();
        (self.examples.len() - positive, positive)
    }
}

impl Dataset<Example> for ExampleStore {
    fn get(&self, index: usize) -> Option<Example> {
        self.examples.get(index).cloned()
    }

    fn len(&self) -> usize {
        self.examples.len()
    }
}
