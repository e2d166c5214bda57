// ============================================================
// Layer 3 — Prediction Record
// ============================================================
// A (gold, predicted) pair produced by the Evaluation Engine,
// one per test example, kept in split order.

use crate::domain::example::Label;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PredictionRecord {
    pub gold:      Label,
    pub predicted: Label,
}

impl PredictionRecord {
    pub fn new(gold: Label, predicted: Label) -> Self {
        Self { gold, predicted }
    }

    pub fn is_correct(&self) -> bool {
        self.gold == self.predicted
    }
}

/// Convert a probability into a label.
///
/// Round-half-up: a probability exactly equal to `threshold`
/// is classified as positive.
pub fn threshold_probability(probability: f32, threshold: f32) -> Label {
    if probability >= threshold {
        Label::Positive
    } else {
        Label::Negative
    }
}
