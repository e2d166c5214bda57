// ============================================================
// Layer 5 — Evaluation Engine
// ============================================================
// Runs the trained head over the held-out split with no
// gradient tracking: the caller passes `model.valid()`, which
// lives on the inner (non-autodiff) backend and has dropout
// switched off. Nothing here can mutate parameters.
//
// Every probability is thresholded (round-half-up) and paired
// with its gold label, in split order. An evaluation loss is
// also computed, but only for diagnostics.

use anyhow::{Context, Result};
use burn::{prelude::*, tensor::activation::sigmoid};

use crate::data::{batcher::{Collator, MiniBatch}, dataset::ExampleStore, sampler::BatchSampler};
use crate::domain::example::Label;
use crate::domain::prediction::{threshold_probability, PredictionRecord};
use crate::ml::head::{binary_cross_entropy_with_logits, ClassificationHead};
use crate::ml::trainer::gather;

/// How often (in batches) to log evaluation progress
const PROGRESS_EVERY: usize = 20;

pub struct Evaluator {
    threshold: f32,
}

impl Evaluator {
    pub fn new(threshold: f32) -> Self {
        Self { threshold }
    }

    /// Predictions and mean BCE for one batch.
    pub fn evaluate_batch<B: Backend>(
        &self,
        model: &ClassificationHead<B>,
        batch: &MiniBatch<B>,
    ) -> (Vec<PredictionRecord>, f64) {
        let logits = model.forward_logits(&batch.inputs);
        let loss: f64 = binary_cross_entropy_with_logits(logits.clone(), batch.labels.clone().float())
            .into_scalar()
            .elem();
        let probabilities = sigmoid(logits);

        let gold: Vec<Label> = batch.label_values();
        let records = probabilities
            .into_data()
            .iter::<f32>()
            .zip(gold)
            .map(|(p, gold)| PredictionRecord::new(gold, threshold_probability(p, self.threshold)))
            .collect();
        (records, loss)
    }

    /// Evaluate the whole split in order.
    pub fn evaluate<B: Backend>(
        &self,
        model:      &ClassificationHead<B>,
        collator:   &Collator,
        examples:   &ExampleStore,
        batch_size: usize,
        device:     &B::Device,
    ) -> Result<Vec<PredictionRecord>> {
        let sampler = BatchSampler::sequential(examples.size(), batch_size)?;
        let total   = sampler.num_batches();

        let mut records  = Vec::with_capacity(examples.size());
        let mut loss_sum = 0.0f64;

        for (i, indices) in sampler.epoch_batches(0).iter().enumerate() {
            let refs  = gather(examples, indices)?;
            let batch = collator
                .collate::<B>(&refs, device)
                .with_context(|| format!("collate evaluation batch {}", i + 1))?;

            let (batch_records, loss) = self.evaluate_batch(model, &batch);
            tracing::debug!("eval batch {}/{} loss={:.5}", i + 1, total, loss);
            records.extend(batch_records);
            loss_sum += loss;

            if (i + 1) % PROGRESS_EVERY == 0 {
                tracing::info!("Evaluated {}/{} batches", i + 1, total);
            }
        }

        if total > 0 {
            tracing::info!(
                "Evaluation done: {} examples, mean loss {:.5}",
                records.len(),
                loss_sum / total as f64
            );
        }
        Ok(records)
    }
}
