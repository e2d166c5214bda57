// ============================================================
// Layer 5 — Distributed Training Engine
// ============================================================
// One training step, with R replicas:
//
//   IDLE ─► FORWARD ─► BACKWARD ─► SYNC ─► STEP ─► IDLE
//
//   1. split the mini-batch into ≤ R contiguous shards
//   2. fork the current parameters onto each replica device
//   3. per shard (in parallel): mean BCE × (shard_len / B),
//      then backward
//   4. join, move every shard's gradients to the primary device
//      and sum them
//   5. one AdamW update on the single parameter store
//
// Scaling each shard's mean loss by shard_len / B before the
// backward pass makes the summed gradient equal to the gradient
// of the full-batch mean loss, even for an uneven last shard.
//
// Replicas are re-forked from the store on every step, so no
// step can see parameters older than the previous update.
//
// Reference: Burn Book §5 (Training), burn GradientsAccumulator
//            Loshchilov & Hutter (2019) AdamW

use anyhow::{Context, Result};
use burn::{
    module::{AutodiffModule, ModuleVisitor, Param},
    optim::{GradientsAccumulator, GradientsParams, Optimizer},
    prelude::*,
    tensor::backend::AutodiffBackend,
};
use std::{fmt, marker::PhantomData, time::Instant};

use crate::data::{batcher::{Collator, MiniBatch}, dataset::ExampleStore, sampler::BatchSampler};
use crate::domain::error::PipelineError;
use crate::domain::example::Example;
use crate::infra::metrics::{EpochLog, EpochMetrics};
use crate::ml::head::ClassificationHead;
use crate::ml::parallel::{fork_join, plan_shards};

// ─── Step phases ──────────────────────────────────────────────────────────────
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepPhase {
    Idle,
    Forward,
    Backward,
    Sync,
    Step,
}

impl fmt::Display for StepPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            StepPhase::Idle     => "idle",
            StepPhase::Forward  => "forward",
            StepPhase::Backward => "backward",
            StepPhase::Sync     => "sync",
            StepPhase::Step     => "step",
        };
        f.write_str(name)
    }
}

// ─── Parameter store ──────────────────────────────────────────────────────────
/// The single logical copy of the model parameters and the optimizer
/// that mutates them. Only `apply_update` writes to it.
pub struct ParameterStore<B, O>
where
    B: AutodiffBackend,
    O: Optimizer<ClassificationHead<B>, B>,
{
    model:         ClassificationHead<B>,
    optimizer:     O,
    learning_rate: f64,
    steps:         usize,
}

impl<B, O> ParameterStore<B, O>
where
    B: AutodiffBackend,
    O: Optimizer<ClassificationHead<B>, B>,
{
    pub fn new(model: ClassificationHead<B>, optimizer: O, learning_rate: f64) -> Self {
        Self { model, optimizer, learning_rate, steps: 0 }
    }

    pub fn model(&self) -> &ClassificationHead<B> {
        &self.model
    }

    /// Number of optimizer updates applied so far.
    pub fn steps(&self) -> usize {
        self.steps
    }

    /// Apply one combined gradient. Called exactly once per training step.
    pub fn apply_update(&mut self, grads: GradientsParams) {
        self.model = self.optimizer.step(self.learning_rate, self.model.clone(), grads);
        self.steps += 1;
    }

    pub fn into_model(self) -> ClassificationHead<B> {
        self.model
    }
}

// ─── Shard result ─────────────────────────────────────────────────────────────
struct ShardGradients {
    /// Shard mean loss already multiplied by shard_len / B
    weighted_loss: f64,
    grads:         GradientsParams,
}

// ─── Engine ───────────────────────────────────────────────────────────────────
pub struct TrainingEngine<B: AutodiffBackend> {
    devices: Vec<B::Device>,
}

impl<B: AutodiffBackend> TrainingEngine<B> {
    /// `devices[0]` is the primary device that holds the parameter store.
    pub fn new(devices: Vec<B::Device>) -> Result<Self> {
        anyhow::ensure!(!devices.is_empty(), "at least one device is required");
        Ok(Self { devices })
    }

    pub fn primary_device(&self) -> &B::Device {
        &self.devices[0]
    }

    pub fn replicas(&self) -> usize {
        self.devices.len()
    }

    /// Forward + backward on every shard and sum the weighted gradients.
    /// Returns the full-batch mean loss and the combined gradient, living
    /// on the primary device. Parameters are not touched.
    pub fn compute_gradients(
        &self,
        model: &ClassificationHead<B>,
        batch: &MiniBatch<B>,
    ) -> Result<(f64, GradientsParams), PipelineError> {
        let batch_size = batch.batch_size();
        let shards     = plan_shards(batch_size, self.replicas());

        let tasks: Vec<_> = shards
            .iter()
            .zip(self.devices.iter())
            .map(|(shard, device)| {
                let weight = shard.len as f64 / batch_size as f64;
                (model.clone(), batch.slice(shard.range()), device.clone(), weight)
            })
            .collect();

        tracing::trace!(phase = %StepPhase::Forward, shards = tasks.len(), "fork");
        let outcomes = fork_join(tasks, |replica, (model, shard, device, weight)| {
            let replica_model = model.fork(&device);
            let shard         = shard.to_device(&device);

            let loss = replica_model.forward_loss(&shard, weight);
            let weighted_loss: f64 = loss.clone().into_scalar().elem();

            tracing::trace!(phase = %StepPhase::Backward, replica, rows = shard.batch_size());
            let grads = GradientsParams::from_grads(loss.backward(), &replica_model);
            ShardGradients { weighted_loss, grads }
        })?;

        tracing::trace!(phase = %StepPhase::Sync, "join");
        let primary = self.primary_device();
        let mut accumulator = GradientsAccumulator::new();
        let mut loss = 0.0;
        for outcome in outcomes {
            loss += outcome.weighted_loss;
            accumulator.accumulate(model, outcome.grads.to_device(primary, model));
        }
        Ok((loss, accumulator.grads()))
    }

    /// One full step: gradients, finiteness checks, optimizer update.
    /// Returns the batch loss.
    pub fn train_step<O>(
        &self,
        store: &mut ParameterStore<B, O>,
        batch: &MiniBatch<B>,
    ) -> Result<f64, PipelineError>
    where
        O: Optimizer<ClassificationHead<B>, B>,
    {
        let (loss, grads) = self.compute_gradients(store.model(), batch)?;
        self.apply_gradients(store, loss, grads)
    }

    /// Check the combined loss and every parameter's gradient, then
    /// apply the update. A non-finite value leaves `store` untouched.
    pub fn apply_gradients<O>(
        &self,
        store: &mut ParameterStore<B, O>,
        loss:  f64,
        grads: GradientsParams,
    ) -> Result<f64, PipelineError>
    where
        O: Optimizer<ClassificationHead<B>, B>,
    {
        let step = store.steps() + 1;
        if !loss.is_finite() {
            return Err(PipelineError::NumericInstability {
                step,
                what:  "training loss".to_string(),
                value: loss,
            });
        }
        if let Some((param, value)) = first_non_finite_gradient::<B, _>(store.model(), &grads) {
            return Err(PipelineError::NumericInstability {
                step,
                what: format!("gradient of {param}"),
                value,
            });
        }

        tracing::trace!(phase = %StepPhase::Step, step, loss);
        store.apply_update(grads);
        tracing::trace!(phase = %StepPhase::Idle, step);
        Ok(loss)
    }

    /// Run one epoch over `examples`. Every step counts equally in the
    /// returned mean loss, whatever the size of the final batch.
    pub fn train_epoch<O>(
        &self,
        store:    &mut ParameterStore<B, O>,
        collator: &Collator,
        examples: &ExampleStore,
        sampler:  &BatchSampler,
        epoch:    usize,
    ) -> Result<f64>
    where
        O: Optimizer<ClassificationHead<B>, B>,
    {
        let batches     = sampler.epoch_batches(epoch);
        let num_batches = batches.len();
        let mut train_loss = 0.0f64;

        for (i, indices) in batches.iter().enumerate() {
            let step_in_epoch = i + 1;
            let batch_examples = gather(examples, indices)?;
            let batch = collator
                .collate::<B>(&batch_examples, self.primary_device())
                .with_context(|| format!("collate batch {step_in_epoch} of epoch {}", epoch + 1))?;

            let loss = self
                .train_step(store, &batch)
                .with_context(|| format!("train step {step_in_epoch} of epoch {}", epoch + 1))?;

            train_loss += loss / num_batches as f64;
            tracing::debug!(
                "epoch {} step {}/{} loss={:.5}",
                epoch + 1, step_in_epoch, num_batches, loss
            );
        }

        Ok(train_loss)
    }
}

// ─── Gradient check ───────────────────────────────────────────────────────────
/// Walks every float parameter, sums |grad| and keeps the first
/// non-finite total together with the parameter's module path.
struct NonFiniteGradient<'a, B: AutodiffBackend> {
    grads: &'a GradientsParams,
    path:  Vec<String>,
    found: Option<(String, f64)>,
    _backend: PhantomData<B>,
}

impl<B: AutodiffBackend> ModuleVisitor<B> for NonFiniteGradient<'_, B> {
    fn enter_module(&mut self, name: &str, _container_type: &str) {
        self.path.push(name.to_string());
    }

    fn exit_module(&mut self, _name: &str, _container_type: &str) {
        self.path.pop();
    }

    fn visit_float<const D: usize>(&mut self, param: &Param<Tensor<B, D>>) {
        if self.found.is_some() {
            return;
        }
        let Some(grad) = self.grads.get::<B::InnerBackend, D>(param.id) else {
            return;
        };
        let magnitude: f64 = grad.abs().sum().into_scalar().elem();
        if !magnitude.is_finite() {
            self.found = Some((self.path.join("."), magnitude));
        }
    }
}

/// The first parameter of `model` whose gradient holds a NaN or an
/// infinity, as (module path, sum of |grad|).
pub fn first_non_finite_gradient<B, M>(model: &M, grads: &GradientsParams) -> Option<(String, f64)>
where
    B: AutodiffBackend,
    M: AutodiffModule<B>,
{
    let mut visitor = NonFiniteGradient::<B> {
        grads,
        path:     Vec::new(),
        found:    None,
        _backend: PhantomData,
    };
    model.visit(&mut visitor);
    visitor.found
}

/// Borrow the examples for one batch, in sampler order.
pub fn gather<'a>(examples: &'a ExampleStore, indices: &[usize]) -> Result<Vec<&'a Example>> {
    indices
        .iter()
        .map(|&i| {
            examples
                .example(i)
                .with_context(|| format!("example index {i} out of range ({})", examples.size()))
        })
        .collect()
}

// ─── Training loop ────────────────────────────────────────────────────────────
/// Train for `epochs` epochs and return the final parameter store.
pub fn run_training<B, O>(
    engine:   &TrainingEngine<B>,
    mut store: ParameterStore<B, O>,
    collator: &Collator,
    examples: &ExampleStore,
    sampler:  &BatchSampler,
    epochs:   usize,
    log:      &EpochLog,
) -> Result<ParameterStore<B, O>>
where
    B: AutodiffBackend,
    O: Optimizer<ClassificationHead<B>, B>,
{
    tracing::info!(
        "Training on {} replica(s): {} examples, {} batches per epoch",
        engine.replicas(),
        examples.size(),
        sampler.num_batches(),
    );

    for epoch in 0..epochs {
        let start = Instant::now();
        let train_loss = engine.train_epoch(&mut store, collator, examples, sampler, epoch)?;
        let elapsed = start.elapsed().as_secs_f64();

        println!(
            "epoch : {}/{}    time : {:.0}s    ETA : {:.0}s",
            epoch + 1, epochs, elapsed, elapsed * (epochs - epoch - 1) as f64,
        );
        println!("TRAIN    loss : {:.5}", train_loss);
        tracing::info!(epoch = epoch + 1, train_loss, seconds = elapsed, "epoch finished");

        log.log(&EpochMetrics::new(epoch + 1, train_loss, elapsed))
            .with_context(|| format!("train: record epoch {}", epoch + 1))?;
    }

    tracing::info!("Training complete after {} optimizer steps", store.steps());
    Ok(store)
}
