// ============================================================
// Layer 2 — FineTuneUseCase
// ============================================================
// Orchestrates the full fine-tuning run in order:
//
//   Step 1: Validate the run config
//   Step 2: Load train / test corpora       (Layer 4 - data)
//   Step 3: Load pretrained encoder,
//           tokenizer and build collator    (Layer 6 - infra)
//   Step 4: Wrap encoder in the head,
//           build AdamW + parameter store   (Layer 5 - ml)
//   Step 5: Data-parallel training loop     (Layer 5 - ml)
//   Step 6: Evaluate on the test split      (Layer 5 - ml)
//   Step 7: Compute and write the report    (Layer 6 - infra)
//
// Every step attaches its phase name to errors, so a failed
// run ends with e.g. "train step 12 of epoch 3: ...".
//
// Reference: Rust Book §9 (Error Handling)
//            Burn Book §5 (Training)

use anyhow::{bail, Context, Result};
use burn::{module::AutodiffModule, optim::AdamWConfig, tensor::backend::AutodiffBackend};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::data::{batcher::Collator, dataset::ExampleStore, loader::JsonCorpus, sampler::BatchSampler};
use crate::infra::{
    metrics::EpochLog,
    pretrained::PretrainedStore,
    report::ClassificationReport,
};
use crate::ml::{
    evaluator::Evaluator,
    head::ClassificationHead,
    trainer::{run_training, ParameterStore, TrainingEngine},
};

/// AdamW epsilon
const ADAM_EPSILON: f32 = 1e-8;

// ─── Run Configuration ────────────────────────────────────────────────────────
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunConfig {
    pub train_file:   PathBuf,
    pub test_file:    PathBuf,
    pub encoder:      String,
    pub models_dir:   PathBuf,
    pub report:       PathBuf,
    pub batch_size:   usize,
    pub lr:           f64,
    pub epochs:       usize,
    pub devices:      usize,
    pub threshold:    f32,
    pub weight_decay: f64,
    pub seed:         u64,
    pub max_length:   usize,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            train_file:   "data/nsmc_data/nsmc_train.json".into(),
            test_file:    "data/nsmc_data/nsmc_test.json".into(),
            encoder:      "klue/roberta-base".to_string(),
            models_dir:   "models".into(),
            report:       "data/report_roberta-base.txt".into(),
            batch_size:   256,
            lr:           1e-5,
            epochs:       10,
            devices:      4,
            threshold:    0.5,
            weight_decay: 0.01,
            seed:         42,
            max_length:   512,
        }
    }
}

impl RunConfig {
    pub fn validate(&self) -> Result<()> {
        for (name, value) in [
            ("batch_size", self.batch_size),
            ("epochs", self.epochs),
            ("devices", self.devices),
            ("max_length", self.max_length),
        ] {
            if value == 0 {
                bail!("{name} must be at least 1");
            }
        }
        if !(self.lr.is_finite() && self.lr > 0.0) {
            bail!("learning rate must be positive and finite, got {}", self.lr);
        }
        if !(self.threshold > 0.0 && self.threshold < 1.0) {
            bail!("threshold must lie strictly between 0 and 1, got {}", self.threshold);
        }
        if !(self.weight_decay.is_finite() && self.weight_decay >= 0.0) {
            bail!("weight decay must be non-negative, got {}", self.weight_decay);
        }
        Ok(())
    }

    /// Training history is written next to the report.
    pub fn epoch_log_path(&self) -> PathBuf {
        self.report.with_extension("epochs.csv")
    }
}

// ─── FineTuneUseCase ──────────────────────────────────────────────────────────
pub struct FineTuneUseCase {
    config: RunConfig,
}

impl FineTuneUseCase {
    pub fn new(config: RunConfig) -> Self {
        Self { config }
    }

    /// Run the whole pipeline on `devices`; the first one is the primary
    /// device that owns the parameters and runs evaluation.
    pub fn execute<B: AutodiffBackend>(&self, devices: Vec<B::Device>) -> Result<ClassificationReport> {
        let cfg = &self.config;

        // ── Step 1: Validate ──────────────────────────────────────────────────
        cfg.validate().context("invalid run configuration")?;
        tracing::info!("Run config: {}", serde_json::to_string(cfg)?);

        // ── Step 2: Load corpora ──────────────────────────────────────────────
        let train = ExampleStore::load(&JsonCorpus::new(&cfg.train_file)).context("load")?;
        let test  = ExampleStore::load(&JsonCorpus::new(&cfg.test_file)).context("load")?;
        if train.is_empty() {
            bail!("load: training corpus '{}' is empty", cfg.train_file.display());
        }

        // ── Step 3: Pretrained encoder + tokenizer ────────────────────────────
        let engine    = TrainingEngine::<B>::new(devices)?;
        let device    = engine.primary_device().clone();
        let pretrained = PretrainedStore::new(&cfg.models_dir, &cfg.encoder);

        let encoder_config = pretrained.load_config().context("load")?;
        let encoder   = pretrained.load_encoder::<B>(&encoder_config, &device).context("load")?;
        let tokenizer = pretrained.load_tokenizer().context("load")?;

        let max_length = cfg.max_length.min(encoder_config.max_sequence_length());
        let collator   = Collator::new(tokenizer, max_length, encoder_config.uses_segments())
            .context("load")?;

        // ── Step 4: Head, optimizer, parameter store ──────────────────────────
        let model = ClassificationHead::new(encoder, &device);
        let optim = AdamWConfig::new()
            .with_weight_decay(cfg.weight_decay as f32)
            .with_epsilon(ADAM_EPSILON)
            .init();
        let store = ParameterStore::new(model, optim, cfg.lr);

        // ── Step 5: Train ─────────────────────────────────────────────────────
        let sampler = BatchSampler::shuffled(train.size(), cfg.batch_size, cfg.seed).context("train")?;
        let log     = EpochLog::create(cfg.epoch_log_path()).context("train")?;
        let store   = run_training(&engine, store, &collator, &train, &sampler, cfg.epochs, &log)?;
        tracing::info!("Training finished after {} optimizer steps", store.steps());

        // ── Step 6: Evaluate ──────────────────────────────────────────────────
        // valid() drops the autodiff graph and disables dropout
        let frozen  = store.into_model().valid();
        let records = Evaluator::new(cfg.threshold)
            .evaluate(&frozen, &collator, &test, cfg.batch_size, &device)
            .context("evaluate")?;

        // ── Step 7: Report ────────────────────────────────────────────────────
        let report = ClassificationReport::from_records(&records);
        report.write_to(&cfg.report).context("report")?;
        println!("{}", report.render());

        Ok(report)
    }
}
