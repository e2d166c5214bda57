// ============================================================
// Layer 1 — CLI Arguments
// ============================================================
// Every run option as a --flag. clap's derive macros generate
// help text, missing-value errors and type conversion.
//
// Reference: Rust Book §12 (Building a CLI Program)

use clap::{Args, ValueEnum};
use std::path::PathBuf;

use crate::application::finetune_use_case::RunConfig;

/// Compute backend for the replicas
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendKind {
    /// GPU via wgpu; one discrete adapter per replica
    Wgpu,
    /// CPU; every replica shares the host
    Ndarray,
}

#[derive(Args, Debug)]
pub struct RunArgs {
    /// JSON array of {text, label} records to train on
    #[arg(long, default_value = "data/nsmc_data/nsmc_train.json")]
    pub train_file: PathBuf,

    /// JSON array of {text, label} records to evaluate on
    #[arg(long, default_value = "data/nsmc_data/nsmc_test.json")]
    pub test_file: PathBuf,

    /// Pretrained encoder name, resolved under --models-dir
    #[arg(long, default_value = "klue/roberta-base")]
    pub encoder: String,

    /// Directory of HuggingFace snapshots, one per encoder name
    #[arg(long, default_value = "models")]
    pub models_dir: PathBuf,

    /// Report file; overwritten on every run
    #[arg(long, default_value = "data/report_roberta-base.txt")]
    pub report: PathBuf,

    /// Global mini-batch size, split across the replicas
    #[arg(long, default_value_t = 256)]
    pub batch_size: usize,

    #[arg(long, default_value_t = 1e-5)]
    pub lr: f64,

    #[arg(long, default_value_t = 10)]
    pub epochs: usize,

    /// Number of data-parallel replicas (one per device)
    #[arg(long, default_value_t = 4)]
    pub devices: usize,

    /// Probabilities at or above this are predicted positive
    #[arg(long, default_value_t = 0.5)]
    pub threshold: f32,

    /// AdamW decoupled weight decay
    #[arg(long, default_value_t = 0.01)]
    pub weight_decay: f64,

    /// Seed for the per-epoch shuffle
    #[arg(long, default_value_t = 42)]
    pub seed: u64,

    /// Maximum tokens per sentence; capped by the encoder's position table
    #[arg(long, default_value_t = 512)]
    pub max_length: usize,

    #[arg(long, value_enum, default_value_t = BackendKind::Wgpu)]
    pub backend: BackendKind,
}

/// The application layer never sees clap types.
impl From<RunArgs> for RunConfig {
    fn from(a: RunArgs) -> Self {
        RunConfig {
            train_file:   a.train_file,
            test_file:    a.test_file,
            encoder:      a.encoder,
            models_dir:   a.models_dir,
            report:       a.report,
            batch_size:   a.batch_size,
            lr:           a.lr,
            epochs:       a.epochs,
            devices:      a.devices,
            threshold:    a.threshold,
            weight_decay: a.weight_decay,
            seed:         a.seed,
            max_length:   a.max_length,
        }
    }
}
