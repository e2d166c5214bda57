// ============================================================
// Layer 6 — Epoch Log
// ============================================================
// Records the training history to a CSV file, one row per epoch.
// The file is truncated at the start of every run, so it only
// ever describes the latest run.
//
// Example CSV output:
//   epoch,train_loss,seconds
//   1,0.412345,812.4
//   2,0.301122,809.9
//
// Reference: Rust Book §12 (I/O and File Handling)

use anyhow::{Context, Result};
use std::{
    fs::{self, OpenOptions},
    io::Write,
    path::{Path, PathBuf},
};

/// One row of training history
#[derive(Debug, Clone)]
pub struct EpochMetrics {
    /// Starts at 1
    pub epoch: usize,

    /// Mean of the per-step losses; every step counts equally
    pub train_loss: f64,

    /// Wall-clock time of the epoch
    pub seconds: f64,
}

impl EpochMetrics {
    pub fn new(epoch: usize, train_loss: f64, seconds: f64) -> Self {
        Self { epoch, train_loss, seconds }
    }
}

pub struct EpochLog {
    csv_path: PathBuf,
}

impl EpochLog {
    /// Create (or truncate) the CSV file and write its header.
    pub fn create(csv_path: impl AsRef<Path>) -> Result<Self> {
        let csv_path = csv_path.as_ref().to_path_buf();
        if let Some(parent) = csv_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .with_context(|| format!("Cannot create directory '{}'", parent.display()))?;
        }

        let mut f = fs::File::create(&csv_path)
            .with_context(|| format!("Cannot create epoch log '{}'", csv_path.display()))?;
        writeln!(f, "epoch,train_loss,seconds")?;
        tracing::debug!("Created epoch log: '{}'", csv_path.display());

        Ok(Self { csv_path })
    }

    /// Append one epoch as a new row.
    pub fn log(&self, m: &EpochMetrics) -> Result<()> {
        let mut f = OpenOptions::new()
            .append(true)
            .open(&self.csv_path)
            .with_context(|| format!("Cannot open epoch log '{}'", self.csv_path.display()))?;

        writeln!(f, "{},{:.6},{:.1}", m.epoch, m.train_loss, m.seconds)?;
        Ok(())
    }

    pub fn csv_path(&self) -> &Path {
        &self.csv_path
    }
}
