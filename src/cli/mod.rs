// ============================================================
// Layer 1 — CLI / Presentation Layer
// ============================================================
// Parses the run options with clap, picks the backend and its
// devices, and hands everything else to Layer 2.
//
// Reference: Rust Book §7 (Modules), §12 (CLI programs)

pub mod commands;

use anyhow::Result;
use burn::backend::{
    ndarray::NdArrayDevice,
    wgpu::WgpuDevice,
    Autodiff, NdArray, Wgpu,
};
use clap::Parser;
use commands::{BackendKind, RunArgs};

use crate::application::finetune_use_case::{FineTuneUseCase, RunConfig};

#[derive(Parser, Debug)]
#[command(
    name = "sentiment-finetune",
    version = "0.1.0",
    about = "Fine-tune a pretrained encoder for binary sentiment classification and report test metrics."
)]
pub struct Cli {
    #[command(flatten)]
    pub args: RunArgs,
}

impl Cli {
    pub fn run(self) -> Result<()> {
        let backend = self.args.backend;
        let config: RunConfig = self.args.into();
        let replicas = config.devices;
        let use_case = FineTuneUseCase::new(config);

        tracing::info!("Backend {:?} with {} replica(s)", backend, replicas);
        match backend {
            BackendKind::Wgpu    => use_case.execute::<Autodiff<Wgpu>>(wgpu_devices(replicas))?,
            BackendKind::Ndarray => use_case.execute::<Autodiff<NdArray>>(vec![NdArrayDevice::Cpu; replicas])?,
        };
        Ok(())
    }
}

/// One discrete adapter per replica; a single replica uses the default adapter.
fn wgpu_devices(replicas: usize) -> Vec<WgpuDevice> {
    if replicas == 1 {
        vec![WgpuDevice::default()]
    } else {
        (0..replicas).map(WgpuDevice::DiscreteGpu).collect()
    }
}
