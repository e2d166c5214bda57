// ============================================================
// Layer 5 — Classification Head
// ============================================================
// pooled encoder vector [B, H] → Linear(H, 1) → logit [B]
//                                            → sigmoid → p [B]
//
// The same module runs in both modes:
//   - on an Autodiff backend → gradients are tracked (training)
//   - after model.valid()    → inner backend, no graph, no
//                              dropout (evaluation)
//
// Loss is binary cross-entropy computed from the logit via
// log_sigmoid, which equals BCE on the sigmoid output without
// taking log(0) when the sigmoid saturates.

use burn::{
    nn::{Linear, LinearConfig},
    prelude::*,
    tensor::activation::{log_sigmoid, sigmoid},
};

use crate::data::batcher::{MiniBatch, TokenizedInput};
use crate::ml::encoder::TextEncoder;

#[derive(Module, Debug)]
pub struct ClassificationHead<B: Backend> {
    pub encoder:    TextEncoder<B>,
    pub classifier: Linear<B>,
}

impl<B: Backend> ClassificationHead<B> {
    /// Wrap a (pretrained) encoder with a freshly initialised projection.
    pub fn new(encoder: TextEncoder<B>, device: &B::Device) -> Self {
        let classifier = LinearConfig::new(encoder.hidden_size, 1).init(device);
        Self { encoder, classifier }
    }

    /// Raw scores: [batch]
    pub fn forward_logits(&self, inputs: &TokenizedInput<B>) -> Tensor<B, 1> {
        let [batch_size, _] = inputs.dims();
        let pooled = self.encoder.pooled(inputs);
        self.classifier.forward(pooled).reshape([batch_size])
    }

    /// Positive-class probabilities in [0, 1]: [batch]
    pub fn forward(&self, inputs: &TokenizedInput<B>) -> Tensor<B, 1> {
        sigmoid(self.forward_logits(inputs))
    }

    /// Mean BCE over the batch, scaled by `weight`: shape [1]
    pub fn forward_loss(&self, batch: &MiniBatch<B>, weight: f64) -> Tensor<B, 1> {
        let logits  = self.forward_logits(&batch.inputs);
        let targets = batch.labels.clone().float();
        binary_cross_entropy_with_logits(logits, targets).mul_scalar(weight)
    }
}

/// Mean of `-(y·log σ(z) + (1-y)·log σ(-z))` over the batch.
pub fn binary_cross_entropy_with_logits<B: Backend>(
    logits:  Tensor<B, 1>,
    targets: Tensor<B, 1>,
) -> Tensor<B, 1> {
    let positive = log_sigmoid(logits.clone()) * targets.clone();
    let negative = log_sigmoid(logits.neg()) * targets.neg().add_scalar(1.0);
    (positive + negative).neg().mean()
}
