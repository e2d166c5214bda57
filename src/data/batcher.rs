// ============================================================
// Layer 4 — Batch Collator
// ============================================================
// Turns a handful of raw examples into device tensors.
//
// Dynamic padding:
//   The tokenizer is called ONCE per batch and pads every row
//   to the longest sequence in THAT batch (BatchLongest), not
//   to a corpus-wide length. A batch of short reviews stays
//   short; only batches with a long review pay for it.
//
//   Input:  B examples
//   Output: MiniBatch with
//             input_ids       [B, L]
//             attention_mask  [B, L]   (0 = padding)
//             token_type_ids  [B, L]   (only if the encoder uses segments)
//             labels          [B]
//
// Labels are emitted in exactly the order of the examples,
// which is what makes the loss and the metrics line up.
//
// Reference: Burn Book §4 (Batcher)
//            HuggingFace tokenizers (PaddingStrategy::BatchLongest)

use burn::prelude::*;
use std::ops::Range;
use tokenizers::{PaddingParams, PaddingStrategy, Tokenizer, TruncationParams};

use crate::domain::error::PipelineError;
use crate::domain::example::{Example, Label};

// ─── TokenizedInput ───────────────────────────────────────────────────────────
/// Encoder inputs for one batch. Every tensor has shape [batch, seq_len].
#[derive(Debug, Clone)]
pub struct TokenizedInput<B: Backend> {
    pub input_ids:      Tensor<B, 2, Int>,
    /// 1 = real token, 0 = padding
    pub attention_mask: Tensor<B, 2, Int>,
    pub token_type_ids: Option<Tensor<B, 2, Int>>,
}

impl<B: Backend> TokenizedInput<B> {
    /// [batch, seq_len]
    pub fn dims(&self) -> [usize; 2] {
        self.input_ids.dims()
    }

    /// Rows `range` of every field.
    pub fn slice(&self, range: Range<usize>) -> Self {
        let [_, seq_len] = self.dims();
        let rows = |t: &Tensor<B, 2, Int>| t.clone().slice([range.clone(), 0..seq_len]);
        Self {
            input_ids:      rows(&self.input_ids),
            attention_mask: rows(&self.attention_mask),
            token_type_ids: self.token_type_ids.as_ref().map(rows),
        }
    }

    pub fn to_device(self, device: &B::Device) -> Self {
        Self {
            input_ids:      self.input_ids.to_device(device),
            attention_mask: self.attention_mask.to_device(device),
            token_type_ids: self.token_type_ids.map(|t| t.to_device(device)),
        }
    }
}

// ─── MiniBatch ────────────────────────────────────────────────────────────────
#[derive(Debug, Clone)]
pub struct MiniBatch<B: Backend> {
    pub inputs: TokenizedInput<B>,
    /// Gold labels as 0/1, shape [batch]
    pub labels: Tensor<B, 1, Int>,
}

impl<B: Backend> MiniBatch<B> {
    pub fn batch_size(&self) -> usize {
        self.labels.dims()[0]
    }

    /// Contiguous sub-batch used as one replica's shard.
    pub fn slice(&self, range: Range<usize>) -> Self {
        Self {
            inputs: self.inputs.slice(range.clone()),
            labels: self.labels.clone().slice([range]),
        }
    }

    pub fn to_device(self, device: &B::Device) -> Self {
        Self {
            inputs: self.inputs.to_device(device),
            labels: self.labels.to_device(device),
        }
    }

    /// Read the gold labels back to the host, in batch order.
    pub fn label_values(&self) -> Vec<Label> {
        self.labels
            .clone()
            .into_data()
            .iter::<i64>()
            .map(|v| if v == 0 { Label::Negative } else { Label::Positive })
            .collect()
    }
}

// ─── Collator ─────────────────────────────────────────────────────────────────
/// Holds the tokenizer, configured once for dynamic padding and truncation.
/// Collating has no other state: the same examples always give the same batch.
#[derive(Clone)]
pub struct Collator {
    tokenizer:     Tokenizer,
    with_segments: bool,
}

impl Collator {
    /// Configure `tokenizer` for per-batch padding and truncation at `max_length`.
    ///
    /// `with_segments` adds token_type_ids to every batch; set it only when
    /// the encoder has a segment vocabulary.
    pub fn new(
        mut tokenizer: Tokenizer,
        max_length:    usize,
        with_segments: bool,
    ) -> Result<Self, PipelineError> {
        match tokenizer.get_padding_mut() {
            Some(padding) => padding.strategy = PaddingStrategy::BatchLongest,
            None => {
                let mut padding = PaddingParams {
                    strategy: PaddingStrategy::BatchLongest,
                    ..Default::default()
                };
                match ["<pad>", "[PAD]"]
                    .iter()
                    .find_map(|t| tokenizer.token_to_id(t).map(|id| (*t, id)))
                {
                    Some((token, id)) => {
                        padding.pad_token = token.to_string();
                        padding.pad_id    = id;
                    }
                    None => tracing::warn!(
                        "Tokenizer has no padding token; padding with id {}",
                        padding.pad_id
                    ),
                }
                tokenizer.with_padding(Some(padding));
            }
        }

        tokenizer
            .with_truncation(Some(TruncationParams {
                max_length,
                ..Default::default()
            }))
            .map_err(|e| PipelineError::Tokenization(format!("invalid truncation: {e}")))?;

        Ok(Self { tokenizer, with_segments })
    }

    /// Tokenize `examples` as one batch and build tensors on `device`.
    pub fn collate<B: Backend>(
        &self,
        examples: &[&Example],
        device:   &B::Device,
    ) -> Result<MiniBatch<B>, PipelineError> {
        if examples.is_empty() {
            return Err(PipelineError::Tokenization("cannot collate an empty batch".into()));
        }

        let texts: Vec<&str> = examples.iter().map(|e| e.text.as_str()).collect();
        let encodings = self
            .tokenizer
            .encode_batch(texts, true)
            .map_err(|e| PipelineError::Tokenization(e.to_string()))?;

        let batch_size = encodings.len();
        let seq_len    = encodings.iter().map(|e| e.len()).max().unwrap_or(0);
        if seq_len == 0 {
            return Err(PipelineError::Tokenization("batch produced no tokens".into()));
        }
        if let Some(i) = encodings.iter().position(|e| e.len() != seq_len) {
            return Err(PipelineError::Tokenization(format!(
                "row {i} has {} tokens, expected {seq_len} after padding",
                encodings[i].len()
            )));
        }

        // Flatten row-major, then reshape to [batch, seq_len]
        let flatten = |field: fn(&tokenizers::Encoding) -> &[u32]| -> Tensor<B, 2, Int> {
            let flat: Vec<i32> = encodings
                .iter()
                .flat_map(|e| field(e).iter().map(|&x| x as i32))
                .collect();
            Tensor::<B, 1, Int>::from_ints(flat.as_slice(), device).reshape([batch_size, seq_len])
        };

        let input_ids      = flatten(tokenizers::Encoding::get_ids);
        let attention_mask = flatten(tokenizers::Encoding::get_attention_mask);
        let token_type_ids = self
            .with_segments
            .then(|| flatten(tokenizers::Encoding::get_type_ids));

        let labels: Vec<i32> = examples.iter().map(|e| e.label.as_int() as i32).collect();
        let labels = Tensor::<B, 1, Int>::from_ints(labels.as_slice(), device);

        Ok(MiniBatch {
            inputs: TokenizedInput { input_ids, attention_mask, token_type_ids },
            labels,
        })
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{examples, strict_tokenizer, word_tokenizer, TestBackend};

    fn collator() -> Collator {
        Collator::new(word_tokenizer(), 16, false).unwrap()
    }

    fn ints(t: Tensor<TestBackend, 2, Int>) -> Vec<i64> {
        t.into_data().iter::<i64>().collect()
    }

    #[test]
    fn test_labels_align_with_inputs() {
        let data = examples(&[
            ("the movie was great", 1),
            ("bad", 0),
            ("really boring plot", 0),
            ("fun", 1),
        ]);
        let refs: Vec<&Example> = data.iter().collect();
        let batch = collator().collate::<TestBackend>(&refs, &Default::default()).unwrap();

        assert_eq!(batch.batch_size(), 4);
        assert_eq!(batch.inputs.dims()[0], 4);
        assert_eq!(
            batch.label_values(),
            vec![Label::Positive, Label::Negative, Label::Negative, Label::Positive]
        );
    }

    #[test]
    fn test_all_fields_share_shape() {
        let data = examples(&[("the movie was great", 1), ("bad", 0)]);
        let refs: Vec<&Example> = data.iter().collect();
        let batch = Collator::new(word_tokenizer(), 16, true)
            .unwrap()
            .collate::<TestBackend>(&refs, &Default::default())
            .unwrap();

        let dims = batch.inputs.dims();
        assert_eq!(dims, [2, 4]);
        assert_eq!(batch.inputs.attention_mask.dims(), dims);
        assert_eq!(batch.inputs.token_type_ids.as_ref().map(|t| t.dims()), Some(dims));
    }

    #[test]
    fn test_pads_to_batch_longest_only() {
        let c = collator();
        let data = examples(&[("bad", 0), ("fun", 1), ("the movie was really great", 1)]);

        // A batch of short texts is not padded to the long one
        let short: Vec<&Example> = data[..2].iter().collect();
        let batch = c.collate::<TestBackend>(&short, &Default::default()).unwrap();
        assert_eq!(batch.inputs.dims(), [2, 1]);

        let mixed: Vec<&Example> = vec![&data[0], &data[2]];
        let batch = c.collate::<TestBackend>(&mixed, &Default::default()).unwrap();
        assert_eq!(batch.inputs.dims(), [2, 5]);
        assert_eq!(
            ints(batch.inputs.attention_mask),
            vec![1, 0, 0, 0, 0, 1, 1, 1, 1, 1]
        );
    }

    #[test]
    fn test_truncates_to_max_length() {
        let c    = Collator::new(word_tokenizer(), 3, false).unwrap();
        let data = examples(&[("the movie was really great fun", 1)]);
        let refs: Vec<&Example> = data.iter().collect();
        let batch = c.collate::<TestBackend>(&refs, &Default::default()).unwrap();
        assert_eq!(batch.inputs.dims(), [1, 3]);
    }

    #[test]
    fn test_tokenizer_failure_propagates() {
        let c    = Collator::new(strict_tokenizer(), 16, false).unwrap();
        let data = examples(&[("good", 1), ("zzz-unknown", 0)]);
        let refs: Vec<&Example> = data.iter().collect();
        let err  = c.collate::<TestBackend>(&refs, &Default::default()).unwrap_err();
        assert!(matches!(err, PipelineError::Tokenization(_)));
    }

    #[test]
    fn test_empty_batch_is_error() {
        let err = collator().collate::<TestBackend>(&[], &Default::default()).unwrap_err();
        assert!(matches!(err, PipelineError::Tokenization(_)));
    }

    #[test]
    fn test_slice_keeps_rows_and_labels_together() {
        let data = examples(&[("good", 1), ("bad", 0), ("awful acting", 0)]);
        let refs: Vec<&Example> = data.iter().collect();
        let batch = collator().collate::<TestBackend>(&refs, &Default::default()).unwrap();

        let tail = batch.slice(1..3);
        assert_eq!(tail.batch_size(), 2);
        assert_eq!(tail.inputs.dims(), [2, 2]);
        assert_eq!(tail.label_values(), vec![Label::Negative, Label::Negative]);

        let full_ids = ints(batch.inputs.input_ids);
        assert_eq!(ints(tail.inputs.input_ids), full_ids[2..].to_vec());
    }
}
