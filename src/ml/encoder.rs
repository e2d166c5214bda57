// ============================================================
// Layer 5 — Pretrained Text Encoder
// ============================================================
// RoBERTa-style encoder used as an opaque feature extractor:
//
//   token + position + segment embeddings → LayerNorm → dropout
//   N × EncoderBlock (padding-masked self-attention, GELU FFN,
//                     post-LN residuals)
//   pooler: dense + tanh over the first token  → [batch, hidden]
//
// The architecture comes from the pretrained model's
// config.json and the weights from its HuggingFace checkpoint;
// nothing here is trained from scratch in a real run.
//
// Position ids follow the checkpoint family:
//   BERT     0, 1, 2, ...                   (padding_idx = None)
//   RoBERTa  p+1, p+2, ... on real tokens,  (padding_idx = Some(p))
//            p on padding
// so a RoBERTa encoder can only see max_position_embeddings - p - 1
// tokens.
//
// Reference: Burn Book §3 (Building Blocks)
//            Liu et al. (2019) RoBERTa

use burn::{
    nn::{
        attention::{MhaInput, MultiHeadAttention, MultiHeadAttentionConfig},
        Dropout, DropoutConfig,
        Embedding, EmbeddingConfig,
        LayerNorm, LayerNormConfig,
        Linear, LinearConfig,
    },
    prelude::*,
    tensor::activation::{gelu, tanh},
};

use crate::data::batcher::TokenizedInput;

// NOTE: #[derive(Config)] already generates Clone and Serialize/Deserialize.
#[derive(Config, Debug)]
pub struct TextEncoderConfig {
    pub vocab_size:              usize,
    pub max_position_embeddings: usize,
    pub hidden_size:             usize,
    pub num_heads:               usize,
    pub num_layers:              usize,
    pub intermediate_size:       usize,
    #[config(default = 1)]
    pub type_vocab_size:         usize,
    #[config(default = 0.1)]
    pub dropout:                 f64,
    #[config(default = 1e-5)]
    pub layer_norm_eps:          f64,
    /// Set for RoBERTa checkpoints, whose positions start after it
    #[config(default = "None")]
    pub padding_idx:             Option<usize>,
}

impl TextEncoderConfig {
    pub fn init<B: Backend>(&self, device: &B::Device) -> TextEncoder<B> {
        let token_embedding    = EmbeddingConfig::new(self.vocab_size, self.hidden_size).init(device);
        let position_embedding = EmbeddingConfig::new(self.max_position_embeddings, self.hidden_size).init(device);
        let segment_embedding  = EmbeddingConfig::new(self.type_vocab_size, self.hidden_size).init(device);
        let embedding_norm     = LayerNormConfig::new(self.hidden_size)
            .with_epsilon(self.layer_norm_eps)
            .init(device);
        let layers: Vec<EncoderBlock<B>> = (0..self.num_layers)
            .map(|_| self.build_encoder_block(device))
            .collect();
        let pooler  = LinearConfig::new(self.hidden_size, self.hidden_size).init(device);
        let dropout = DropoutConfig::new(self.dropout).init();
        TextEncoder {
            token_embedding, position_embedding, segment_embedding,
            embedding_norm, layers, pooler, dropout,
            hidden_size:     self.hidden_size,
            position_offset: self.position_offset(),
        }
    }

    /// Segment ids are only worth feeding when there is more than one segment.
    pub fn uses_segments(&self) -> bool {
        self.type_vocab_size > 1
    }

    /// Position id of the first real token.
    pub fn position_offset(&self) -> usize {
        self.padding_idx.map_or(0, |p| p + 1)
    }

    /// Longest token sequence the position table can address.
    pub fn max_sequence_length(&self) -> usize {
        self.max_position_embeddings.saturating_sub(self.position_offset())
    }

    fn build_encoder_block<B: Backend>(&self, device: &B::Device) -> EncoderBlock<B> {
        let self_attn = MultiHeadAttentionConfig::new(self.hidden_size, self.num_heads)
            .with_dropout(self.dropout)
            .init(device);
        let ffn_linear1 = LinearConfig::new(self.hidden_size, self.intermediate_size).init(device);
        let ffn_linear2 = LinearConfig::new(self.intermediate_size, self.hidden_size).init(device);
        let norm1   = LayerNormConfig::new(self.hidden_size).with_epsilon(self.layer_norm_eps).init(device);
        let norm2   = LayerNormConfig::new(self.hidden_size).with_epsilon(self.layer_norm_eps).init(device);
        let dropout = DropoutConfig::new(self.dropout).init();
        EncoderBlock { self_attn, ffn_linear1, ffn_linear2, norm1, norm2, dropout }
    }
}

#[derive(Module, Debug)]
pub struct EncoderBlock<B: Backend> {
    pub self_attn:   MultiHeadAttention<B>,
    pub ffn_linear1: Linear<B>,
    pub ffn_linear2: Linear<B>,
    pub norm1:       LayerNorm<B>,
    pub norm2:       LayerNorm<B>,
    pub dropout:     Dropout,
}

impl<B: Backend> EncoderBlock<B> {
    /// x: [batch, seq, hidden], mask_pad: [batch, seq] (true = padding)
    pub fn forward(&self, x: Tensor<B, 3>, mask_pad: Tensor<B, 2, Bool>) -> Tensor<B, 3> {
        let attn_input  = MhaInput::self_attn(x.clone()).mask_pad(mask_pad);
        let attn_output = self.self_attn.forward(attn_input).context;
        let x = self.norm1.forward(x + self.dropout.forward(attn_output));
        let ffn_out = self.ffn_linear2.forward(gelu(self.ffn_linear1.forward(x.clone())));
        self.norm2.forward(x + self.dropout.forward(ffn_out))
    }
}

#[derive(Module, Debug)]
pub struct TextEncoder<B: Backend> {
    pub token_embedding:    Embedding<B>,
    pub position_embedding: Embedding<B>,
    pub segment_embedding:  Embedding<B>,
    pub embedding_norm:     LayerNorm<B>,
    pub layers:             Vec<EncoderBlock<B>>,
    pub pooler:             Linear<B>,
    pub dropout:            Dropout,
    pub hidden_size:        usize,
    pub position_offset:    usize,
}

impl<B: Backend> TextEncoder<B> {
    /// Contextual token states: [batch, seq, hidden]
    pub fn forward(&self, inputs: &TokenizedInput<B>) -> Tensor<B, 3> {
        let [batch_size, seq_len] = inputs.dims();
        let device = inputs.input_ids.device();

        let tok_emb = self.token_embedding.forward(inputs.input_ids.clone());

        let pos_emb = self.position_embedding.forward(self.position_ids(inputs));

        let segments = inputs
            .token_type_ids
            .clone()
            .unwrap_or_else(|| Tensor::<B, 2, Int>::zeros([batch_size, seq_len], &device));
        let seg_emb = self.segment_embedding.forward(segments);

        let mut x = self.dropout.forward(self.embedding_norm.forward(tok_emb + pos_emb + seg_emb));

        let mask_pad = inputs.attention_mask.clone().equal_elem(0);
        for layer in &self.layers {
            x = layer.forward(x, mask_pad.clone());
        }
        x
    }

    /// Position ids: [batch, seq]. With an offset, every padding
    /// position points at padding_idx = offset - 1.
    pub fn position_ids(&self, inputs: &TokenizedInput<B>) -> Tensor<B, 2, Int> {
        let [batch_size, seq_len] = inputs.dims();
        if self.position_offset == 0 {
            return Tensor::<B, 1, Int>::arange(0..seq_len as i64, &inputs.input_ids.device())
                .unsqueeze::<2>()
                .expand([batch_size, seq_len]);
        }
        let mask = inputs.attention_mask.clone();
        (mask.clone().cumsum(1) * mask).add_scalar(self.position_offset as i64 - 1)
    }

    /// Pooled sentence vector from the first token: [batch, hidden]
    pub fn pooled(&self, inputs: &TokenizedInput<B>) -> Tensor<B, 2> {
        let [batch_size, _] = inputs.dims();
        let states = self.forward(inputs);
        let first  = states
            .slice([0..batch_size, 0..1, 0..self.hidden_size])
            .reshape([batch_size, self.hidden_size]);
        tanh(self.pooler.forward(first))
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::batcher::Collator;
    use crate::domain::example::Example;
    use crate::test_utils::{examples, tiny_encoder_config, word_tokenizer, TestBackend};

    #[test]
    fn test_pooled_shape() {
        let device  = Default::default();
        let encoder = tiny_encoder_config().init::<TestBackend>(&device);
        let data    = examples(&[("the movie was great", 1), ("bad", 0), ("fun", 1)]);
        let refs: Vec<&Example> = data.iter().collect();
        let batch = Collator::new(word_tokenizer(), 16, false)
            .unwrap()
            .collate::<TestBackend>(&refs, &device)
            .unwrap();

        assert_eq!(encoder.pooled(&batch.inputs).dims(), [3, 8]);
    }

    #[test]
    fn test_padding_does_not_change_pooled_vector() {
        let device   = Default::default();
        let encoder  = tiny_encoder_config().init::<TestBackend>(&device);
        let collator = Collator::new(word_tokenizer(), 16, false).unwrap();
        let data     = examples(&[("bad acting", 0), ("the movie was really great", 1)]);

        let alone: Vec<&Example> = vec![&data[0]];
        let alone = collator.collate::<TestBackend>(&alone, &device).unwrap();
        let padded: Vec<&Example> = data.iter().collect();
        let padded = collator.collate::<TestBackend>(&padded, &device).unwrap();

        let a: Vec<f32> = encoder.pooled(&alone.inputs).into_data().iter::<f32>().collect();
        let p: Vec<f32> = encoder
            .pooled(&padded.inputs)
            .slice([0..1, 0..8])
            .into_data()
            .iter::<f32>()
            .collect();

        for (x, y) in a.iter().zip(p.iter()) {
            assert!((x - y).abs() < 1e-4, "pooled vectors differ: {x} vs {y}");
        }
    }

    #[test]
    fn test_config_defaults() {
        let cfg = tiny_encoder_config();
        assert_eq!(cfg.type_vocab_size, 1);
        assert!(!cfg.uses_segments());
        assert!(cfg.with_type_vocab_size(2).uses_segments());
    }

    #[test]
    fn test_roberta_positions_skip_padding_idx() {
        let device  = Default::default();
        let config  = tiny_encoder_config().with_padding_idx(Some(1));
        assert_eq!(config.position_offset(), 2);
        assert_eq!(config.max_sequence_length(), 14);

        let encoder = config.init::<TestBackend>(&device);
        let data    = examples(&[("bad acting", 0), ("the movie was great", 1)]);
        let refs: Vec<&Example> = data.iter().collect();
        let batch = Collator::new(word_tokenizer(), 16, false)
            .unwrap()
            .collate::<TestBackend>(&refs, &device)
            .unwrap();

        let positions: Vec<i64> = encoder.position_ids(&batch.inputs).into_data().iter::<i64>().collect();
        assert_eq!(positions, vec![2, 3, 1, 1, 2, 3, 4, 5]);
    }

    #[test]
    fn test_bert_positions_count_from_zero() {
        let device  = Default::default();
        let config  = TextEncoderConfig { padding_idx: None, ..tiny_encoder_config() };
        assert_eq!(config.max_sequence_length(), config.max_position_embeddings);

        let encoder = config.init::<TestBackend>(&device);
        let data    = examples(&[("bad", 0), ("the movie", 1)]);
        let refs: Vec<&Example> = data.iter().collect();
        let batch = Collator::new(word_tokenizer(), 16, false)
            .unwrap()
            .collate::<TestBackend>(&refs, &device)
            .unwrap();

        let positions: Vec<i64> = encoder.position_ids(&batch.inputs).into_data().iter::<i64>().collect();
        assert_eq!(positions, vec![0, 1, 0, 1]);
    }
}
