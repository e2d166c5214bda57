// ============================================================
// Layer 6 — Pretrained Store
// ============================================================
// Resolves an encoder name (e.g. "klue/roberta-base") to a
// directory holding a HuggingFace snapshot of that model:
//
//   models/
//     klue/roberta-base/
//       config.json          ← architecture (HF key names)
//       model.safetensors    ← weights, or pytorch_model.bin
//       tokenizer.json       ← HuggingFace tokenizer
//
// The config is read first so the encoder can be built with
// the right shape; the checkpoint is then imported into it.
// Checkpoint names are rewritten onto the encoder's module
// paths and PyTorch layouts are converted on the way in
// (Linear weights transposed, LayerNorm weight/bias → gamma/beta).
// Every encoder tensor must be present; extra tensors such as
// the masked-LM head are ignored.
//
// Reference: Burn Book §5 (Records and Checkpointing)
//            burn-store (SafetensorsStore, PytorchStore)

use anyhow::{anyhow, bail, ensure, Context, Result};
use burn::prelude::*;
use burn_store::{ModuleSnapshot, PyTorchToBurnAdapter, PytorchStore, SafetensorsStore};
use serde::Deserialize;
use std::{
    fs,
    path::{Path, PathBuf},
};
use tokenizers::Tokenizer;

use crate::ml::encoder::{TextEncoder, TextEncoderConfig};

pub const CONFIG_FILE:      &str = "config.json";
pub const SAFETENSORS_FILE: &str = "model.safetensors";
pub const PYTORCH_FILE:     &str = "pytorch_model.bin";
pub const TOKENIZER_FILE:   &str = "tokenizer.json";

/// Checkpoint families whose position ids start after padding_idx.
const ROBERTA_FAMILY: [&str; 3] = ["roberta", "xlm-roberta", "camembert"];

/// HuggingFace BERT/RoBERTa parameter names → encoder module paths,
/// applied in order to every checkpoint key.
const CHECKPOINT_KEY_MAP: [(&str, &str); 12] = [
    (r"^(roberta|bert)\.",                                       ""),
    (r"^embeddings\.word_embeddings\.",                          "token_embedding."),
    (r"^embeddings\.position_embeddings\.",                      "position_embedding."),
    (r"^embeddings\.token_type_embeddings\.",                    "segment_embedding."),
    (r"^embeddings\.LayerNorm\.",                                "embedding_norm."),
    (r"^encoder\.layer\.(\d+)\.attention\.self\.(query|key|value)\.", "layers.${1}.self_attn.${2}."),
    (r"^encoder\.layer\.(\d+)\.attention\.output\.dense\.",      "layers.${1}.self_attn.output."),
    (r"^encoder\.layer\.(\d+)\.attention\.output\.LayerNorm\.",  "layers.${1}.norm1."),
    (r"^encoder\.layer\.(\d+)\.intermediate\.dense\.",           "layers.${1}.ffn_linear1."),
    (r"^encoder\.layer\.(\d+)\.output\.dense\.",                 "layers.${1}.ffn_linear2."),
    (r"^encoder\.layer\.(\d+)\.output\.LayerNorm\.",             "layers.${1}.norm2."),
    (r"^pooler\.dense\.",                                        "pooler."),
];

// ─── config.json ──────────────────────────────────────────────────────────────
/// The part of a HuggingFace `config.json` the encoder needs. HF key
/// names and the encoder's own names are both accepted; every other
/// key in the file is ignored.
#[derive(Debug, Deserialize)]
struct EncoderConfigFile {
    #[serde(default)]
    model_type:              Option<String>,
    vocab_size:              usize,
    max_position_embeddings: usize,
    hidden_size:             usize,
    #[serde(alias = "num_attention_heads")]
    num_heads:               usize,
    #[serde(alias = "num_hidden_layers")]
    num_layers:              usize,
    intermediate_size:       usize,
    #[serde(default = "default_type_vocab_size")]
    type_vocab_size:         usize,
    #[serde(alias = "hidden_dropout_prob", default = "default_dropout")]
    dropout:                 f64,
    #[serde(default = "default_layer_norm_eps")]
    layer_norm_eps:          f64,
    #[serde(default)]
    pad_token_id:            Option<usize>,
    #[serde(default)]
    hidden_act:              Option<String>,
}

fn default_type_vocab_size() -> usize { 1 }
fn default_dropout() -> f64 { 0.1 }
fn default_layer_norm_eps() -> f64 { 1e-5 }

impl EncoderConfigFile {
    fn into_encoder_config(self) -> Result<TextEncoderConfig> {
        if let Some(act) = self.hidden_act.as_deref() {
            ensure!(act == "gelu", "unsupported hidden_act '{act}' (only gelu)");
        }
        ensure!(
            self.num_heads > 0 && self.hidden_size % self.num_heads == 0,
            "hidden_size {} is not divisible by {} attention heads",
            self.hidden_size, self.num_heads
        );

        let roberta = self
            .model_type
            .as_deref()
            .is_some_and(|t| ROBERTA_FAMILY.contains(&t));
        let padding_idx = roberta.then(|| self.pad_token_id.unwrap_or(1));

        Ok(TextEncoderConfig::new(
            self.vocab_size,
            self.max_position_embeddings,
            self.hidden_size,
            self.num_heads,
            self.num_layers,
            self.intermediate_size,
        )
        .with_type_vocab_size(self.type_vocab_size)
        .with_dropout(self.dropout)
        .with_layer_norm_eps(self.layer_norm_eps)
        .with_padding_idx(padding_idx))
    }
}

// ─── PretrainedStore ──────────────────────────────────────────────────────────
pub struct PretrainedStore {
    dir: PathBuf,
}

impl PretrainedStore {
    pub fn new(models_dir: impl AsRef<Path>, name: &str) -> Self {
        Self { dir: models_dir.as_ref().join(name) }
    }

    pub fn load_config(&self) -> Result<TextEncoderConfig> {
        let path = self.dir.join(CONFIG_FILE);
        let text = fs::read_to_string(&path)
            .with_context(|| format!("Cannot load encoder config '{}'", path.display()))?;
        let file: EncoderConfigFile = serde_json::from_str(&text)
            .with_context(|| format!("Cannot parse encoder config '{}'", path.display()))?;
        file.into_encoder_config()
            .with_context(|| format!("Unsupported encoder config '{}'", path.display()))
    }

    /// Build the encoder described by `config` and import the checkpoint into it.
    /// `model.safetensors` is preferred over `pytorch_model.bin`.
    pub fn load_encoder<B: Backend>(
        &self,
        config: &TextEncoderConfig,
        device: &B::Device,
    ) -> Result<TextEncoder<B>> {
        let mut encoder = config.init::<B>(device);
        let safetensors = self.dir.join(SAFETENSORS_FILE);
        let pytorch     = self.dir.join(PYTORCH_FILE);

        let result = if safetensors.is_file() {
            let mut store = CHECKPOINT_KEY_MAP.iter().fold(
                SafetensorsStore::from_file(safetensors.clone()).with_from_adapter(PyTorchToBurnAdapter),
                |store, (from, to)| store.with_key_remapping(*from, *to),
            );
            encoder.load_from(&mut store).map_err(|e| {
                anyhow!("Cannot load encoder weights '{}': {}", safetensors.display(), e)
            })?
        } else if pytorch.is_file() {
            let mut store = CHECKPOINT_KEY_MAP.iter().fold(
                PytorchStore::from_file(pytorch.clone()),
                |store, (from, to)| store.with_key_remapping(*from, *to),
            );
            encoder.load_from(&mut store).map_err(|e| {
                anyhow!("Cannot load encoder weights '{}': {}", pytorch.display(), e)
            })?
        } else {
            bail!(
                "Cannot load encoder weights: neither '{}' nor '{}' exists",
                safetensors.display(),
                pytorch.display()
            );
        };

        tracing::info!(
            applied = result.applied.len(),
            unused  = result.unused.len(),
            "Loaded pretrained encoder from '{}'",
            self.dir.display()
        );
        if !result.unused.is_empty() {
            tracing::debug!("Ignored checkpoint tensors: {:?}", result.unused);
        }
        Ok(encoder)
    }

    pub fn load_tokenizer(&self) -> Result<Tokenizer> {
        let path = self.dir.join(TOKENIZER_FILE);
        Tokenizer::from_file(&path)
            .map_err(|e| anyhow!("Cannot load tokenizer from '{}': {}", path.display(), e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::batcher::Collator;
    use crate::domain::example::Example;
    use crate::test_utils::{
        examples, tiny_encoder_config, word_tokenizer_json, write_hf_snapshot, TestBackend,
    };

    /// config.json as published for klue/roberta-base.
    const KLUE_CONFIG: &str = r#"{
        "architectures": ["RobertaForMaskedLM"],
        "attention_probs_dropout_prob": 0.1,
        "bos_token_id": 0,
        "eos_token_id": 2,
        "gradient_checkpointing": false,
        "hidden_act": "gelu",
        "hidden_dropout_prob": 0.1,
        "hidden_size": 768,
        "initializer_range": 0.02,
        "intermediate_size": 3072,
        "layer_norm_eps": 1e-05,
        "max_position_embeddings": 514,
        "model_type": "roberta",
        "num_attention_heads": 12,
        "num_hidden_layers": 12,
        "pad_token_id": 1,
        "position_embedding_type": "absolute",
        "tokenizer_class": "BertTokenizer",
        "transformers_version": "4.10.0",
        "type_vocab_size": 1,
        "use_cache": true,
        "vocab_size": 32000
    }"#;

    fn pooled_values(encoder: &TextEncoder<TestBackend>, store: &PretrainedStore) -> Vec<f32> {
        let data = examples(&[("good movie", 1), ("the plot was boring", 0)]);
        let refs: Vec<&Example> = data.iter().collect();
        let batch = Collator::new(store.load_tokenizer().unwrap(), 16, false)
            .unwrap()
            .collate::<TestBackend>(&refs, &Default::default())
            .unwrap();
        encoder.pooled(&batch.inputs).into_data().iter::<f32>().collect()
    }

    #[test]
    fn test_reads_huggingface_config_keys() {
        let dir   = tempfile::tempdir().unwrap();
        let store = PretrainedStore::new(dir.path(), "klue/roberta-base");
        fs::create_dir_all(dir.path().join("klue/roberta-base")).unwrap();
        fs::write(dir.path().join("klue/roberta-base").join(CONFIG_FILE), KLUE_CONFIG).unwrap();

        let config = store.load_config().unwrap();
        assert_eq!(config.vocab_size, 32000);
        assert_eq!(config.hidden_size, 768);
        assert_eq!(config.num_heads, 12);
        assert_eq!(config.num_layers, 12);
        assert_eq!(config.intermediate_size, 3072);
        assert_eq!(config.type_vocab_size, 1);
        assert_eq!(config.padding_idx, Some(1));
        assert_eq!(config.max_sequence_length(), 512);
        assert!((config.dropout - 0.1).abs() < 1e-12);
        assert!(!config.uses_segments());
    }

    #[test]
    fn test_bert_config_uses_plain_positions() {
        let file: EncoderConfigFile = serde_json::from_str(
            r#"{"model_type": "bert", "vocab_size": 30522, "max_position_embeddings": 512,
                "hidden_size": 768, "num_attention_heads": 12, "num_hidden_layers": 12,
                "intermediate_size": 3072, "type_vocab_size": 2, "pad_token_id": 0}"#,
        )
        .unwrap();
        let config = file.into_encoder_config().unwrap();
        assert_eq!(config.padding_idx, None);
        assert_eq!(config.max_sequence_length(), 512);
        assert!(config.uses_segments());
    }

    #[test]
    fn test_rejects_unsupported_architecture() {
        let parse = |json: &str| {
            serde_json::from_str::<EncoderConfigFile>(json)
                .unwrap()
                .into_encoder_config()
                .unwrap_err()
                .to_string()
        };
        let err = parse(
            r#"{"vocab_size": 10, "max_position_embeddings": 8, "hidden_size": 10,
                "num_heads": 3, "num_layers": 1, "intermediate_size": 8}"#,
        );
        assert!(err.contains("divisible"), "{err}");

        let err = parse(
            r#"{"vocab_size": 10, "max_position_embeddings": 8, "hidden_size": 8,
                "num_heads": 2, "num_layers": 1, "intermediate_size": 8, "hidden_act": "relu"}"#,
        );
        assert!(err.contains("relu"), "{err}");
    }

    #[test]
    fn test_imports_huggingface_checkpoint() {
        let dir    = tempfile::tempdir().unwrap();
        let store  = PretrainedStore::new(dir.path(), "tiny/encoder");
        let device = Default::default();

        let config  = tiny_encoder_config();
        let encoder = config.init::<TestBackend>(&device);
        write_hf_snapshot(&dir.path().join("tiny/encoder"), &config, &encoder, &word_tokenizer_json());

        let loaded_config = store.load_config().unwrap();
        assert_eq!(loaded_config.hidden_size, config.hidden_size);
        assert_eq!(loaded_config.vocab_size, config.vocab_size);
        assert_eq!(loaded_config.padding_idx, config.padding_idx);

        let loaded = store.load_encoder::<TestBackend>(&loaded_config, &device).unwrap();

        // A fresh init has different random weights, so matching outputs
        // mean every tensor came from the checkpoint.
        let before = pooled_values(&encoder, &store);
        let after  = pooled_values(&loaded, &store);
        let fresh  = pooled_values(&config.init::<TestBackend>(&device), &store);
        assert_eq!(before.len(), after.len());
        for (a, b) in before.iter().zip(&after) {
            assert!((a - b).abs() < 1e-5, "{a} vs {b}");
        }
        assert!(before.iter().zip(&fresh).any(|(a, b)| (a - b).abs() > 1e-5));
    }

    #[test]
    fn test_checkpoint_missing_a_layer_is_rejected() {
        let dir    = tempfile::tempdir().unwrap();
        let store  = PretrainedStore::new(dir.path(), "short");
        let device = Default::default();

        // The checkpoint has one layer but config.json promises two
        let config = tiny_encoder_config();
        write_hf_snapshot(
            &dir.path().join("short"),
            &TextEncoderConfig { num_layers: 2, ..config.clone() },
            &config.init::<TestBackend>(&device),
            &word_tokenizer_json(),
        );

        let loaded_config = store.load_config().unwrap();
        let err = store
            .load_encoder::<TestBackend>(&loaded_config, &device)
            .unwrap_err()
            .to_string();
        assert!(err.contains(SAFETENSORS_FILE), "{err}");
        assert!(err.contains("not found"), "{err}");
    }

    #[test]
    fn test_missing_directory_names_the_file() {
        let dir   = tempfile::tempdir().unwrap();
        let store = PretrainedStore::new(dir.path(), "absent");

        let err = store.load_config().unwrap_err().to_string();
        assert!(err.contains("config.json"), "{err}");

        let err = store.load_tokenizer().unwrap_err().to_string();
        assert!(err.contains("tokenizer.json"), "{err}");

        let err = store
            .load_encoder::<TestBackend>(&tiny_encoder_config(), &Default::default())
            .unwrap_err()
            .to_string();
        assert!(err.contains(SAFETENSORS_FILE) && err.contains(PYTORCH_FILE), "{err}");
    }
}
