// Shared fixtures for unit tests: a tiny word-level tokenizer,
// a tiny encoder configuration, a writer for HuggingFace-style
// model snapshots, and the CPU test backends.

use burn::prelude::*;
use burn_store::{BurnToPyTorchAdapter, ModuleSnapshot, SafetensorsStore};
use std::{fs, path::Path, str::FromStr};
use tokenizers::Tokenizer;

use crate::domain::example::{Example, Label};
use crate::infra::pretrained::{CONFIG_FILE, SAFETENSORS_FILE, TOKENIZER_FILE};
use crate::ml::encoder::{TextEncoder, TextEncoderConfig};

pub type TestBackend         = burn::backend::NdArray;
pub type TestAutodiffBackend = burn::backend::Autodiff<TestBackend>;

const WORDS: [&str; 12] = [
    "good", "great", "movie", "bad", "boring", "plot",
    "the", "was", "fun", "awful", "acting", "really",
];

/// Vocabulary size of the test tokenizer (special tokens included).
pub const TEST_VOCAB_SIZE: usize = WORDS.len() + 2;

fn tokenizer_json(with_unk: bool) -> String {
    let mut vocab = serde_json::json!({ "[PAD]": 0 });
    if with_unk {
        vocab["[UNK]"] = serde_json::json!(1);
    }
    for (i, word) in WORDS.iter().enumerate() {
        vocab[*word] = serde_json::json!(i + 2);
    }

    serde_json::json!({
        "version": "1.0",
        "truncation": null,
        "padding": null,
        "added_tokens": [
            {"id": 0, "content": "[PAD]", "single_word": false, "lstrip": false,
             "rstrip": false, "normalized": false, "special": true}
        ],
        "normalizer": null,
        "pre_tokenizer": { "type": "Whitespace" },
        "post_processor": null,
        "decoder": null,
        "model": { "type": "WordLevel", "vocab": vocab, "unk_token": "[UNK]" }
    })
    .to_string()
}

/// Word-level tokenizer; unknown words map to [UNK].
pub fn word_tokenizer() -> Tokenizer {
    Tokenizer::from_str(&tokenizer_json(true)).expect("valid tokenizer json")
}

/// Same vocabulary without [UNK]: unknown words are an encoding error.
pub fn strict_tokenizer() -> Tokenizer {
    Tokenizer::from_str(&tokenizer_json(false)).expect("valid tokenizer json")
}

/// JSON of the word-level tokenizer, for tests that need it on disk.
pub fn word_tokenizer_json() -> String {
    tokenizer_json(true)
}

/// RoBERTa-style: positions start after the [PAD] id 0.
pub fn tiny_encoder_config() -> TextEncoderConfig {
    TextEncoderConfig::new(TEST_VOCAB_SIZE, 16, 8, 2, 1, 16)
        .with_dropout(0.0)
        .with_padding_idx(Some(0))
}

/// Encoder module paths → HuggingFace RoBERTa names, as a
/// RobertaForMaskedLM checkpoint stores them.
const HF_NAMES: [(&str, &str); 11] = [
    (r"^token_embedding\.",                     "roberta.embeddings.word_embeddings."),
    (r"^position_embedding\.",                  "roberta.embeddings.position_embeddings."),
    (r"^segment_embedding\.",                   "roberta.embeddings.token_type_embeddings."),
    (r"^embedding_norm\.",                      "roberta.embeddings.LayerNorm."),
    (r"^layers\.(\d+)\.self_attn\.(query|key|value)\.", "roberta.encoder.layer.${1}.attention.self.${2}."),
    (r"^layers\.(\d+)\.self_attn\.output\.",  "roberta.encoder.layer.${1}.attention.output.dense."),
    (r"^layers\.(\d+)\.norm1\.",              "roberta.encoder.layer.${1}.attention.output.LayerNorm."),
    (r"^layers\.(\d+)\.ffn_linear1\.",        "roberta.encoder.layer.${1}.intermediate.dense."),
    (r"^layers\.(\d+)\.ffn_linear2\.",        "roberta.encoder.layer.${1}.output.dense."),
    (r"^layers\.(\d+)\.norm2\.",              "roberta.encoder.layer.${1}.output.LayerNorm."),
    (r"^pooler\.",                              "roberta.pooler.dense."),
];

/// Write `dir/{config.json, model.safetensors, tokenizer.json}` the way
/// a HuggingFace RoBERTa snapshot lays them out.
pub fn write_hf_snapshot<B: Backend>(
    dir:            &Path,
    config:         &TextEncoderConfig,
    encoder:        &TextEncoder<B>,
    tokenizer_json: &str,
) {
    fs::create_dir_all(dir).expect("create snapshot dir");

    let model_type = if config.padding_idx.is_some() { "roberta" } else { "bert" };
    let config_json = serde_json::json!({
        "architectures":                ["RobertaForMaskedLM"],
        "model_type":                   model_type,
        "vocab_size":                   config.vocab_size,
        "max_position_embeddings":      config.max_position_embeddings,
        "hidden_size":                  config.hidden_size,
        "num_attention_heads":          config.num_heads,
        "num_hidden_layers":            config.num_layers,
        "intermediate_size":            config.intermediate_size,
        "type_vocab_size":              config.type_vocab_size,
        "hidden_dropout_prob":          config.dropout,
        "attention_probs_dropout_prob": config.dropout,
        "layer_norm_eps":               config.layer_norm_eps,
        "pad_token_id":                 config.padding_idx.unwrap_or(0),
        "hidden_act":                   "gelu"
    });
    fs::write(dir.join(CONFIG_FILE), config_json.to_string()).expect("write config.json");

    let mut store = HF_NAMES.iter().fold(
        SafetensorsStore::from_file(dir.join(SAFETENSORS_FILE)).with_to_adapter(BurnToPyTorchAdapter),
        |store, (from, to)| store.with_key_remapping(*from, *to),
    );
    encoder.save_into(&mut store).expect("write model.safetensors");

    fs::write(dir.join(TOKENIZER_FILE), tokenizer_json).expect("write tokenizer.json");
}

pub fn examples(items: &[(&str, i64)]) -> Vec<Example> {
    items
        .iter()
        .map(|(text, label)| Example::new(*text, Label::from_int(*label).expect("0 or 1")))
        .collect()
}
