// ============================================================
// Layer 6 — Tokenizer Store
// ============================================================
// Resolves the tokenizer for a run directory.
//
// Source order:
//   1. <run_dir>/tokenizer.json, if a previous run left one
//   2. the HuggingFace Hub, when --pretrained-tokenizer is set
//      (bert → bert-base-uncased, t5 → t5-small)
//   3. a word-level vocabulary built from the training corpus
//
// Whatever the source, the tokenizer is written back to
// <run_dir>/tokenizer.json so evaluation uses the exact same
// vocabulary.
//
// In tokenizers 0.15, train_from_files requires Trainer::Model
// to equal ModelWrapper. The word-level vocabulary is therefore
// written as tokenizer JSON by hand and parsed back, bypassing
// the trainer type mismatch entirely.

use anyhow::{anyhow, Context, Result};
use std::{collections::HashMap, path::PathBuf, str::FromStr};
use tokenizers::Tokenizer;

use crate::domain::label::NLI_LABEL_WORDS;

/// Prompt words of the generative input layout.
const PROMPT_WORDS: [&str; 3] = ["mnli", "hypothesis", "premise"];

/// Special tokens and their fixed ids, BERT convention.
const SPECIAL_TOKENS: [(&str, u32); 5] = [
    ("[PAD]", 0),
    ("[UNK]", 1),
    ("[CLS]", 101),
    ("[SEP]", 102),
    ("[MASK]", 103),
];

const FIRST_WORD_ID: u32 = 104;

pub struct TokenizerStore {
    dir: PathBuf,
}

impl TokenizerStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn path(&self) -> PathBuf {
        self.dir.join("tokenizer.json")
    }

    /// Load the run's tokenizer, or fetch / build and save one.
    pub fn load_or_build(
        &self,
        texts:      &[String],
        vocab_size: usize,
        pretrained: Option<&str>,
    ) -> Result<Tokenizer> {
        if self.path().exists() {
            tracing::info!("Loading existing tokenizer from '{}'", self.path().display());
            return self.load();
        }

        let tokenizer = match pretrained {
            Some(repo_id) => {
                tracing::info!("Fetching pretrained tokenizer '{repo_id}' from the hub");
                fetch_pretrained(repo_id)?
            }
            None => {
                tracing::info!("Building word-level tokenizer (vocab_size={vocab_size})");
                build_word_level(texts, vocab_size)?
            }
        };
        self.save(&tokenizer)?;
        Ok(tokenizer)
    }

    /// Load a previously saved tokenizer.
    pub fn load(&self) -> Result<Tokenizer> {
        let path = self.path();
        Tokenizer::from_file(&path)
            .map_err(|e| anyhow!("Cannot load tokenizer from '{}': {}", path.display(), e))
    }

    pub fn save(&self, tokenizer: &Tokenizer) -> Result<()> {
        std::fs::create_dir_all(&self.dir)
            .with_context(|| format!("Cannot create '{}'", self.dir.display()))?;
        let path = self.path();
        tokenizer
            .save(&path, true)
            .map_err(|e| anyhow!("Cannot write tokenizer to '{}': {}", path.display(), e))?;
        tracing::debug!("Saved tokenizer to '{}'", path.display());
        Ok(())
    }
}

/// Download `tokenizer.json` from a HuggingFace Hub model repo.
pub fn fetch_pretrained(repo_id: &str) -> Result<Tokenizer> {
    let api  = hf_hub::api::sync::Api::new().context("Cannot initialise the HuggingFace Hub client")?;
    let path = api
        .model(repo_id.to_string())
        .get("tokenizer.json")
        .with_context(|| format!("Cannot download tokenizer.json for '{repo_id}'"))?;
    Tokenizer::from_file(&path)
        .map_err(|e| anyhow!("Cannot parse tokenizer from '{}': {}", path.display(), e))
}

/// Build a word-level tokenizer from raw sentences.
///
/// The vocabulary holds the special tokens at their BERT ids,
/// the NLI label words and prompt words, then the most frequent
/// corpus words until `vocab_size` entries are reached.
pub fn build_word_level(texts: &[String], vocab_size: usize) -> Result<Tokenizer> {
    let mut freq: HashMap<String, usize> = HashMap::new();
    for text in texts {
        for word in text.split_whitespace() {
            let w = word.to_lowercase();
            let w = w.trim_matches(|c: char| !c.is_alphanumeric());
            if !w.is_empty() {
                *freq.entry(w.to_string()).or_insert(0) += 1;
            }
        }
    }

    // Frequency descending, ties alphabetical so the ids are stable
    let mut words: Vec<(String, usize)> = freq.into_iter().collect();
    words.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));

    let mut vocab = serde_json::Map::new();
    for (token, id) in SPECIAL_TOKENS {
        vocab.insert(token.to_string(), serde_json::json!(id));
    }

    let reserved = NLI_LABEL_WORDS.iter().chain(PROMPT_WORDS.iter()).map(|w| w.to_string());
    let mut next_id = FIRST_WORD_ID;
    for word in reserved.chain(words.into_iter().map(|(w, _)| w)) {
        if vocab.len() >= vocab_size.max(SPECIAL_TOKENS.len() + NLI_LABEL_WORDS.len()) {
            break;
        }
        if !vocab.contains_key(&word) {
            vocab.insert(word, serde_json::json!(next_id));
            next_id += 1;
        }
    }

    let added_tokens: Vec<serde_json::Value> = SPECIAL_TOKENS
        .iter()
        .map(|(content, id)| serde_json::json!({
            "id": id, "content": content, "single_word": false, "lstrip": false,
            "rstrip": false, "normalized": false, "special": true
        }))
        .collect();

    let tokenizer_json = serde_json::json!({
        "version": "1.0",
        "truncation": null,
        "padding": null,
        "added_tokens": added_tokens,
        "normalizer": {
            "type": "BertNormalizer",
            "clean_text": true,
            "handle_chinese_chars": true,
            "strip_accents": null,
            "lowercase": true
        },
        "pre_tokenizer": { "type": "Whitespace" },
        "post_processor": null,
        "decoder": null,
        "model": {
            "type": "WordLevel",
            "vocab": vocab,
            "unk_token": "[UNK]"
        }
    });

    tracing::debug!("Word-level vocabulary holds {} entries", next_id);
    Tokenizer::from_str(&tokenizer_json.to_string())
        .map_err(|e| anyhow!("Cannot construct word-level tokenizer: {e}"))
}

/// Embedding table size needed to cover every token id.
///
/// The word-level vocabulary leaves gaps below the special ids,
/// so this is the largest id plus one rather than the entry count.
pub fn embedding_size(tokenizer: &Tokenizer) -> usize {
    tokenizer
        .get_vocab(true)
        .values()
        .max()
        .map(|&id| id as usize + 1)
        .unwrap_or(0)
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;

    fn corpus() -> Vec<String> {
        vec![
            "The cat sat on the mat.".to_string(),
            "A dog ran in the park".to_string(),
        ]
    }

    #[test]
    fn test_special_and_label_tokens() {
        let tok = build_word_level(&corpus(), 100).unwrap();
        assert_eq!(tok.token_to_id("[PAD]"), Some(0));
        assert_eq!(tok.token_to_id("[CLS]"), Some(101));
        assert_eq!(tok.token_to_id("[SEP]"), Some(102));
        for word in NLI_LABEL_WORDS {
            assert!(tok.token_to_id(word).is_some(), "missing {word}");
        }
    }

    #[test]
    fn test_vocab_size_limit() {
        let tok = build_word_level(&corpus(), 12).unwrap();
        assert_eq!(tok.get_vocab_size(true), 12);
        // Most frequent corpus word survives the cut
        assert!(tok.token_to_id("the").is_some());
    }

    #[test]
    fn test_lowercases_and_strips_punctuation() {
        let tok = build_word_level(&corpus(), 100).unwrap();
        let enc = tok.encode("THE mat", false).unwrap();
        assert!(enc.get_ids().iter().all(|&id| id != 1));
    }

    #[test]
    fn test_embedding_size_covers_max_id() {
        let tok = build_word_level(&corpus(), 100).unwrap();
        let max = tok.get_vocab(true).values().copied().max().unwrap();
        assert_eq!(embedding_size(&tok), max as usize + 1);
    }

    #[test]
    fn test_store_roundtrip() {
        let dir   = tempfile::tempdir().unwrap();
        let store = TokenizerStore::new(dir.path());
        let built = store.load_or_build(&corpus(), 100, None).unwrap();
        assert!(dir.path().join("tokenizer.json").exists());

        // Second call loads from disk, corpus is ignored
        let loaded = store.load_or_build(&[], 100, None).unwrap();
        assert_eq!(loaded.token_to_id("park"), built.token_to_id("park"));
    }
}
