//! Tokenizer wrapper
//!
//! Thin interface over `aprender::text::tokenize::BpeTokenizer`. A preset
//! directory carries its tokenizer as a `tokenizer.json` file holding the
//! vocabulary and merge rules; this module handles that round trip plus
//! encode/decode.

use anyhow::{Context, Result};
use aprender::text::tokenize::BpeTokenizer;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::Path;

/// Serialized tokenizer contents: vocabulary and merge rules only.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct TokenizerFile {
    vocabulary: HashMap<String, u32>,
    merges: Vec<(String, String)>,
}

/// BPE tokenizer used by both the preprocessor and the inference path.
#[derive(Debug, Clone)]
pub struct Tokenizer {
    bpe: BpeTokenizer,
}

impl Tokenizer {
    /// Train a tokenizer from a text corpus. Used by tests and preset
    /// preparation; production runs load a pretrained tokenizer from the
    /// preset directory.
    pub fn train_from_iterator<I, S>(corpus: I, vocab_size: usize) -> Result<Self>
    where
        I: Iterator<Item = S>,
        S: AsRef<str>,
    {
        let owned: Vec<String> = corpus.map(|s| s.as_ref().to_string()).collect();
        let refs: Vec<&str> = owned.iter().map(|s| s.as_str()).collect();

        let bpe = BpeTokenizer::train(&refs, vocab_size)
            .map_err(|e| anyhow::anyhow!("Failed to train BPE tokenizer: {}", e))?;

        Ok(Self { bpe })
    }

    pub fn encode(&self, text: &str) -> Result<Vec<u32>> {
        self.bpe
            .encode(text)
            .map_err(|e| anyhow::anyhow!("Encoding failed: {}", e))
    }

    pub fn decode(&self, ids: &[u32]) -> Result<String> {
        self.bpe
            .decode(ids)
            .map_err(|e| anyhow::anyhow!("Decoding failed: {}", e))
    }

    pub fn vocab_size(&self) -> usize {
        self.bpe.vocab_size()
    }

    /// Load a tokenizer from `<dir>/tokenizer.json`.
    pub fn from_directory<P: AsRef<Path>>(dir: P) -> Result<Self> {
        let path = dir.as_ref().join("tokenizer.json");
        let content = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read tokenizer file: {}", path.display()))?;

        let file: TokenizerFile =
            serde_json::from_str(&content).context("Failed to parse tokenizer JSON")?;

        let bpe = BpeTokenizer::from_vocab(file.vocabulary, file.merges);
        Ok(Self { bpe })
    }

    /// Save the tokenizer as `<dir>/tokenizer.json`.
    pub fn save<P: AsRef<Path>>(&self, dir: P) -> Result<()> {
        let dir = dir.as_ref();
        fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create directory: {}", dir.display()))?;

        let file = TokenizerFile {
            vocabulary: self.bpe.vocab().clone(),
            merges: self.bpe.merges().to_vec(),
        };
        let content = serde_json::to_string(&file).context("Failed to serialize tokenizer")?;

        let path = dir.join("tokenizer.json");
        fs::write(&path, content)
            .with_context(|| format!("Failed to write tokenizer file: {}", path.display()))?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn small_tokenizer() -> Tokenizer {
        let corpus = ["make it formal", "improve the essay", "rewrite this text"];
        Tokenizer::train_from_iterator(corpus.iter(), 300).expect("Failed to train tokenizer")
    }

    #[test]
    fn test_encode_produces_ids() {
        let tokenizer = small_tokenizer();
        let ids = tokenizer.encode("make it formal").unwrap();
        assert!(!ids.is_empty());
    }

    #[test]
    fn test_save_and_load_roundtrip() {
        let tokenizer = small_tokenizer();
        let dir = TempDir::new().unwrap();
        tokenizer.save(dir.path()).unwrap();

        let loaded = Tokenizer::from_directory(dir.path()).unwrap();
        assert_eq!(loaded.vocab_size(), tokenizer.vocab_size());

        let original = tokenizer.encode("improve the essay").unwrap();
        let reloaded = loaded.encode("improve the essay").unwrap();
        assert_eq!(original, reloaded);
    }

    #[test]
    fn test_missing_tokenizer_file_is_error() {
        let dir = TempDir::new().unwrap();
        assert!(Tokenizer::from_directory(dir.path()).is_err());
    }
}
