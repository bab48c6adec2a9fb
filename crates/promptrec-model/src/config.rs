//! Model architecture configuration

use serde::{Deserialize, Serialize};

/// Architecture hyperparameters for the causal LM backbone.
///
/// Stored alongside checkpoint weights so a model can be reconstructed from
/// its preset directory without out-of-band information.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelConfig {
    /// Vocabulary size (must match the preset tokenizer)
    pub vocab_size: usize,
    /// Number of transformer layers
    pub n_layer: usize,
    /// Number of attention heads
    pub n_head: usize,
    /// Embedding dimension
    pub n_embd: usize,
    /// Maximum sequence length
    pub sequence_len: usize,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            vocab_size: 32000,
            n_layer: 6,
            n_head: 6,
            n_embd: 384,
            sequence_len: 512,
        }
    }
}

impl ModelConfig {
    /// A tiny configuration for unit tests.
    pub fn tiny() -> Self {
        Self {
            vocab_size: 512,
            n_layer: 1,
            n_head: 2,
            n_embd: 16,
            sequence_len: 32,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_serde_roundtrip() {
        let config = ModelConfig::default();
        let json = serde_json::to_string(&config).unwrap();
        let back: ModelConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back, config);
    }

    #[test]
    fn test_head_dim_divides_embedding() {
        let config = ModelConfig::default();
        assert_eq!(config.n_embd % config.n_head, 0);
    }
}
