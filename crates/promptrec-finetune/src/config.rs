//! Run configuration
//!
//! All knobs for a fine-tuning run, loaded once from a JSON file (or
//! defaults) and passed explicitly to each stage. Nothing mutates the
//! configuration after startup.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FinetuneConfig {
    /// Random seed for batch shuffling
    pub seed: u64,
    /// Labeled training CSV
    pub input_csv: PathBuf,
    /// Pretrained preset directory (model checkpoint + tokenizer)
    pub preset_dir: PathBuf,
    /// Directory for the output checkpoint
    pub output_dir: PathBuf,
    /// Maximum token sequence length per example
    pub sequence_length: usize,
    /// Training batch size
    pub batch_size: usize,
    /// Number of training epochs
    pub epochs: usize,
    /// Fixed learning rate (no scheduler)
    pub learning_rate: f32,
    /// LoRA rank for adapter injection
    pub lora_rank: usize,
    /// LoRA alpha (scale = alpha / rank)
    pub lora_alpha: f32,
    /// Steps between metric log lines
    pub log_interval: usize,
}

impl Default for FinetuneConfig {
    fn default() -> Self {
        Self {
            seed: 42,
            input_csv: PathBuf::from("data/train.csv"),
            preset_dir: PathBuf::from("presets/base"),
            output_dir: PathBuf::from("checkpoints"),
            sequence_length: 512,
            batch_size: 4,
            epochs: 1,
            learning_rate: 3e-5,
            lora_rank: 4,
            lora_alpha: 4.0,
            log_interval: 10,
        }
    }
}

impl FinetuneConfig {
    /// Load configuration from a JSON file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        let config: FinetuneConfig = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;
        Ok(config)
    }

    /// Name of the preset, taken from the preset directory name. Used in the
    /// output checkpoint name.
    pub fn preset_name(&self) -> String {
        self.preset_dir
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "preset".to_string())
    }

    /// Output checkpoint stem: `finetune_{preset}_{input_stem}_epoch{N}`.
    pub fn checkpoint_name(&self) -> String {
        let input_stem = self
            .input_csv
            .file_stem()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "input".to_string());
        format!(
            "finetune_{}_{}_epoch{}",
            self.preset_name(),
            input_stem,
            self.epochs
        )
    }
}
