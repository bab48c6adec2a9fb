//! Checkpoint and preset I/O
//!
//! A checkpoint is a pair of files sharing one stem: `<path>.safetensors`
//! with the weights (written through aprender's model serialization) and
//! `<path>.json` with the format version, model configuration, and training
//! metadata. A preset is a directory holding a `model` checkpoint plus a
//! `tokenizer.json`, which is everything needed to resume from pretrained
//! state.

use crate::config::ModelConfig;
use crate::model::CausalLM;
use crate::tokenizer::Tokenizer;
use anyhow::{Context, Result};
use aprender::nn::serialize::{load_model, save_model};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::Path;

const CHECKPOINT_VERSION: &str = "1.0.0";

/// Training metadata stored in the checkpoint sidecar.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CheckpointMetadata {
    /// Number of epochs trained
    pub epoch: usize,
    /// Final training loss
    pub loss: Option<f32>,
    /// Learning rate used
    pub learning_rate: Option<f32>,
    /// Additional key-value metadata
    #[serde(flatten)]
    pub extra: HashMap<String, serde_json::Value>,
}

/// Save a model checkpoint: weights to `<path>.safetensors`, version plus
/// config plus metadata to `<path>.json`.
pub fn save_checkpoint<P: AsRef<Path>>(
    model: &CausalLM,
    path: P,
    metadata: Option<CheckpointMetadata>,
) -> Result<()> {
    let path = path.as_ref();
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).with_context(|| {
            format!("Failed to create checkpoint directory: {}", parent.display())
        })?;
    }

    let weights_path = path.with_extension("safetensors");
    save_model(model, &weights_path)
        .map_err(|e| anyhow::anyhow!("Failed to save weights: {}", e))?;

    let mut metadata = metadata.unwrap_or_default();
    metadata.extra.insert(
        "version".to_string(),
        serde_json::Value::String(CHECKPOINT_VERSION.to_string()),
    );
    metadata
        .extra
        .insert("config".to_string(), serde_json::to_value(model.config())?);

    // Weights are matched back to parameters by position, so a model with
    // adapters has a different parameter list than a plain one. Record the
    // adapter shape so load can rebuild the same list before reading weights.
    if let Some((rank, alpha)) = model.lora_config() {
        metadata
            .extra
            .insert("lora_rank".to_string(), serde_json::to_value(rank)?);
        metadata
            .extra
            .insert("lora_alpha".to_string(), serde_json::to_value(alpha)?);
    }

    let sidecar_path = path.with_extension("json");
    let json = serde_json::to_string_pretty(&metadata)
        .context("Failed to serialize checkpoint metadata")?;
    fs::write(&sidecar_path, json)
        .with_context(|| format!("Failed to write metadata file: {}", sidecar_path.display()))?;

    Ok(())
}

/// Load a model checkpoint saved by `save_checkpoint`.
pub fn load_checkpoint<P: AsRef<Path>>(path: P) -> Result<(CausalLM, CheckpointMetadata)> {
    let path = path.as_ref();

    let sidecar_path = path.with_extension("json");
    let json = fs::read_to_string(&sidecar_path)
        .with_context(|| format!("Failed to read metadata file: {}", sidecar_path.display()))?;
    let metadata: CheckpointMetadata =
        serde_json::from_str(&json).context("Failed to parse checkpoint metadata")?;

    let version = metadata
        .extra
        .get("version")
        .and_then(|v| v.as_str())
        .ok_or_else(|| anyhow::anyhow!("Missing version in checkpoint metadata"))?;
    if version != CHECKPOINT_VERSION {
        anyhow::bail!(
            "Checkpoint version mismatch: expected {}, got {}",
            CHECKPOINT_VERSION,
            version
        );
    }

    let config_value = metadata
        .extra
        .get("config")
        .ok_or_else(|| anyhow::anyhow!("Missing config in checkpoint metadata"))?;
    let config: ModelConfig = serde_json::from_value(config_value.clone())
        .context("Failed to parse model config from checkpoint metadata")?;

    let mut model = CausalLM::new(config);
    if let Some(rank) = metadata.extra.get("lora_rank").and_then(|v| v.as_u64()) {
        let alpha = metadata
            .extra
            .get("lora_alpha")
            .and_then(|v| v.as_f64())
            .unwrap_or(rank as f64);
        model.enable_lora(rank as usize, alpha as f32);
    }
    let weights_path = path.with_extension("safetensors");
    load_model(&mut model, &weights_path)
        .map_err(|e| anyhow::anyhow!("Failed to load weights: {}", e))?;

    Ok((model, metadata))
}

/// Save a preset directory: `model.{safetensors,json}` plus `tokenizer.json`.
pub fn save_preset<P: AsRef<Path>>(
    model: &CausalLM,
    tokenizer: &Tokenizer,
    dir: P,
) -> Result<()> {
    let dir = dir.as_ref();
    fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create preset directory: {}", dir.display()))?;

    save_checkpoint(model, dir.join("model"), None)?;
    tokenizer.save(dir)?;
    Ok(())
}

/// Load a pretrained preset: the model checkpoint and its tokenizer.
pub fn load_preset<P: AsRef<Path>>(dir: P) -> Result<(CausalLM, Tokenizer)> {
    let dir = dir.as_ref();

    let (model, _metadata) = load_checkpoint(dir.join("model"))
        .with_context(|| format!("Failed to load preset model from {}", dir.display()))?;
    let tokenizer = Tokenizer::from_directory(dir)
        .with_context(|| format!("Failed to load preset tokenizer from {}", dir.display()))?;

    if tokenizer.vocab_size() > model.config().vocab_size {
        anyhow::bail!(
            "Preset tokenizer vocab size {} exceeds model vocab size {}",
            tokenizer.vocab_size(),
            model.config().vocab_size
        );
    }

    Ok((model, tokenizer))
}
