//! Fine-tune a pretrained causal LM to recover rewrite prompts
//!
//! # Usage
//!
//! ```bash
//! promptrec-finetune \
//!   [--config config.json] \
//!   [--input-csv data/train.csv] \
//!   [--preset presets/base] \
//!   [--output-dir checkpoints] \
//!   [--quiet]
//! ```
//!
//! Pipeline: read runtime env knobs, load configuration, ingest the labeled
//! CSV, render each row through the prompt template, load the pretrained
//! preset, inject LoRA adapters, preprocess and batch the corpus, train, and
//! save a single checkpoint named
//! `finetune_{preset}_{input_stem}_epoch{epochs}`.

use anyhow::{Context, Result};
use clap::Parser;
use promptrec_data::{PromptTemplate, RewriteDataset};
use promptrec_finetune::{
    batcher::PromptBatcher,
    config::FinetuneConfig,
    env::RuntimeEnv,
    train::{train, TrainingConfig},
};
use promptrec_model::{load_preset, save_checkpoint, CheckpointMetadata, Preprocessor};
use std::collections::HashMap;
use std::path::PathBuf;

/// Fine-tune a pretrained causal LM to recover rewrite prompts
#[derive(Parser, Debug)]
#[command(name = "promptrec-finetune")]
#[command(about = "LoRA fine-tuning for rewrite-prompt recovery", long_about = None)]
struct Args {
    /// Path to JSON run configuration
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Override: labeled training CSV
    #[arg(long, value_name = "PATH")]
    input_csv: Option<PathBuf>,

    /// Override: pretrained preset directory
    #[arg(long, value_name = "PATH")]
    preset: Option<PathBuf>,

    /// Override: output checkpoint directory
    #[arg(long, value_name = "PATH")]
    output_dir: Option<PathBuf>,

    /// Suppress progress output
    #[arg(long)]
    quiet: bool,
}

fn main() -> Result<()> {
    // Environment knobs are read before anything else happens.
    let runtime = RuntimeEnv::from_env();

    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => FinetuneConfig::from_file(path).context("Failed to load config file")?,
        None => FinetuneConfig::default(),
    };
    if let Some(input_csv) = args.input_csv {
        config.input_csv = input_csv;
    }
    if let Some(preset) = args.preset {
        config.preset_dir = preset;
    }
    if let Some(output_dir) = args.output_dir {
        config.output_dir = output_dir;
    }

    if !args.quiet {
        runtime.report();
    }

    // Data: CSV rows to formatted training strings, in row order.
    let dataset = RewriteDataset::from_csv(&config.input_csv)
        .context("Failed to load training dataset")?;
    let template = PromptTemplate::new();
    let corpus = dataset.formatted_prompts(&template);
    if !args.quiet {
        println!("Loaded {} training rows from {}", dataset.len(), config.input_csv.display());
    }

    // Model: pretrained preset, then LoRA injection.
    let (mut model, tokenizer) =
        load_preset(&config.preset_dir).context("Failed to load pretrained preset")?;
    model.enable_lora(config.lora_rank, config.lora_alpha);
    if !args.quiet {
        println!(
            "Enabled LoRA rank {}: {} of {} parameters trainable",
            config.lora_rank,
            model.trainable_parameter_count(),
            model.parameter_count()
        );
    }

    // Preprocess the corpus at the configured sequence length.
    let preprocessor = Preprocessor::new(tokenizer, config.sequence_length);
    let examples = preprocessor
        .process_corpus(&corpus)
        .context("Failed to preprocess corpus")?;
    let mut batcher = PromptBatcher::new(
        examples,
        config.batch_size,
        config.sequence_length,
        config.seed,
    );

    let training_config = TrainingConfig {
        epochs: config.epochs,
        learning_rate: config.learning_rate,
        log_interval: config.log_interval,
        quiet: args.quiet,
    };
    let summary =
        train(&mut model, &mut batcher, &training_config).context("Training failed")?;

    // Single checkpoint at the end of the run.
    let checkpoint_path = config.output_dir.join(config.checkpoint_name());
    let mut extra = HashMap::new();
    extra.insert(
        "preset".to_string(),
        serde_json::Value::String(config.preset_name()),
    );
    let metadata = CheckpointMetadata {
        epoch: config.epochs,
        loss: Some(summary.final_loss),
        learning_rate: Some(config.learning_rate),
        extra,
    };
    save_checkpoint(&model, &checkpoint_path, Some(metadata))
        .context("Failed to save checkpoint")?;

    if !args.quiet {
        println!(
            "Finished {} steps; final loss {:.4}, accuracy {:.4}",
            summary.steps, summary.final_loss, summary.final_accuracy
        );
        println!("Saved checkpoint to {}", checkpoint_path.display());
    }

    Ok(())
}
