//! Generate a submission CSV from a fine-tuned checkpoint
//!
//! # Usage
//!
//! ```bash
//! promptrec-infer \
//!   --checkpoint checkpoints/finetune_base_train_epoch1 \
//!   --tokenizer-dir presets/base \
//!   --test-csv data/test.csv \
//!   [--out submission.csv] \
//!   [--max-tokens 64]
//! ```

use anyhow::{Context, Result};
use clap::Parser;
use promptrec_data::{load_test_csv, PromptTemplate};
use promptrec_infer::{finalize_prediction, recover_prompt, write_submission, SubmissionRow};
use promptrec_model::{load_checkpoint, Tokenizer};
use std::path::PathBuf;

/// Recover rewrite prompts for a test CSV and write a submission file
#[derive(Parser, Debug)]
#[command(name = "promptrec-infer")]
#[command(about = "Rewrite-prompt recovery inference", long_about = None)]
struct Args {
    /// Fine-tuned checkpoint path (without extension)
    #[arg(long, value_name = "PATH")]
    checkpoint: PathBuf,

    /// Directory holding tokenizer.json (usually the preset directory)
    #[arg(long, value_name = "PATH")]
    tokenizer_dir: PathBuf,

    /// Test CSV with id, original_text, rewritten_text columns
    #[arg(long, value_name = "PATH")]
    test_csv: PathBuf,

    /// Output submission path
    #[arg(long, value_name = "PATH", default_value = "submission.csv")]
    out: PathBuf,

    /// Maximum tokens to generate per row
    #[arg(long, default_value_t = 64)]
    max_tokens: usize,
}

fn main() -> Result<()> {
    let args = Args::parse();

    let (model, metadata) =
        load_checkpoint(&args.checkpoint).context("Failed to load checkpoint")?;
    let tokenizer =
        Tokenizer::from_directory(&args.tokenizer_dir).context("Failed to load tokenizer")?;
    println!(
        "Loaded checkpoint {} (epoch {})",
        args.checkpoint.display(),
        metadata.epoch
    );

    let records = load_test_csv(&args.test_csv).context("Failed to load test CSV")?;
    println!("Predicting {} rows", records.len());

    let template = PromptTemplate::new();
    let mut rows = Vec::with_capacity(records.len());
    for record in &records {
        let prediction = recover_prompt(
            &model,
            &tokenizer,
            &template,
            &record.original_text,
            &record.rewritten_text,
            args.max_tokens,
        )
        .with_context(|| format!("Generation failed for row {}", record.id))?;

        rows.push(SubmissionRow {
            id: record.id.clone(),
            rewrite_prompt: finalize_prediction(prediction),
        });
    }

    write_submission(&rows, &args.out).context("Failed to write submission")?;
    println!("Wrote {} rows to {}", rows.len(), args.out.display());

    Ok(())
}
