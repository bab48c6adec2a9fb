//! Supervised fine-tuning loop
//!
//! A single blocking loop over the requested number of epochs: cached
//! forward, weighted cross-entropy, explicit backward through the backbone,
//! Adam step over the trainable tensors. The learning rate is fixed (no
//! scheduler), there is no validation split, no gradient accumulation, and no
//! mid-run checkpointing; exactly one checkpoint is written by the caller
//! after training finishes.

use crate::batcher::PromptBatcher;
use crate::metrics::MetricsLogger;
use crate::optim::Adam;
use anyhow::{Context, Result};
use promptrec_model::{cross_entropy_grad, cross_entropy_loss, token_accuracy, CausalLM};

/// Training hyperparameters, taken from the run configuration.
#[derive(Debug, Clone)]
pub struct TrainingConfig {
    pub epochs: usize,
    pub learning_rate: f32,
    pub log_interval: usize,
    pub quiet: bool,
}

/// What the loop reports back for the checkpoint metadata.
#[derive(Debug, Clone)]
pub struct TrainingSummary {
    pub steps: usize,
    pub final_loss: f32,
    pub final_accuracy: f32,
}

/// Run supervised fine-tuning over the batcher's examples.
///
/// With LoRA enabled on the model, only the adapter matrices are handed to
/// the optimizer; the pretrained backbone stays frozen.
pub fn train(
    model: &mut CausalLM,
    batcher: &mut PromptBatcher,
    config: &TrainingConfig,
) -> Result<TrainingSummary> {
    if batcher.num_examples() == 0 {
        anyhow::bail!("No training examples available");
    }
    if model.trainable_parameter_count() == 0 {
        anyhow::bail!("Model has no trainable parameters");
    }

    let lora = model.lora_enabled();
    let mut optimizer = Adam::new(config.learning_rate);

    let mut logger = MetricsLogger::new(config.log_interval, config.quiet);
    let tokens_per_batch = batcher.batch_size() * batcher.seq_len();

    let mut steps = 0;
    let mut final_loss = 0.0;
    let mut final_accuracy = 0.0;

    for epoch in 1..=config.epochs {
        batcher.reset();

        while let Some((inputs, targets, weights)) = batcher.next_batch() {
            let (logits, cache) = model
                .forward_with_cache(&inputs)
                .context("Forward pass failed")?;
            let loss = cross_entropy_loss(&logits, &targets, Some(&weights))
                .context("Loss computation failed")?;
            let accuracy = token_accuracy(&logits, &targets, Some(&weights))
                .context("Accuracy computation failed")?;

            let dlogits = cross_entropy_grad(&logits, &targets, Some(&weights))
                .context("Loss gradient failed")?;
            let grads = model
                .backward(&cache, &dlogits)
                .context("Backward pass failed")?;
            optimizer
                .step(&mut model.trainable_parameters_mut(), &grads.trainable(lora))
                .context("Optimizer step failed")?;

            final_loss = loss;
            final_accuracy = accuracy;
            steps += 1;

            logger.log_step(
                epoch,
                final_loss,
                final_accuracy,
                config.learning_rate,
                tokens_per_batch,
            );
        }
    }

    Ok(TrainingSummary {
        steps,
        final_loss,
        final_accuracy,
    })
}
