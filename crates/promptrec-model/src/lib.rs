//! Causal language model wrapper for rewrite-prompt recovery
//!
//! This crate wraps the pieces of the pipeline that touch model weights:
//! - a decoder-only causal LM backbone built on `aprender` primitives
//! - LoRA adapter injection for parameter-efficient fine-tuning
//! - the preprocessor that turns formatted strings into
//!   (inputs, targets, sample weights) triples
//! - checkpoint save/load and pretrained preset loading
//!
//! # Example
//!
//! ```no_run
//! use promptrec_model::{CausalLM, ModelConfig};
//!
//! let mut model = CausalLM::new(ModelConfig::default());
//!
//! // Enable LoRA: base weights freeze, only adapter matrices remain trainable.
//! model.enable_lora(4, 4.0);
//! assert!(model.trainable_parameter_count() < model.parameter_count());
//! ```

pub mod checkpoint;
pub mod config;
pub mod layers;
pub mod lora;
pub mod loss;
pub mod model;
pub mod preprocessor;
pub mod tokenizer;

pub use checkpoint::{
    load_checkpoint, load_preset, save_checkpoint, save_preset, CheckpointMetadata,
};
pub use config::ModelConfig;
pub use loss::{cross_entropy_grad, cross_entropy_loss, token_accuracy};
pub use model::{CausalLM, ForwardCache, Gradients};
pub use preprocessor::{Preprocessed, Preprocessor};
pub use tokenizer::Tokenizer;
