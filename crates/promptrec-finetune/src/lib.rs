//! Fine-tuning driver for rewrite-prompt recovery
//!
//! Wires the pipeline together: runtime environment knobs, run
//! configuration, shuffled batching of preprocessed examples, the training
//! loop, and step metrics logging.

pub mod batcher;
pub mod config;
pub mod env;
pub mod metrics;
pub mod optim;
pub mod train;
