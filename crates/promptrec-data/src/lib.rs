//! Dataset loading and prompt templating for rewrite-prompt recovery
//!
//! This crate handles the data side of the pipeline: reading labeled CSV
//! triples of (original text, rewritten text, rewrite prompt) and rendering
//! each row into a single instruction-following training string.

pub mod dataset;
pub mod template;

pub use dataset::{load_test_csv, RewriteDataset, RewriteRecord, TestRecord};
pub use template::PromptTemplate;
