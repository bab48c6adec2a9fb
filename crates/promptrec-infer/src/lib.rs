//! Inference path: recover rewrite prompts and write a submission CSV
//!
//! Loads a fine-tuned checkpoint, renders each test row through the query
//! template (the same four-section layout as training, with an empty
//! Response), decodes greedily, and writes `id,rewrite_prompt` rows. Rows
//! where decoding produced nothing fall back to a fixed default prompt.

pub mod generate;
pub mod submission;

pub use generate::{generate_greedy, recover_prompt};
pub use submission::{finalize_prediction, write_submission, SubmissionRow, DEFAULT_PROMPT};
