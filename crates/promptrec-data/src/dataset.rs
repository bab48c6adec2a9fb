//! CSV dataset loading
//!
//! The training file is a CSV with at least the columns `original_text`,
//! `rewritten_text`, and `rewrite_prompt`. Rows are loaded once, kept in file
//! order, and never mutated after the formatted prompts are derived. No
//! deduplication or content validation is performed.

use crate::template::PromptTemplate;
use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;

/// One labeled training row.
#[derive(Debug, Clone, Deserialize)]
pub struct RewriteRecord {
    pub original_text: String,
    pub rewritten_text: String,
    /// The supervision target: the instruction hypothesized to have produced
    /// `rewritten_text` from `original_text`.
    pub rewrite_prompt: String,
}

/// One held-out row for the inference path. Text fields may be absent in the
/// file and default to empty strings.
#[derive(Debug, Clone, Deserialize)]
pub struct TestRecord {
    pub id: String,
    #[serde(default)]
    pub original_text: String,
    #[serde(default)]
    pub rewritten_text: String,
}

/// The full labeled dataset, in source-file row order.
#[derive(Debug, Clone)]
pub struct RewriteDataset {
    records: Vec<RewriteRecord>,
}

impl RewriteDataset {
    /// Load the dataset from a CSV file. Extra columns are ignored; a missing
    /// required column or a malformed row is an error.
    pub fn from_csv<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let mut reader = csv::Reader::from_path(path)
            .with_context(|| format!("Failed to open dataset CSV: {}", path.display()))?;

        let mut records = Vec::new();
        for (row_num, row) in reader.deserialize().enumerate() {
            let record: RewriteRecord = row.with_context(|| {
                format!("Failed to parse row {} in {}", row_num + 1, path.display())
            })?;
            records.push(record);
        }

        Ok(Self { records })
    }

    /// Render one training string per row via the template, preserving row
    /// order.
    pub fn formatted_prompts(&self, template: &PromptTemplate) -> Vec<String> {
        self.records
            .iter()
            .map(|r| template.render(&r.original_text, &r.rewritten_text, &r.rewrite_prompt))
            .collect()
    }

    pub fn records(&self) -> &[RewriteRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Load held-out rows for inference from a CSV with columns
/// `id`, `original_text`, `rewritten_text`.
pub fn load_test_csv<P: AsRef<Path>>(path: P) -> Result<Vec<TestRecord>> {
    let path = path.as_ref();
    let mut reader = csv::Reader::from_path(path)
        .with_context(|| format!("Failed to open test CSV: {}", path.display()))?;

    let mut records = Vec::new();
    for (row_num, row) in reader.deserialize().enumerate() {
        let record: TestRecord = row.with_context(|| {
            format!("Failed to parse row {} in {}", row_num + 1, path.display())
        })?;
        records.push(record);
    }

    Ok(records)
}
