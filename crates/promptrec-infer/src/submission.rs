//! Submission CSV assembly

use anyhow::{Context, Result};
use serde::Serialize;
use std::path::Path;

/// Fallback prediction for rows where decoding produced nothing.
pub const DEFAULT_PROMPT: &str = "Improve the essay";

/// One output row: `id,rewrite_prompt`.
#[derive(Debug, Clone, Serialize)]
pub struct SubmissionRow {
    pub id: String,
    pub rewrite_prompt: String,
}

/// Replace an empty prediction with the default prompt. Only the exactly
/// empty string triggers the fallback; whitespace-only output is kept as-is.
pub fn finalize_prediction(prediction: String) -> String {
    if prediction.is_empty() {
        DEFAULT_PROMPT.to_string()
    } else {
        prediction
    }
}

/// Write submission rows to a CSV file with an `id,rewrite_prompt` header.
pub fn write_submission<P: AsRef<Path>>(rows: &[SubmissionRow], path: P) -> Result<()> {
    let path = path.as_ref();
    let mut writer = csv::Writer::from_path(path)
        .with_context(|| format!("Failed to create submission file: {}", path.display()))?;

    for row in rows {
        writer
            .serialize(row)
            .with_context(|| format!("Failed to write submission row {}", row.id))?;
    }
    writer.flush().context("Failed to flush submission file")?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_empty_prediction_gets_default() {
        assert_eq!(finalize_prediction(String::new()), "Improve the essay");
    }

    #[test]
    fn test_nonempty_prediction_is_kept() {
        assert_eq!(finalize_prediction("make it formal".to_string()), "make it formal");
    }

    #[test]
    fn test_whitespace_prediction_is_not_replaced() {
        assert_eq!(finalize_prediction(" ".to_string()), " ");
    }

    #[test]
    fn test_write_submission_csv() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("submission.csv");

        let rows = vec![
            SubmissionRow {
                id: "9559194".to_string(),
                rewrite_prompt: "make it formal".to_string(),
            },
            SubmissionRow {
                id: "9559195".to_string(),
                rewrite_prompt: DEFAULT_PROMPT.to_string(),
            },
        ];
        write_submission(&rows, &path).unwrap();

        let content = fs::read_to_string(&path).unwrap();
        let mut lines = content.lines();
        assert_eq!(lines.next(), Some("id,rewrite_prompt"));
        assert_eq!(lines.next(), Some("9559194,make it formal"));
        assert_eq!(lines.next(), Some("9559195,Improve the essay"));
    }

    #[test]
    fn test_write_submission_quotes_commas() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("submission.csv");

        let rows = vec![SubmissionRow {
            id: "1".to_string(),
            rewrite_prompt: "shorten it, keep the tone".to_string(),
        }];
        write_submission(&rows, &path).unwrap();

        let content = fs::read_to_string(&path).unwrap();
        assert!(content.contains("\"shorten it, keep the tone\""));
    }
}
