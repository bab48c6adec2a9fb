//! Dataset-to-model adapter
//!
//! Converts formatted example strings into fixed-length
//! (inputs, targets, sample weights) triples for next-token training:
//! targets are the inputs shifted by one position, and padding positions get
//! sample weight 0 so they do not contribute to the loss. Truncation to the
//! configured sequence length happens here and nowhere else.

use crate::tokenizer::Tokenizer;
use anyhow::{Context, Result};

/// One preprocessed example. All three vectors have length `sequence_length`.
#[derive(Debug, Clone)]
pub struct Preprocessed {
    /// Input token IDs, zero-padded
    pub inputs: Vec<f32>,
    /// Next-token target IDs, zero-padded
    pub targets: Vec<f32>,
    /// 1.0 where a real next-token prediction exists, 0.0 on padding
    pub sample_weights: Vec<f32>,
}

/// Tokenizes and packs formatted strings for the training loop.
pub struct Preprocessor {
    tokenizer: Tokenizer,
    /// Maximum sequence length; adjustable before training to control memory.
    pub sequence_length: usize,
}

impl Preprocessor {
    pub fn new(tokenizer: Tokenizer, sequence_length: usize) -> Self {
        Self {
            tokenizer,
            sequence_length,
        }
    }

    pub fn tokenizer(&self) -> &Tokenizer {
        &self.tokenizer
    }

    /// Preprocess a single formatted example string.
    pub fn process(&self, text: &str) -> Result<Preprocessed> {
        let ids = self.tokenizer.encode(text).context("Failed to tokenize example")?;

        // Need seq_len + 1 tokens to form seq_len (input, target) pairs.
        let keep = ids.len().min(self.sequence_length + 1);
        let ids = &ids[..keep];

        let mut inputs = vec![0.0f32; self.sequence_length];
        let mut targets = vec![0.0f32; self.sequence_length];
        let mut sample_weights = vec![0.0f32; self.sequence_length];

        if keep > 1 {
            for (i, pair) in ids.windows(2).enumerate() {
                inputs[i] = pair[0] as f32;
                targets[i] = pair[1] as f32;
                sample_weights[i] = 1.0;
            }
        }

        Ok(Preprocessed {
            inputs,
            targets,
            sample_weights,
        })
    }

    /// Preprocess a whole corpus, preserving order.
    pub fn process_corpus(&self, texts: &[String]) -> Result<Vec<Preprocessed>> {
        texts
            .iter()
            .enumerate()
            .map(|(i, text)| {
                self.process(text)
                    .with_context(|| format!("Failed to preprocess example {}", i))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_preprocessor(sequence_length: usize) -> Preprocessor {
        let corpus = [
            "make it formal",
            "improve the essay",
            "rewrite this text please",
        ];
        let tokenizer =
            Tokenizer::train_from_iterator(corpus.iter(), 300).expect("Failed to train tokenizer");
        Preprocessor::new(tokenizer, sequence_length)
    }

    #[test]
    fn test_triple_lengths_match_sequence_length() {
        let preprocessor = test_preprocessor(16);
        let example = preprocessor.process("make it formal").unwrap();

        assert_eq!(example.inputs.len(), 16);
        assert_eq!(example.targets.len(), 16);
        assert_eq!(example.sample_weights.len(), 16);
    }

    #[test]
    fn test_targets_are_shifted_inputs() {
        let preprocessor = test_preprocessor(16);
        let example = preprocessor.process("improve the essay").unwrap();

        let real = example.sample_weights.iter().filter(|&&w| w == 1.0).count();
        assert!(real > 0);
        for i in 0..real - 1 {
            assert_eq!(example.inputs[i + 1], example.targets[i]);
        }
    }

    #[test]
    fn test_padding_has_zero_weight() {
        let preprocessor = test_preprocessor(64);
        let example = preprocessor.process("make it formal").unwrap();

        let real = example.sample_weights.iter().filter(|&&w| w == 1.0).count();
        assert!(real < 64);
        for i in real..64 {
            assert_eq!(example.sample_weights[i], 0.0);
            assert_eq!(example.inputs[i], 0.0);
        }
    }

    #[test]
    fn test_long_example_is_truncated() {
        let preprocessor = test_preprocessor(4);
        let long_text = "rewrite this text please ".repeat(50);
        let example = preprocessor.process(&long_text).unwrap();

        assert_eq!(example.inputs.len(), 4);
        assert!(example.sample_weights.iter().all(|&w| w == 1.0));
    }

    #[test]
    fn test_corpus_order_preserved() {
        let preprocessor = test_preprocessor(16);
        let texts = vec!["make it formal".to_string(), "improve the essay".to_string()];
        let examples = preprocessor.process_corpus(&texts).unwrap();

        assert_eq!(examples.len(), 2);
        let first = preprocessor.process(&texts[0]).unwrap();
        assert_eq!(examples[0].inputs, first.inputs);
    }
}
