//! Greedy decoding against the fine-tuned model

use anyhow::Result;
use aprender::autograd::Tensor;
use promptrec_data::PromptTemplate;
use promptrec_model::{CausalLM, Tokenizer};

/// Generate text from a prompt using greedy decoding.
///
/// Each step runs a full-context forward pass and takes the argmax over the
/// last position's logits. Generation stops after `max_tokens` steps or when
/// the sequence reaches the model's context length.
///
/// Returns the generated text including the prompt.
pub fn generate_greedy(
    model: &CausalLM,
    tokenizer: &Tokenizer,
    prompt: &str,
    max_tokens: usize,
) -> Result<String> {
    let prompt_ids = tokenizer.encode(prompt)?;
    if prompt_ids.is_empty() {
        return Ok(prompt.to_string());
    }

    let sequence_len = model.config().sequence_len;
    let mut ids = prompt_ids;
    // A prompt longer than the context window keeps only its tail.
    if ids.len() > sequence_len {
        ids = ids.split_off(ids.len() - sequence_len);
    }

    for _ in 0..max_tokens {
        if ids.len() >= sequence_len {
            break;
        }

        let input: Vec<f32> = ids.iter().map(|&id| id as f32).collect();
        let input = Tensor::new(&input, &[1, ids.len()]);
        let logits = model.forward(&input)?;

        let next = greedy_sample(&logits, ids.len())?;
        ids.push(next);
    }

    tokenizer.decode(&ids)
}

/// Argmax over the last position of `[1, seq_len, vocab_size]` logits.
fn greedy_sample(logits: &Tensor, seq_len: usize) -> Result<u32> {
    let shape = logits.shape();
    if shape.len() != 3 || shape[0] != 1 || shape[1] != seq_len {
        anyhow::bail!("Unexpected logits shape: {:?}", shape);
    }
    let vocab_size = shape[2];

    let data = logits.data();
    let last = &data[(seq_len - 1) * vocab_size..seq_len * vocab_size];

    let mut max_logit = f32::NEG_INFINITY;
    let mut max_idx = 0;
    for (idx, &logit) in last.iter().enumerate() {
        if logit > max_logit {
            max_logit = logit;
            max_idx = idx;
        }
    }

    Ok(max_idx as u32)
}

/// Recover the rewrite prompt for one test row.
///
/// Renders the query template (empty Response section), generates, and strips
/// the rendered query from the front of the output. Whatever follows the
/// query is the model's predicted rewrite prompt, whitespace-trimmed.
pub fn recover_prompt(
    model: &CausalLM,
    tokenizer: &Tokenizer,
    template: &PromptTemplate,
    original_text: &str,
    rewritten_text: &str,
    max_tokens: usize,
) -> Result<String> {
    let query = template.render_query(original_text, rewritten_text);
    let generated = generate_greedy(model, tokenizer, &query, max_tokens)?;

    let prediction = strip_query(&generated, &query);
    Ok(prediction.trim().to_string())
}

/// Remove the query prefix from generated output. BPE decode does not always
/// reproduce the query byte-for-byte, so fall back to splitting on the final
/// section label when an exact prefix match fails.
fn strip_query<'a>(generated: &'a str, query: &str) -> &'a str {
    if let Some(rest) = generated.strip_prefix(query) {
        return rest;
    }
    match generated.rfind("Response:\n") {
        Some(pos) => &generated[pos + "Response:\n".len()..],
        None => generated,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use promptrec_model::ModelConfig;

    fn tiny_model_and_tokenizer() -> (CausalLM, Tokenizer) {
        let corpus = ["make it formal", "improve the essay"];
        let tokenizer =
            Tokenizer::train_from_iterator(corpus.iter(), 200).expect("Failed to train tokenizer");
        let model = CausalLM::new(ModelConfig {
            sequence_len: 24,
            ..ModelConfig::tiny()
        });
        (model, tokenizer)
    }

    #[test]
    fn test_generate_includes_prompt() {
        let (model, tokenizer) = tiny_model_and_tokenizer();
        let out = generate_greedy(&model, &tokenizer, "make it", 4).unwrap();
        assert!(out.starts_with("make it"));
    }

    #[test]
    fn test_generate_empty_prompt_is_identity() {
        let (model, tokenizer) = tiny_model_and_tokenizer();
        let out = generate_greedy(&model, &tokenizer, "", 4).unwrap();
        assert_eq!(out, "");
    }

    #[test]
    fn test_generate_zero_max_tokens() {
        let (model, tokenizer) = tiny_model_and_tokenizer();
        let out = generate_greedy(&model, &tokenizer, "formal", 0).unwrap();
        assert_eq!(out, "formal");
    }

    #[test]
    fn test_strip_query_exact_prefix() {
        assert_eq!(strip_query("queryanswer", "query"), "answer");
    }

    #[test]
    fn test_strip_query_falls_back_to_response_label() {
        let generated = "mangled preamble\n\nResponse:\nmake it formal";
        assert_eq!(strip_query(generated, "not a prefix"), "make it formal");
    }

    #[test]
    fn test_strip_query_without_label_keeps_output() {
        assert_eq!(strip_query("free text", "missing"), "free text");
    }
}
