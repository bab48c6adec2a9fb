//! Instruction-prompt template for training and inference examples
//!
//! Every dataset row is rendered into one string with four labeled sections:
//! Instruction, Original Text, Rewriten Text, Response. The "Rewriten"
//! spelling is part of the established example format and must not be fixed,
//! fine-tuned checkpoints depend on the exact section labels.

/// Fixed instruction header shared by all rendered examples.
const INSTRUCTION: &str = "Instruction:\nBelow, the `Original Text` passage has been rewritten/transformed/improved into `Rewritten Text` by a large language model with a certain prompt/instruction. Your task is to carefully analyze the differences between the `Original Text` and `Rewritten Text`, and try to infer the specific prompt or instruction that was likely given to the model to rewrite/transform/improve the text in this way.";

/// Renders dataset rows into instruction-following example strings.
///
/// Rendering is a pure function of the three input fields: the values are
/// interpolated verbatim, with no escaping, sanitization, or length limits.
/// Truncation, if any, happens later in the preprocessor.
#[derive(Debug, Clone, Default)]
pub struct PromptTemplate;

impl PromptTemplate {
    pub fn new() -> Self {
        Self
    }

    /// Render a full training example with all three fields filled in.
    pub fn render(
        &self,
        original_text: &str,
        rewritten_text: &str,
        rewrite_prompt: &str,
    ) -> String {
        format!(
            "{INSTRUCTION}\n\nOriginal Text:\n{original_text}\n\nRewriten Text:\n{rewritten_text}\n\nResponse:\n{rewrite_prompt}"
        )
    }

    /// Render the inference variant: the Response section is present but
    /// empty, so the model completes it with the recovered prompt.
    pub fn render_query(&self, original_text: &str, rewritten_text: &str) -> String {
        self.render(original_text, rewritten_text, "")
    }
}
