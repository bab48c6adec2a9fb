//! Property tests for the prompt template formatter

use promptrec_data::PromptTemplate;
use proptest::prelude::*;

proptest! {
    /// Rendering is deterministic: the same inputs always yield the same
    /// output string.
    #[test]
    fn render_is_pure(original in ".*", rewritten in ".*", prompt in ".*") {
        let template = PromptTemplate::new();
        let first = template.render(&original, &rewritten, &prompt);
        let second = template.render(&original, &rewritten, &prompt);
        prop_assert_eq!(first, second);
    }

    /// All three fields appear verbatim in the rendered output.
    #[test]
    fn render_interpolates_verbatim(original in ".*", rewritten in ".*", prompt in ".*") {
        let template = PromptTemplate::new();
        let out = template.render(&original, &rewritten, &prompt);
        prop_assert!(out.contains(&original));
        prop_assert!(out.contains(&rewritten));
        prop_assert!(out.ends_with(&prompt));
    }
}

#[test]
fn render_matches_reference_example() {
    let template = PromptTemplate::new();
    let out = template.render("cat", "feline", "make it formal");

    assert!(out.contains("Instruction:"));
    assert!(out.contains("Original Text:\ncat"));
    assert!(out.contains("Rewriten Text:\nfeline"));
    assert!(out.ends_with("Response:\nmake it formal"));
}
