//! Prompt templates bundled with the crate.

/// Prompt template for topic title generation.
/// Placeholder: `{{MESSAGE}}`.
pub const TOPIC_TITLE_PROMPT_TEMPLATE: &str = include_str!(concat!(
    env!("CARGO_MANIFEST_DIR"),
    "/prompts/topic_title_prompt.md"
));
