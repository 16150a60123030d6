//! Topic title derivation.
//!
//! Two policies: deterministic truncation of the first message, or a short
//! label generated by the title model. De-duplication against existing
//! titles lives in the session store, at title-assignment time.

use anyhow::{Result, anyhow};
use unicode_segmentation::UnicodeSegmentation;

use crate::config::TitlePolicy;
use crate::prompts::TOPIC_TITLE_PROMPT_TEMPLATE;
use crate::providers::CompletionProvider;

/// Display length of a truncated topic title, in grapheme clusters.
pub const TRUNCATE_DISPLAY_CHARS: usize = 10;

/// Placeholder title while the generated policy waits on the title model.
pub const NAMING_PLACEHOLDER: &str = "naming...";

/// Title used when the title model call fails.
pub const FALLBACK_TITLE: &str = "untitled topic";

/// Title installed at topic creation, before any labeling step completes.
pub fn provisional_title(text: &str, policy: TitlePolicy) -> String {
    match policy {
        TitlePolicy::Truncate => truncated_title(text),
        TitlePolicy::Generated => NAMING_PLACEHOLDER.to_string(),
    }
}

/// First [`TRUNCATE_DISPLAY_CHARS`] display characters of the message, with
/// an ellipsis suffix when truncation occurred.
pub fn truncated_title(text: &str) -> String {
    let graphemes: Vec<&str> = text.graphemes(true).collect();
    if graphemes.len() <= TRUNCATE_DISPLAY_CHARS {
        text.to_string()
    } else {
        format!("{}...", graphemes[..TRUNCATE_DISPLAY_CHARS].concat())
    }
}

/// Generate a title for a first message using the title model.
///
/// # Errors
/// Returns an error if the provider call fails or produces an
/// empty/invalid title. Callers fall back to [`FALLBACK_TITLE`] rather
/// than surfacing a second error mid-conversation.
pub async fn generate_title<P: CompletionProvider>(provider: &P, message: &str) -> Result<String> {
    let prompt = TOPIC_TITLE_PROMPT_TEMPLATE.replace("{{MESSAGE}}", message);
    let raw = provider.complete(&prompt).await?;
    sanitize_title(&raw)
}

fn sanitize_title(raw: &str) -> Result<String> {
    let mut line = raw
        .lines()
        .find(|l| !l.trim().is_empty())
        .ok_or_else(|| anyhow!("Empty title generated"))?
        .trim()
        .to_string();

    for prefix in ["title:", "Title:"] {
        if let Some(rest) = line.strip_prefix(prefix) {
            line = rest.trim().to_string();
            break;
        }
    }

    let trimmed = line
        .trim_matches(|c: char| c == '"' || c == '\'' || c == '`')
        .trim()
        .to_string();

    if trimmed.is_empty() {
        Err(anyhow!("Title is empty after sanitization"))
    } else {
        Ok(trimmed)
    }
}
