use andro_llm::{LlmProvider, OneShotRequest, ProviderResult};

use crate::message::Message;
use crate::suggestions::dialogue_excerpt;

const README_PROMPT: &str = "\
Draft a README.md that documents the project, tool or idea developed in the \
following conversation. Use a title, a short overview, installation or setup \
steps where they apply, usage examples in fenced code blocks and a section of \
open questions. Respond with the Markdown document only.";

/// Asks the utility model for a README summarising `history`.
pub async fn generate_readme(
    provider: &dyn LlmProvider,
    model_id: &str,
    system_instruction: &str,
    history: &[Message],
) -> ProviderResult<String> {
    let dialogue = dialogue_excerpt(history, usize::MAX);
    let request = OneShotRequest::new(model_id, format!("{README_PROMPT}\n\nCONVERSATION:\n{dialogue}"))
        .with_preamble(system_instruction);

    let raw = provider.generate_once(request).await?;
    tracing::debug!(model_id = %model_id, readme_len = raw.len(), "generated readme");

    Ok(strip_markdown_fence(&raw))
}

/// Removes a wrapping ```markdown fence the model sometimes adds.
///
/// A bare ``` opener only counts as a wrapper when the body holds no other
/// fence; otherwise it is the document's own first code block.
pub fn strip_markdown_fence(raw: &str) -> String {
    let trimmed = raw.trim();
    let Some((opening, rest)) = trimmed.split_once('\n') else {
        return trimmed.to_string();
    };
    let Some(info) = opening.trim_end().strip_prefix("```") else {
        return trimmed.to_string();
    };
    let Some(body) = rest.trim_end().strip_suffix("```") else {
        return trimmed.to_string();
    };

    let wrapped = match info.trim() {
        "markdown" | "md" => true,
        "" => !body.lines().any(|line| line.trim_start().starts_with("```")),
        _ => false,
    };
    if wrapped {
        body.trim().to_string()
    } else {
        trimmed.to_string()
    }
}
