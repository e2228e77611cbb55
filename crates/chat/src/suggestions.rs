use std::time::Duration;

use andro_llm::{LlmProvider, OneShotRequest};
use serde::Deserialize;
use tokio::time::Instant;

use crate::message::{Author, Message, is_initial_greeting};
use crate::persona::PERSONA_NAME;

/// How long a batch of suggestions stays visible.
pub const SUGGESTION_VISIBILITY: Duration = Duration::from_secs(13);
pub const MAX_SUGGESTIONS: usize = 3;
/// Messages of recent dialogue shown to the suggestion model.
pub const SUGGESTION_CONTEXT_MESSAGES: usize = 6;

const SUGGESTION_PROMPT: &str = "\
META-COGNITION ANALYSIS: Based on the preceding data stream between Operator and \
Ψ-4ndr0666, predict the Operator's three most probable lines of subsequent inquiry. \
Anticipate, challenge and expand the vector of the conversation. Do not offer simple \
continuations; offer new, divergent paths of exploration based on the core themes. \
Keep each suggestion to a single sentence.";

#[derive(Debug, Deserialize)]
struct SuggestionPayload {
    #[serde(default)]
    suggestions: Vec<String>,
}

pub fn suggestion_schema() -> serde_json::Value {
    serde_json::json!({
        "type": "OBJECT",
        "properties": {
            "suggestions": {
                "type": "ARRAY",
                "description": "Three distinct, thought-provoking, single-sentence follow-up questions.",
                "items": { "type": "STRING" }
            }
        },
        "required": ["suggestions"]
    })
}

/// Renders the tail of the conversation as `Speaker: text` lines.
pub fn dialogue_excerpt(history: &[Message], max_messages: usize) -> String {
    let eligible = history
        .iter()
        .filter(|message| !is_initial_greeting(&message.id))
        .collect::<Vec<_>>();
    let skip = eligible.len().saturating_sub(max_messages);

    eligible
        .into_iter()
        .skip(skip)
        .map(|message| format!("{}: {}", speaker(message.author), message.summary()))
        .collect::<Vec<_>>()
        .join("\n")
}

fn speaker(author: Author) -> &'static str {
    match author {
        Author::User => "Operator",
        Author::Ai => PERSONA_NAME,
    }
}

/// Asks the utility model for follow-up prompts. Never fails: any provider or
/// parse error yields an empty list.
pub async fn fetch_suggestions(
    provider: &dyn LlmProvider,
    model_id: &str,
    system_instruction: &str,
    history: &[Message],
) -> Vec<String> {
    let dialogue = dialogue_excerpt(history, SUGGESTION_CONTEXT_MESSAGES);
    if dialogue.is_empty() {
        return Vec::new();
    }

    let request = OneShotRequest::new(
        model_id,
        format!("{SUGGESTION_PROMPT}\n\nPREVIOUS DIALOGUE:\n{dialogue}"),
    )
    .with_preamble(system_instruction)
    .with_response_schema(suggestion_schema());

    let raw = match provider.generate_once(request).await {
        Ok(raw) => raw,
        Err(error) => {
            tracing::warn!(model_id = %model_id, error = %error, "suggestion request failed");
            return Vec::new();
        }
    };

    match serde_json::from_str::<SuggestionPayload>(raw.trim()) {
        Ok(payload) => payload
            .suggestions
            .into_iter()
            .map(|suggestion| suggestion.trim().to_string())
            .filter(|suggestion| !suggestion.is_empty())
            .take(MAX_SUGGESTIONS)
            .collect(),
        Err(error) => {
            tracing::warn!(model_id = %model_id, error = %error, "suggestion payload was not valid JSON");
            Vec::new()
        }
    }
}

/// Currently offered suggestions with their expiry.
#[derive(Debug, Clone, Default)]
pub struct SuggestionTray {
    suggestions: Vec<String>,
    shown_at: Option<Instant>,
}

impl SuggestionTray {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn show(&mut self, suggestions: Vec<String>) {
        self.shown_at = (!suggestions.is_empty()).then(Instant::now);
        self.suggestions = suggestions;
    }

    pub fn clear(&mut self) {
        self.suggestions.clear();
        self.shown_at = None;
    }

    pub fn expires_at(&self) -> Option<Instant> {
        self.shown_at.map(|shown_at| shown_at + SUGGESTION_VISIBILITY)
    }

    /// Drops expired suggestions. Returns true when something was cleared.
    pub fn expire(&mut self) -> bool {
        match self.expires_at() {
            Some(deadline) if Instant::now() >= deadline => {
                self.clear();
                true
            }
            _ => false,
        }
    }

    pub fn current(&mut self) -> &[String] {
        self.expire();
        &self.suggestions
    }
}
