use andro_llm::{DEFAULT_CHAT_MODEL, DEFAULT_UTILITY_MODEL};

use crate::persona::SYSTEM_INSTRUCTION;

/// Most recent messages forwarded to the API per request.
pub const API_HISTORY_LIMIT: usize = 20;

/// Knobs the controller and session factory read on every turn.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatOptions {
    pub chat_model: String,
    pub utility_model: String,
    pub system_instruction: String,
    pub history_limit: usize,
    pub suggestions_enabled: bool,
}

impl Default for ChatOptions {
    fn default() -> Self {
        Self {
            chat_model: DEFAULT_CHAT_MODEL.to_string(),
            utility_model: DEFAULT_UTILITY_MODEL.to_string(),
            system_instruction: SYSTEM_INSTRUCTION.to_string(),
            history_limit: API_HISTORY_LIMIT,
            suggestions_enabled: true,
        }
    }
}

impl ChatOptions {
    pub fn with_chat_model(mut self, model_id: impl Into<String>) -> Self {
        self.chat_model = model_id.into();
        self
    }

    pub fn with_utility_model(mut self, model_id: impl Into<String>) -> Self {
        self.utility_model = model_id.into();
        self
    }

    pub fn with_history_limit(mut self, limit: usize) -> Self {
        self.history_limit = limit;
        self
    }

    pub fn with_suggestions(mut self, enabled: bool) -> Self {
        self.suggestions_enabled = enabled;
        self
    }
}
