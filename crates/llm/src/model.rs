#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Model {
    pub id: String,
    pub description: Option<String>,
}

impl Model {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            description: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

/// Model used for the conversation stream.
pub const DEFAULT_CHAT_MODEL: &str = "gemini-2.5-pro";

/// Cheaper model used for suggestions and README drafts.
pub const DEFAULT_UTILITY_MODEL: &str = "gemini-2.5-flash";

pub fn default_gemini_models() -> Vec<Model> {
    vec![
        Model::new(DEFAULT_CHAT_MODEL).with_description("Primary persona model"),
        Model::new(DEFAULT_UTILITY_MODEL).with_description("Fast model for side requests"),
        Model::new("gemini-2.5-flash-lite").with_description("Lowest latency option"),
    ]
}
