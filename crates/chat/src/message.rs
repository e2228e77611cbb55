use std::fmt;

use andro_llm::{ProviderContent, ProviderPart, Role};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Id of the synthetic persona greeting that opens every conversation.
pub const INITIAL_GREETING_ID: &str = "ai-initial-greeting";

/// Stable identifier for one message.
///
/// Fresh ids are `<prefix>-<uuid v7>`, so they sort by creation time. Imported
/// transcripts keep whatever id they carried.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageId(pub String);

impl MessageId {
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub fn generate(prefix: &str) -> Self {
        Self(format!("{prefix}-{}", Uuid::now_v7()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(&self.0)
    }
}

impl From<&str> for MessageId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Author {
    User,
    Ai,
}

impl Author {
    pub fn role(self) -> Role {
        match self {
            Self::User => Role::User,
            Self::Ai => Role::Model,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InlineData {
    pub mime_type: String,
    /// Base64 payload.
    pub data: String,
    /// Display-only annotation, never sent to the API.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_name: Option<String>,
}

/// One content part, serialized in the generative API's wire shape.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Part {
    Text {
        text: String,
    },
    InlineData {
        #[serde(rename = "inlineData")]
        inline_data: InlineData,
    },
}

impl Part {
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text { text: text.into() }
    }

    pub fn inline_data(
        mime_type: impl Into<String>,
        data: impl Into<String>,
        file_name: Option<String>,
    ) -> Self {
        Self::InlineData {
            inline_data: InlineData {
                mime_type: mime_type.into(),
                data: data.into(),
                file_name,
            },
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text { text } => Some(text),
            Self::InlineData { .. } => None,
        }
    }

    /// API projection; `file_name` stays behind.
    pub fn to_provider_part(&self) -> ProviderPart {
        match self {
            Self::Text { text } => ProviderPart::text(text.clone()),
            Self::InlineData { inline_data } => {
                ProviderPart::inline_data(inline_data.mime_type.clone(), inline_data.data.clone())
            }
        }
    }

    /// Short label used when a transcript is flattened into prose.
    pub fn summary(&self) -> String {
        match self {
            Self::Text { text } => text.clone(),
            Self::InlineData { inline_data } => match &inline_data.file_name {
                Some(file_name) => format!("[Attachment: {file_name}]"),
                None => format!("[Attachment: {}]", inline_data.mime_type),
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub id: MessageId,
    pub author: Author,
    pub parts: Vec<Part>,
}

impl Message {
    pub fn new(id: MessageId, author: Author, parts: Vec<Part>) -> Self {
        Self { id, author, parts }
    }

    pub fn user(parts: Vec<Part>) -> Self {
        Self::new(MessageId::generate("user"), Author::User, parts)
    }

    pub fn ai_text(id: MessageId, text: impl Into<String>) -> Self {
        Self::new(id, Author::Ai, vec![Part::text(text)])
    }

    /// AI placeholder appended when the first chunk of a response arrives.
    pub fn ai_streaming() -> Self {
        Self::ai_text(MessageId::generate("ai"), String::new())
    }

    /// Synthesized AI message describing a failed request.
    pub fn system_fault(error: &str) -> Self {
        Self::ai_text(MessageId::generate("err"), format!("SYSTEM_FAULT: {error}"))
    }

    /// Concatenation of every text part.
    pub fn text(&self) -> String {
        self.parts
            .iter()
            .filter_map(Part::as_text)
            .collect::<String>()
    }

    fn text_index(&self) -> Option<usize> {
        self.parts
            .iter()
            .position(|part| matches!(part, Part::Text { .. }))
    }

    /// Replaces the first text part, or appends one when there is none.
    ///
    /// Blank text on a message that carries other parts drops its text parts
    /// instead, so no empty text part reaches the API.
    pub fn set_text(&mut self, text: impl Into<String>) {
        let text = text.into();
        if text.trim().is_empty()
            && self
                .parts
                .iter()
                .any(|part| matches!(part, Part::InlineData { .. }))
        {
            self.parts.retain(|part| !matches!(part, Part::Text { .. }));
            return;
        }

        let replacement = Part::text(text);
        match self.text_index() {
            Some(index) => self.parts[index] = replacement,
            None => self.parts.push(replacement),
        }
    }

    /// Appends to the first text part, creating it when missing.
    pub fn push_text(&mut self, delta: &str) {
        let Some(index) = self.text_index() else {
            self.parts.push(Part::text(delta));
            return;
        };
        if let Part::Text { text } = &mut self.parts[index] {
            text.push_str(delta);
        }
    }

    pub fn provider_parts(&self) -> Vec<ProviderPart> {
        self.parts.iter().map(Part::to_provider_part).collect()
    }

    pub fn to_provider_content(&self) -> ProviderContent {
        ProviderContent::new(self.author.role(), self.provider_parts())
    }

    /// Flattened one-line rendition, attachments shown by name.
    pub fn summary(&self) -> String {
        self.parts
            .iter()
            .map(Part::summary)
            .collect::<Vec<_>>()
            .join(" ")
    }
}

pub fn is_initial_greeting(id: &MessageId) -> bool {
    id.as_str() == INITIAL_GREETING_ID
}

pub fn has_text_part(message: &Message) -> bool {
    message
        .parts
        .iter()
        .any(|part| matches!(part, Part::Text { .. }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_ids_carry_prefix_and_are_unique() {
        let first = MessageId::generate("user");
        let second = MessageId::generate("user");

        assert!(first.as_str().starts_with("user-"));
        assert_ne!(first, second);
    }

    #[test]
    fn inline_data_round_trips_in_wire_shape() {
        let message = Message::new(
            MessageId::new("user-1"),
            Author::User,
            vec![
                Part::inline_data("image/png", "iVBOR", Some("cat.png".to_string())),
                Part::text("what is this"),
            ],
        );

        let json = match serde_json::to_value(&message) {
            Ok(json) => json,
            Err(error) => panic!("serialize failed: {error}"),
        };

        assert_eq!(json["author"], "user");
        assert_eq!(json["parts"][0]["inlineData"]["mimeType"], "image/png");
        assert_eq!(json["parts"][0]["inlineData"]["fileName"], "cat.png");
        assert_eq!(json["parts"][1]["text"], "what is this");

        let parsed: Message = match serde_json::from_value(json) {
            Ok(parsed) => parsed,
            Err(error) => panic!("deserialize failed: {error}"),
        };
        assert_eq!(parsed, message);
    }

    #[test]
    fn api_projection_drops_file_name_but_display_keeps_it() {
        let display = Part::inline_data("image/webp", "UklG", Some("shot.webp".to_string()));
        let message = Message::new(
            MessageId::new("user-5"),
            Author::User,
            vec![display.clone(), Part::text("caption")],
        );

        assert_eq!(
            message.to_provider_content(),
            ProviderContent::new(
                Role::User,
                vec![
                    ProviderPart::inline_data("image/webp", "UklG"),
                    ProviderPart::text("caption"),
                ]
            )
        );
        assert_eq!(
            display.to_provider_part(),
            ProviderPart::inline_data("image/webp", "UklG")
        );
        assert!(matches!(
            display,
            Part::InlineData { ref inline_data } if inline_data.file_name.as_deref() == Some("shot.webp")
        ));
    }

    #[test]
    fn set_text_replaces_existing_text_part_only() {
        let mut message = Message::new(
            MessageId::new("user-2"),
            Author::User,
            vec![
                Part::inline_data("image/png", "AAAA", None),
                Part::text("old"),
            ],
        );

        message.set_text("new");

        assert_eq!(message.parts.len(), 2);
        assert_eq!(message.text(), "new");

        let mut image_only = Message::new(
            MessageId::new("user-3"),
            Author::User,
            vec![Part::inline_data("image/png", "AAAA", None)],
        );
        image_only.set_text("caption");
        assert_eq!(image_only.parts.len(), 2);
        assert!(has_text_part(&image_only));
    }

    #[test]
    fn blank_text_on_an_attachment_drops_the_text_part() {
        let mut captioned = Message::new(
            MessageId::new("user-6"),
            Author::User,
            vec![
                Part::inline_data("image/png", "AAAA", None),
                Part::text("caption"),
            ],
        );

        captioned.set_text("  ");

        assert!(!has_text_part(&captioned));
        assert_eq!(
            captioned.provider_parts(),
            vec![ProviderPart::inline_data("image/png", "AAAA")]
        );

        let mut plain = Message::new(MessageId::new("user-7"), Author::User, vec![Part::text("x")]);
        plain.set_text("");
        assert_eq!(plain.parts, vec![Part::text("")]);
    }

    #[test]
    fn predicates() {
        assert!(is_initial_greeting(&MessageId::new(INITIAL_GREETING_ID)));
        assert!(!is_initial_greeting(&MessageId::new("ai-123")));

        let image_only = Message::new(
            MessageId::new("user-4"),
            Author::User,
            vec![Part::inline_data("image/gif", "R0lG", None)],
        );
        assert!(!has_text_part(&image_only));
        assert!(has_text_part(&Message::system_fault("boom")));
    }

    #[test]
    fn system_fault_uses_error_prefix() {
        let fault = Message::system_fault("network down");

        assert!(fault.id.as_str().starts_with("err-"));
        assert_eq!(fault.author, Author::Ai);
        assert_eq!(fault.text(), "SYSTEM_FAULT: network down");
    }
}
