use andro_llm::{
    LlmProvider, ProviderContent, ProviderPart, ProviderResult, ProviderStreamHandle,
    StreamRequest, StreamSessionId,
};

use crate::message::{Message, is_initial_greeting};
use crate::options::ChatOptions;

/// Request context bound to one history prefix.
///
/// Built fresh for every send and every edit fork; never reused.
#[derive(Debug, Clone, PartialEq)]
pub struct ChatSession {
    model_id: String,
    system_instruction: String,
    history: Vec<ProviderContent>,
}

impl ChatSession {
    pub fn from_history(history: &[Message], options: &ChatOptions) -> Self {
        Self {
            model_id: options.chat_model.clone(),
            system_instruction: options.system_instruction.clone(),
            history: history_for_api(history, options.history_limit),
        }
    }

    pub fn model_id(&self) -> &str {
        &self.model_id
    }

    pub fn history(&self) -> &[ProviderContent] {
        &self.history
    }

    pub fn send_stream(
        &self,
        provider: &dyn LlmProvider,
        session_id: StreamSessionId,
        prompt: Vec<ProviderPart>,
    ) -> ProviderResult<ProviderStreamHandle> {
        tracing::debug!(
            session_id = ?session_id,
            model_id = %self.model_id,
            history_len = self.history.len(),
            prompt_parts = prompt.len(),
            "sending chat turn"
        );

        let request = StreamRequest::new(session_id, self.model_id.clone(), self.history.clone(), prompt)
            .with_preamble(self.system_instruction.clone());
        provider.stream_chat(request)
    }
}

/// Projects history for the API: greeting dropped, last `limit` kept
/// oldest-first, display-only annotations stripped.
pub fn history_for_api(history: &[Message], limit: usize) -> Vec<ProviderContent> {
    let eligible = history
        .iter()
        .filter(|message| !is_initial_greeting(&message.id))
        .collect::<Vec<_>>();
    let skip = eligible.len().saturating_sub(limit);

    eligible
        .into_iter()
        .skip(skip)
        .map(Message::to_provider_content)
        .collect()
}

#[cfg(test)]
mod tests {
    use andro_llm::Role;

    use super::*;
    use crate::message::{Author, MessageId, Part};
    use crate::options::API_HISTORY_LIMIT;
    use crate::persona::initial_greeting;

    fn numbered(count: usize) -> Vec<Message> {
        let mut history = vec![initial_greeting()];
        history.extend((0..count).map(|index| {
            let author = if index % 2 == 0 { Author::User } else { Author::Ai };
            Message::new(
                MessageId::new(format!("m-{index}")),
                author,
                vec![Part::text(format!("turn {index}"))],
            )
        }));
        history
    }

    #[test]
    fn greeting_is_never_forwarded() {
        let projected = history_for_api(&numbered(3), API_HISTORY_LIMIT);

        assert_eq!(projected.len(), 3);
        assert_eq!(projected[0].text(), "turn 0");
        assert_eq!(projected[0].role, Role::User);
        assert_eq!(projected[1].role, Role::Model);
    }

    #[test]
    fn keeps_only_the_most_recent_messages_oldest_first() {
        let projected = history_for_api(&numbered(25), API_HISTORY_LIMIT);

        assert_eq!(projected.len(), API_HISTORY_LIMIT);
        assert_eq!(projected[0].text(), "turn 5");
        assert_eq!(projected[API_HISTORY_LIMIT - 1].text(), "turn 24");
    }

    #[test]
    fn inline_data_is_forwarded_without_file_name() {
        let history = vec![Message::new(
            MessageId::new("user-1"),
            Author::User,
            vec![Part::inline_data("image/png", "iVBOR", Some("cat.png".to_string()))],
        )];

        let projected = history_for_api(&history, API_HISTORY_LIMIT);

        assert_eq!(
            projected[0].parts,
            vec![ProviderPart::inline_data("image/png", "iVBOR")]
        );
    }

    #[test]
    fn session_carries_persona_and_model() {
        let options = ChatOptions::default().with_chat_model("gemini-test");
        let session = ChatSession::from_history(&numbered(2), &options);

        assert_eq!(session.model_id(), "gemini-test");
        assert_eq!(session.history().len(), 2);
    }

    #[tokio::test]
    async fn send_stream_attaches_system_instruction() {
        let provider = andro_llm::testing::ScriptedProvider::new();
        provider.push_stream(andro_llm::testing::StreamScript::chunks(["ok"]));
        let options = ChatOptions::default();
        let session = ChatSession::from_history(&numbered(1), &options);

        let handle = session.send_stream(
            &provider,
            StreamSessionId::new(7),
            vec![ProviderPart::text("hi")],
        );
        assert!(handle.is_ok());

        let requests = provider.stream_requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].session_id, StreamSessionId::new(7));
        assert_eq!(requests[0].preamble.as_deref(), Some(options.system_instruction.as_str()));
        assert_eq!(requests[0].history.len(), 1);
        assert_eq!(requests[0].prompt, vec![ProviderPart::text("hi")]);
    }
}
