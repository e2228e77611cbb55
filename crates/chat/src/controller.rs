use std::path::Path;
use std::sync::Arc;

use andro_llm::{LlmProvider, ProviderPart, StreamSessionId};
use snafu::{ResultExt, ensure};

use crate::attachment::{Attachment, AttachmentSet, build_parts, fetch_url_context, load_attachment};
use crate::error::{
    AttachmentSnafu, ChatResult, EmptyHistorySnafu, EmptyPromptSnafu, MessageNotFoundSnafu,
    NotEditableSnafu, ProviderSnafu, TranscriptSnafu, TurnInFlightSnafu,
};
use crate::message::{Author, Message, MessageId, has_text_part, is_initial_greeting};
use crate::options::ChatOptions;
use crate::persona::initial_greeting;
use crate::readme;
use crate::session::ChatSession;
use crate::stream::{CancelToken, ChatObserver, StreamOutcome, consume_stream};
use crate::suggestions::{SuggestionTray, fetch_suggestions};
use crate::transcript::{export_transcript, parse_transcript};
use crate::turn::{TurnState, TurnTransition};

/// How a turn ended. Provider failures are reported here, not as errors: the
/// conversation already carries the `SYSTEM_FAULT` message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TurnOutcome {
    Completed,
    Cancelled,
    Failed { error: String },
}

/// Owns the conversation and runs turns against a provider.
pub struct ChatController {
    provider: Arc<dyn LlmProvider>,
    options: ChatOptions,
    history: Vec<Message>,
    turn: TurnState,
    staged: AttachmentSet,
    suggestions: SuggestionTray,
    last_session_id: StreamSessionId,
}

impl ChatController {
    pub fn new(provider: Arc<dyn LlmProvider>, options: ChatOptions) -> Self {
        Self {
            provider,
            options,
            history: vec![initial_greeting()],
            turn: TurnState::Idle,
            staged: AttachmentSet::new(),
            suggestions: SuggestionTray::new(),
            last_session_id: StreamSessionId::new(0),
        }
    }

    pub fn history(&self) -> &[Message] {
        &self.history
    }

    pub fn turn_state(&self) -> &TurnState {
        &self.turn
    }

    pub fn options(&self) -> &ChatOptions {
        &self.options
    }

    pub fn provider(&self) -> &dyn LlmProvider {
        self.provider.as_ref()
    }

    /// Swaps the provider, keeping the conversation.
    pub fn set_provider(&mut self, provider: Arc<dyn LlmProvider>) {
        tracing::info!(provider_id = %provider.id(), "switching provider");
        self.provider = provider;
    }

    pub fn set_chat_model(&mut self, model_id: impl Into<String>) {
        self.options.chat_model = model_id.into();
    }

    pub fn staged(&self) -> &AttachmentSet {
        &self.staged
    }

    pub fn stage_attachment(&mut self, attachment: Attachment) {
        tracing::debug!(label = %attachment.label(), "staging attachment");
        self.staged.stage(attachment);
    }

    /// Loads and stages a local file. Staging is untouched on failure.
    pub fn attach_file(&mut self, path: &Path) -> ChatResult<()> {
        let attachment = load_attachment(path).context(AttachmentSnafu {
            stage: "attach-file",
        })?;
        self.stage_attachment(attachment);
        Ok(())
    }

    /// Fetches and stages URL context. Staging is untouched on failure.
    pub async fn attach_url(&mut self, url: &str) -> ChatResult<()> {
        let attachment = fetch_url_context(url).await.context(AttachmentSnafu {
            stage: "attach-url",
        })?;
        self.stage_attachment(attachment);
        Ok(())
    }

    pub fn remove_attachment(&mut self, index: usize) -> Option<Attachment> {
        self.staged.remove(index)
    }

    pub fn clear_attachments(&mut self) {
        self.staged.clear();
    }

    pub fn suggestions_enabled(&self) -> bool {
        self.options.suggestions_enabled
    }

    pub fn set_suggestions_enabled(&mut self, enabled: bool) {
        self.options.suggestions_enabled = enabled;
        if !enabled {
            self.suggestions.clear();
        }
    }

    /// Suggestions still inside their visibility window.
    pub fn current_suggestions(&mut self) -> &[String] {
        self.suggestions.current()
    }

    /// Sends `text` together with whatever is staged.
    pub async fn send(
        &mut self,
        text: &str,
        cancel: &CancelToken,
        observer: &mut dyn ChatObserver,
    ) -> ChatResult<TurnOutcome> {
        ensure!(
            !text.trim().is_empty() || !self.staged.is_empty(),
            EmptyPromptSnafu { stage: "send" }
        );
        let session_id = self.begin_turn("send", observer)?;

        let attachments = self.staged.take();
        let built = build_parts(text, &attachments);
        self.clear_suggestions(observer);

        let session = ChatSession::from_history(&self.history, &self.options);
        self.history.push(Message::user(built.display));
        observer.history_changed(&self.history);

        Ok(self.run_turn(session, session_id, built.api, cancel, observer).await)
    }

    /// Rewrites a user message, drops everything after it and regenerates
    /// the reply from that point.
    pub async fn edit_and_resend(
        &mut self,
        id: &MessageId,
        text: &str,
        cancel: &CancelToken,
        observer: &mut dyn ChatObserver,
    ) -> ChatResult<TurnOutcome> {
        let index = self.index_of(id, "edit-and-resend")?;
        let target = &self.history[index];
        ensure!(
            target.author == Author::User,
            NotEditableSnafu {
                stage: "edit-and-resend",
                id: id.clone(),
            }
        );
        let carries_attachment = target.parts.len() > usize::from(has_text_part(target));
        ensure!(
            !text.trim().is_empty() || carries_attachment,
            EmptyPromptSnafu {
                stage: "edit-and-resend"
            }
        );
        let session_id = self.begin_turn("edit-and-resend", observer)?;

        self.history.truncate(index + 1);
        self.history[index].set_text(text);
        self.clear_suggestions(observer);
        observer.history_changed(&self.history);

        let session = ChatSession::from_history(&self.history[..index], &self.options);
        let prompt = self.history[index].provider_parts();
        tracing::info!(message_id = %id, index, "forking conversation from edited message");

        Ok(self.run_turn(session, session_id, prompt, cancel, observer).await)
    }

    pub fn delete_message(&mut self, id: &MessageId) -> ChatResult<Message> {
        let index = self.index_of(id, "delete-message")?;
        Ok(self.history.remove(index))
    }

    /// Starts over with a fresh greeting.
    pub fn clear(&mut self) {
        self.history = vec![initial_greeting()];
        self.staged.clear();
        self.suggestions.clear();
    }

    pub fn export_transcript(&self) -> ChatResult<String> {
        export_transcript(&self.history).context(TranscriptSnafu {
            stage: "export-transcript",
        })
    }

    /// Replaces the whole history. On any validation failure the current
    /// history is kept as is.
    pub fn import_transcript(&mut self, document: &str) -> ChatResult<usize> {
        let imported = parse_transcript(document).context(TranscriptSnafu {
            stage: "import-transcript",
        })?;
        let count = imported.len();

        self.history = imported;
        self.suggestions.clear();
        tracing::info!(message_count = count, "imported transcript");

        Ok(count)
    }

    pub async fn generate_readme(&self) -> ChatResult<String> {
        ensure!(
            self.history
                .iter()
                .any(|message| !is_initial_greeting(&message.id)),
            EmptyHistorySnafu {
                stage: "generate-readme"
            }
        );

        readme::generate_readme(
            self.provider.as_ref(),
            &self.options.utility_model,
            &self.options.system_instruction,
            &self.history,
        )
        .await
        .context(ProviderSnafu {
            stage: "generate-readme",
        })
    }

    fn index_of(&self, id: &MessageId, stage: &'static str) -> ChatResult<usize> {
        self.history
            .iter()
            .position(|message| &message.id == id)
            .ok_or_else(|| {
                MessageNotFoundSnafu {
                    stage,
                    id: id.clone(),
                }
                .build()
            })
    }

    fn begin_turn(
        &mut self,
        stage: &'static str,
        observer: &mut dyn ChatObserver,
    ) -> ChatResult<StreamSessionId> {
        let session_id = self.last_session_id.next();
        let next = self
            .turn
            .apply(TurnTransition::Begin(session_id))
            .map_err(|rejection| TurnInFlightSnafu { stage, rejection }.build())?;

        self.last_session_id = session_id;
        self.turn = next;
        observer.turn_state_changed(&self.turn);
        Ok(session_id)
    }

    fn advance(&mut self, transition: TurnTransition, observer: &mut dyn ChatObserver) {
        match self.turn.apply(transition) {
            Ok(next) => {
                self.turn = next;
                observer.turn_state_changed(&self.turn);
            }
            Err(rejection) => {
                tracing::warn!(state = ?self.turn, rejection = ?rejection, "turn transition rejected");
            }
        }
    }

    fn clear_suggestions(&mut self, observer: &mut dyn ChatObserver) {
        self.suggestions.clear();
        observer.suggestions_changed(&[]);
    }

    async fn run_turn(
        &mut self,
        session: ChatSession,
        session_id: StreamSessionId,
        prompt: Vec<ProviderPart>,
        cancel: &CancelToken,
        observer: &mut dyn ChatObserver,
    ) -> TurnOutcome {
        let handle = match session.send_stream(self.provider.as_ref(), session_id, prompt) {
            Ok(handle) => handle,
            Err(error) => {
                tracing::error!(session_id = ?session_id, error = %error, "failed to open chat stream");
                return self.fail_turn(session_id, error.to_string(), observer);
            }
        };

        self.advance(TurnTransition::StreamOpened(session_id), observer);
        let worker = tokio::spawn(handle.worker);
        let mut stream = handle.stream;

        let outcome = consume_stream(&mut stream, &mut self.history, cancel, observer).await;
        drop(stream);

        match outcome {
            StreamOutcome::Completed { message_id } => {
                tracing::debug!(session_id = ?session_id, message_id = ?message_id, "turn completed");
                self.advance(TurnTransition::Complete(session_id), observer);
                self.refresh_suggestions(observer).await;
                TurnOutcome::Completed
            }
            StreamOutcome::Cancelled { .. } => {
                worker.abort();
                self.advance(TurnTransition::Cancel(session_id), observer);
                self.advance(TurnTransition::Reset, observer);
                TurnOutcome::Cancelled
            }
            StreamOutcome::Failed { error, .. } => {
                worker.abort();
                self.fail_turn(session_id, error, observer)
            }
        }
    }

    fn fail_turn(
        &mut self,
        session_id: StreamSessionId,
        error: String,
        observer: &mut dyn ChatObserver,
    ) -> TurnOutcome {
        self.history.push(Message::system_fault(&error));
        observer.history_changed(&self.history);
        self.advance(
            TurnTransition::Fail {
                session_id,
                message: error.clone(),
            },
            observer,
        );
        self.advance(TurnTransition::Reset, observer);
        TurnOutcome::Failed { error }
    }

    async fn refresh_suggestions(&mut self, observer: &mut dyn ChatObserver) {
        if !self.options.suggestions_enabled {
            return;
        }

        let suggestions = fetch_suggestions(
            self.provider.as_ref(),
            &self.options.utility_model,
            &self.options.system_instruction,
            &self.history,
        )
        .await;

        self.suggestions.show(suggestions);
        observer.suggestions_changed(self.suggestions.current());
    }
}

#[cfg(test)]
mod tests {
    use andro_llm::testing::{ScriptedProvider, StreamScript};
    use andro_llm::{ProviderPart, Role};

    use super::*;
    use crate::error::ChatError;
    use crate::message::Part;
    use crate::stream::{ABORT_MARKER, NoopObserver};

    fn controller(provider: &Arc<ScriptedProvider>) -> ChatController {
        ChatController::new(provider.clone(), ChatOptions::default())
    }

    fn quiet_controller(provider: &Arc<ScriptedProvider>) -> ChatController {
        ChatController::new(provider.clone(), ChatOptions::default().with_suggestions(false))
    }

    /// Cancels as soon as the AI reply shows up in history.
    struct CancelOnReply {
        token: CancelToken,
        states: Vec<TurnState>,
    }

    impl ChatObserver for CancelOnReply {
        fn history_changed(&mut self, history: &[Message]) {
            if history.last().is_some_and(|message| message.author == Author::Ai) {
                self.token.cancel();
            }
        }

        fn turn_state_changed(&mut self, state: &TurnState) {
            self.states.push(state.clone());
        }
    }

    async fn seed_turns(chat: &mut ChatController, provider: &ScriptedProvider, turns: usize) {
        for turn in 0..turns {
            provider.push_stream(StreamScript::chunks([format!("reply {turn}")]));
            let outcome = chat
                .send(&format!("prompt {turn}"), &CancelToken::new(), &mut NoopObserver)
                .await;
            assert!(matches!(outcome, Ok(TurnOutcome::Completed)));
        }
    }

    #[tokio::test]
    async fn send_streams_reply_and_refreshes_suggestions() {
        let provider = Arc::new(ScriptedProvider::new());
        provider.push_stream(StreamScript::chunks(["Hel", "lo"]));
        provider.push_one_shot(Ok(r#"{"suggestions":["why?","how?"]}"#.to_string()));
        let mut chat = controller(&provider);

        let outcome = chat.send("hello", &CancelToken::new(), &mut NoopObserver).await;

        assert!(matches!(outcome, Ok(TurnOutcome::Completed)));
        assert_eq!(chat.history().len(), 3);
        assert_eq!(chat.history()[1].author, Author::User);
        assert_eq!(chat.history()[2].text(), "Hello");
        assert!(chat.turn_state().is_idle());
        assert_eq!(chat.current_suggestions(), ["why?".to_string(), "how?".to_string()]);

        let requests = provider.stream_requests();
        assert!(requests[0].history.is_empty());
        assert_eq!(requests[0].prompt, vec![ProviderPart::text("hello")]);
        assert_eq!(provider.one_shot_requests()[0].model_id, chat.options().utility_model);
    }

    #[tokio::test]
    async fn disabled_suggestions_skip_the_side_request() {
        let provider = Arc::new(ScriptedProvider::new());
        provider.push_stream(StreamScript::chunks(["ok"]));
        let mut chat = quiet_controller(&provider);

        let outcome = chat.send("hi", &CancelToken::new(), &mut NoopObserver).await;

        assert!(matches!(outcome, Ok(TurnOutcome::Completed)));
        assert!(provider.one_shot_requests().is_empty());
        assert!(chat.current_suggestions().is_empty());
    }

    #[tokio::test]
    async fn cancel_after_first_chunk_suppresses_suggestions() {
        let provider = Arc::new(ScriptedProvider::new());
        provider.push_stream(StreamScript::chunks(["first", "second", "third"]));
        let mut chat = controller(&provider);
        let token = CancelToken::new();
        let mut observer = CancelOnReply {
            token: token.clone(),
            states: Vec::new(),
        };

        let outcome = chat.send("go", &token, &mut observer).await;

        assert!(matches!(outcome, Ok(TurnOutcome::Cancelled)));
        assert_eq!(chat.history()[2].text(), format!("first{ABORT_MARKER}"));
        assert!(provider.one_shot_requests().is_empty());
        assert!(chat.turn_state().is_idle());
        assert!(matches!(
            observer.states.as_slice(),
            [
                TurnState::Sending(_),
                TurnState::Streaming(_),
                TurnState::Cancelled(_),
                TurnState::Idle
            ]
        ));
    }

    #[tokio::test]
    async fn provider_failure_becomes_system_fault_message() {
        let provider = Arc::new(ScriptedProvider::new());
        provider.push_stream(StreamScript::Reject("network unreachable".to_string()));
        let mut chat = controller(&provider);

        let outcome = chat.send("hi", &CancelToken::new(), &mut NoopObserver).await;

        assert!(matches!(outcome, Ok(TurnOutcome::Failed { .. })));
        let fault = &chat.history()[2];
        assert!(fault.id.as_str().starts_with("err-"));
        assert!(fault.text().starts_with("SYSTEM_FAULT: "));
        assert!(fault.text().contains("network unreachable"));
        assert!(chat.turn_state().is_idle());
    }

    #[tokio::test]
    async fn empty_prompt_is_rejected_without_touching_history() {
        let provider = Arc::new(ScriptedProvider::new());
        let mut chat = controller(&provider);

        let result = chat.send("   ", &CancelToken::new(), &mut NoopObserver).await;

        assert!(matches!(result, Err(ChatError::EmptyPrompt { .. })));
        assert_eq!(chat.history().len(), 1);
        assert!(provider.stream_requests().is_empty());
    }

    #[tokio::test]
    async fn send_is_rejected_while_a_turn_is_in_flight() {
        let provider = Arc::new(ScriptedProvider::new());
        let mut chat = controller(&provider);
        chat.turn = TurnState::Streaming(StreamSessionId::new(41));

        let result = chat.send("hi", &CancelToken::new(), &mut NoopObserver).await;

        assert!(matches!(result, Err(ChatError::TurnInFlight { .. })));
        assert_eq!(chat.history().len(), 1);
    }

    #[tokio::test]
    async fn url_attachment_is_wrapped_for_the_api_and_summarised_for_display() {
        let provider = Arc::new(ScriptedProvider::new());
        provider.push_stream(StreamScript::chunks(["read it"]));
        let mut chat = quiet_controller(&provider);
        chat.stage_attachment(Attachment::Url {
            url: "https://example.com".to_string(),
            content: "page body".to_string(),
        });

        let outcome = chat.send("summarise", &CancelToken::new(), &mut NoopObserver).await;

        assert!(matches!(outcome, Ok(TurnOutcome::Completed)));
        assert!(chat.staged().is_empty());
        assert_eq!(
            chat.history()[1].text(),
            "[Attached URL: https://example.com] summarise"
        );
        let prompt = &provider.stream_requests()[0].prompt;
        assert!(matches!(
            prompt.as_slice(),
            [ProviderPart::Text(text)] if text.contains("page body") && text.ends_with("USER PROMPT: summarise")
        ));
    }

    #[tokio::test]
    async fn edit_forks_history_at_the_edited_message() {
        let provider = Arc::new(ScriptedProvider::new());
        let mut chat = quiet_controller(&provider);
        seed_turns(&mut chat, &provider, 3).await;
        assert_eq!(chat.history().len(), 7);

        let edited = chat.history()[3].id.clone();
        provider.push_stream(StreamScript::chunks(["fresh"]));
        let outcome = chat
            .edit_and_resend(&edited, "rewritten", &CancelToken::new(), &mut NoopObserver)
            .await;

        assert!(matches!(outcome, Ok(TurnOutcome::Completed)));
        assert_eq!(chat.history().len(), 3 + 1 + 1);
        assert_eq!(chat.history()[3].id, edited);
        assert_eq!(chat.history()[3].text(), "rewritten");
        assert_eq!(chat.history()[4].text(), "fresh");
        assert!(chat.history().iter().all(|message| message.text() != "reply 1"));

        let fork = provider.stream_requests().pop();
        assert!(matches!(
            fork,
            Some(ref request)
                if request.history.len() == 2
                    && request.history[0].role == Role::User
                    && request.prompt == vec![ProviderPart::text("rewritten")]
        ));
    }

    #[tokio::test]
    async fn blank_edit_of_an_image_message_sends_only_the_image() {
        let provider = Arc::new(ScriptedProvider::new());
        provider.push_stream(StreamScript::chunks(["a cat"]));
        provider.push_stream(StreamScript::chunks(["still a cat"]));
        let mut chat = quiet_controller(&provider);
        chat.stage_attachment(Attachment::Image {
            file_name: "cat.png".to_string(),
            mime_type: "image/png".to_string(),
            base64: "AAAA".to_string(),
        });
        let sent = chat.send("what is it", &CancelToken::new(), &mut NoopObserver).await;
        assert!(matches!(sent, Ok(TurnOutcome::Completed)));
        let edited = chat.history()[1].id.clone();

        let outcome = chat
            .edit_and_resend(&edited, "  ", &CancelToken::new(), &mut NoopObserver)
            .await;

        assert!(matches!(outcome, Ok(TurnOutcome::Completed)));
        assert!(!has_text_part(&chat.history()[1]));
        assert_eq!(chat.history()[2].text(), "still a cat");
        let fork = provider.stream_requests().pop();
        assert!(matches!(
            fork,
            Some(ref request)
                if request.prompt == vec![ProviderPart::inline_data("image/png", "AAAA")]
        ));
    }

    #[tokio::test]
    async fn blank_edit_of_a_text_message_is_rejected() {
        let provider = Arc::new(ScriptedProvider::new());
        let mut chat = quiet_controller(&provider);
        seed_turns(&mut chat, &provider, 1).await;
        let edited = chat.history()[1].id.clone();

        let result = chat
            .edit_and_resend(&edited, "", &CancelToken::new(), &mut NoopObserver)
            .await;

        assert!(matches!(result, Err(ChatError::EmptyPrompt { .. })));
        assert_eq!(chat.history().len(), 3);
        assert_eq!(chat.history()[1].text(), "prompt 0");
    }

    #[test]
    fn failed_file_load_keeps_staging() {
        let provider = Arc::new(ScriptedProvider::new());
        let mut chat = quiet_controller(&provider);
        let staged = Attachment::Text {
            file_name: "notes.md".to_string(),
            mime_type: "text/markdown".to_string(),
            content: "# notes".to_string(),
        };
        chat.stage_attachment(staged.clone());

        let missing = std::env::temp_dir()
            .join(format!("andro-missing-{}", uuid::Uuid::now_v7()))
            .join("gone.txt");
        let result = chat.attach_file(&missing);

        assert!(matches!(result, Err(ChatError::Attachment { .. })));
        assert_eq!(chat.staged().as_slice(), &[staged]);
    }

    #[tokio::test]
    async fn only_known_user_messages_can_be_edited() {
        let provider = Arc::new(ScriptedProvider::new());
        let mut chat = quiet_controller(&provider);
        let greeting = chat.history()[0].id.clone();

        let not_editable = chat
            .edit_and_resend(&greeting, "x", &CancelToken::new(), &mut NoopObserver)
            .await;
        let missing = chat
            .edit_and_resend(&MessageId::new("nope"), "x", &CancelToken::new(), &mut NoopObserver)
            .await;

        assert!(matches!(not_editable, Err(ChatError::NotEditable { .. })));
        assert!(matches!(missing, Err(ChatError::MessageNotFound { .. })));
        assert!(chat.turn_state().is_idle());
    }

    #[tokio::test]
    async fn api_history_is_bounded_and_excludes_greeting() {
        let provider = Arc::new(ScriptedProvider::new());
        let mut chat = quiet_controller(&provider);
        seed_turns(&mut chat, &provider, 12).await;
        assert_eq!(chat.history().len(), 25);

        provider.push_stream(StreamScript::chunks(["ok"]));
        let outcome = chat.send("last", &CancelToken::new(), &mut NoopObserver).await;
        assert!(matches!(outcome, Ok(TurnOutcome::Completed)));

        let last = provider.stream_requests().pop();
        assert!(matches!(
            last,
            Some(ref request)
                if request.history.len() == 20
                    && request.history[0].text() == "prompt 2"
                    && request.history[19].text() == "reply 11"
        ));
    }

    #[tokio::test]
    async fn delete_removes_only_the_named_message() {
        let provider = Arc::new(ScriptedProvider::new());
        let mut chat = quiet_controller(&provider);
        seed_turns(&mut chat, &provider, 2).await;
        let victim = chat.history()[2].id.clone();
        let survivors = [chat.history()[1].id.clone(), chat.history()[3].id.clone()];

        let removed = chat.delete_message(&victim);

        assert!(matches!(removed, Ok(ref message) if message.id == victim));
        assert_eq!(chat.history().len(), 4);
        assert_eq!(chat.history()[1].id, survivors[0]);
        assert_eq!(chat.history()[2].id, survivors[1]);
        assert!(matches!(
            chat.delete_message(&victim),
            Err(ChatError::MessageNotFound { .. })
        ));
    }

    #[tokio::test]
    async fn rejected_import_leaves_history_unchanged() {
        let provider = Arc::new(ScriptedProvider::new());
        let mut chat = quiet_controller(&provider);
        seed_turns(&mut chat, &provider, 1).await;
        let before = chat.export_transcript().ok();

        let result = chat.import_transcript(r#"[{"id": "user-9", "author": "user"}]"#);

        assert!(matches!(result, Err(ChatError::Transcript { .. })));
        assert_eq!(chat.export_transcript().ok(), before);
    }

    #[test]
    fn import_replaces_history_wholesale() {
        let provider = Arc::new(ScriptedProvider::new());
        let mut chat = quiet_controller(&provider);
        let document = r#"[
            {"id": "user-1", "author": "user", "parts": [{"text": "imported"}]},
            {"id": "ai-1", "author": "ai", "parts": [{"text": "yes"}]}
        ]"#;

        assert!(matches!(chat.import_transcript(document), Ok(2)));
        assert_eq!(chat.history()[0].text(), "imported");
        assert_eq!(
            chat.history()[1].parts,
            vec![Part::text("yes")]
        );
    }

    #[tokio::test]
    async fn readme_needs_real_conversation() {
        let provider = Arc::new(ScriptedProvider::new());
        let mut chat = quiet_controller(&provider);

        assert!(matches!(
            chat.generate_readme().await,
            Err(ChatError::EmptyHistory { .. })
        ));

        seed_turns(&mut chat, &provider, 1).await;
        provider.push_one_shot(Ok("# Project".to_string()));
        assert!(matches!(chat.generate_readme().await, Ok(ref text) if text == "# Project"));
    }

    #[tokio::test]
    async fn model_and_provider_changes_apply_to_the_next_turn() {
        let first = Arc::new(ScriptedProvider::new());
        let second = Arc::new(ScriptedProvider::new());
        second.push_stream(StreamScript::chunks(["from second"]));
        let mut chat = quiet_controller(&first);

        chat.set_provider(second.clone());
        chat.set_chat_model("gemini-2.5-flash-lite");
        let outcome = chat.send("hi", &CancelToken::new(), &mut NoopObserver).await;

        assert!(matches!(outcome, Ok(TurnOutcome::Completed)));
        assert!(first.stream_requests().is_empty());
        assert_eq!(second.stream_requests()[0].model_id, "gemini-2.5-flash-lite");
        assert_eq!(chat.history()[2].text(), "from second");
    }

    #[test]
    fn clear_resets_to_a_single_greeting() {
        let provider = Arc::new(ScriptedProvider::new());
        let mut chat = quiet_controller(&provider);
        chat.stage_attachment(Attachment::Url {
            url: "https://example.com".to_string(),
            content: String::new(),
        });

        chat.clear();

        assert_eq!(chat.history().len(), 1);
        assert!(is_initial_greeting(&chat.history()[0].id));
        assert!(chat.staged().is_empty());
    }
}
