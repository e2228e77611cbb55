use std::sync::Arc;

use andro_llm::{ProviderEventStream, StreamEventPayload};
use tokio::sync::watch;

use crate::message::{Message, MessageId};
use crate::turn::TurnState;

pub const ABORT_MARKER: &str = "\n\n[TRANSMISSION ABORTED BY OPERATOR]";

/// Cooperative cancellation flag for one turn.
///
/// Clones share the flag. Each send takes its own token, so cancelling one
/// turn never leaks into the next.
#[derive(Debug, Clone)]
pub struct CancelToken {
    flag: Arc<watch::Sender<bool>>,
}

impl Default for CancelToken {
    fn default() -> Self {
        let (flag, _) = watch::channel(false);
        Self {
            flag: Arc::new(flag),
        }
    }
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.flag.send_replace(true);
    }

    pub fn is_cancelled(&self) -> bool {
        *self.flag.borrow()
    }

    /// Resolves once [`CancelToken::cancel`] has been called.
    pub async fn cancelled(&self) {
        let mut receiver = self.flag.subscribe();
        // The sender lives in `self`, so this can only return once the flag is set.
        let _ = receiver.wait_for(|cancelled| *cancelled).await;
    }
}

/// Presentation hook. Called synchronously after every state change.
pub trait ChatObserver: Send {
    fn history_changed(&mut self, _history: &[Message]) {}

    fn turn_state_changed(&mut self, _state: &TurnState) {}

    fn suggestions_changed(&mut self, _suggestions: &[String]) {}
}

#[derive(Debug, Default, Clone, Copy)]
pub struct NoopObserver;

impl ChatObserver for NoopObserver {}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamOutcome {
    /// `message_id` is `None` when the provider finished without any text.
    Completed { message_id: Option<MessageId> },
    Cancelled { message_id: Option<MessageId> },
    Failed {
        message_id: Option<MessageId>,
        error: String,
    },
}

/// Folds provider events into `history` until the stream finishes, fails or
/// `cancel` is observed.
///
/// The AI message is appended on the first delta and grows in place; the
/// observer sees every applied chunk. Events from other sessions are ignored.
pub async fn consume_stream(
    stream: &mut ProviderEventStream,
    history: &mut Vec<Message>,
    cancel: &CancelToken,
    observer: &mut dyn ChatObserver,
) -> StreamOutcome {
    let session_id = stream.session_id();
    let mut message_id: Option<MessageId> = None;

    loop {
        if cancel.is_cancelled() {
            return abort(stream, history, message_id, observer);
        }

        let next = tokio::select! {
            biased;
            _ = cancel.cancelled() => None,
            event = stream.recv() => Some(event),
        };

        let event = match next {
            None => return abort(stream, history, message_id, observer),
            Some(None) => {
                tracing::warn!(session_id = ?session_id, "provider stream closed before completion");
                return StreamOutcome::Failed {
                    message_id,
                    error: "provider stream ended before a terminal event".to_string(),
                };
            }
            Some(Some(event)) => event,
        };

        if event.session_id != session_id {
            tracing::warn!(
                expected = ?session_id,
                received = ?event.session_id,
                "dropping stale stream event"
            );
            continue;
        }

        match event.payload {
            StreamEventPayload::Delta(delta) => {
                let index = match message_id
                    .as_ref()
                    .and_then(|id| history.iter().rposition(|message| &message.id == id))
                {
                    Some(index) => index,
                    None => {
                        let message = Message::ai_streaming();
                        message_id = Some(message.id.clone());
                        history.push(message);
                        history.len() - 1
                    }
                };
                history[index].push_text(&delta);
                observer.history_changed(history);
            }
            StreamEventPayload::Done => {
                tracing::debug!(session_id = ?session_id, "provider stream completed");
                return StreamOutcome::Completed { message_id };
            }
            StreamEventPayload::Error(error) => {
                tracing::warn!(session_id = ?session_id, error = %error, "provider stream failed");
                return StreamOutcome::Failed { message_id, error };
            }
        }
    }
}

fn abort(
    stream: &mut ProviderEventStream,
    history: &mut [Message],
    message_id: Option<MessageId>,
    observer: &mut dyn ChatObserver,
) -> StreamOutcome {
    stream.cancel();
    tracing::info!(session_id = ?stream.session_id(), "turn cancelled by operator");

    if let Some(message) = message_id
        .as_ref()
        .and_then(|id| history.iter_mut().rev().find(|message| &message.id == id))
    {
        message.push_text(ABORT_MARKER);
        observer.history_changed(history);
    }

    StreamOutcome::Cancelled { message_id }
}
