//! Conversation engine for the Ψ-4ndr0666 chat client.
//!
//! [`ChatController`] owns the history and drives turns: attachments are
//! marshalled by [`build_parts`], each request gets a fresh [`ChatSession`]
//! and [`consume_stream`] folds the provider's deltas into the reply.

pub mod attachment;
pub mod controller;
pub mod error;
pub mod message;
pub mod options;
pub mod persona;
pub mod readme;
pub mod session;
pub mod stream;
pub mod suggestions;
pub mod transcript;
pub mod turn;

pub use attachment::{
    Attachment, AttachmentError, AttachmentSet, BuiltParts, CONTEXT_CHAR_LIMIT, MAX_FILE_SIZE,
    TRUNCATION_MARKER, build_parts, fetch_url_context, load_attachment,
};
pub use controller::{ChatController, TurnOutcome};
pub use error::{ChatError, ChatResult};
pub use message::{
    Author, INITIAL_GREETING_ID, InlineData, Message, MessageId, Part, has_text_part,
    is_initial_greeting,
};
pub use options::{API_HISTORY_LIMIT, ChatOptions};
pub use persona::{PERSONA_NAME, SYSTEM_INSTRUCTION, initial_greeting};
pub use session::{ChatSession, history_for_api};
pub use stream::{ABORT_MARKER, CancelToken, ChatObserver, NoopObserver, StreamOutcome, consume_stream};
pub use suggestions::{SUGGESTION_VISIBILITY, SuggestionTray, fetch_suggestions};
pub use transcript::TranscriptError;
pub use turn::{TurnRejection, TurnState, TurnTransition};
