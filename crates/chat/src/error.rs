use andro_llm::ProviderError;
use snafu::Snafu;

use crate::attachment::AttachmentError;
use crate::message::MessageId;
use crate::transcript::TranscriptError;
use crate::turn::TurnRejection;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum ChatError {
    #[snafu(display("a turn is already in flight: {rejection:?}"))]
    TurnInFlight {
        stage: &'static str,
        rejection: TurnRejection,
    },
    #[snafu(display("nothing to send: message is empty and no attachment is staged"))]
    EmptyPrompt { stage: &'static str },
    #[snafu(display("message {id} not found"))]
    MessageNotFound { stage: &'static str, id: MessageId },
    #[snafu(display("message {id} is not a user message and cannot be edited"))]
    NotEditable { stage: &'static str, id: MessageId },
    #[snafu(display("conversation has no messages beyond the greeting"))]
    EmptyHistory { stage: &'static str },
    #[snafu(display("transcript rejected on `{stage}`: {source}"))]
    Transcript {
        stage: &'static str,
        source: TranscriptError,
    },
    #[snafu(display("attachment rejected on `{stage}`: {source}"))]
    Attachment {
        stage: &'static str,
        source: AttachmentError,
    },
    #[snafu(display("provider request failed on `{stage}`: {source}"))]
    Provider {
        stage: &'static str,
        source: ProviderError,
    },
}

pub type ChatResult<T> = Result<T, ChatError>;
