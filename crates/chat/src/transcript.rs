//! JSON transcript export and validated import.

use serde_json::Value;
use snafu::{OptionExt, ResultExt, Snafu, ensure};

use crate::message::Message;

const REQUIRED_FIELDS: [&str; 3] = ["id", "author", "parts"];

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum TranscriptError {
    #[snafu(display("transcript is not valid JSON: {source}"))]
    Parse {
        stage: &'static str,
        source: serde_json::Error,
    },
    #[snafu(display("transcript must be a JSON array of messages"))]
    NotAnArray { stage: &'static str },
    #[snafu(display("message {index} is missing `{field}`"))]
    MissingField {
        stage: &'static str,
        index: usize,
        field: &'static str,
    },
    #[snafu(display("message {index} is malformed: {source}"))]
    InvalidMessage {
        stage: &'static str,
        index: usize,
        source: serde_json::Error,
    },
    #[snafu(display("failed to serialize transcript: {source}"))]
    Serialize {
        stage: &'static str,
        source: serde_json::Error,
    },
}

pub type TranscriptResult<T> = Result<T, TranscriptError>;

pub fn export_transcript(history: &[Message]) -> TranscriptResult<String> {
    serde_json::to_string_pretty(history).context(SerializeSnafu {
        stage: "export-transcript",
    })
}

/// Parses a transcript document. Every element must carry `id`, `author` and
/// `parts`; the first offending element is reported.
pub fn parse_transcript(document: &str) -> TranscriptResult<Vec<Message>> {
    let value: Value = serde_json::from_str(document).context(ParseSnafu {
        stage: "parse-transcript",
    })?;
    let elements = value.as_array().context(NotAnArraySnafu {
        stage: "check-transcript-shape",
    })?;

    elements
        .iter()
        .enumerate()
        .map(|(index, element)| {
            for field in REQUIRED_FIELDS {
                ensure!(
                    element.get(field).is_some(),
                    MissingFieldSnafu {
                        stage: "check-transcript-fields",
                        index,
                        field,
                    }
                );
            }
            serde_json::from_value(element.clone()).context(InvalidMessageSnafu {
                stage: "decode-transcript-message",
                index,
            })
        })
        .collect()
}
