use std::io::Write;

use andro_chat::{Author, ChatObserver, Message, MessageId, PERSONA_NAME, TurnState};

/// Prints streamed replies incrementally. User messages are not echoed; the
/// operator typed them.
pub struct TerminalObserver<W: Write + Send> {
    out: W,
    current: Option<MessageId>,
    printed: usize,
}

impl<W: Write + Send> TerminalObserver<W> {
    pub fn new(out: W) -> Self {
        Self {
            out,
            current: None,
            printed: 0,
        }
    }

    #[cfg(test)]
    pub fn into_inner(self) -> W {
        self.out
    }

    fn write(&mut self, text: &str) {
        if let Err(error) = self.out.write_all(text.as_bytes()).and_then(|()| self.out.flush()) {
            tracing::warn!(error = %error, "failed to write to terminal");
        }
    }

    fn finish_message(&mut self) {
        if self.current.take().is_some() {
            self.write("\n\n");
        }
        self.printed = 0;
    }
}

impl<W: Write + Send> ChatObserver for TerminalObserver<W> {
    fn history_changed(&mut self, history: &[Message]) {
        let Some(last) = history.last().filter(|message| message.author == Author::Ai) else {
            return;
        };

        if self.current.as_ref() != Some(&last.id) {
            self.finish_message();
            self.current = Some(last.id.clone());
            self.write(&format!("{PERSONA_NAME} ▸ "));
        }

        let text = last.text();
        match text.get(self.printed..) {
            Some(fresh) => {
                let fresh = fresh.to_string();
                self.write(&fresh);
            }
            None => {
                // The text shrank or the offset split a character; print it whole.
                self.write(&format!("\n{text}"));
            }
        }
        self.printed = text.len();
    }

    fn turn_state_changed(&mut self, state: &TurnState) {
        if state.is_idle() {
            self.finish_message();
        }
        tracing::debug!(state = ?state, "turn state changed");
    }

    fn suggestions_changed(&mut self, suggestions: &[String]) {
        if suggestions.is_empty() {
            return;
        }
        let mut listing = String::from("suggested next moves:\n");
        for (index, suggestion) in suggestions.iter().enumerate() {
            listing.push_str(&format!("  [{}] {suggestion}\n", index + 1));
        }
        listing.push('\n');
        self.write(&listing);
    }
}

/// One line per message for `/history`.
pub fn history_line(message: &Message) -> String {
    let speaker = match message.author {
        Author::User => "operator",
        Author::Ai => PERSONA_NAME,
    };
    let summary = message.summary().replace('\n', " ");
    let preview = match summary.char_indices().nth(72) {
        Some((cut, _)) => format!("{}…", &summary[..cut]),
        None => summary,
    };
    format!("{:<40} {speaker}: {preview}", message.id.as_str())
}
