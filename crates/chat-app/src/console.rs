use std::future::Future;
use std::path::Path;
use std::sync::Arc;

use andro_chat::{
    Attachment, CancelToken, ChatController, ChatResult, MessageId, PERSONA_NAME, TurnOutcome,
};
use andro_llm::{LlmProvider, ProviderConfig, ProviderResult, create_provider};
use snafu::ResultExt;
use tokio::io::{AsyncBufReadExt, BufReader};

use crate::command::{Command, HELP};
use crate::error::{AppResult, ChatSnafu, FileSnafu, SettingsSnafu, TerminalSnafu};
use crate::render::{TerminalObserver, history_line};
use crate::settings::{AppSettings, SettingsStore};

enum Flow {
    Continue,
    Quit,
}

/// Builds a provider from the current settings.
pub type ProviderFactory =
    Box<dyn Fn(ProviderConfig) -> ProviderResult<Arc<dyn LlmProvider>> + Send + Sync>;

/// Line-oriented front end over one conversation.
pub struct Console {
    settings: SettingsStore,
    factory: ProviderFactory,
    chat: Option<ChatController>,
    /// Persistent initialization error shown until a provider is available.
    banner: Option<String>,
}

impl Console {
    pub fn new(settings: SettingsStore) -> Self {
        Self::with_factory(settings, Box::new(create_provider))
    }

    pub fn with_factory(settings: SettingsStore, factory: ProviderFactory) -> Self {
        let current = settings.settings();
        let (chat, banner) = match connect(&current, &factory) {
            Ok(provider) => (Some(ChatController::new(provider, current.chat_options())), None),
            Err(banner) => (None, Some(banner)),
        };

        Self {
            settings,
            factory,
            chat,
            banner,
        }
    }

    pub async fn run(mut self) -> AppResult<()> {
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        self.print_opening();

        loop {
            if let Some(banner) = &self.banner {
                eprintln!("!! SYSTEM OFFLINE: {banner}");
            }

            let line = tokio::select! {
                line = lines.next_line() => line.context(TerminalSnafu { stage: "read-input" })?,
                Ok(()) = tokio::signal::ctrl_c() => None,
            };
            let Some(line) = line else {
                break;
            };

            let command = match Command::parse(&line) {
                Ok(command) => command,
                Err(usage) => {
                    eprintln!("{usage}");
                    continue;
                }
            };

            match self.execute(command).await {
                Ok(Flow::Continue) => {}
                Ok(Flow::Quit) => break,
                Err(error) => {
                    tracing::debug!(error = ?error, "command failed");
                    eprintln!("error: {error}");
                }
            }
        }

        Ok(())
    }

    async fn execute(&mut self, command: Command) -> AppResult<Flow> {
        match command {
            Command::Empty => {}
            Command::Help => println!("{HELP}"),
            Command::Quit => return Ok(Flow::Quit),
            Command::Key(api_key) => self.set_api_key(api_key)?,
            Command::Model(model_id) => self.model(model_id)?,
            Command::Suggestions(enabled) => self.suggestions(enabled)?,
            other => {
                let Some(chat) = self.chat.as_mut() else {
                    eprintln!("no provider is connected; set a key with /key <api-key>");
                    return Ok(Flow::Continue);
                };
                run_chat_command(chat, other).await?;
            }
        }
        Ok(Flow::Continue)
    }

    fn print_opening(&self) {
        println!("{HELP}\n");
        if let Some(greeting) = self.chat.as_ref().and_then(|chat| chat.history().first()) {
            println!("{PERSONA_NAME} ▸ {}\n", greeting.text());
        }
    }

    fn set_api_key(&mut self, api_key: String) -> AppResult<()> {
        let mut updated = (*self.settings.settings()).clone();
        updated.api_key = api_key;
        self.settings.update(updated).context(SettingsSnafu {
            stage: "store-api-key",
        })?;

        let current = self.settings.settings();
        match connect(&current, &self.factory) {
            Ok(provider) => {
                match &mut self.chat {
                    Some(chat) => chat.set_provider(provider),
                    slot @ None => *slot = Some(ChatController::new(provider, current.chat_options())),
                }
                self.banner = None;
                println!("provider connected");
                if let Some(greeting) = self.chat.as_ref().and_then(|chat| chat.history().first()) {
                    println!("{PERSONA_NAME} ▸ {}\n", greeting.text());
                }
            }
            Err(banner) => self.banner = Some(banner),
        }
        Ok(())
    }

    fn model(&mut self, model_id: Option<String>) -> AppResult<()> {
        let Some(model_id) = model_id else {
            let current = self.settings.settings();
            println!("chat model: {}", current.chat_model);
            println!("utility model: {}", current.utility_model);
            if let Some(chat) = &self.chat {
                for model in chat.provider().fallback_models() {
                    let description = model.description.as_deref().unwrap_or_default();
                    println!("  {:<28} {description}", model.id);
                }
            }
            return Ok(());
        };

        let mut updated = (*self.settings.settings()).clone();
        updated.chat_model = model_id.clone();
        self.settings.update(updated).context(SettingsSnafu {
            stage: "store-chat-model",
        })?;
        if let Some(chat) = self.chat.as_mut() {
            chat.set_chat_model(model_id.clone());
        }
        println!("chat model set to {model_id}");
        Ok(())
    }

    fn suggestions(&mut self, enabled: Option<bool>) -> AppResult<()> {
        let Some(enabled) = enabled else {
            let Some(chat) = self.chat.as_mut() else {
                return Ok(());
            };
            let state = if chat.suggestions_enabled() { "on" } else { "off" };
            let current = chat.current_suggestions();
            if current.is_empty() {
                println!("suggestions are {state}; none pending");
            }
            for (index, suggestion) in current.iter().enumerate() {
                println!("  [{}] {suggestion}", index + 1);
            }
            return Ok(());
        };

        let mut updated = (*self.settings.settings()).clone();
        updated.suggestions_enabled = enabled;
        self.settings.update(updated).context(SettingsSnafu {
            stage: "store-suggestions-toggle",
        })?;
        if let Some(chat) = self.chat.as_mut() {
            chat.set_suggestions_enabled(enabled);
        }
        println!("suggestions {}", if enabled { "on" } else { "off" });
        Ok(())
    }
}

fn connect(
    settings: &AppSettings,
    factory: &ProviderFactory,
) -> Result<Arc<dyn LlmProvider>, String> {
    if !settings.has_api_key() {
        return Err("no API key configured (set GEMINI_API_KEY or use /key)".to_string());
    }

    factory(settings.to_provider_config()).map_err(|error| {
        tracing::error!(provider_id = %settings.provider_id, error = %error, "failed to initialize provider");
        error.to_string()
    })
}

async fn run_chat_command(chat: &mut ChatController, command: Command) -> AppResult<()> {
    match command {
        Command::Send(text) => run_turn(chat, TurnRequest::Send(text)).await?,
        Command::Pick(number) => {
            let Some(suggestion) = chat.current_suggestions().get(number - 1).cloned() else {
                eprintln!("no suggestion [{number}]; suggestions expire after a few seconds");
                return Ok(());
            };
            println!("operator ▸ {suggestion}");
            run_turn(chat, TurnRequest::Send(suggestion)).await?;
        }
        Command::Edit { id, text } => run_turn(chat, TurnRequest::Edit { id, text }).await?,
        Command::Delete(id) => {
            let removed = chat.delete_message(&id).context(ChatSnafu {
                stage: "delete-message",
            })?;
            println!("deleted {}", removed.id);
        }
        Command::History => {
            for message in chat.history() {
                println!("{}", history_line(message));
            }
        }
        Command::Attach(path) => {
            chat.attach_file(&path).context(ChatSnafu {
                stage: "attach-file",
            })?;
            print_staged(chat);
        }
        Command::Url(url) => {
            let Some(result) = abort_on_interrupt(chat.attach_url(&url)).await else {
                eprintln!("fetch aborted");
                return Ok(());
            };
            result.context(ChatSnafu { stage: "attach-url" })?;
            print_staged(chat);
        }
        Command::Detach(None) => {
            chat.clear_attachments();
            println!("attachments cleared");
        }
        Command::Detach(Some(number)) => {
            match number.checked_sub(1).and_then(|index| chat.remove_attachment(index)) {
                Some(removed) => println!("removed {}", removed.label()),
                None => eprintln!("no attachment [{number}]"),
            }
            print_staged(chat);
        }
        Command::Export(path) => {
            let document = chat.export_transcript().context(ChatSnafu {
                stage: "export-transcript",
            })?;
            write_file(&path, document).await?;
            println!("transcript written to {}", path.display());
        }
        Command::Import(path) => {
            let document = tokio::fs::read_to_string(&path).await.context(FileSnafu {
                stage: "read-transcript",
                path: path.clone(),
            })?;
            let count = chat.import_transcript(&document).context(ChatSnafu {
                stage: "import-transcript",
            })?;
            println!("imported {count} messages");
        }
        Command::Readme(path) => {
            println!("drafting README.md...");
            let Some(result) = abort_on_interrupt(chat.generate_readme()).await else {
                eprintln!("README draft aborted");
                return Ok(());
            };
            let readme = result.context(ChatSnafu {
                stage: "generate-readme",
            })?;
            match path {
                Some(path) => {
                    write_file(&path, readme).await?;
                    println!("README written to {}", path.display());
                }
                None => println!("{readme}\n"),
            }
        }
        Command::Clear => {
            chat.clear();
            if let Some(greeting) = chat.history().first() {
                println!("{PERSONA_NAME} ▸ {}\n", greeting.text());
            }
        }
        Command::Empty
        | Command::Help
        | Command::Quit
        | Command::Key(_)
        | Command::Model(_)
        | Command::Suggestions(_) => {}
    }
    Ok(())
}

enum TurnRequest {
    Send(String),
    Edit {
        id: MessageId,
        text: String,
    },
}

async fn run_turn(chat: &mut ChatController, request: TurnRequest) -> AppResult<()> {
    let cancel = CancelToken::new();
    let mut observer = TerminalObserver::new(std::io::stdout());

    let turn = async {
        match &request {
            TurnRequest::Send(text) => chat.send(text, &cancel, &mut observer).await,
            TurnRequest::Edit { id, text } => {
                chat.edit_and_resend(id, text, &cancel, &mut observer).await
            }
        }
    };
    let result: ChatResult<TurnOutcome> = cancel_on_interrupt(turn, &cancel).await;

    match result.context(ChatSnafu { stage: "run-turn" })? {
        TurnOutcome::Completed => {}
        TurnOutcome::Cancelled => tracing::info!("turn aborted by operator"),
        TurnOutcome::Failed { error } => tracing::warn!(error = %error, "turn failed"),
    }
    Ok(())
}

/// Drives `turn` to the end. Ctrl-C cancels its token rather than dropping it,
/// so the abort marker and turn state still land.
async fn cancel_on_interrupt<F: Future>(turn: F, cancel: &CancelToken) -> F::Output {
    tokio::pin!(turn);
    tokio::select! {
        output = &mut turn => output,
        Ok(()) = tokio::signal::ctrl_c() => {
            cancel.cancel();
            turn.await
        }
    }
}

/// Drops `operation` on Ctrl-C.
async fn abort_on_interrupt<F: Future>(operation: F) -> Option<F::Output> {
    tokio::select! {
        output = operation => Some(output),
        Ok(()) = tokio::signal::ctrl_c() => None,
    }
}

fn print_staged(chat: &ChatController) {
    let staged = chat.staged().as_slice();
    if staged.is_empty() {
        println!("nothing staged");
        return;
    }
    for (index, attachment) in staged.iter().enumerate() {
        let kind = match attachment {
            Attachment::Image { .. } => "image",
            Attachment::Text { .. } => "file",
            Attachment::Url { .. } => "url",
        };
        println!("  [{}] {kind} {}", index + 1, attachment.label());
    }
}

async fn write_file(path: &Path, content: String) -> AppResult<()> {
    tokio::fs::write(path, content).await.context(FileSnafu {
        stage: "write-output-file",
        path: path.to_path_buf(),
    })
}
