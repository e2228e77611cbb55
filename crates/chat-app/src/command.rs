use std::path::PathBuf;

use andro_chat::MessageId;

pub const HELP: &str = "\
commands:
  <text>                    send a message with any staged attachments
  /edit <id> <text>         rewrite a user message and regenerate from there
  /delete <id>              remove one message
  /history                  list messages with their ids
  /attach <path>            stage a file or image
  /url <address>            stage the contents of a web page
  /detach [index]           drop one staged attachment, or all of them
  /suggestions [on|off]     show or toggle follow-up suggestions
  /pick <n>                 send suggestion number n
  /export <path>            save the transcript as JSON
  /import <path>            replace the conversation with a saved transcript
  /readme [path]            draft a README.md from the conversation
  /model [id]               show or change the chat model
  /key <api-key>            store an API key and reconnect
  /clear                    start over
  /help                     show this list
  /quit                     exit
Ctrl-C aborts a streaming reply.";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Send(String),
    Edit { id: MessageId, text: String },
    Delete(MessageId),
    History,
    Attach(PathBuf),
    Url(String),
    Detach(Option<usize>),
    Suggestions(Option<bool>),
    Pick(usize),
    Export(PathBuf),
    Import(PathBuf),
    Readme(Option<PathBuf>),
    Model(Option<String>),
    Key(String),
    Clear,
    Help,
    Quit,
    Empty,
}

impl Command {
    pub fn parse(line: &str) -> Result<Self, String> {
        let line = line.trim_end_matches(['\r', '\n']);
        let Some(rest) = line.strip_prefix('/') else {
            if line.trim().is_empty() {
                return Ok(Self::Empty);
            }
            return Ok(Self::Send(line.to_string()));
        };

        let (name, argument) = match rest.split_once(char::is_whitespace) {
            Some((name, argument)) => (name, argument.trim()),
            None => (rest, ""),
        };

        match name {
            "edit" => {
                let Some((id, text)) = argument.split_once(char::is_whitespace) else {
                    return Err("usage: /edit <id> <text>".to_string());
                };
                Ok(Self::Edit {
                    id: MessageId::new(id),
                    text: text.trim().to_string(),
                })
            }
            "delete" => required(argument, "/delete <id>").map(|id| Self::Delete(MessageId::new(id))),
            "history" => Ok(Self::History),
            "attach" => required(argument, "/attach <path>").map(|path| Self::Attach(PathBuf::from(path))),
            "url" => required(argument, "/url <address>").map(|url| Self::Url(url.to_string())),
            "detach" => optional_index(argument, "/detach [index]").map(Self::Detach),
            "suggestions" => match argument {
                "" => Ok(Self::Suggestions(None)),
                "on" => Ok(Self::Suggestions(Some(true))),
                "off" => Ok(Self::Suggestions(Some(false))),
                _ => Err("usage: /suggestions [on|off]".to_string()),
            },
            "pick" => match optional_index(argument, "/pick <n>")? {
                Some(number) if number > 0 => Ok(Self::Pick(number)),
                _ => Err("usage: /pick <n>".to_string()),
            },
            "export" => required(argument, "/export <path>").map(|path| Self::Export(PathBuf::from(path))),
            "import" => required(argument, "/import <path>").map(|path| Self::Import(PathBuf::from(path))),
            "readme" => Ok(Self::Readme((!argument.is_empty()).then(|| PathBuf::from(argument)))),
            "model" => Ok(Self::Model((!argument.is_empty()).then(|| argument.to_string()))),
            "key" => required(argument, "/key <api-key>").map(|key| Self::Key(key.to_string())),
            "clear" => Ok(Self::Clear),
            "help" | "?" => Ok(Self::Help),
            "quit" | "exit" => Ok(Self::Quit),
            other => Err(format!("unknown command /{other}, try /help")),
        }
    }
}

fn required<'a>(argument: &'a str, usage: &str) -> Result<&'a str, String> {
    if argument.is_empty() {
        Err(format!("usage: {usage}"))
    } else {
        Ok(argument)
    }
}

fn optional_index(argument: &str, usage: &str) -> Result<Option<usize>, String> {
    if argument.is_empty() {
        return Ok(None);
    }
    argument
        .parse::<usize>()
        .map(Some)
        .map_err(|_| format!("usage: {usage}"))
}
