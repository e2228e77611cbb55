use std::path::PathBuf;

use andro_chat::ChatError;
use snafu::Snafu;

use crate::settings::SettingsError;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum AppError {
    #[snafu(display("{source}"))]
    Chat {
        stage: &'static str,
        source: ChatError,
    },
    #[snafu(display("settings update failed on `{stage}`: {source}"))]
    Settings {
        stage: &'static str,
        source: SettingsError,
    },
    #[snafu(display("terminal i/o failed on `{stage}`: {source}"))]
    Terminal {
        stage: &'static str,
        source: std::io::Error,
    },
    #[snafu(display("failed to access {path:?} on `{stage}`: {source}"))]
    File {
        stage: &'static str,
        path: PathBuf,
        source: std::io::Error,
    },
}

pub type AppResult<T> = Result<T, AppError>;
