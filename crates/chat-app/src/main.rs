use std::process::ExitCode;

use tracing_subscriber::EnvFilter;

mod command;
mod console;
mod error;
mod render;
mod settings;

use console::Console;
use settings::SettingsStore;

/// Logs go to stderr so they never interleave with the transcript on stdout.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> ExitCode {
    init_tracing();

    let settings = SettingsStore::load();
    tracing::info!(path = ?settings.config_path(), "loaded settings");

    match Console::new(settings).run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            tracing::error!(error = %error, "console stopped");
            eprintln!("fatal: {error}");
            ExitCode::FAILURE
        }
    }
}
