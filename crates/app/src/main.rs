use std::process::ExitCode;
use std::sync::Arc;

use saathi::app;
use saathi::chat::ChatController;
use saathi::settings::SettingsStore;
use saathi_llm::GeminiGateway;
use tracing_subscriber::EnvFilter;

/// Application entry point.
///
/// Bootstraps the chat session with:
/// 1. Logging on stderr (stdout is the chat), filtered by `RUST_LOG`, `warn` by default
/// 2. Settings from defaults, the settings file, and `SAATHI_*` variables
/// 3. One gateway and one controller for the lifetime of the process
#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let store = SettingsStore::load();
    let config = store.settings().to_gateway_config();

    // Not fatal: the key is looked up again on every call.
    if config.credential.resolve().is_none() {
        tracing::warn!(
            settings_path = ?store.config_path(),
            "no API key found; replies will fail until GEMINI_API_KEY or API_KEY is set"
        );
    }

    let model_id = config.model_id.clone();
    let controller = ChatController::new(Arc::new(GeminiGateway::new(config)));
    tracing::info!(
        gateway = controller.gateway_id(),
        model_id = %model_id,
        "starting chat session"
    );

    match app::run(&controller).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            tracing::error!(error = %error, "chat session ended with an error");
            eprintln!("{error}");
            ExitCode::FAILURE
        }
    }
}
