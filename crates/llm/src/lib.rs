use std::sync::Arc;

mod model;
mod provider;
mod rig_adapter;
#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use model::{DEFAULT_CHAT_MODEL, DEFAULT_UTILITY_MODEL, Model, default_gemini_models};
pub use provider::{
    BoxFuture, LlmProvider, OneShotRequest, ProviderConfig, ProviderContent, ProviderError,
    ProviderEventStream, ProviderPart, ProviderResult, ProviderStreamHandle, ProviderWorker, Role,
    StreamEvent, StreamEventPayload, StreamRequest, StreamSessionId,
};
pub use rig_adapter::{RIG_GEMINI_PROVIDER_ID, RigProviderAdapter};

pub fn create_provider(mut config: ProviderConfig) -> ProviderResult<Arc<dyn LlmProvider>> {
    if config.provider_id.trim().is_empty() {
        config.provider_id = RIG_GEMINI_PROVIDER_ID.to_string();
    }

    match config.provider_id.as_str() {
        "gemini" | "google" | "rig-gemini" => {
            config.provider_id = RIG_GEMINI_PROVIDER_ID.to_string();
            Ok(Arc::new(RigProviderAdapter::new(config)?))
        }
        _ => Err(ProviderError::UnsupportedProvider {
            stage: "create-provider",
            provider_id: config.provider_id,
        }),
    }
}
