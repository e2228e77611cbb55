use std::future::Future;
use std::pin::Pin;

use snafu::Snafu;
use tokio::sync::{mpsc, oneshot};

use super::model::Model;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderConfig {
    pub provider_id: String,
    pub api_key: String,
    pub endpoint: String,
}

impl ProviderConfig {
    pub fn new(
        provider_id: impl Into<String>,
        api_key: impl Into<String>,
        endpoint: impl Into<String>,
    ) -> Self {
        Self {
            provider_id: provider_id.into().trim().to_string(),
            api_key: api_key.into().trim().to_string(),
            endpoint: endpoint.into().trim().to_string(),
        }
    }
}

/// Speaker role as the generative API understands it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    User,
    Model,
}

/// API-bound content part. Carries no display-only annotations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProviderPart {
    Text(String),
    InlineData { mime_type: String, data: String },
}

impl ProviderPart {
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text(text.into())
    }

    pub fn inline_data(mime_type: impl Into<String>, data: impl Into<String>) -> Self {
        Self::InlineData {
            mime_type: mime_type.into(),
            data: data.into(),
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(text) => Some(text),
            Self::InlineData { .. } => None,
        }
    }
}

/// One prior turn handed to the API as history.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderContent {
    pub role: Role,
    pub parts: Vec<ProviderPart>,
}

impl ProviderContent {
    pub fn new(role: Role, parts: Vec<ProviderPart>) -> Self {
        Self { role, parts }
    }

    /// Joins every text part; inline data is skipped.
    pub fn text(&self) -> String {
        self.parts
            .iter()
            .filter_map(ProviderPart::as_text)
            .collect::<String>()
    }
}

/// Identifier for one streaming generation.
///
/// This must change on every send/edit so stale chunks can be rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StreamSessionId(pub u64);

impl StreamSessionId {
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    pub const fn next(self) -> Self {
        Self(self.0.wrapping_add(1))
    }
}

/// Provider-agnostic stream payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamEventPayload {
    Delta(String),
    Done,
    Error(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamEvent {
    pub session_id: StreamSessionId,
    pub payload: StreamEventPayload,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StreamRequest {
    pub session_id: StreamSessionId,
    pub model_id: String,
    pub preamble: Option<String>,
    pub history: Vec<ProviderContent>,
    pub prompt: Vec<ProviderPart>,
}

impl StreamRequest {
    pub fn new(
        session_id: StreamSessionId,
        model_id: impl Into<String>,
        history: Vec<ProviderContent>,
        prompt: Vec<ProviderPart>,
    ) -> Self {
        Self {
            session_id,
            model_id: model_id.into(),
            preamble: None,
            history,
            prompt,
        }
    }

    pub fn with_preamble(mut self, preamble: impl Into<String>) -> Self {
        self.preamble = Some(preamble.into());
        self
    }
}

/// Single non-streaming generation, optionally constrained to a JSON schema.
#[derive(Debug, Clone, PartialEq)]
pub struct OneShotRequest {
    pub model_id: String,
    pub preamble: Option<String>,
    pub prompt: String,
    pub response_schema: Option<serde_json::Value>,
}

impl OneShotRequest {
    pub fn new(model_id: impl Into<String>, prompt: impl Into<String>) -> Self {
        Self {
            model_id: model_id.into(),
            preamble: None,
            prompt: prompt.into(),
            response_schema: None,
        }
    }

    pub fn with_preamble(mut self, preamble: impl Into<String>) -> Self {
        self.preamble = Some(preamble.into());
        self
    }

    pub fn with_response_schema(mut self, schema: serde_json::Value) -> Self {
        self.response_schema = Some(schema);
        self
    }
}

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;
pub type ProviderWorker = Pin<Box<dyn Future<Output = ()> + Send + 'static>>;
pub type ProviderResult<T> = Result<T, ProviderError>;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum ProviderError {
    #[snafu(display("missing API key for provider '{provider_id}'"))]
    MissingApiKey {
        stage: &'static str,
        provider_id: String,
    },
    #[snafu(display("provider '{provider_id}' is not supported"))]
    UnsupportedProvider {
        stage: &'static str,
        provider_id: String,
    },
    #[snafu(display("stream request {session_id:?} has an empty prompt"))]
    EmptyPrompt {
        stage: &'static str,
        session_id: StreamSessionId,
    },
    #[snafu(display("http client failed on `{stage}`, {source}"))]
    HttpClient {
        stage: &'static str,
        source: rig::http_client::Error,
    },
    #[snafu(display("completions failed on `{stage}`, {source}"))]
    CompletionsFailed {
        stage: &'static str,
        source: rig::completion::CompletionError,
    },
    #[snafu(display("provider returned no text on `{stage}`"))]
    EmptyResponse { stage: &'static str },
    #[snafu(display("request rejected on `{stage}`: {message}"))]
    RequestFailed {
        stage: &'static str,
        message: String,
    },
}

pub struct ProviderEventStream {
    session_id: StreamSessionId,
    events: mpsc::UnboundedReceiver<StreamEvent>,
    cancel_tx: Option<oneshot::Sender<()>>,
}

pub struct ProviderStreamHandle {
    pub stream: ProviderEventStream,
    pub worker: ProviderWorker,
}

impl ProviderEventStream {
    pub(crate) fn new(
        session_id: StreamSessionId,
        events: mpsc::UnboundedReceiver<StreamEvent>,
        cancel_tx: oneshot::Sender<()>,
    ) -> Self {
        Self {
            session_id,
            events,
            cancel_tx: Some(cancel_tx),
        }
    }

    pub fn session_id(&self) -> StreamSessionId {
        self.session_id
    }

    pub async fn recv(&mut self) -> Option<StreamEvent> {
        self.events.recv().await
    }

    pub fn cancel(&mut self) -> bool {
        self.cancel_tx
            .take()
            .map(|tx| tx.send(()).is_ok())
            .unwrap_or(false)
    }
}

impl Drop for ProviderEventStream {
    fn drop(&mut self) {
        if let Some(cancel_tx) = self.cancel_tx.take() {
            let _ = cancel_tx.send(());
        }
    }
}

pub trait LlmProvider: Send + Sync {
    fn id(&self) -> &str;
    fn default_model(&self) -> &str;
    fn fallback_models(&self) -> &[Model];
    fn stream_chat(&self, request: StreamRequest) -> ProviderResult<ProviderStreamHandle>;
    fn generate_once<'a>(&'a self, request: OneShotRequest) -> BoxFuture<'a, ProviderResult<String>>;
}

pub(crate) fn make_event_stream(
    session_id: StreamSessionId,
) -> (
    mpsc::UnboundedSender<StreamEvent>,
    ProviderEventStream,
    oneshot::Receiver<()>,
) {
    let (event_tx, event_rx) = mpsc::unbounded_channel();
    let (cancel_tx, cancel_rx) = oneshot::channel();
    (
        event_tx,
        ProviderEventStream::new(session_id, event_rx, cancel_tx),
        cancel_rx,
    )
}
