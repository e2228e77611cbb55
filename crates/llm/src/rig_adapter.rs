use futures::StreamExt;
use rig::OneOrMany;
use rig::completion::message::{AssistantContent, ImageMediaType, MimeType, UserContent};
use rig::completion::{CompletionModel, Message as RigMessage};
use rig::prelude::CompletionClient;
use rig::providers::gemini;
use rig::streaming::StreamedAssistantContent;
use snafu::{ResultExt, ensure};
use tokio::sync::{mpsc, oneshot};

use super::model::{DEFAULT_CHAT_MODEL, Model, default_gemini_models};
use super::provider::{
    BoxFuture, CompletionsFailedSnafu, EmptyPromptSnafu, EmptyResponseSnafu, HttpClientSnafu,
    LlmProvider, MissingApiKeySnafu, OneShotRequest, ProviderConfig, ProviderContent,
    ProviderError, ProviderPart, ProviderResult, ProviderStreamHandle, ProviderWorker,
    RequestFailedSnafu, Role, StreamEvent, StreamEventPayload, StreamRequest, StreamSessionId,
    make_event_stream,
};

pub const RIG_GEMINI_PROVIDER_ID: &str = "gemini";

pub struct RigProviderAdapter {
    config: ProviderConfig,
    fallback_models: Vec<Model>,
}

impl RigProviderAdapter {
    pub fn new(config: ProviderConfig) -> ProviderResult<Self> {
        ensure!(
            !config.api_key.is_empty(),
            MissingApiKeySnafu {
                stage: "rig-adapter-new",
                provider_id: config.provider_id.clone(),
            }
        );

        Ok(Self {
            config,
            fallback_models: default_gemini_models(),
        })
    }

    fn build_client(config: &ProviderConfig) -> ProviderResult<gemini::Client> {
        let mut builder = gemini::Client::builder().api_key(config.api_key.as_str());
        if !config.endpoint.is_empty() {
            builder = builder.base_url(config.endpoint.as_str());
        }
        builder.build().context(HttpClientSnafu {
            stage: "build-client",
        })
    }

    fn to_user_content(part: &ProviderPart) -> ProviderResult<UserContent> {
        match part {
            ProviderPart::Text(text) => Ok(UserContent::text(text.clone())),
            ProviderPart::InlineData { mime_type, data } => {
                let Some(media_type) = ImageMediaType::from_mime_type(mime_type) else {
                    return RequestFailedSnafu {
                        stage: "convert-inline-data",
                        message: format!("unsupported inline data type '{mime_type}'"),
                    }
                    .fail();
                };
                Ok(UserContent::image_base64(data.clone(), Some(media_type), None))
            }
        }
    }

    fn to_user_message(parts: &[ProviderPart]) -> ProviderResult<Option<RigMessage>> {
        let content = parts
            .iter()
            .map(Self::to_user_content)
            .collect::<ProviderResult<Vec<_>>>()?;

        Ok(OneOrMany::many(content)
            .ok()
            .map(|content| RigMessage::User { content }))
    }

    fn to_rig_message(content: &ProviderContent) -> ProviderResult<Option<RigMessage>> {
        match content.role {
            Role::User => Self::to_user_message(&content.parts),
            Role::Model => {
                // Model turns only ever carry text in this client.
                let text = content.text();
                if text.is_empty() {
                    Ok(None)
                } else {
                    Ok(Some(RigMessage::assistant(text)))
                }
            }
        }
    }

    fn emit_error_event(
        event_tx: &mpsc::UnboundedSender<StreamEvent>,
        session_id: StreamSessionId,
        error: ProviderError,
    ) {
        let _ = event_tx.send(StreamEvent {
            session_id,
            payload: StreamEventPayload::Error(error.to_string()),
        });
    }

    fn map_stream_item<R>(
        session_id: StreamSessionId,
        item: StreamedAssistantContent<R>,
    ) -> Option<StreamEvent>
    where
        R: Clone + Unpin,
    {
        let payload = match item {
            StreamedAssistantContent::Text(text) => StreamEventPayload::Delta(text.text),
            // Reasoning, tool calls and the final usage record are not rendered.
            _ => return None,
        };

        Some(StreamEvent {
            session_id,
            payload,
        })
    }

    async fn run_stream_worker(
        config: ProviderConfig,
        request: StreamRequest,
        event_tx: mpsc::UnboundedSender<StreamEvent>,
        mut cancel_rx: oneshot::Receiver<()>,
    ) {
        let session_id = request.session_id;

        let prepared = Self::build_client(&config).and_then(|client| {
            let history = request
                .history
                .iter()
                .map(Self::to_rig_message)
                .collect::<ProviderResult<Vec<_>>>()?
                .into_iter()
                .flatten()
                .collect::<Vec<_>>();
            let prompt = Self::to_user_message(&request.prompt)?;
            Ok((client, history, prompt))
        });

        let (client, history, prompt) = match prepared {
            Ok((client, history, Some(prompt))) => (client, history, prompt),
            Ok((_, _, None)) => {
                let error = EmptyPromptSnafu {
                    stage: "run-stream-worker-prompt",
                    session_id,
                }
                .build();
                Self::emit_error_event(&event_tx, session_id, error);
                return;
            }
            Err(error) => {
                tracing::error!(
                    session_id = ?session_id,
                    provider_id = %config.provider_id,
                    error = %error,
                    "failed to prepare provider request"
                );
                Self::emit_error_event(&event_tx, session_id, error);
                return;
            }
        };

        tracing::debug!(
            session_id = ?session_id,
            model_id = %request.model_id,
            history_len = history.len(),
            "opening provider stream"
        );

        let model = client.completion_model(request.model_id.clone());
        let mut builder = model.completion_request(prompt).messages(history);

        if let Some(preamble) = &request.preamble
            && !preamble.trim().is_empty()
        {
            builder = builder.preamble(preamble.clone());
        }

        let mut stream = match builder.stream().await.context(CompletionsFailedSnafu {
            stage: "open-stream",
        }) {
            Ok(stream) => stream,
            Err(error) => {
                tracing::error!(
                    session_id = ?session_id,
                    provider_id = %config.provider_id,
                    model_id = %request.model_id,
                    error = %error,
                    "failed to open provider stream"
                );
                Self::emit_error_event(&event_tx, session_id, error);
                return;
            }
        };

        let mut cancelled = false;
        let mut stream_failed = false;

        loop {
            tokio::select! {
                _ = &mut cancel_rx => {
                    cancelled = true;
                    tracing::debug!(session_id = ?session_id, "provider stream cancelled");
                    stream.cancel();
                    break;
                }
                next_item = stream.next() => {
                    match next_item {
                        Some(Ok(item)) => {
                            if let Some(mapped) = Self::map_stream_item(session_id, item)
                                && event_tx.send(mapped).is_err()
                            {
                                return;
                            }
                        }
                        Some(Err(source)) => {
                            stream_failed = true;
                            tracing::warn!(
                                session_id = ?session_id,
                                error = %source,
                                "provider stream emitted an error chunk"
                            );
                            let error = ProviderError::CompletionsFailed {
                                stage: "stream-chunk",
                                source,
                            };
                            Self::emit_error_event(&event_tx, session_id, error);
                            break;
                        }
                        None => break,
                    }
                }
            }
        }

        if !cancelled && !stream_failed {
            let _ = event_tx.send(StreamEvent {
                session_id,
                payload: StreamEventPayload::Done,
            });
        }
    }

    async fn run_one_shot(config: &ProviderConfig, request: OneShotRequest) -> ProviderResult<String> {
        let client = Self::build_client(config)?;
        let model = client.completion_model(request.model_id.clone());
        let mut builder = model.completion_request(RigMessage::user(request.prompt));

        if let Some(preamble) = request.preamble {
            builder = builder.preamble(preamble);
        }

        if let Some(schema) = request.response_schema {
            builder = builder.additional_params(serde_json::json!({
                "generationConfig": {
                    "responseMimeType": "application/json",
                    "responseSchema": schema,
                }
            }));
        }

        let response = builder.send().await.context(CompletionsFailedSnafu {
            stage: "generate-once",
        })?;

        let text = response
            .choice
            .iter()
            .filter_map(|content| match content {
                AssistantContent::Text(text) => Some(text.text.clone()),
                _ => None,
            })
            .collect::<Vec<_>>()
            .join("");

        ensure!(
            !text.trim().is_empty(),
            EmptyResponseSnafu {
                stage: "generate-once-text",
            }
        );

        Ok(text)
    }
}

impl LlmProvider for RigProviderAdapter {
    fn id(&self) -> &str {
        &self.config.provider_id
    }

    fn default_model(&self) -> &str {
        DEFAULT_CHAT_MODEL
    }

    fn fallback_models(&self) -> &[Model] {
        &self.fallback_models
    }

    fn stream_chat(&self, request: StreamRequest) -> ProviderResult<ProviderStreamHandle> {
        ensure!(
            !request.prompt.is_empty(),
            EmptyPromptSnafu {
                stage: "stream-chat",
                session_id: request.session_id,
            }
        );

        let (event_tx, stream, cancel_rx) = make_event_stream(request.session_id);
        let worker: ProviderWorker = Box::pin(Self::run_stream_worker(
            self.config.clone(),
            request,
            event_tx,
            cancel_rx,
        ));

        Ok(ProviderStreamHandle { stream, worker })
    }

    fn generate_once<'a>(&'a self, request: OneShotRequest) -> BoxFuture<'a, ProviderResult<String>> {
        Box::pin(async move {
            let model_id = request.model_id.clone();
            Self::run_one_shot(&self.config, request)
                .await
                .inspect_err(|error| {
                    tracing::warn!(
                        provider_id = %self.config.provider_id,
                        model_id = %model_id,
                        error = %error,
                        "one-shot generation failed"
                    );
                })
        })
    }
}
