//! In-memory provider that replays scripted responses.

use std::collections::VecDeque;
use std::sync::Mutex;

use super::model::{DEFAULT_CHAT_MODEL, Model, default_gemini_models};
use super::provider::{
    BoxFuture, LlmProvider, OneShotRequest, ProviderError, ProviderResult, ProviderStreamHandle,
    ProviderWorker, StreamEvent, StreamEventPayload, StreamRequest, make_event_stream,
};

/// What the next `stream_chat` call does.
#[derive(Debug, Clone)]
pub enum StreamScript {
    /// Emit these payloads in order, then end the worker.
    Events(Vec<StreamEventPayload>),
    /// Fail synchronously when the stream is requested.
    Reject(String),
}

impl StreamScript {
    /// Deltas followed by `Done`.
    pub fn chunks<I, S>(chunks: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut events = chunks
            .into_iter()
            .map(|chunk| StreamEventPayload::Delta(chunk.into()))
            .collect::<Vec<_>>();
        events.push(StreamEventPayload::Done);
        Self::Events(events)
    }
}

#[derive(Default)]
pub struct ScriptedProvider {
    fallback_models: Vec<Model>,
    streams: Mutex<VecDeque<StreamScript>>,
    one_shots: Mutex<VecDeque<Result<String, String>>>,
    stream_requests: Mutex<Vec<StreamRequest>>,
    one_shot_requests: Mutex<Vec<OneShotRequest>>,
}

impl ScriptedProvider {
    pub fn new() -> Self {
        Self {
            fallback_models: default_gemini_models(),
            ..Self::default()
        }
    }

    pub fn push_stream(&self, script: StreamScript) -> &Self {
        lock(&self.streams).push_back(script);
        self
    }

    pub fn push_one_shot(&self, response: Result<String, String>) -> &Self {
        lock(&self.one_shots).push_back(response);
        self
    }

    pub fn stream_requests(&self) -> Vec<StreamRequest> {
        lock(&self.stream_requests).clone()
    }

    pub fn one_shot_requests(&self) -> Vec<OneShotRequest> {
        lock(&self.one_shot_requests).clone()
    }
}

impl LlmProvider for ScriptedProvider {
    fn id(&self) -> &str {
        "scripted"
    }

    fn default_model(&self) -> &str {
        DEFAULT_CHAT_MODEL
    }

    fn fallback_models(&self) -> &[Model] {
        &self.fallback_models
    }

    fn stream_chat(&self, request: StreamRequest) -> ProviderResult<ProviderStreamHandle> {
        let session_id = request.session_id;
        lock(&self.stream_requests).push(request);

        let script = lock(&self.streams)
            .pop_front()
            .unwrap_or_else(|| StreamScript::Reject("no scripted stream left".to_string()));

        let events = match script {
            StreamScript::Events(events) => events,
            StreamScript::Reject(message) => {
                return Err(ProviderError::RequestFailed {
                    stage: "scripted-stream-chat",
                    message,
                });
            }
        };

        let (event_tx, stream, _cancel_rx) = make_event_stream(session_id);
        let worker: ProviderWorker = Box::pin(async move {
            for payload in events {
                if event_tx.send(StreamEvent { session_id, payload }).is_err() {
                    return;
                }
            }
        });

        Ok(ProviderStreamHandle { stream, worker })
    }

    fn generate_once<'a>(&'a self, request: OneShotRequest) -> BoxFuture<'a, ProviderResult<String>> {
        Box::pin(async move {
            lock(&self.one_shot_requests).push(request);
            let response = lock(&self.one_shots)
                .pop_front()
                .unwrap_or_else(|| Err("no scripted response left".to_string()));

            response.map_err(|message| ProviderError::RequestFailed {
                stage: "scripted-generate-once",
                message,
            })
        })
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
