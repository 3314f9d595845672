//! Scripted in-process provider.
//!
//! Replays queued completions and chunk scripts in order, so the chat
//! pipeline can be driven without a model. Each call consumes one
//! queued entry; an exhausted queue is an error.

use crate::client::{LlmClient, LlmRequest, LlmResponse, LlmStream, LlmStreamChunk, LlmUsage};
use futures::StreamExt;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use unilink_core::{AppError, AppResult};

/// One queued single-shot reply.
#[derive(Debug, Clone)]
enum Reply {
    Text(String),
    Fail(String),
    /// Never resolves
    Hang,
}

/// One step of a scripted stream.
#[derive(Debug, Clone, PartialEq)]
pub enum ScriptedStep {
    /// Emit a text chunk
    Chunk(String),
    /// Emit the terminal `done` chunk
    Done,
    /// Emit a provider error
    Fail(String),
    /// Never yield again
    Stall,
}

#[derive(Debug, Clone)]
enum StreamScript {
    Steps(Vec<ScriptedStep>),
    OpenFail(String),
}

/// Scripted LLM client.
#[derive(Debug, Default)]
pub struct ScriptedClient {
    replies: Mutex<VecDeque<Reply>>,
    streams: Mutex<VecDeque<StreamScript>>,
    requests: Mutex<Vec<LlmRequest>>,
    chunk_delay: Option<Duration>,
    released: Arc<AtomicUsize>,
}

impl ScriptedClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a successful completion.
    pub fn with_completion(mut self, text: impl Into<String>) -> Self {
        self.queue_reply(Reply::Text(text.into()));
        self
    }

    /// Queue a failing completion.
    pub fn with_completion_error(mut self, message: impl Into<String>) -> Self {
        self.queue_reply(Reply::Fail(message.into()));
        self
    }

    /// Queue a completion that never returns.
    pub fn with_hanging_completion(mut self) -> Self {
        self.queue_reply(Reply::Hang);
        self
    }

    /// Queue a stream that yields `chunks` and then finishes cleanly.
    pub fn with_stream<S: AsRef<str>>(self, chunks: &[S]) -> Self {
        let mut steps: Vec<ScriptedStep> = chunks
            .iter()
            .map(|c| ScriptedStep::Chunk(c.as_ref().to_string()))
            .collect();
        steps.push(ScriptedStep::Done);
        self.with_stream_steps(steps)
    }

    /// Queue a stream built from explicit steps.
    pub fn with_stream_steps(mut self, steps: Vec<ScriptedStep>) -> Self {
        if let Ok(queue) = self.streams.get_mut() {
            queue.push_back(StreamScript::Steps(steps));
        }
        self
    }

    /// Queue a stream whose opening call fails.
    pub fn with_stream_open_error(mut self, message: impl Into<String>) -> Self {
        if let Ok(queue) = self.streams.get_mut() {
            queue.push_back(StreamScript::OpenFail(message.into()));
        }
        self
    }

    /// Pause before each stream step.
    pub fn with_chunk_delay(mut self, delay: Duration) -> Self {
        self.chunk_delay = Some(delay);
        self
    }

    /// Every request received so far, in order.
    pub fn requests(&self) -> Vec<LlmRequest> {
        self.requests
            .lock()
            .map(|r| r.clone())
            .unwrap_or_default()
    }

    /// Number of opened streams that have since been dropped.
    pub fn released_streams(&self) -> usize {
        self.released.load(Ordering::SeqCst)
    }

    fn queue_reply(&mut self, reply: Reply) {
        if let Ok(queue) = self.replies.get_mut() {
            queue.push_back(reply);
        }
    }

    fn record(&self, request: &LlmRequest) -> AppResult<()> {
        self.requests
            .lock()
            .map_err(|_| AppError::Llm("scripted client lock poisoned".to_string()))?
            .push(request.clone());
        Ok(())
    }
}

/// Counts a stream as released when dropped.
struct ReleaseGuard(Arc<AtomicUsize>);

impl Drop for ReleaseGuard {
    fn drop(&mut self) {
        self.0.fetch_add(1, Ordering::SeqCst);
    }
}

#[async_trait::async_trait]
impl LlmClient for ScriptedClient {
    fn provider_name(&self) -> &str {
        "scripted"
    }

    async fn complete(&self, request: &LlmRequest) -> AppResult<LlmResponse> {
        self.record(request)?;

        let reply = self
            .replies
            .lock()
            .map_err(|_| AppError::Llm("scripted client lock poisoned".to_string()))?
            .pop_front();

        match reply {
            Some(Reply::Text(content)) => Ok(LlmResponse {
                content,
                model: request.model.clone(),
                usage: LlmUsage::default(),
            }),
            Some(Reply::Fail(message)) => Err(AppError::Llm(message)),
            Some(Reply::Hang) => std::future::pending().await,
            None => Err(AppError::Llm("no scripted completion left".to_string())),
        }
    }

    async fn stream(&self, request: &LlmRequest) -> AppResult<LlmStream> {
        self.record(request)?;

        let script = self
            .streams
            .lock()
            .map_err(|_| AppError::Llm("scripted client lock poisoned".to_string()))?
            .pop_front();

        let steps = match script {
            Some(StreamScript::Steps(steps)) => steps,
            Some(StreamScript::OpenFail(message)) => return Err(AppError::Llm(message)),
            None => return Err(AppError::Llm("no scripted stream left".to_string())),
        };

        let delay = self.chunk_delay;
        let guard = ReleaseGuard(Arc::clone(&self.released));

        let stream = futures::stream::iter(steps)
            .then(move |step| async move {
                if let Some(delay) = delay {
                    tokio::time::sleep(delay).await;
                }
                match step {
                    ScriptedStep::Chunk(text) => Ok(LlmStreamChunk::text(text)),
                    ScriptedStep::Done => Ok(LlmStreamChunk::finished(None)),
                    ScriptedStep::Fail(message) => Err(AppError::Llm(message)),
                    ScriptedStep::Stall => std::future::pending().await,
                }
            })
            .map(move |item| {
                let _held = &guard;
                item
            });

        Ok(Box::pin(stream))
    }
}
