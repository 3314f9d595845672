//! Streaming responder.
//!
//! Opening a response happens before any header is written: the generation
//! stream is opened and its first item awaited, so a provider that fails
//! straight away still produces a structured error. Once an
//! [`AnswerStream`] exists the transport is committed to plain text and the
//! only remaining failure signal is an abruptly closed body.
//!
//! Both phases are bounded by an idle timeout: a provider that goes quiet
//! for longer than that is treated as failed.

use futures::{Future, Stream, StreamExt};
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Duration;
use tokio::time::{Instant, Sleep};
use tracing::Span;
use unilink_core::{AppError, AppResult};
use unilink_llm::{LlmClient, LlmRequest, LlmStream};

/// Lifecycle of a committed answer stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponderState {
    /// Headers committed, nothing relayed yet
    HeadersSent,
    /// At least one chunk relayed
    Streaming,
    /// The generation source finished
    Completed,
    /// The generation source failed or the caller went away
    Aborted,
}

impl ResponderState {
    fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Aborted)
    }
}

/// Default bound on silence from the generation source.
pub const DEFAULT_STREAM_IDLE_TIMEOUT: Duration = Duration::from_secs(60);

fn idle_error(idle_timeout: Duration) -> AppError {
    AppError::Llm(format!(
        "Generation stream idle for more than {}ms",
        idle_timeout.as_millis()
    ))
}

/// Open a generation stream and wait for its first piece of output.
///
/// Errors returned here happen before headers are committed, including a
/// source that stays silent for longer than `idle_timeout`.
pub async fn open_answer(
    client: &dyn LlmClient,
    request: &LlmRequest,
    idle_timeout: Duration,
    span: Span,
) -> AppResult<AnswerStream> {
    let mut upstream = client.stream(request).await?;

    loop {
        let next = tokio::time::timeout(idle_timeout, upstream.next())
            .await
            .map_err(|_| idle_error(idle_timeout))?;

        match next {
            Some(Ok(chunk)) if !chunk.content.is_empty() => {
                let done = chunk.done;
                let mut answer =
                    AnswerStream::new(upstream, Some(chunk.content), idle_timeout, span);
                if done {
                    answer.finish_after_first = true;
                }
                return Ok(answer);
            }
            Some(Ok(chunk)) if chunk.done => {
                tracing::debug!("Generation finished without output");
                let mut answer = AnswerStream::new(upstream, None, idle_timeout, span);
                answer.complete();
                return Ok(answer);
            }
            Some(Ok(_)) => continue,
            Some(Err(e)) => return Err(e),
            None => {
                return Err(AppError::Llm(
                    "Generation stream ended before producing output".to_string(),
                ))
            }
        }
    }
}

/// Relays generation chunks to the caller in arrival order.
///
/// Yields an `Err` when the source fails or goes idle mid-stream so the
/// HTTP body is cut off. Dropping the stream drops the upstream generation
/// stream.
pub struct AnswerStream {
    upstream: LlmStream,
    first: Option<String>,
    finish_after_first: bool,
    state: ResponderState,
    chunks: usize,
    bytes: usize,
    idle_timeout: Duration,
    idle_deadline: Pin<Box<Sleep>>,
    span: Span,
}

impl AnswerStream {
    fn new(
        upstream: LlmStream,
        first: Option<String>,
        idle_timeout: Duration,
        span: Span,
    ) -> Self {
        Self {
            upstream,
            first,
            finish_after_first: false,
            state: ResponderState::HeadersSent,
            chunks: 0,
            bytes: 0,
            idle_timeout,
            idle_deadline: Box::pin(tokio::time::sleep(idle_timeout)),
            span,
        }
    }

    pub fn state(&self) -> ResponderState {
        self.state
    }

    /// Chunks relayed so far.
    pub fn relayed_chunks(&self) -> usize {
        self.chunks
    }

    fn reset_idle_deadline(&mut self) {
        let deadline = Instant::now() + self.idle_timeout;
        self.idle_deadline.as_mut().reset(deadline);
    }

    fn relay(&mut self, text: String) -> Poll<Option<AppResult<String>>> {
        self.state = ResponderState::Streaming;
        self.chunks += 1;
        self.bytes += text.len();
        Poll::Ready(Some(Ok(text)))
    }

    fn complete(&mut self) {
        self.state = ResponderState::Completed;
        tracing::info!(
            chunks = self.chunks,
            bytes = self.bytes,
            "Answer stream completed"
        );
    }

    fn abort(&mut self, reason: &str) {
        self.state = ResponderState::Aborted;
        tracing::warn!(chunks = self.chunks, "Answer stream aborted: {}", reason);
    }
}

impl Stream for AnswerStream {
    type Item = AppResult<String>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = &mut *self;
        let span = this.span.clone();
        let _entered = span.enter();

        if let Some(first) = this.first.take() {
            this.reset_idle_deadline();
            let ready = this.relay(first);
            if this.finish_after_first {
                this.complete();
            }
            return ready;
        }

        if this.state.is_terminal() {
            return Poll::Ready(None);
        }

        loop {
            match this.upstream.poll_next_unpin(cx) {
                Poll::Pending => {
                    if this.idle_deadline.as_mut().poll(cx).is_ready() {
                        let err = idle_error(this.idle_timeout);
                        this.abort(&err.to_string());
                        return Poll::Ready(Some(Err(err)));
                    }
                    return Poll::Pending;
                }
                Poll::Ready(Some(Ok(chunk))) => {
                    this.reset_idle_deadline();
                    if chunk.done {
                        if chunk.content.is_empty() {
                            this.complete();
                            return Poll::Ready(None);
                        }
                        let ready = this.relay(chunk.content);
                        this.complete();
                        return ready;
                    }
                    if chunk.content.is_empty() {
                        continue;
                    }
                    return this.relay(chunk.content);
                }
                Poll::Ready(Some(Err(e))) => {
                    this.abort(&e.to_string());
                    return Poll::Ready(Some(Err(e)));
                }
                Poll::Ready(None) => {
                    this.complete();
                    return Poll::Ready(None);
                }
            }
        }
    }
}

impl Drop for AnswerStream {
    fn drop(&mut self) {
        if !self.state.is_terminal() {
            let span = self.span.clone();
            let _entered = span.enter();
            self.abort("caller disconnected");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use unilink_llm::{ScriptedClient, ScriptedStep};

    const IDLE: Duration = Duration::from_secs(5);

    fn request() -> LlmRequest {
        LlmRequest::new("prompt", "model").with_streaming()
    }

    async fn collect(mut answer: AnswerStream) -> (Vec<String>, Option<AppError>, ResponderState) {
        let mut chunks = Vec::new();
        let mut error = None;
        while let Some(item) = answer.next().await {
            match item {
                Ok(text) => chunks.push(text),
                Err(e) => error = Some(e),
            }
        }
        (chunks, error, answer.state())
    }

    #[tokio::test]
    async fn test_relays_chunks_in_order() {
        let client = ScriptedClient::new().with_stream(&["Hel", "lo", "!"]);
        let answer = open_answer(&client, &request(), IDLE, Span::none()).await.unwrap();
        assert_eq!(answer.state(), ResponderState::HeadersSent);

        let (chunks, error, state) = collect(answer).await;
        assert_eq!(chunks, vec!["Hel", "lo", "!"]);
        assert_eq!(chunks.concat(), "Hello!");
        assert!(error.is_none());
        assert_eq!(state, ResponderState::Completed);
    }

    #[tokio::test]
    async fn test_empty_chunks_are_not_forwarded() {
        let client = ScriptedClient::new().with_stream(&["", "a", "", "b"]);
        let answer = open_answer(&client, &request(), IDLE, Span::none()).await.unwrap();

        let (chunks, _, _) = collect(answer).await;
        assert_eq!(chunks, vec!["a", "b"]);
    }

    #[tokio::test]
    async fn test_mid_stream_failure_aborts_after_relayed_chunks() {
        let client = ScriptedClient::new().with_stream_steps(vec![
            ScriptedStep::Chunk("one ".to_string()),
            ScriptedStep::Chunk("two ".to_string()),
            ScriptedStep::Fail("model crashed".to_string()),
            ScriptedStep::Chunk("never".to_string()),
        ]);
        let answer = open_answer(&client, &request(), IDLE, Span::none()).await.unwrap();

        let (chunks, error, state) = collect(answer).await;
        assert_eq!(chunks, vec!["one ", "two "]);
        assert!(matches!(error, Some(AppError::Llm(_))));
        assert_eq!(state, ResponderState::Aborted);
    }

    #[tokio::test]
    async fn test_open_failure_is_pre_headers() {
        let client = ScriptedClient::new().with_stream_open_error("quota exceeded");
        let result = open_answer(&client, &request(), IDLE, Span::none()).await;
        assert!(matches!(result, Err(AppError::Llm(_))));
    }

    #[tokio::test]
    async fn test_first_item_failure_is_pre_headers() {
        let client = ScriptedClient::new()
            .with_stream_steps(vec![ScriptedStep::Fail("bad key".to_string())]);
        let result = open_answer(&client, &request(), IDLE, Span::none()).await;
        assert!(result.is_err());
        assert_eq!(client.released_streams(), 1);
    }

    #[tokio::test]
    async fn test_done_without_output_is_empty_answer() {
        let client = ScriptedClient::new().with_stream::<&str>(&[]);
        let answer = open_answer(&client, &request(), IDLE, Span::none()).await.unwrap();
        assert_eq!(answer.state(), ResponderState::Completed);

        let (chunks, error, _) = collect(answer).await;
        assert!(chunks.is_empty());
        assert!(error.is_none());
    }

    #[tokio::test]
    async fn test_silent_source_fails_before_headers() {
        let client = ScriptedClient::new().with_stream_steps(vec![ScriptedStep::Stall]);
        let result = tokio::time::timeout(
            Duration::from_secs(2),
            open_answer(&client, &request(), Duration::from_millis(50), Span::none()),
        )
        .await
        .expect("open_answer must not hang");

        assert!(matches!(result, Err(AppError::Llm(_))));
        assert_eq!(client.released_streams(), 1);
    }

    #[tokio::test]
    async fn test_stall_after_first_chunk_aborts() {
        let client = ScriptedClient::new().with_stream_steps(vec![
            ScriptedStep::Chunk("Rides ".to_string()),
            ScriptedStep::Chunk("leave ".to_string()),
            ScriptedStep::Stall,
        ]);
        let answer = open_answer(&client, &request(), Duration::from_millis(50), Span::none())
            .await
            .unwrap();

        let (chunks, error, state) = tokio::time::timeout(Duration::from_secs(2), collect(answer))
            .await
            .expect("relay must not hang");
        assert_eq!(chunks, vec!["Rides ", "leave "]);
        assert!(matches!(error, Some(AppError::Llm(_))));
        assert_eq!(state, ResponderState::Aborted);
        assert_eq!(client.released_streams(), 1);
    }

    #[tokio::test]
    async fn test_slow_but_steady_source_is_not_idle() {
        let client = ScriptedClient::new()
            .with_stream(&["a", "b", "c"])
            .with_chunk_delay(Duration::from_millis(30));
        let answer = open_answer(&client, &request(), Duration::from_millis(80), Span::none())
            .await
            .unwrap();

        let (chunks, error, state) = collect(answer).await;
        assert_eq!(chunks, vec!["a", "b", "c"]);
        assert!(error.is_none());
        assert_eq!(state, ResponderState::Completed);
    }

    #[tokio::test]
    async fn test_drop_releases_upstream() {
        let client = ScriptedClient::new()
            .with_stream_steps(vec![
                ScriptedStep::Chunk("partial".to_string()),
                ScriptedStep::Stall,
            ])
            .with_chunk_delay(Duration::from_millis(1));
        let mut answer = open_answer(&client, &request(), IDLE, Span::none()).await.unwrap();

        assert_eq!(answer.next().await.unwrap().unwrap(), "partial");
        assert_eq!(answer.state(), ResponderState::Streaming);
        assert_eq!(answer.relayed_chunks(), 1);
        assert_eq!(client.released_streams(), 0);

        drop(answer);
        assert_eq!(client.released_streams(), 1);
    }
}
