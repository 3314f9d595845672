//! Line framing for streamed provider responses.
//!
//! Network reads do not line up with protocol lines: one read may carry
//! several lines or end in the middle of one (or in the middle of a UTF-8
//! sequence). Bytes are buffered until a full line is available.

use futures::{Stream, StreamExt};
use unilink_core::{AppError, AppResult};

#[derive(Debug, Default)]
pub(crate) struct LineBuffer {
    pending: Vec<u8>,
}

impl LineBuffer {
    /// Append bytes and return every completed, non-blank line.
    pub(crate) fn push(&mut self, bytes: &[u8]) -> Vec<String> {
        self.pending.extend_from_slice(bytes);

        let mut lines = Vec::new();
        while let Some(pos) = self.pending.iter().position(|b| *b == b'\n') {
            let raw: Vec<u8> = self.pending.drain(..=pos).collect();
            let line = String::from_utf8_lossy(&raw)
                .trim_end_matches(&['\n', '\r'][..])
                .to_string();
            if !line.trim().is_empty() {
                lines.push(line);
            }
        }
        lines
    }

    /// Flush a trailing line that was not newline-terminated.
    pub(crate) fn finish(&mut self) -> Option<String> {
        let raw = std::mem::take(&mut self.pending);
        let line = String::from_utf8_lossy(&raw).trim().to_string();
        (!line.is_empty()).then_some(line)
    }
}

/// Turn a byte stream into a stream of complete text lines.
///
/// A transport error ends the stream after yielding it.
pub(crate) fn decode_lines<S, B, E>(bytes: S) -> impl Stream<Item = AppResult<String>> + Send
where
    S: Stream<Item = Result<B, E>> + Send + 'static,
    B: AsRef<[u8]> + Send,
    E: std::fmt::Display + Send,
{
    let state = Some((Box::pin(bytes), LineBuffer::default()));

    futures::stream::unfold(state, |state| async move {
        let (mut bytes, mut buffer) = state?;
        let (lines, next): (Vec<AppResult<String>>, _) = match bytes.next().await {
            Some(Ok(chunk)) => {
                let lines = buffer.push(chunk.as_ref()).into_iter().map(Ok).collect();
                (lines, Some((bytes, buffer)))
            }
            Some(Err(e)) => (
                vec![Err(AppError::Llm(format!("Stream error: {}", e)))],
                None,
            ),
            None => (buffer.finish().into_iter().map(Ok).collect(), None),
        };
        Some((futures::stream::iter(lines), next))
    })
    .flatten()
}
