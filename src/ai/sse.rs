//! Server-sent event decoding shared by the streaming provider clients.

use std::collections::VecDeque;

use futures::{stream, StreamExt};

use super::FragmentStream;
use crate::ai::{GenerationError, Provider};

/// Payload that OpenAI-compatible APIs send to end a stream.
pub(crate) const DONE_MARKER: &str = "[DONE]";

/// Turns an SSE response body into the stream of its `data:` payloads.
///
/// Lines are buffered as bytes so multi-byte characters split across
/// network frames decode correctly. Comment, `event:` and `id:` lines are
/// dropped. The stream ends after the body ends or after the first
/// transport error.
pub(crate) fn data_events(provider: Provider, response: reqwest::Response) -> FragmentStream<'static> {
    struct State {
        body: futures::stream::BoxStream<'static, reqwest::Result<Vec<u8>>>,
        buffer: Vec<u8>,
        pending: VecDeque<String>,
        finished: bool,
    }

    let state = State {
        body: response
            .bytes_stream()
            .map(|chunk| chunk.map(|bytes| bytes.to_vec()))
            .boxed(),
        buffer: Vec::new(),
        pending: VecDeque::new(),
        finished: false,
    };

    stream::unfold(state, move |mut state| async move {
        loop {
            if let Some(data) = state.pending.pop_front() {
                return Some((Ok(data), state));
            }
            if state.finished {
                return None;
            }
            match state.body.next().await {
                Some(Ok(bytes)) => {
                    state.buffer.extend_from_slice(&bytes);
                    drain_lines(&mut state.buffer, &mut state.pending);
                }
                Some(Err(e)) => {
                    state.finished = true;
                    let err = GenerationError::provider(provider, e.to_string());
                    return Some((Err(err.into()), state));
                }
                None => {
                    state.finished = true;
                    state.buffer.push(b'\n');
                    drain_lines(&mut state.buffer, &mut state.pending);
                }
            }
        }
    })
    .boxed()
}

/// Moves every complete line of `buffer` that carries a data payload into
/// `pending`.
fn drain_lines(buffer: &mut Vec<u8>, pending: &mut VecDeque<String>) {
    while let Some(pos) = buffer.iter().position(|&b| b == b'\n') {
        let line: Vec<u8> = buffer.drain(..=pos).collect();
        let line = String::from_utf8_lossy(&line);
        if let Some(data) = data_payload(&line) {
            pending.push_back(data.to_string());
        }
    }
}

/// Returns the payload of a `data:` line.
fn data_payload(line: &str) -> Option<&str> {
    let line = line.trim_end_matches(['\n', '\r']);
    let data = line.strip_prefix("data:")?;
    Some(data.strip_prefix(' ').unwrap_or(data))
}
