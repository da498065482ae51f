//! Shared test utilities for the generation pipeline.

use std::collections::VecDeque;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex};

use anyhow::Result;
use futures::{stream, StreamExt};

use super::{FragmentStream, GenerationGateway, GenerationRequest};

/// Mock gateway with a pre-programmed queue of responses.
///
/// Responses are returned in FIFO order. When the queue is exhausted,
/// subsequent calls return `Err("no more mock responses")`.
///
/// Every call records the request it was given so tests can inspect which
/// prompts were dispatched. Streamed responses are delivered one word per
/// fragment.
pub(crate) struct ConfigurableMockGateway {
    responses: Arc<Mutex<VecDeque<Result<String>>>>,
    recorded: Arc<Mutex<Vec<GenerationRequest>>>,
}

impl ConfigurableMockGateway {
    /// Creates a new mock gateway that will return the given responses in
    /// order.
    pub(crate) fn new(responses: Vec<Result<String>>) -> Self {
        Self {
            responses: Arc::new(Mutex::new(VecDeque::from(responses))),
            recorded: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Returns a handle for inspecting which requests were sent.
    pub(crate) fn prompt_handle(&self) -> PromptRecordHandle {
        PromptRecordHandle {
            recorded: self.recorded.clone(),
        }
    }

    /// Returns the number of unconsumed responses remaining in the queue.
    pub(crate) fn remaining(&self) -> usize {
        self.responses.lock().unwrap().len()
    }

    fn next_response(&self, request: &GenerationRequest) -> Result<String> {
        self.recorded.lock().unwrap().push(request.clone());
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(anyhow::anyhow!("no more mock responses")))
    }
}

/// Shared handle to a mock gateway's recorded requests.
pub(crate) struct PromptRecordHandle {
    recorded: Arc<Mutex<Vec<GenerationRequest>>>,
}

impl PromptRecordHandle {
    /// Returns all recorded prompts in dispatch order.
    pub(crate) fn prompts(&self) -> Vec<String> {
        self.recorded
            .lock()
            .unwrap()
            .iter()
            .map(|r| r.prompt.clone())
            .collect()
    }

    /// Returns all recorded requests in dispatch order.
    pub(crate) fn requests(&self) -> Vec<GenerationRequest> {
        self.recorded.lock().unwrap().clone()
    }

    /// Returns the number of requests that were made.
    pub(crate) fn request_count(&self) -> usize {
        self.recorded.lock().unwrap().len()
    }
}

impl GenerationGateway for ConfigurableMockGateway {
    fn complete<'a>(
        &'a self,
        request: &'a GenerationRequest,
    ) -> Pin<Box<dyn Future<Output = Result<String>> + Send + 'a>> {
        Box::pin(async move { self.next_response(request) })
    }

    fn stream<'a>(&'a self, request: &'a GenerationRequest) -> FragmentStream<'a> {
        match self.next_response(request) {
            Ok(text) => {
                let fragments: Vec<Result<String>> = text
                    .split_inclusive(' ')
                    .map(|word| Ok(word.to_string()))
                    .collect();
                stream::iter(fragments).boxed()
            }
            Err(e) => stream::iter(vec![Err(e)]).boxed(),
        }
    }
}
