//! OpenAI-compatible Chat Completions client (OpenAI and Groq).

use std::future::Future;
use std::pin::Pin;

use anyhow::Result;
use futures::{future, stream, StreamExt, TryStreamExt};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::{
    check_status, endpoint, http_client, sse, AiClient, AiClientMetadata, FragmentStream,
    GenerationError, GenerationRequest, Provider,
};

/// OpenAI API request message.
#[derive(Serialize, Debug)]
struct Message<'a> {
    role: &'static str,
    content: &'a str,
}

/// OpenAI API request body.
#[derive(Serialize, Debug)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<Message<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_completion_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    stream: bool,
}

/// OpenAI API response choice.
#[derive(Deserialize, Debug)]
struct Choice {
    message: ResponseMessage,
}

/// OpenAI API response message.
#[derive(Deserialize, Debug)]
struct ResponseMessage {
    content: Option<String>,
}

/// OpenAI API response.
#[derive(Deserialize, Debug)]
struct ChatResponse {
    choices: Vec<Choice>,
    model: Option<String>,
    usage: Option<Usage>,
}

/// OpenAI API usage statistics.
#[derive(Deserialize, Debug)]
#[allow(dead_code)]
struct Usage {
    prompt_tokens: Option<u32>,
    completion_tokens: Option<u32>,
}

/// One streamed chunk.
#[derive(Deserialize, Debug)]
struct ChatChunk {
    #[serde(default)]
    choices: Vec<ChunkChoice>,
}

#[derive(Deserialize, Debug)]
struct ChunkChoice {
    delta: ChunkDelta,
}

#[derive(Deserialize, Debug, Default)]
struct ChunkDelta {
    content: Option<String>,
}

/// OpenAI-compatible API client.
pub struct OpenAiClient {
    /// HTTP client for API requests.
    client: Client,
    /// Backend reported in errors and metadata.
    provider: Provider,
    /// API key for authentication.
    api_key: String,
    /// Base URL for the API.
    base_url: String,
}

impl OpenAiClient {
    /// Creates a client for `provider` against `base_url`.
    pub fn new(provider: Provider, api_key: String, base_url: String) -> Result<Self> {
        Ok(Self {
            client: http_client(provider)?,
            provider,
            api_key,
            base_url,
        })
    }

    /// Reasoning models take `max_completion_tokens` and only their default
    /// temperature.
    fn is_reasoning_model(model: &str) -> bool {
        model.starts_with("o1")
            || model.starts_with("o3")
            || model.starts_with("o4")
            || model.starts_with("gpt-5")
    }

    fn body<'a>(&self, request: &'a GenerationRequest, stream: bool) -> ChatRequest<'a> {
        let messages = vec![Message {
            role: "user",
            content: &request.prompt,
        }];
        if self.provider == Provider::OpenAi && Self::is_reasoning_model(&request.model) {
            ChatRequest {
                model: &request.model,
                messages,
                max_tokens: None,
                max_completion_tokens: Some(request.max_output_tokens),
                temperature: None,
                stream,
            }
        } else {
            ChatRequest {
                model: &request.model,
                messages,
                max_tokens: Some(request.max_output_tokens),
                max_completion_tokens: None,
                temperature: Some(request.temperature),
                stream,
            }
        }
    }

    async fn post(&self, request: &GenerationRequest, stream: bool) -> Result<reqwest::Response> {
        let url = endpoint(&self.base_url, "v1/chat/completions");
        let body = self.body(request, stream);
        debug!(
            max_tokens = ?body.max_tokens,
            max_completion_tokens = ?body.max_completion_tokens,
            temperature = ?body.temperature,
            "Built OpenAI-compatible request payload"
        );
        info!(
            url = %url,
            provider = %self.provider,
            model = %request.model,
            stream,
            "Sending request to OpenAI-compatible API"
        );

        let response = self
            .client
            .post(&url)
            .header("Content-Type", "application/json")
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&body)
            .send()
            .await
            .map_err(|e| GenerationError::provider(self.provider, e.to_string()))?;

        check_status(self.provider, response).await
    }
}

/// Reads the text fragment, if any, out of one streamed chunk.
fn stream_fragment(provider: Provider, data: &str) -> Result<Option<String>> {
    if data.trim() == sse::DONE_MARKER {
        return Ok(None);
    }
    let chunk: ChatChunk = serde_json::from_str(data).map_err(|e| {
        GenerationError::provider(provider, format!("Malformed stream chunk: {e}"))
    })?;
    Ok(chunk
        .choices
        .into_iter()
        .next()
        .and_then(|c| c.delta.content)
        .filter(|t| !t.is_empty()))
}

impl AiClient for OpenAiClient {
    fn send_request<'a>(
        &'a self,
        request: &'a GenerationRequest,
    ) -> Pin<Box<dyn Future<Output = Result<String>> + Send + 'a>> {
        Box::pin(async move {
            debug!(
                prompt_len = request.prompt.len(),
                model = %request.model,
                base_url = %self.base_url,
                "Preparing OpenAI-compatible API request"
            );

            let response = self.post(request, false).await?;
            let parsed: ChatResponse = response.json().await.map_err(|e| {
                GenerationError::provider(self.provider, format!("Invalid response: {e}"))
            })?;

            debug!(
                choice_count = parsed.choices.len(),
                model = ?parsed.model,
                usage = ?parsed.usage,
                "Received OpenAI-compatible API response"
            );

            let text = parsed
                .choices
                .into_iter()
                .next()
                .and_then(|choice| choice.message.content)
                .ok_or_else(|| GenerationError::provider(self.provider, "No choices in response"))?;

            debug!(response_len = text.len(), "Extracted OpenAI-compatible response text");
            Ok(text)
        })
    }

    fn stream_request<'a>(&'a self, request: &'a GenerationRequest) -> FragmentStream<'a> {
        let provider = self.provider;
        let open = async move {
            let response = self.post(request, true).await?;
            Ok::<_, anyhow::Error>(sse::data_events(provider, response))
        };
        stream::once(open)
            .try_flatten()
            .try_filter_map(move |data| future::ready(stream_fragment(provider, &data)))
            .boxed()
    }

    fn get_metadata(&self) -> AiClientMetadata {
        AiClientMetadata {
            provider: self.provider,
            base_url: self.base_url.clone(),
        }
    }
}
