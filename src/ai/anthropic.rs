//! Anthropic Messages API client.

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

/// Pinned API version header value.
const API_VERSION: &str = "2023-06-01";

/// Anthropic accepts temperatures in `[0, 1]` only.
const MAX_TEMPERATURE: f32 = 1.0;

/// Anthropic API request message.
#[derive(Serialize)]
struct Message<'a> {
    role: &'static str,
    content: &'a str,
}

/// Anthropic API request body.
#[derive(Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    temperature: f32,
    messages: Vec<Message<'a>>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    stream: bool,
}

/// Anthropic API response content block.
#[derive(Deserialize)]
struct Content {
    #[serde(rename = "type")]
    content_type: String,
    #[serde(default)]
    text: String,
}

/// Anthropic API response.
#[derive(Deserialize)]
struct MessagesResponse {
    content: Vec<Content>,
}

/// One streamed event payload. Only the fields read here are modelled.
#[derive(Deserialize)]
struct StreamEvent {
    #[serde(rename = "type")]
    event_type: String,
    delta: Option<Delta>,
    error: Option<StreamError>,
}

#[derive(Deserialize)]
struct Delta {
    #[serde(rename = "type")]
    delta_type: Option<String>,
    text: Option<String>,
}

#[derive(Deserialize)]
struct StreamError {
    message: String,
}

/// Anthropic Messages API client.
pub struct AnthropicClient {
    /// HTTP client for API requests.
    client: Client,
    /// API key for authentication.
    api_key: String,
    /// Base URL for the API.
    base_url: String,
}

impl AnthropicClient {
    /// Creates a client against `base_url`.
    pub fn new(api_key: String, base_url: String) -> Result<Self> {
        Ok(Self {
            client: http_client(Provider::Anthropic)?,
            api_key,
            base_url,
        })
    }

    fn body<'a>(request: &'a GenerationRequest, stream: bool) -> MessagesRequest<'a> {
        let temperature = request.temperature.min(MAX_TEMPERATURE);
        if temperature < request.temperature {
            debug!(
                requested = request.temperature,
                effective = temperature,
                "Clamped temperature to Anthropic's range"
            );
        }
        MessagesRequest {
            model: &request.model,
            max_tokens: request.max_output_tokens,
            temperature,
            messages: vec![Message {
                role: "user",
                content: &request.prompt,
            }],
            stream,
        }
    }

    async fn post(&self, request: &GenerationRequest, stream: bool) -> Result<reqwest::Response> {
        let url = endpoint(&self.base_url, "v1/messages");
        info!(
            url = %url,
            model = %request.model,
            max_tokens = request.max_output_tokens,
            stream,
            "Sending request to Anthropic API"
        );

        let response = self
            .client
            .post(&url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", API_VERSION)
            .header("content-type", "application/json")
            .json(&Self::body(request, stream))
            .send()
            .await
            .map_err(|e| GenerationError::provider(Provider::Anthropic, e.to_string()))?;

        check_status(Provider::Anthropic, response).await
    }
}

/// Reads the text fragment, if any, out of one streamed event.
fn stream_fragment(data: &str) -> Result<Option<String>> {
    let event: StreamEvent = serde_json::from_str(data).map_err(|e| {
        GenerationError::provider(Provider::Anthropic, format!("Malformed stream event: {e}"))
    })?;
    match event.event_type.as_str() {
        "content_block_delta" => Ok(event
            .delta
            .filter(|d| d.delta_type.as_deref() == Some("text_delta"))
            .and_then(|d| d.text)
            .filter(|t| !t.is_empty())),
        "error" => {
            let message = event
                .error
                .map_or_else(|| "unknown stream error".to_string(), |e| e.message);
            Err(GenerationError::provider(Provider::Anthropic, message).into())
        }
        _ => Ok(None),
    }
}

impl AiClient for AnthropicClient {
    fn send_request<'a>(
        &'a self,
        request: &'a GenerationRequest,
    ) -> Pin<Box<dyn Future<Output = Result<String>> + Send + 'a>> {
        Box::pin(async move {
            debug!(
                prompt_len = request.prompt.len(),
                model = %request.model,
                "Preparing Anthropic API request"
            );

            let response = self.post(request, false).await?;
            let parsed: MessagesResponse = response.json().await.map_err(|e| {
                GenerationError::provider(Provider::Anthropic, format!("Invalid response: {e}"))
            })?;

            debug!(
                content_count = parsed.content.len(),
                "Received Anthropic API response"
            );

            let text: String = parsed
                .content
                .into_iter()
                .filter(|c| c.content_type == "text")
                .map(|c| c.text)
                .collect();
            if text.is_empty() {
                return Err(GenerationError::provider(
                    Provider::Anthropic,
                    "No text content in response",
                )
                .into());
            }

            debug!(response_len = text.len(), "Extracted Anthropic response text");
            Ok(text)
        })
    }

    fn stream_request<'a>(&'a self, request: &'a GenerationRequest) -> FragmentStream<'a> {
        let open = async move {
            let response = self.post(request, true).await?;
            Ok::<_, anyhow::Error>(sse::data_events(Provider::Anthropic, response))
        };
        stream::once(open)
            .try_flatten()
            .try_filter_map(|data| future::ready(stream_fragment(&data)))
            .boxed()
    }

    fn get_metadata(&self) -> AiClientMetadata {
        AiClientMetadata {
            provider: Provider::Anthropic,
            base_url: self.base_url.clone(),
        }
    }
}
