//! Google Gemini `generateContent` client.

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

#[derive(Serialize)]
struct Part<'a> {
    text: &'a str,
}

#[derive(Serialize)]
struct Content<'a> {
    role: &'static str,
    parts: Vec<Part<'a>>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    temperature: f32,
    max_output_tokens: u32,
}

/// Gemini API request body.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest<'a> {
    contents: Vec<Content<'a>>,
    generation_config: GenerationConfig,
}

/// Gemini API response; streamed events share this shape.
#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    prompt_feedback: Option<PromptFeedback>,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    content: Option<CandidateContent>,
    finish_reason: Option<String>,
}

#[derive(Deserialize, Debug)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Deserialize, Debug)]
struct ResponsePart {
    text: Option<String>,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    block_reason: Option<String>,
}

impl GenerateResponse {
    /// Concatenates the text parts of the first candidate.
    fn text(self) -> String {
        self.candidates
            .into_iter()
            .next()
            .and_then(|c| c.content)
            .map(|c| c.parts.into_iter().filter_map(|p| p.text).collect())
            .unwrap_or_default()
    }

    fn block_reason(&self) -> Option<&str> {
        self.prompt_feedback
            .as_ref()
            .and_then(|f| f.block_reason.as_deref())
    }
}

/// Gemini API client.
pub struct GoogleClient {
    /// HTTP client for API requests.
    client: Client,
    /// API key for authentication.
    api_key: String,
    /// Base URL for the API.
    base_url: String,
}

impl GoogleClient {
    /// Creates a client against `base_url`.
    pub fn new(api_key: String, base_url: String) -> Result<Self> {
        Ok(Self {
            client: http_client(Provider::Google)?,
            api_key,
            base_url,
        })
    }

    fn body(request: &GenerationRequest) -> GenerateRequest<'_> {
        GenerateRequest {
            contents: vec![Content {
                role: "user",
                parts: vec![Part {
                    text: &request.prompt,
                }],
            }],
            generation_config: GenerationConfig {
                temperature: request.temperature,
                max_output_tokens: request.max_output_tokens,
            },
        }
    }

    async fn post(&self, request: &GenerationRequest, stream: bool) -> Result<reqwest::Response> {
        let path = if stream {
            format!("v1beta/models/{}:streamGenerateContent?alt=sse", request.model)
        } else {
            format!("v1beta/models/{}:generateContent", request.model)
        };
        let url = endpoint(&self.base_url, &path);
        info!(
            url = %url,
            model = %request.model,
            max_tokens = request.max_output_tokens,
            stream,
            "Sending request to Gemini API"
        );

        let response = self
            .client
            .post(&url)
            .header("x-goog-api-key", &self.api_key)
            .header("content-type", "application/json")
            .json(&Self::body(request))
            .send()
            .await
            .map_err(|e| GenerationError::provider(Provider::Google, e.to_string()))?;

        check_status(Provider::Google, response).await
    }
}

/// Reads the text fragment, if any, out of one streamed event.
fn stream_fragment(data: &str) -> Result<Option<String>> {
    let event: GenerateResponse = serde_json::from_str(data).map_err(|e| {
        GenerationError::provider(Provider::Google, format!("Malformed stream event: {e}"))
    })?;
    if let Some(reason) = event.block_reason() {
        return Err(
            GenerationError::provider(Provider::Google, format!("Prompt blocked: {reason}")).into(),
        );
    }
    let text = event.text();
    Ok((!text.is_empty()).then_some(text))
}

impl AiClient for GoogleClient {
    fn send_request<'a>(
        &'a self,
        request: &'a GenerationRequest,
    ) -> Pin<Box<dyn Future<Output = Result<String>> + Send + 'a>> {
        Box::pin(async move {
            debug!(
                prompt_len = request.prompt.len(),
                model = %request.model,
                "Preparing Gemini API request"
            );

            let response = self.post(request, false).await?;
            let parsed: GenerateResponse = response.json().await.map_err(|e| {
                GenerationError::provider(Provider::Google, format!("Invalid response: {e}"))
            })?;

            if let Some(reason) = parsed.block_reason() {
                return Err(GenerationError::provider(
                    Provider::Google,
                    format!("Prompt blocked: {reason}"),
                )
                .into());
            }
            debug!(
                candidate_count = parsed.candidates.len(),
                finish_reason = ?parsed.candidates.first().and_then(|c| c.finish_reason.as_deref()),
                "Received Gemini API response"
            );

            let text = parsed.text();
            if text.is_empty() {
                return Err(
                    GenerationError::provider(Provider::Google, "No text in response").into(),
                );
            }
            Ok(text)
        })
    }

    fn stream_request<'a>(&'a self, request: &'a GenerationRequest) -> FragmentStream<'a> {
        let open = async move {
            let response = self.post(request, true).await?;
            Ok::<_, anyhow::Error>(sse::data_events(Provider::Google, response))
        };
        stream::once(open)
            .try_flatten()
            .try_filter_map(|data| future::ready(stream_fragment(&data)))
            .boxed()
    }

    fn get_metadata(&self) -> AiClientMetadata {
        AiClientMetadata {
            provider: Provider::Google,
            base_url: self.base_url.clone(),
        }
    }
}
