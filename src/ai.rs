//! Language-model access: request types, provider clients and the gateway.
//!
//! Two traits sit at this seam. [`AiClient`] is one provider backend
//! speaking its own HTTP dialect. [`GenerationGateway`] is what the
//! summarization pipeline depends on: it routes a [`GenerationRequest`] to
//! the right backend by [`Provider`].

pub mod anthropic;
pub mod error;
pub mod gateway;
pub mod google;
pub mod model_config;
pub mod openai;
pub(crate) mod sse;
#[cfg(test)]
#[allow(clippy::unwrap_used)]
pub(crate) mod test_utils;

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::str::FromStr;
use std::time::Duration;

use anyhow::Result;
use futures::stream::BoxStream;
use serde::{Deserialize, Serialize};

pub use error::GenerationError;
pub use gateway::ProviderGateway;

/// Upper bound on a single HTTP request to a provider.
pub(crate) const REQUEST_TIMEOUT: Duration = Duration::from_secs(300);

/// Lazy, finite, single-consumer sequence of text fragments.
///
/// Dropping the stream stops reading the response body.
pub type FragmentStream<'a> = BoxStream<'a, Result<String>>;

/// Hosted model providers.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    /// OpenAI Chat Completions.
    #[value(name = "openai")]
    OpenAi,
    /// Anthropic Messages.
    Anthropic,
    /// Google Gemini.
    Google,
    /// Groq (OpenAI-compatible).
    Groq,
}

impl Provider {
    /// All providers, in display order.
    pub const ALL: [Self; 4] = [Self::OpenAi, Self::Anthropic, Self::Google, Self::Groq];

    /// Lowercase identifier used in config files and on the command line.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::OpenAi => "openai",
            Self::Anthropic => "anthropic",
            Self::Google => "google",
            Self::Groq => "groq",
        }
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Provider {
    type Err = GenerationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|p| p.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| GenerationError::ConfigurationError(format!("Unknown provider: {s}")))
    }
}

/// One model call.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationRequest {
    /// Fully rendered prompt.
    pub prompt: String,
    /// Upper bound on generated tokens; always positive.
    pub max_output_tokens: u32,
    /// Sampling temperature in `[0, 2]`.
    pub temperature: f32,
    /// Provider-specific model identifier.
    pub model: String,
    /// Backend to route to.
    pub provider: Provider,
}

impl GenerationRequest {
    /// Creates a request, rejecting out-of-range parameters.
    pub fn new(
        prompt: impl Into<String>,
        max_output_tokens: u32,
        temperature: f32,
        model: impl Into<String>,
        provider: Provider,
    ) -> Result<Self> {
        if max_output_tokens == 0 {
            return Err(GenerationError::ConfigurationError(
                "max output tokens must be greater than zero".to_string(),
            )
            .into());
        }
        if !(0.0..=2.0).contains(&temperature) {
            return Err(GenerationError::ConfigurationError(format!(
                "temperature {temperature} is outside [0, 2]"
            ))
            .into());
        }
        Ok(Self {
            prompt: prompt.into(),
            max_output_tokens,
            temperature,
            model: model.into(),
            provider,
        })
    }
}

/// Builds the HTTP client shared by the provider backends.
pub(crate) fn http_client(provider: Provider) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(REQUEST_TIMEOUT)
        .build()
        .map_err(|e| GenerationError::provider(provider, format!("HTTP client setup: {e}")).into())
}

/// Passes a successful response through, or turns an error status into a
/// [`GenerationError::ProviderError`] carrying the body.
pub(crate) async fn check_status(
    provider: Provider,
    response: reqwest::Response,
) -> Result<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let error_text = response.text().await.unwrap_or_else(|e| {
        tracing::debug!("Failed to read error response body: {e}");
        String::new()
    });
    Err(GenerationError::provider(provider, format!("HTTP {status}: {error_text}")).into())
}

/// Joins a base URL and an endpoint path with exactly one slash.
pub(crate) fn endpoint(base_url: &str, path: &str) -> String {
    format!("{}/{}", base_url.trim_end_matches('/'), path.trim_start_matches('/'))
}

/// Metadata about an AI client implementation.
#[derive(Clone, Debug)]
pub struct AiClientMetadata {
    /// Backend this client talks to.
    pub provider: Provider,
    /// Base URL requests are sent to.
    pub base_url: String,
}

/// One provider backend.
pub trait AiClient: Send + Sync {
    /// Sends a request and returns the complete response text.
    fn send_request<'a>(
        &'a self,
        request: &'a GenerationRequest,
    ) -> Pin<Box<dyn Future<Output = Result<String>> + Send + 'a>>;

    /// Sends a streaming request and yields text fragments as they arrive.
    fn stream_request<'a>(&'a self, request: &'a GenerationRequest) -> FragmentStream<'a>;

    /// Returns metadata about the AI client implementation.
    fn get_metadata(&self) -> AiClientMetadata;
}

/// Text completion service used by the summarization pipeline.
pub trait GenerationGateway: Send + Sync {
    /// Returns the full completion for `request`.
    fn complete<'a>(
        &'a self,
        request: &'a GenerationRequest,
    ) -> Pin<Box<dyn Future<Output = Result<String>> + Send + 'a>>;

    /// Returns the completion for `request` as a stream of fragments.
    fn stream<'a>(&'a self, request: &'a GenerationRequest) -> FragmentStream<'a>;
}
