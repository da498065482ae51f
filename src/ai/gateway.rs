//! Provider routing behind the [`GenerationGateway`] trait.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;

use anyhow::Result;
use futures::{future, stream, StreamExt};
use tracing::debug;

use super::anthropic::AnthropicClient;
use super::google::GoogleClient;
use super::model_config::get_model_registry;
use super::openai::OpenAiClient;
use super::{
    AiClient, FragmentStream, GenerationError, GenerationGateway, GenerationRequest, Provider,
};
use crate::config::credentials::CredentialStore;

/// Builds the backend for `provider`.
///
/// Without `base_url` the client targets the catalogue's `api_base` for
/// the provider.
pub fn build_client(
    provider: Provider,
    api_key: String,
    base_url: Option<String>,
) -> Result<Box<dyn AiClient>> {
    let base_url = match base_url {
        Some(url) => url,
        None => get_model_registry()
            .api_base(provider)
            .map(str::to_string)
            .ok_or_else(|| {
                GenerationError::ConfigurationError(format!(
                    "No API base URL catalogued for {provider}"
                ))
            })?,
    };
    let client: Box<dyn AiClient> = match provider {
        Provider::Anthropic => Box::new(AnthropicClient::new(api_key, base_url)?),
        Provider::Google => Box::new(GoogleClient::new(api_key, base_url)?),
        Provider::OpenAi | Provider::Groq => {
            Box::new(OpenAiClient::new(provider, api_key, base_url)?)
        }
    };
    Ok(client)
}

/// Routes requests to one [`AiClient`] per provider.
///
/// Providers with no client registered, or explicitly disabled, fail with
/// [`GenerationError::ConfigurationError`] before any network traffic.
#[derive(Default)]
pub struct ProviderGateway {
    clients: HashMap<Provider, Box<dyn AiClient>>,
    disabled: Vec<Provider>,
}

impl ProviderGateway {
    /// Creates a gateway with no providers configured.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a gateway from every key `store` can resolve, skipping
    /// `disabled` providers.
    pub fn from_credentials(store: &dyn CredentialStore, disabled: &[Provider]) -> Result<Self> {
        let mut gateway = Self::new().with_disabled(disabled);
        for provider in Provider::ALL {
            if disabled.contains(&provider) {
                continue;
            }
            if let Some(key) = store.get_secret(provider)? {
                debug!(%provider, "Resolved API key");
                gateway = gateway.with_api_key(provider, key)?;
            }
        }
        Ok(gateway)
    }

    /// Registers the public endpoint for `provider` with `api_key`.
    pub fn with_api_key(self, provider: Provider, api_key: String) -> Result<Self> {
        Ok(self.with_client(build_client(provider, api_key, None)?))
    }

    /// Registers `client` under the provider it reports.
    pub fn with_client(mut self, client: Box<dyn AiClient>) -> Self {
        self.clients.insert(client.get_metadata().provider, client);
        self
    }

    /// Marks providers as unusable even when a key is present.
    pub fn with_disabled(mut self, disabled: &[Provider]) -> Self {
        self.disabled.extend_from_slice(disabled);
        self
    }

    /// Returns `true` when `provider` can serve requests.
    pub fn is_available(&self, provider: Provider) -> bool {
        !self.disabled.contains(&provider) && self.clients.contains_key(&provider)
    }

    fn client(&self, request: &GenerationRequest) -> Result<&dyn AiClient> {
        let provider = request.provider;
        if self.disabled.contains(&provider) {
            return Err(GenerationError::ConfigurationError(format!(
                "Provider {provider} is disabled in this configuration"
            ))
            .into());
        }
        let client = self.clients.get(&provider).ok_or_else(|| {
            GenerationError::ConfigurationError(format!(
                "No API key configured for {provider}; run `diffscribe init` or set the provider's API key variable"
            ))
        })?;
        Ok(client.as_ref())
    }
}

/// Wraps failures that did not come from a provider client in a
/// [`GenerationError::ProviderError`].
fn as_provider_error(provider: Provider, err: anyhow::Error) -> anyhow::Error {
    if err.downcast_ref::<GenerationError>().is_some() {
        err
    } else {
        GenerationError::provider(provider, format!("{err:#}")).into()
    }
}

impl GenerationGateway for ProviderGateway {
    fn complete<'a>(
        &'a self,
        request: &'a GenerationRequest,
    ) -> Pin<Box<dyn Future<Output = Result<String>> + Send + 'a>> {
        Box::pin(async move {
            let client = self.client(request)?;
            client
                .send_request(request)
                .await
                .map_err(|e| as_provider_error(request.provider, e))
        })
    }

    fn stream<'a>(&'a self, request: &'a GenerationRequest) -> FragmentStream<'a> {
        match self.client(request) {
            Ok(client) => {
                let provider = request.provider;
                client
                    .stream_request(request)
                    .map(move |item| item.map_err(|e| as_provider_error(provider, e)))
                    .boxed()
            }
            Err(e) => stream::once(future::ready(Err(e))).boxed(),
        }
    }
}
