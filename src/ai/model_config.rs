//! Model catalogue loaded from an embedded YAML file.
//!
//! Used for advisory validation of model identifiers and for seeding
//! per-provider default models. Provider catalogues change faster than
//! this file, so an unknown identifier is never an error.

use std::collections::HashMap;
use std::sync::OnceLock;

use anyhow::Result;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::ai::Provider;

/// Raw YAML of the embedded catalogue.
pub const MODELS_YAML: &str = include_str!("../templates/models.yaml");

/// Model specification from the catalogue.
#[derive(Debug, Deserialize, Clone)]
pub struct ModelSpec {
    /// Provider serving this model.
    pub provider: Provider,
    /// Identifier sent in API requests.
    pub api_identifier: String,
    /// Maximum number of tokens that can be generated in a single response.
    pub max_output_tokens: u32,
}

/// Provider-level catalogue entry.
#[derive(Debug, Deserialize)]
pub struct ProviderConfig {
    /// Human-readable provider name.
    pub name: String,
    /// Base URL for API requests.
    pub api_base: String,
    /// Model used when a config does not name one.
    pub default_model: String,
}

/// Complete catalogue.
#[derive(Debug, Deserialize)]
pub struct ModelConfiguration {
    /// Provider entries.
    pub providers: HashMap<Provider, ProviderConfig>,
    /// Known models.
    pub models: Vec<ModelSpec>,
}

/// Lookup table over the catalogue.
pub struct ModelRegistry {
    config: ModelConfiguration,
    by_identifier: HashMap<(Provider, String), ModelSpec>,
}

impl ModelRegistry {
    /// Parses the embedded catalogue.
    pub fn load() -> Result<Self> {
        Self::from_yaml(MODELS_YAML)
    }

    /// Parses a catalogue from YAML text.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: ModelConfiguration = serde_yaml::from_str(yaml)?;
        let by_identifier = config
            .models
            .iter()
            .map(|m| ((m.provider, m.api_identifier.clone()), m.clone()))
            .collect();
        Ok(Self {
            config,
            by_identifier,
        })
    }

    /// Returns the spec for `model` under `provider`, if catalogued.
    pub fn get_model_spec(&self, provider: Provider, model: &str) -> Option<&ModelSpec> {
        self.by_identifier.get(&(provider, model.to_string()))
    }

    /// Returns `true` if `model` is catalogued for `provider`.
    pub fn is_known(&self, provider: Provider, model: &str) -> bool {
        self.get_model_spec(provider, model).is_some()
    }

    /// Logs a warning when `model` is not catalogued for `provider`.
    ///
    /// Returns whether the model was known.
    pub fn check_model(&self, provider: Provider, model: &str) -> bool {
        let known = self.is_known(provider, model);
        if !known {
            warn!(
                %provider,
                model,
                "Model is not in the known catalogue; sending it anyway"
            );
        }
        known
    }

    /// Caps `requested` at the model's output limit when the model is
    /// catalogued.
    pub fn clamp_output_tokens(&self, provider: Provider, model: &str, requested: u32) -> u32 {
        match self.get_model_spec(provider, model) {
            Some(spec) if spec.max_output_tokens < requested => {
                debug!(
                    %provider,
                    model,
                    requested,
                    limit = spec.max_output_tokens,
                    "Capping output tokens at the model limit"
                );
                spec.max_output_tokens
            }
            _ => requested,
        }
    }

    /// Returns the provider's display name, falling back to its identifier.
    pub fn provider_name(&self, provider: Provider) -> &str {
        self.config
            .providers
            .get(&provider)
            .map_or_else(|| provider.as_str(), |p| p.name.as_str())
    }

    /// Returns the catalogue's default model for `provider`.
    pub fn default_model(&self, provider: Provider) -> Option<&str> {
        self.config
            .providers
            .get(&provider)
            .map(|p| p.default_model.as_str())
    }

    /// Returns the catalogue's base URL for `provider`.
    pub fn api_base(&self, provider: Provider) -> Option<&str> {
        self.config
            .providers
            .get(&provider)
            .map(|p| p.api_base.as_str())
    }

    /// Returns every catalogued model for `provider`, in file order.
    pub fn models_for(&self, provider: Provider) -> Vec<&ModelSpec> {
        self.config
            .models
            .iter()
            .filter(|m| m.provider == provider)
            .collect()
    }
}

/// Global model registry instance.
static MODEL_REGISTRY: OnceLock<ModelRegistry> = OnceLock::new();

/// Returns the registry built from the embedded catalogue.
pub fn get_model_registry() -> &'static ModelRegistry {
    #[allow(clippy::expect_used)] // embedded data, validated by tests
    MODEL_REGISTRY.get_or_init(|| ModelRegistry::load().expect("Failed to load model registry"))
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn embedded_catalogue_loads() {
        let registry = ModelRegistry::load().unwrap();
        for provider in Provider::ALL {
            assert!(registry.default_model(provider).is_some(), "{provider}");
            assert!(registry.api_base(provider).is_some(), "{provider}");
            assert!(!registry.models_for(provider).is_empty(), "{provider}");
        }
    }

    #[test]
    fn defaults_are_catalogued() {
        let registry = ModelRegistry::load().unwrap();
        for provider in Provider::ALL {
            let model = registry.default_model(provider).unwrap();
            assert!(registry.is_known(provider, model), "{provider}/{model}");
        }
    }

    #[test]
    fn lookup_is_provider_scoped() {
        let registry = ModelRegistry::load().unwrap();
        assert!(registry.is_known(Provider::OpenAi, "gpt-4o"));
        assert!(!registry.is_known(Provider::Anthropic, "gpt-4o"));
        let spec = registry
            .get_model_spec(Provider::Anthropic, "claude-sonnet-4-20250514")
            .unwrap();
        assert_eq!(spec.max_output_tokens, 64000);
    }

    #[test]
    fn unknown_model_is_advisory() {
        let registry = ModelRegistry::load().unwrap();
        assert!(!registry.check_model(Provider::Groq, "brand-new-model"));
        assert!(registry.check_model(Provider::Groq, "llama-3.1-8b-instant"));
    }

    #[test]
    fn custom_catalogue() {
        let yaml = r#"
providers:
  groq:
    name: "Groq"
    api_base: "http://localhost"
    default_model: "tiny"
models:
  - provider: groq
    api_identifier: "tiny"
    max_output_tokens: 10
"#;
        let registry = ModelRegistry::from_yaml(yaml).unwrap();
        assert_eq!(registry.default_model(Provider::Groq), Some("tiny"));
        assert_eq!(registry.default_model(Provider::OpenAi), None);
        assert_eq!(registry.provider_name(Provider::Groq), "Groq");
        assert_eq!(registry.provider_name(Provider::OpenAi), "openai");
    }

    #[test]
    fn output_tokens_are_capped_for_known_models() {
        let registry = ModelRegistry::load().unwrap();
        assert_eq!(
            registry.clamp_output_tokens(Provider::Anthropic, "claude-3-5-haiku-20241022", 100_000),
            8192
        );
        assert_eq!(
            registry.clamp_output_tokens(Provider::Anthropic, "claude-3-5-haiku-20241022", 600),
            600
        );
        assert_eq!(
            registry.clamp_output_tokens(Provider::Groq, "brand-new-model", 100_000),
            100_000
        );
    }
}
