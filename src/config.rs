//! Configuration value object and default prompt templates.
//!
//! A [`Config`] is loaded once per invocation (see [`store::ConfigStore`])
//! and passed by reference to everything that needs it. Missing keys in a
//! config file take the values from [`Config::default`].

pub mod credentials;
pub mod store;

use std::collections::BTreeMap;

use anyhow::Result;
use serde::{Deserialize, Serialize};

use crate::ai::model_config::get_model_registry;
use crate::ai::{GenerationError, Provider};
use crate::summary::chunker::ChunkStrategy;

/// Prompt for one commit message pass over a diff or diff chunk.
pub const DEFAULT_COMMIT_PROMPT: &str = r#"You write git commit messages.

Read the diff below and propose {n_commit} distinct commit message(s) in the
Conventional Commits style (`type(scope): summary`). Keep the summary line
under 72 characters. Add a short body only when the change needs explaining.

Answer with JSON only, in exactly this shape:
{"results": ["<message>", ...]}

Diff:
{diff}
"#;

/// Prompt merging per-chunk commit messages into final proposals.
pub const DEFAULT_MERGE_COMMIT_PROMPT: &str = r#"You write git commit messages.

A large change was summarised in parts. The partial commit messages, in
order, are:

{messages}

Combine them into {n_commit} distinct commit message(s) describing the whole
change, in the Conventional Commits style. Do not list the parts separately.

Answer with JSON only, in exactly this shape:
{"results": ["<message>", ...]}
"#;

/// Prompt for a pull request description over a small commit range.
pub const DEFAULT_PR_PROMPT: &str = r#"You write pull request descriptions.

The pull request contains these commits:
{commits}

Their combined diff is:
{diff}

Write a title on the first line, starting with `# `, then a blank line,
then a description in Markdown covering what changed and why.
"#;

/// Prompt summarising one group of commits of a large pull request.
pub const DEFAULT_PR_CHUNK_PROMPT: &str = r#"Summarise the following commits and
their diffs in a few plain-text sentences. Focus on behaviour that changed.

{diff}
"#;

/// Prompt merging per-group summaries into one pull request description.
pub const DEFAULT_MERGE_PR_PROMPT: &str = r#"You write pull request descriptions.

The pull request contains these commits:
{commits}

Summaries of its parts, in order:
{messages}

Write one cohesive description. Put a title on the first line, starting
with `# `, then a blank line, then the description in Markdown.
"#;

/// Runtime configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Provider used unless overridden on the command line.
    pub provider: Provider,
    /// Model per provider; providers not listed use the catalogue default.
    pub models: BTreeMap<Provider, String>,
    /// Providers that must not be used even when a key is present.
    pub disabled_providers: Vec<Provider>,
    /// Template with `{diff}` and `{n_commit}`.
    pub commit_prompt: String,
    /// Template with `{diff}`, `{commits}` and `{n_commit}`.
    pub pr_prompt: String,
    /// Template with `{messages}` and `{n_commit}`.
    pub merge_commit_prompt: String,
    /// Template with `{messages}` and `{commits}`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub merge_pr_prompt: Option<String>,
    /// Template with `{diff}`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pr_chunk_prompt: Option<String>,
    /// Sampling temperature in `[0, 2]`.
    pub temperature: f32,
    /// Output token limit for commit message calls.
    pub max_commit_tokens: u32,
    /// Output token limit for pull request calls.
    pub max_pr_tokens: u32,
    /// Stream the final call's output as it arrives.
    pub stream_output: bool,
    /// Number of alternative commit messages to ask for.
    pub commit_variations: u32,
    /// Inputs longer than this many bytes are chunked.
    pub size_threshold: usize,
    /// Byte budget per chunk.
    pub max_chunk_size: usize,
    /// Context carried between consecutive pieces of a split: lines for
    /// the file-aware splitter, bytes for the window splitter.
    pub chunk_overlap: usize,
    /// Splitter used for commit messages.
    pub chunk_strategy: ChunkStrategy,
    /// Maximum number of chunk calls in flight.
    pub concurrency: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            provider: Provider::OpenAi,
            models: BTreeMap::new(),
            disabled_providers: Vec::new(),
            commit_prompt: DEFAULT_COMMIT_PROMPT.to_string(),
            pr_prompt: DEFAULT_PR_PROMPT.to_string(),
            merge_commit_prompt: DEFAULT_MERGE_COMMIT_PROMPT.to_string(),
            merge_pr_prompt: None,
            pr_chunk_prompt: None,
            temperature: 0.4,
            max_commit_tokens: 600,
            max_pr_tokens: 1500,
            stream_output: false,
            commit_variations: 1,
            size_threshold: 12_000,
            max_chunk_size: 10_000,
            chunk_overlap: 0,
            chunk_strategy: ChunkStrategy::Files,
            concurrency: 4,
        }
    }
}

impl Config {
    /// Checks value ranges.
    pub fn validate(&self) -> Result<()> {
        let invalid = |msg: String| -> Result<()> {
            Err(GenerationError::ConfigurationError(msg).into())
        };
        if self.commit_variations < 1 {
            return invalid("commit_variations must be at least 1".to_string());
        }
        if self.concurrency < 1 {
            return invalid("concurrency must be at least 1".to_string());
        }
        if self.max_chunk_size == 0 {
            return invalid("max_chunk_size must be greater than zero".to_string());
        }
        if !(0.0..=2.0).contains(&self.temperature) {
            return invalid(format!(
                "temperature must be within [0, 2], got {}",
                self.temperature
            ));
        }
        if self.max_commit_tokens == 0 || self.max_pr_tokens == 0 {
            return invalid("token limits must be greater than zero".to_string());
        }
        if self.disabled_providers.contains(&self.provider) {
            return invalid(format!(
                "default provider {} is listed as disabled",
                self.provider
            ));
        }
        Ok(())
    }

    /// Returns the model to use for `provider`.
    pub fn model_for(&self, provider: Provider) -> Result<String> {
        if let Some(model) = self.models.get(&provider) {
            return Ok(model.clone());
        }
        get_model_registry()
            .default_model(provider)
            .map(str::to_string)
            .ok_or_else(|| {
                GenerationError::ConfigurationError(format!("No model configured for {provider}"))
                    .into()
            })
    }

    /// Returns the PR merge template, falling back to the built-in one.
    pub fn merge_pr_prompt(&self) -> &str {
        self.merge_pr_prompt
            .as_deref()
            .unwrap_or(DEFAULT_MERGE_PR_PROMPT)
    }

    /// Returns the PR chunk template, falling back to the built-in one.
    pub fn pr_chunk_prompt(&self) -> &str {
        self.pr_chunk_prompt
            .as_deref()
            .unwrap_or(DEFAULT_PR_CHUNK_PROMPT)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        Config::default().validate().unwrap();
    }

    #[test]
    fn missing_fields_take_defaults() {
        let config: Config = serde_yaml::from_str("provider: groq\ncommit_variations: 3\n").unwrap();
        assert_eq!(config.provider, Provider::Groq);
        assert_eq!(config.commit_variations, 3);
        assert_eq!(config.size_threshold, Config::default().size_threshold);
        assert_eq!(config.commit_prompt, DEFAULT_COMMIT_PROMPT);
    }

    #[test]
    fn yaml_round_trip_keeps_models() {
        let mut config = Config::default();
        config
            .models
            .insert(Provider::Anthropic, "claude-sonnet-4-20250514".to_string());
        config.chunk_strategy = ChunkStrategy::Window;
        let yaml = serde_yaml::to_string(&config).unwrap();
        assert!(yaml.contains("anthropic: claude-sonnet-4-20250514"));
        assert!(yaml.contains("chunk_strategy: window"));
        assert!(!yaml.contains("merge_pr_prompt"));
        let back: Config = serde_yaml::from_str(&yaml).unwrap();
        assert_eq!(back, config);
    }

    #[test]
    fn validate_rejects_out_of_range_values() {
        let cases: Vec<fn(&mut Config)> = vec![
            |c| c.commit_variations = 0,
            |c| c.concurrency = 0,
            |c| c.max_chunk_size = 0,
            |c| c.temperature = 2.1,
            |c| c.max_pr_tokens = 0,
            |c| c.disabled_providers = vec![c.provider],
        ];
        for mutate in cases {
            let mut config = Config::default();
            mutate(&mut config);
            let err = config.validate().unwrap_err();
            assert!(matches!(
                err.downcast_ref::<GenerationError>(),
                Some(GenerationError::ConfigurationError(_))
            ));
        }
    }

    #[test]
    fn model_for_prefers_configured_model() {
        let mut config = Config::default();
        config.models.insert(Provider::Groq, "mixtral-8x7b-32768".to_string());
        assert_eq!(config.model_for(Provider::Groq).unwrap(), "mixtral-8x7b-32768");
        assert_eq!(
            config.model_for(Provider::OpenAi).unwrap(),
            get_model_registry().default_model(Provider::OpenAi).unwrap()
        );
    }

    #[test]
    fn optional_prompts_fall_back() {
        let mut config = Config::default();
        assert_eq!(config.merge_pr_prompt(), DEFAULT_MERGE_PR_PROMPT);
        config.pr_chunk_prompt = Some("Summarise: {diff}".to_string());
        assert_eq!(config.pr_chunk_prompt(), "Summarise: {diff}");
    }
}
