//! CLI interface for diffscribe.

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use tracing::debug;

use crate::ai::model_config::get_model_registry;
use crate::ai::{GenerationError, Provider, ProviderGateway};
use crate::config::credentials::{env_vars, FileCredentialStore};
use crate::config::store::ConfigStore;
use crate::config::Config;
use crate::summary::SummarySettings;

pub mod commit;
pub mod config;
pub mod init;
pub mod output;
pub mod pr;

/// diffscribe: commit messages and pull request descriptions from diffs.
#[derive(Parser)]
#[command(name = "diffscribe")]
#[command(
    about = "Generates commit messages and pull request descriptions from git diffs",
    long_about = None
)]
#[command(version)]
pub struct Cli {
    /// The main command to execute.
    #[command(subcommand)]
    pub command: Commands,
}

/// Top-level commands.
#[derive(Subcommand)]
pub enum Commands {
    /// Creates a first configuration and stores an API key.
    Init(init::InitCommand),
    /// Generates a commit message for the staged changes.
    #[command(visible_alias = "c")]
    Commit(commit::CommitCommand),
    /// Generates a pull request description for recent commits.
    Pr(pr::PrCommand),
    /// Manages named configurations.
    Config(config::ConfigCommand),
}

impl Cli {
    /// Executes the CLI command.
    pub async fn execute(self) -> Result<()> {
        match self.command {
            Commands::Init(cmd) => cmd.execute(),
            Commands::Commit(cmd) => cmd.execute().await,
            Commands::Pr(cmd) => cmd.execute().await,
            Commands::Config(cmd) => cmd.execute(),
        }
    }
}

/// Options shared by the generating commands.
#[derive(Args, Debug, Default)]
pub struct GenerationArgs {
    /// Named configuration to use instead of the default one.
    #[arg(long, value_name = "NAME")]
    pub config: Option<String>,

    /// Provider to use instead of the configured one.
    #[arg(long, value_enum)]
    pub provider: Option<Provider>,

    /// Model to use instead of the configured one.
    #[arg(long)]
    pub model: Option<String>,
}

/// Gateway and settings resolved for one invocation.
pub struct Resolved {
    /// Routes requests to the configured providers.
    pub gateway: ProviderGateway,
    /// Settings for the chosen provider and model.
    pub settings: SummarySettings,
}

impl GenerationArgs {
    /// Loads the active config, applies overrides and builds the gateway.
    ///
    /// Fails with a configuration error before any request when the chosen
    /// provider is disabled or has no key.
    pub fn resolve(&self) -> Result<Resolved> {
        let store = ConfigStore::new()?;
        let config = store.load_active(self.config.as_deref())?;

        let provider = self.provider.unwrap_or(config.provider);
        if config.disabled_providers.contains(&provider) {
            return Err(GenerationError::ConfigurationError(format!(
                "Provider {provider} is disabled in this configuration"
            ))
            .into());
        }
        let model = match &self.model {
            Some(model) => model.clone(),
            None => config.model_for(provider)?,
        };

        let credentials = FileCredentialStore::new()?;
        let gateway = ProviderGateway::from_credentials(&credentials, &config.disabled_providers)?;
        if !gateway.is_available(provider) {
            return Err(GenerationError::ConfigurationError(format!(
                "No API key for {provider}: set {} or run `diffscribe init`",
                env_vars(provider).join(" or ")
            ))
            .into());
        }

        let settings = model_settings(&config, provider, model);
        debug!(%provider, model = %settings.model, "Resolved generation settings");
        Ok(Resolved { gateway, settings })
    }
}

/// Checks `model` against the catalogue once per invocation and caps the
/// token limits at what the model can produce.
fn model_settings(config: &Config, provider: Provider, model: String) -> SummarySettings {
    let registry = get_model_registry();
    registry.check_model(provider, &model);
    let mut settings = SummarySettings::from_config(config, provider, model);
    settings.max_commit_tokens =
        registry.clamp_output_tokens(provider, &settings.model, settings.max_commit_tokens);
    settings.max_pr_tokens =
        registry.clamp_output_tokens(provider, &settings.model, settings.max_pr_tokens);
    settings
}
