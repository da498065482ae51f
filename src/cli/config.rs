//! Configuration-related CLI commands.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use super::output;
use crate::ai::model_config::get_model_registry;
use crate::ai::Provider;
use crate::config::store::ConfigStore;
use crate::config::Config;

/// Configuration operations.
#[derive(Parser)]
pub struct ConfigCommand {
    /// Configuration subcommand to execute.
    #[command(subcommand)]
    pub command: ConfigSubcommands,
}

/// Configuration subcommands.
#[derive(Subcommand)]
pub enum ConfigSubcommands {
    /// Creates or replaces a named configuration.
    New(NewCommand),
    /// Lists stored configurations.
    List,
    /// Prints a configuration as YAML.
    Show(ShowCommand),
    /// Makes a configuration the default.
    SetDefault(SetDefaultCommand),
}

/// New command options.
#[derive(Parser)]
pub struct NewCommand {
    /// Configuration name.
    pub name: String,

    /// Provider used by default.
    #[arg(long, value_enum, default_value_t = Provider::OpenAi)]
    pub provider: Provider,

    /// Model for the provider; the catalogue default when omitted.
    #[arg(long)]
    pub model: Option<String>,

    /// Number of commit message variations to ask for.
    #[arg(long, default_value_t = 1)]
    pub variations: u32,

    /// Streams the final answer as it is generated.
    #[arg(long)]
    pub stream: bool,

    /// Makes the new configuration the default.
    #[arg(long)]
    pub default: bool,
}

/// Show command options.
#[derive(Parser)]
pub struct ShowCommand {
    /// Configuration to show; the default one when omitted.
    pub name: Option<String>,
}

/// Set-default command options.
#[derive(Parser)]
pub struct SetDefaultCommand {
    /// Configuration to make the default.
    pub name: String,
}

impl ConfigCommand {
    /// Executes the config command.
    pub fn execute(self) -> Result<()> {
        let store = ConfigStore::new()?;
        match self.command {
            ConfigSubcommands::New(cmd) => cmd.run(&store),
            ConfigSubcommands::List => {
                println!("{}", list_configs(&store)?);
                Ok(())
            }
            ConfigSubcommands::Show(cmd) => {
                println!("{}", cmd.render(&store)?);
                Ok(())
            }
            ConfigSubcommands::SetDefault(cmd) => {
                store.set_default(&cmd.name)?;
                output::note(&format!("Default configuration is now '{}'", cmd.name))
            }
        }
    }
}

impl NewCommand {
    /// Builds the configuration this command describes.
    pub fn to_config(&self) -> Config {
        let mut config = Config {
            provider: self.provider,
            commit_variations: self.variations,
            stream_output: self.stream,
            ..Config::default()
        };
        if let Some(model) = &self.model {
            get_model_registry().check_model(self.provider, model);
            config.models.insert(self.provider, model.clone());
        }
        config
    }

    fn run(&self, store: &ConfigStore) -> Result<()> {
        store.save(&self.name, &self.to_config())?;
        output::note(&format!(
            "Saved configuration '{}' to {}",
            self.name,
            store.config_path(&self.name)?.display()
        ))?;
        if self.default {
            store.set_default(&self.name)?;
            output::note(&format!("Default configuration is now '{}'", self.name))?;
        }
        Ok(())
    }
}

impl ShowCommand {
    fn render(&self, store: &ConfigStore) -> Result<String> {
        let name = match &self.name {
            Some(name) => name.clone(),
            None => store.default_name()?,
        };
        let config = if self.name.is_some() {
            store.load(&name)?
        } else {
            store.load_active(None)?
        };
        let yaml = serde_yaml::to_string(&config).context("Failed to serialize config")?;
        Ok(format!("# {name}\n{}", yaml.trim_end()))
    }
}

/// Lists configuration names, marking the default with `*`.
fn list_configs(store: &ConfigStore) -> Result<String> {
    let names = store.list()?;
    if names.is_empty() {
        return Ok("No configurations; run `diffscribe init` or `diffscribe config new`".into());
    }
    let default = store.default_name()?;
    Ok(names
        .iter()
        .map(|name| {
            let marker = if *name == default { '*' } else { ' ' };
            format!("{marker} {name}")
        })
        .collect::<Vec<_>>()
        .join("\n"))
}
