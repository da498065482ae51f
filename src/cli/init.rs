//! `diffscribe init`: interactive first-time setup.

use std::io::{self, BufRead, IsTerminal, Write};

use anyhow::{bail, Result};
use clap::Parser;
use tracing::info;

use super::output;
use crate::ai::model_config::get_model_registry;
use crate::ai::Provider;
use crate::config::credentials::{CredentialStore, FileCredentialStore};
use crate::config::store::{ConfigStore, DEFAULT_CONFIG_NAME};
use crate::config::Config;

/// Init command options.
#[derive(Parser)]
pub struct InitCommand {
    /// Name of the configuration to create.
    #[arg(long, default_value = DEFAULT_CONFIG_NAME)]
    pub name: String,
}

/// Answers collected by the setup prompts.
#[derive(Debug, PartialEq)]
pub(crate) struct InitAnswers {
    pub provider: Provider,
    pub model: String,
    pub api_key: Option<String>,
}

impl InitCommand {
    /// Executes the init command.
    pub fn execute(self) -> Result<()> {
        let stdin = io::stdin();
        if !stdin.is_terminal() {
            bail!("`diffscribe init` needs an interactive terminal; use `diffscribe config new` instead");
        }
        let answers = prompt_answers(&mut stdin.lock())?;
        let store = ConfigStore::new()?;
        let credentials = FileCredentialStore::new()?;
        apply(&self.name, &answers, &store, &credentials)?;

        output::note(&format!(
            "Saved configuration '{}' to {}",
            self.name,
            store.config_path(&self.name)?.display()
        ))?;
        if answers.api_key.is_some() {
            output::note(&format!(
                "Stored API key in {}",
                credentials.path().display()
            ))?;
        }
        Ok(())
    }
}

/// Saves the configuration, makes it the default and stores the key.
pub(crate) fn apply(
    name: &str,
    answers: &InitAnswers,
    store: &ConfigStore,
    credentials: &dyn CredentialStore,
) -> Result<()> {
    let mut config = Config {
        provider: answers.provider,
        ..Config::default()
    };
    config.models.insert(answers.provider, answers.model.clone());
    store.save(name, &config)?;
    store.set_default(name)?;
    if let Some(key) = &answers.api_key {
        credentials.set_secret(answers.provider, key)?;
    }
    info!(name, provider = %answers.provider, "Initialised configuration");
    Ok(())
}

/// Asks for provider, model and API key.
pub(crate) fn prompt_answers(reader: &mut dyn BufRead) -> Result<InitAnswers> {
    let provider = prompt_provider(reader)?;
    let registry = get_model_registry();
    let default_model = registry.default_model(provider).unwrap_or_default();

    let known: Vec<&str> = registry
        .models_for(provider)
        .iter()
        .map(|spec| spec.api_identifier.as_str())
        .collect();
    if !known.is_empty() {
        println!("Known {provider} models: {}", known.join(", "));
    }

    let model = loop {
        let answer = ask(reader, &format!("Model [{default_model}]: "))?;
        let model = if answer.is_empty() {
            default_model.to_string()
        } else {
            answer
        };
        if !model.is_empty() {
            registry.check_model(provider, &model);
            break model;
        }
        println!("Please enter a model name.");
    };

    let answer = ask(
        reader,
        &format!("API key for {provider} (leave empty to use the environment): "),
    )?;
    let api_key = (!answer.is_empty()).then_some(answer);

    Ok(InitAnswers {
        provider,
        model,
        api_key,
    })
}

fn prompt_provider(reader: &mut dyn BufRead) -> Result<Provider> {
    let registry = get_model_registry();
    println!("Providers:");
    for (i, provider) in Provider::ALL.iter().enumerate() {
        println!("  [{}] {provider} ({})", i + 1, registry.provider_name(*provider));
    }
    loop {
        let answer = ask(reader, "Provider [1]: ")?;
        if answer.is_empty() {
            return Ok(Provider::ALL[0]);
        }
        if let Ok(n) = answer.parse::<usize>() {
            if let Some(provider) = n.checked_sub(1).and_then(|i| Provider::ALL.get(i)) {
                return Ok(*provider);
            }
        }
        if let Ok(provider) = answer.parse::<Provider>() {
            return Ok(provider);
        }
        println!("Unknown provider '{answer}'.");
    }
}

/// Prints `prompt` and reads one trimmed line; end of input is an error.
fn ask(reader: &mut dyn BufRead, prompt: &str) -> Result<String> {
    print!("{prompt}");
    io::stdout().flush()?;
    let mut input = String::new();
    if reader.read_line(&mut input)? == 0 {
        bail!("Setup cancelled");
    }
    Ok(input.trim().to_string())
}
