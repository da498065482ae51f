//! Named configuration files.
//!
//! Layout under the store root (`~/.diffscribe` by default):
//!
//! ```text
//! settings.yaml          # default_config: <name>
//! configs/<name>.yaml    # one Config per name
//! ```

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::Config;
use crate::ai::GenerationError;

/// Name used when no default has been chosen.
pub const DEFAULT_CONFIG_NAME: &str = "default";

/// Store-wide settings.
#[derive(Debug, Default, Serialize, Deserialize)]
struct StoreSettings {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    default_config: Option<String>,
}

/// Reads and writes named [`Config`] files.
pub struct ConfigStore {
    root: PathBuf,
}

impl ConfigStore {
    /// Opens the store at `~/.diffscribe`.
    pub fn new() -> Result<Self> {
        let home_dir = dirs::home_dir().context("Failed to determine home directory")?;
        Ok(Self::at_root(home_dir.join(".diffscribe")))
    }

    /// Opens a store rooted at `root`.
    pub fn at_root(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Returns the store root.
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn configs_dir(&self) -> PathBuf {
        self.root.join("configs")
    }

    fn settings_path(&self) -> PathBuf {
        self.root.join("settings.yaml")
    }

    /// Returns the file a config named `name` lives in.
    pub fn config_path(&self, name: &str) -> Result<PathBuf> {
        validate_name(name)?;
        Ok(self.configs_dir().join(format!("{name}.yaml")))
    }

    /// Validates and writes `config` under `name`, replacing any existing
    /// file atomically.
    pub fn save(&self, name: &str, config: &Config) -> Result<()> {
        config.validate()?;
        let path = self.config_path(name)?;
        let yaml = serde_yaml::to_string(config).context("Failed to serialize config")?;
        write_atomic(&path, yaml.as_bytes())?;
        info!(name, path = %path.display(), "Saved config");
        Ok(())
    }

    /// Loads and validates the config named `name`.
    pub fn load(&self, name: &str) -> Result<Config> {
        let path = self.config_path(name)?;
        if !path.exists() {
            return Err(GenerationError::ConfigurationError(format!(
                "No config named '{name}' (expected {})",
                path.display()
            ))
            .into());
        }
        let content = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        let config: Config = serde_yaml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;
        config
            .validate()
            .with_context(|| format!("Invalid config file: {}", path.display()))?;
        debug!(name, path = %path.display(), "Loaded config");
        Ok(config)
    }

    /// Returns the names of all stored configs, sorted.
    pub fn list(&self) -> Result<Vec<String>> {
        let dir = self.configs_dir();
        if !dir.exists() {
            return Ok(Vec::new());
        }
        let mut names = Vec::new();
        for entry in fs::read_dir(&dir)
            .with_context(|| format!("Failed to read directory: {}", dir.display()))?
        {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some("yaml") {
                continue;
            }
            if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                names.push(stem.to_string());
            }
        }
        names.sort();
        Ok(names)
    }

    /// Makes `name` the default config. The config must exist.
    pub fn set_default(&self, name: &str) -> Result<()> {
        if !self.config_path(name)?.exists() {
            return Err(
                GenerationError::ConfigurationError(format!("No config named '{name}'")).into(),
            );
        }
        let settings = StoreSettings {
            default_config: Some(name.to_string()),
        };
        let yaml = serde_yaml::to_string(&settings)?;
        write_atomic(&self.settings_path(), yaml.as_bytes())?;
        info!(name, "Set default config");
        Ok(())
    }

    /// Returns the default config name.
    pub fn default_name(&self) -> Result<String> {
        let path = self.settings_path();
        if !path.exists() {
            return Ok(DEFAULT_CONFIG_NAME.to_string());
        }
        let content = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read settings file: {}", path.display()))?;
        let settings: StoreSettings = serde_yaml::from_str(&content)
            .with_context(|| format!("Failed to parse settings file: {}", path.display()))?;
        Ok(settings
            .default_config
            .unwrap_or_else(|| DEFAULT_CONFIG_NAME.to_string()))
    }

    /// Loads the config for this invocation.
    ///
    /// An explicit `name_override` must exist. Without one, the default
    /// config is loaded, or built-in defaults are used when no config has
    /// been created yet.
    pub fn load_active(&self, name_override: Option<&str>) -> Result<Config> {
        if let Some(name) = name_override {
            return self.load(name);
        }
        let name = self.default_name()?;
        if self.config_path(&name)?.exists() {
            self.load(&name)
        } else {
            debug!(name, "No stored config; using built-in defaults");
            Ok(Config::default())
        }
    }
}

/// Rejects names that would escape the configs directory.
fn validate_name(name: &str) -> Result<()> {
    let ok = !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
        && !name.starts_with('.');
    if ok {
        Ok(())
    } else {
        Err(GenerationError::ConfigurationError(format!(
            "Invalid config name '{name}': use letters, digits, '-', '_' or '.'"
        ))
        .into())
    }
}

/// Writes `contents` to `path` through a temporary file in the same
/// directory, so readers never observe a partial file.
fn write_atomic(path: &Path, contents: &[u8]) -> Result<()> {
    let dir = path.parent().context("Path has no parent directory")?;
    fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create directory: {}", dir.display()))?;
    let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
    tmp.write_all(contents)?;
    tmp.as_file().sync_all()?;
    tmp.persist(path)
        .with_context(|| format!("Failed to write {}", path.display()))?;
    Ok(())
}
