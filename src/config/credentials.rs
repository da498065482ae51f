//! API key lookup.
//!
//! Keys come from the provider's environment variable first and from
//! `~/.diffscribe/credentials.json` second.

use std::collections::BTreeMap;
use std::env;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::debug;

use crate::ai::Provider;

/// Source of provider API keys.
pub trait CredentialStore: Send + Sync {
    /// Returns the stored key for `provider`, if any.
    fn get_secret(&self, provider: Provider) -> Result<Option<String>>;

    /// Stores `value` as the key for `provider`.
    fn set_secret(&self, provider: Provider, value: &str) -> Result<()>;
}

/// Environment variables consulted for `provider`, in order.
pub fn env_vars(provider: Provider) -> &'static [&'static str] {
    match provider {
        Provider::OpenAi => &["OPENAI_API_KEY"],
        Provider::Anthropic => &["ANTHROPIC_API_KEY"],
        Provider::Google => &["GEMINI_API_KEY", "GOOGLE_API_KEY"],
        Provider::Groq => &["GROQ_API_KEY"],
    }
}

/// Credential store backed by environment variables and a JSON file.
pub struct FileCredentialStore {
    path: PathBuf,
    use_env: bool,
}

impl FileCredentialStore {
    /// Opens the store at the default location.
    pub fn new() -> Result<Self> {
        let home_dir = dirs::home_dir().context("Failed to determine home directory")?;
        Ok(Self::at_path(home_dir.join(".diffscribe").join("credentials.json")))
    }

    /// Opens a store backed by `path`, still consulting the environment.
    pub fn at_path(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            use_env: true,
        }
    }

    /// Stops consulting environment variables.
    pub fn without_env(mut self) -> Self {
        self.use_env = false;
        self
    }

    /// Returns the credentials file location.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_file(&self) -> Result<BTreeMap<Provider, String>> {
        if !self.path.exists() {
            return Ok(BTreeMap::new());
        }
        let content = fs::read_to_string(&self.path)
            .with_context(|| format!("Failed to read credentials file: {}", self.path.display()))?;
        serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse credentials file: {}", self.path.display()))
    }
}

impl CredentialStore for FileCredentialStore {
    fn get_secret(&self, provider: Provider) -> Result<Option<String>> {
        if self.use_env {
            for var in env_vars(provider) {
                if let Ok(value) = env::var(var) {
                    if !value.trim().is_empty() {
                        debug!(%provider, var, "Using API key from environment");
                        return Ok(Some(value));
                    }
                }
            }
        }
        Ok(self
            .read_file()?
            .remove(&provider)
            .filter(|key| !key.trim().is_empty()))
    }

    fn set_secret(&self, provider: Provider, value: &str) -> Result<()> {
        let mut secrets = self.read_file()?;
        secrets.insert(provider, value.trim().to_string());

        let dir = self
            .path
            .parent()
            .context("Credentials path has no parent directory")?;
        fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create directory: {}", dir.display()))?;

        let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
        serde_json::to_writer_pretty(&mut tmp, &secrets)?;
        tmp.write_all(b"\n")?;
        restrict_permissions(tmp.path())?;
        tmp.persist(&self.path)
            .with_context(|| format!("Failed to write {}", self.path.display()))?;
        debug!(%provider, path = %self.path.display(), "Stored API key");
        Ok(())
    }
}

#[cfg(unix)]
fn restrict_permissions(path: &Path) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(0o600))?;
    Ok(())
}

#[cfg(not(unix))]
fn restrict_permissions(_path: &Path) -> Result<()> {
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn missing_file_has_no_secrets() {
        let dir = TempDir::new().unwrap();
        let store = FileCredentialStore::at_path(dir.path().join("credentials.json")).without_env();
        assert_eq!(store.get_secret(Provider::Anthropic).unwrap(), None);
    }

    #[test]
    fn set_then_get() {
        let dir = TempDir::new().unwrap();
        let store = FileCredentialStore::at_path(dir.path().join("nested").join("credentials.json"))
            .without_env();
        store.set_secret(Provider::Groq, " gsk-123 \n").unwrap();
        store.set_secret(Provider::Google, "g-456").unwrap();
        assert_eq!(store.get_secret(Provider::Groq).unwrap().as_deref(), Some("gsk-123"));
        assert_eq!(store.get_secret(Provider::Google).unwrap().as_deref(), Some("g-456"));
        assert_eq!(store.get_secret(Provider::OpenAi).unwrap(), None);

        let raw = fs::read_to_string(store.path()).unwrap();
        assert!(raw.contains("\"groq\""));
    }

    #[cfg(unix)]
    #[test]
    fn file_is_private() {
        use std::os::unix::fs::PermissionsExt;
        let dir = TempDir::new().unwrap();
        let store = FileCredentialStore::at_path(dir.path().join("credentials.json")).without_env();
        store.set_secret(Provider::OpenAi, "sk").unwrap();
        let mode = fs::metadata(store.path()).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }

    #[test]
    fn malformed_file_is_an_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("credentials.json");
        fs::write(&path, "not json").unwrap();
        let store = FileCredentialStore::at_path(&path).without_env();
        let err = store.get_secret(Provider::OpenAi).unwrap_err();
        assert!(format!("{err:#}").contains("Failed to parse credentials file"));
    }

    #[test]
    fn google_accepts_both_variables() {
        assert_eq!(env_vars(Provider::Google), ["GEMINI_API_KEY", "GOOGLE_API_KEY"]);
    }
}
