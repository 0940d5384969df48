//! Configuration management for Flock

use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{ConfigError, Result};
use crate::options::RecipeOptions;

pub const DEFAULT_API_URL: &str = "https://api.github.com";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub github: GithubConfig,
    #[serde(default)]
    pub defaults: RecipeOptions,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GithubConfig {
    #[serde(default = "default_api_url")]
    pub api_url: String,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    /// File holding the API token, used when no token env var is set
    pub token_file: Option<String>,
}

fn default_api_url() -> String {
    DEFAULT_API_URL.to_string()
}

fn default_user_agent() -> String {
    "flock".to_string()
}

impl Default for GithubConfig {
    fn default() -> Self {
        Self {
            api_url: default_api_url(),
            user_agent: default_user_agent(),
            token_file: None,
        }
    }
}

impl GithubConfig {
    /// Resolve the API token
    ///
    /// Checks `FLOCK_GITHUB_TOKEN`, then `GITHUB_TOKEN`, then `token_file`.
    pub fn resolve_token(&self) -> Result<SecretString> {
        for var in ["FLOCK_GITHUB_TOKEN", "GITHUB_TOKEN"] {
            if let Ok(token) = std::env::var(var) {
                let token = token.trim();
                if !token.is_empty() {
                    return Ok(SecretString::from(token.to_string()));
                }
            }
        }

        if let Some(file) = &self.token_file {
            let path = shellexpand::tilde(file).to_string();
            let content = std::fs::read_to_string(&path).map_err(ConfigError::ReadError)?;
            let token = content.trim();
            if !token.is_empty() {
                return Ok(SecretString::from(token.to_string()));
            }
        }

        Err(ConfigError::MissingToken.into())
    }
}

impl Config {
    /// Load configuration from the default location
    ///
    /// A missing file yields the built-in defaults.
    pub fn load() -> Result<Self> {
        let config_path = resolve_config_path()?;
        if !config_path.exists() {
            tracing::debug!(path = %config_path.display(), "No config file, using defaults");
            return Ok(Self::default());
        }
        Self::load_from_path(&config_path)
    }

    /// Load configuration from a specific path
    pub fn load_from_path(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(ConfigError::ReadError)?;
        let config: Config = toml::from_str(&content).map_err(ConfigError::ParseError)?;
        Ok(config)
    }
}

/// Resolve the configuration file path: `FLOCK_CONFIG`, else the platform config dir
pub fn resolve_config_path() -> Result<PathBuf> {
    if let Ok(path) = std::env::var("FLOCK_CONFIG") {
        return Ok(PathBuf::from(shellexpand::tilde(&path).to_string()));
    }

    let config_dir = dirs::config_dir()
        .ok_or_else(|| ConfigError::MissingField("config directory".to_string()))?;

    Ok(config_dir.join("flock").join("config.toml"))
}
