//! Configuration loading and validation for Threadline.
//!
//! Loads configuration from `~/.threadline/config.toml` with environment
//! variable overrides. Validates all settings at startup.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// The root configuration structure.
///
/// Maps directly to `~/.threadline/config.toml`.
#[derive(Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// API key for the chat endpoint
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Base URL of an OpenAI-compatible endpoint
    #[serde(default = "default_api_url")]
    pub api_url: String,

    /// Default model
    #[serde(default = "default_model")]
    pub default_model: String,

    /// Default temperature
    #[serde(default = "default_temperature")]
    pub default_temperature: f32,

    /// Token budget for an assembled request
    #[serde(default = "default_token_limit")]
    pub token_limit: usize,

    /// Stream responses as they are generated
    #[serde(default = "default_true")]
    pub stream: bool,

    /// Where the prompt store lives; defaults to `~/.threadline/store`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub store_dir: Option<PathBuf>,

    /// Who prompts are attributed to
    #[serde(default)]
    pub user: UserConfig,
}

fn default_api_url() -> String {
    "https://api.openai.com/v1".into()
}
fn default_model() -> String {
    "gpt-4".into()
}
fn default_temperature() -> f32 {
    0.7
}
fn default_token_limit() -> usize {
    6000
}
fn default_true() -> bool {
    true
}

/// Redact a secret string for Debug output.
fn redact(s: &Option<String>) -> &'static str {
    match s {
        Some(_) => "[REDACTED]",
        None => "None",
    }
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("api_key", &redact(&self.api_key))
            .field("api_url", &self.api_url)
            .field("default_model", &self.default_model)
            .field("default_temperature", &self.default_temperature)
            .field("token_limit", &self.token_limit)
            .field("stream", &self.stream)
            .field("user", &self.user)
            .field("store_dir", &self.store_dir)
            .finish()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserConfig {
    #[serde(default = "default_user_name")]
    pub name: String,

    #[serde(default = "default_user_email")]
    pub email: String,
}

fn default_user_name() -> String {
    std::env::var("USER")
        .or_else(|_| std::env::var("USERNAME"))
        .unwrap_or_else(|_| "developer".into())
}
fn default_user_email() -> String {
    format!("{}@localhost", default_user_name())
}

impl Default for UserConfig {
    fn default() -> Self {
        Self {
            name: default_user_name(),
            email: default_user_email(),
        }
    }
}

impl AppConfig {
    /// Load configuration from the default path (~/.threadline/config.toml).
    ///
    /// Also checks environment variables:
    /// - `THREADLINE_API_KEY` (highest priority), then `OPENAI_API_KEY`
    /// - `THREADLINE_MODEL`
    /// - `THREADLINE_STORE`
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::config_dir().join("config.toml");
        let mut config = Self::load_from(&config_path)?;

        if config.api_key.is_none() {
            config.api_key = std::env::var("THREADLINE_API_KEY")
                .ok()
                .or_else(|| std::env::var("OPENAI_API_KEY").ok());
        }

        if let Ok(model) = std::env::var("THREADLINE_MODEL") {
            config.default_model = model;
        }

        if let Ok(dir) = std::env::var("THREADLINE_STORE") {
            config.store_dir = Some(PathBuf::from(dir));
        }

        Ok(config)
    }

    /// Load configuration from a specific file path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::info!("No config file found at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Get the configuration directory path.
    pub fn config_dir() -> PathBuf {
        dirs_home().join(".threadline")
    }

    /// The store root: `store_dir` if set, else `~/.threadline/store`.
    pub fn store_root(&self) -> PathBuf {
        self.store_dir
            .clone()
            .unwrap_or_else(|| Self::config_dir().join("store"))
    }

    /// Validate the configuration.
    fn validate(&self) -> Result<(), ConfigError> {
        if self.default_temperature < 0.0 || self.default_temperature > 2.0 {
            return Err(ConfigError::ValidationError(
                "default_temperature must be between 0.0 and 2.0".into(),
            ));
        }

        if self.token_limit == 0 {
            return Err(ConfigError::ValidationError(
                "token_limit must be > 0".into(),
            ));
        }

        Ok(())
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            api_url: default_api_url(),
            default_model: default_model(),
            default_temperature: default_temperature(),
            token_limit: default_token_limit(),
            stream: true,
            user: UserConfig::default(),
            store_dir: None,
        }
    }
}

/// Get the user's home directory.
fn dirs_home() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        std::env::var("USERPROFILE")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("C:\\Users\\Default"))
    }
    #[cfg(not(target_os = "windows"))]
    {
        std::env::var("HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("/tmp"))
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {path}: {reason}")]
    ReadError { path: PathBuf, reason: String },

    #[error("Failed to parse config file at {path}: {reason}")]
    ParseError { path: PathBuf, reason: String },

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn default_config_is_valid() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.default_model, "gpt-4");
        assert_eq!(config.token_limit, 6000);
        assert!(config.stream);
    }

    #[test]
    fn config_roundtrip_toml() {
        let config = AppConfig {
            store_dir: Some(PathBuf::from("/var/threadline")),
            ..AppConfig::default()
        };
        let toml_str = toml::to_string_pretty(&config).unwrap();
        let parsed: AppConfig = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed.default_model, config.default_model);
        assert_eq!(parsed.store_dir, config.store_dir);
        assert_eq!(parsed.user.email, config.user.email);
    }

    #[test]
    fn invalid_temperature_rejected() {
        let config = AppConfig {
            default_temperature: 5.0,
            ..AppConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn zero_token_limit_rejected() {
        let config = AppConfig {
            token_limit: 0,
            ..AppConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn missing_config_file_returns_defaults() {
        let result = AppConfig::load_from(Path::new("/nonexistent/config.toml"));
        assert!(result.is_ok());
        assert_eq!(result.unwrap().default_model, "gpt-4");
    }

    #[test]
    fn partial_file_fills_defaults() {
        let mut tmp = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            tmp,
            "default_model = \"gpt-3.5-turbo\"\ntoken_limit = 3000\n\n[user]\nname = \"ada\"\nemail = \"ada@example.com\""
        )
        .unwrap();
        let config = AppConfig::load_from(tmp.path()).unwrap();
        assert_eq!(config.default_model, "gpt-3.5-turbo");
        assert_eq!(config.token_limit, 3000);
        assert_eq!(config.user.name, "ada");
        assert!(config.stream);
    }

    #[test]
    fn malformed_file_is_a_parse_error() {
        let mut tmp = tempfile::NamedTempFile::new().unwrap();
        writeln!(tmp, "token_limit = \"lots\"").unwrap();
        assert!(matches!(
            AppConfig::load_from(tmp.path()),
            Err(ConfigError::ParseError { .. })
        ));
    }

    #[test]
    fn store_root_defaults_under_config_dir() {
        let config = AppConfig::default();
        assert!(config.store_root().ends_with(".threadline/store"));
    }

    #[test]
    fn debug_redacts_api_key() {
        let config = AppConfig {
            api_key: Some("sk-secret".into()),
            ..AppConfig::default()
        };
        let debug = format!("{config:?}");
        assert!(!debug.contains("sk-secret"));
        assert!(debug.contains("[REDACTED]"));
    }
}
