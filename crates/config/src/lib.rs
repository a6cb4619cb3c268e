//! Configuration loading, validation, and management for Envoy.
//!
//! Loads configuration from `~/.envoy/config.toml` with environment
//! variable overrides. Validates all settings at startup. The resulting
//! `AppConfig` is built once and handed to the provider, the tools and the
//! agent by reference; nothing reads settings from ambient globals.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Environment variables consulted for the API key, in order.
pub const API_KEY_ENV_VARS: [&str; 2] = ["ENVOY_API_KEY", "OPENAI_API_KEY"];

/// The root configuration structure.
///
/// Maps directly to `~/.envoy/config.toml`.
#[derive(Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// API key for the model provider
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Base URL of the OpenAI-compatible endpoint
    #[serde(default = "default_api_url")]
    pub api_url: String,

    #[serde(default = "default_model")]
    pub model: String,

    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Max tokens per LLM response
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    /// Upper bound on a single provider request
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// Root holding one sub-directory of documents per owner
    #[serde(default = "default_personal_data_dir")]
    pub personal_data_dir: PathBuf,

    #[serde(default)]
    pub conversation: ConversationConfig,

    #[serde(default)]
    pub payments: PaymentConfig,
}

fn default_api_url() -> String {
    "https://api.openai.com/v1".into()
}
fn default_model() -> String {
    "gpt-4o".into()
}
fn default_temperature() -> f32 {
    0.7
}
fn default_max_tokens() -> u32 {
    1000
}
fn default_request_timeout_secs() -> u64 {
    120
}
fn default_personal_data_dir() -> PathBuf {
    PathBuf::from("data").join("personal_data")
}

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
            .field("model", &self.model)
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .field("personal_data_dir", &self.personal_data_dir)
            .field("conversation", &self.conversation)
            .field("payments", &self.payments)
            .finish()
    }
}

/// Knobs of the turn-taking loop.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationConfig {
    /// How many recent messages the prompts see
    #[serde(default = "default_history_window")]
    pub history_window: usize,

    /// Generation attempts per turn before the last candidate is sent anyway
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
}

fn default_history_window() -> usize {
    10
}
fn default_max_attempts() -> u32 {
    3
}

impl Default for ConversationConfig {
    fn default() -> Self {
        Self {
            history_window: default_history_window(),
            max_attempts: default_max_attempts(),
        }
    }
}

/// How the payment tool settles charges.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMode {
    /// No payment tool is offered to the model
    Disabled,
    /// Payments are recorded and approved locally
    #[default]
    DryRun,
    /// Payments are forwarded to `payments.endpoint`
    Http,
}

#[derive(Clone, Default, Serialize, Deserialize)]
pub struct PaymentConfig {
    #[serde(default)]
    pub mode: PaymentMode,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
}

impl std::fmt::Debug for PaymentConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PaymentConfig")
            .field("mode", &self.mode)
            .field("endpoint", &self.endpoint)
            .field("api_key", &redact(&self.api_key))
            .finish()
    }
}

impl AppConfig {
    /// Load configuration from the default path (~/.envoy/config.toml).
    ///
    /// Environment overrides:
    /// - `ENVOY_MODEL`
    /// - `ENVOY_PERSONAL_DATA_DIR`
    ///
    /// API keys from the environment are not folded in here; see
    /// [`AppConfig::resolve_api_key`].
    pub fn load() -> Result<Self, ConfigError> {
        let mut config = Self::load_from(&Self::config_path())?;
        config.apply_env_overrides(|key| std::env::var(key).ok());
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

    fn apply_env_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(model) = lookup("ENVOY_MODEL") {
            self.model = model;
        }
        if let Some(dir) = lookup("ENVOY_PERSONAL_DATA_DIR") {
            self.personal_data_dir = PathBuf::from(dir);
        }
    }

    /// Get the configuration directory path.
    pub fn config_dir() -> PathBuf {
        dirs_home().join(".envoy")
    }

    /// Get the default configuration file path.
    pub fn config_path() -> PathBuf {
        Self::config_dir().join("config.toml")
    }

    /// Validate the configuration.
    fn validate(&self) -> Result<(), ConfigError> {
        if self.temperature < 0.0 || self.temperature > 2.0 {
            return Err(ConfigError::ValidationError(
                "temperature must be between 0.0 and 2.0".into(),
            ));
        }

        if self.conversation.max_attempts == 0 {
            return Err(ConfigError::ValidationError(
                "conversation.max_attempts must be at least 1".into(),
            ));
        }

        if self.conversation.history_window == 0 {
            return Err(ConfigError::ValidationError(
                "conversation.history_window must be at least 1".into(),
            ));
        }

        if self.payments.mode == PaymentMode::Http && self.payments.endpoint.is_none() {
            return Err(ConfigError::ValidationError(
                "payments.endpoint is required when payments.mode = \"http\"".into(),
            ));
        }

        Ok(())
    }

    /// Resolve the provider API key: explicit value, then this config, then
    /// the process environment.
    pub fn resolve_api_key(&self, explicit: Option<&str>) -> Option<String> {
        self.resolve_api_key_with(explicit, |key| std::env::var(key).ok())
    }

    /// [`AppConfig::resolve_api_key`] with a custom environment lookup.
    pub fn resolve_api_key_with(
        &self,
        explicit: Option<&str>,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Option<String> {
        let non_blank = |key: &String| !key.trim().is_empty();
        explicit
            .map(str::to_string)
            .filter(non_blank)
            .or_else(|| self.api_key.clone().filter(non_blank))
            .or_else(|| {
                API_KEY_ENV_VARS
                    .iter()
                    .find_map(|var| lookup(var).filter(non_blank))
            })
    }

    /// Generate a default config TOML string (for `envoy config`).
    pub fn default_toml() -> String {
        let config = Self::default();
        toml::to_string_pretty(&config).unwrap_or_default()
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            api_url: default_api_url(),
            model: default_model(),
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
            request_timeout_secs: default_request_timeout_secs(),
            personal_data_dir: default_personal_data_dir(),
            conversation: ConversationConfig::default(),
            payments: PaymentConfig::default(),
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
