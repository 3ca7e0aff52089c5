//! Configuration loading, validation, and credential checks for RelayChat.
//!
//! Loads configuration from `~/.relaychat/config.toml` (optional) with
//! environment variable overrides. The Azure OpenAI credentials normally come
//! from the environment only:
//!
//! - `AZURE_OPENAI_ENDPOINT`
//! - `AZURE_OPENAI_API_KEY`
//! - `AZURE_OPENAI_CHAT_DEPLOYMENT_NAME`
//! - `AZURE_OPENAI_API_VERSION` (optional)
//!
//! Missing credentials are not a load error: the process still starts and the
//! conversation driver refuses each turn with a visible warning until they
//! are provided.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const ENV_ENDPOINT: &str = "AZURE_OPENAI_ENDPOINT";
pub const ENV_API_KEY: &str = "AZURE_OPENAI_API_KEY";
pub const ENV_DEPLOYMENT: &str = "AZURE_OPENAI_CHAT_DEPLOYMENT_NAME";
pub const ENV_API_VERSION: &str = "AZURE_OPENAI_API_VERSION";
pub const ENV_HOST: &str = "RELAYCHAT_HOST";
pub const ENV_PORT: &str = "RELAYCHAT_PORT";

/// The root configuration structure.
///
/// Maps directly to `~/.relaychat/config.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Hosted model service settings
    #[serde(default)]
    pub llm: LlmConfig,

    /// Conversation knobs
    #[serde(default)]
    pub conversation: ConversationConfig,

    /// Gateway configuration
    #[serde(default)]
    pub gateway: GatewayConfig,
}

/// Azure OpenAI connection settings.
#[derive(Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    /// Resource endpoint, e.g. `https://myresource.openai.azure.com`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Chat model deployment name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deployment: Option<String>,

    #[serde(default = "default_api_version")]
    pub api_version: String,

    /// Per-request timeout for model calls
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// Temperature used by the assistant
    #[serde(default)]
    pub assistant_temperature: f32,

    /// Sampling seed sent with the assistant's requests
    #[serde(default = "default_seed")]
    pub seed: Option<u64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,

    /// Stop sequences sent with every model request
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub stop: Vec<String>,
}

fn default_api_version() -> String {
    "2024-06-01".into()
}
fn default_request_timeout_secs() -> u64 {
    600
}
fn default_seed() -> Option<u64> {
    Some(42)
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            api_key: None,
            deployment: None,
            api_version: default_api_version(),
            request_timeout_secs: default_request_timeout_secs(),
            assistant_temperature: 0.0,
            seed: default_seed(),
            max_tokens: None,
            stop: Vec::new(),
        }
    }
}

/// Redact a secret string for Debug output.
fn redact(s: &Option<String>) -> &'static str {
    match s {
        Some(_) => "[REDACTED]",
        None => "None",
    }
}

impl std::fmt::Debug for LlmConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LlmConfig")
            .field("endpoint", &self.endpoint)
            .field("api_key", &redact(&self.api_key))
            .field("deployment", &self.deployment)
            .field("api_version", &self.api_version)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .field("assistant_temperature", &self.assistant_temperature)
            .field("seed", &self.seed)
            .field("max_tokens", &self.max_tokens)
            .field("stop", &self.stop)
            .finish()
    }
}

fn present(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

impl LlmConfig {
    /// Names of the required credential variables that are missing or empty.
    pub fn missing_credentials(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if present(&self.endpoint).is_none() {
            missing.push(ENV_ENDPOINT);
        }
        if present(&self.api_key).is_none() {
            missing.push(ENV_API_KEY);
        }
        if present(&self.deployment).is_none() {
            missing.push(ENV_DEPLOYMENT);
        }
        missing
    }

    /// Build the validated record the provider is constructed from.
    pub fn agent_config(&self) -> Result<AgentConfig, ConfigError> {
        match (
            present(&self.endpoint),
            present(&self.api_key),
            present(&self.deployment),
        ) {
            (Some(endpoint), Some(api_key), Some(deployment)) => Ok(AgentConfig {
                model_name: deployment.to_string(),
                endpoint: endpoint.to_string(),
                api_key: api_key.to_string(),
                api_version: self.api_version.clone(),
            }),
            _ => Err(ConfigError::MissingCredentials(self.missing_credentials())),
        }
    }
}

/// Validated model service credentials, shared read-only by every agent.
#[derive(Clone, PartialEq, Eq)]
pub struct AgentConfig {
    /// Deployment name, used as the model name
    pub model_name: String,
    pub endpoint: String,
    pub api_key: String,
    pub api_version: String,
}

impl std::fmt::Debug for AgentConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AgentConfig")
            .field("model_name", &self.model_name)
            .field("endpoint", &self.endpoint)
            .field("api_key", &"[REDACTED]")
            .field("api_version", &self.api_version)
            .finish()
    }
}

/// Knobs of the multi-agent exchange.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationConfig {
    /// A message ending with this word (case-insensitive) ends the turn
    #[serde(default = "default_termination_keyword")]
    pub termination_keyword: String,

    /// Automatic replies the user proxy may send per turn
    #[serde(default = "default_user_proxy_max_auto_replies")]
    pub user_proxy_max_auto_replies: u32,

    /// Automatic replies the assistant may send per turn
    #[serde(default = "default_assistant_max_auto_replies")]
    pub assistant_max_auto_replies: u32,

    /// Automatic replies the planner's proxy may send per consultation
    #[serde(default)]
    pub planner_proxy_max_auto_replies: u32,
}

fn default_termination_keyword() -> String {
    "TERMINATE".into()
}
fn default_user_proxy_max_auto_replies() -> u32 {
    10
}
fn default_assistant_max_auto_replies() -> u32 {
    100
}

impl Default for ConversationConfig {
    fn default() -> Self {
        Self {
            termination_keyword: default_termination_keyword(),
            user_proxy_max_auto_replies: default_user_proxy_max_auto_replies(),
            assistant_max_auto_replies: default_assistant_max_auto_replies(),
            planner_proxy_max_auto_replies: 0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default = "default_host")]
    pub host: String,
}

fn default_port() -> u16 {
    8501
}
fn default_host() -> String {
    "127.0.0.1".into()
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            host: default_host(),
        }
    }
}

impl AppConfig {
    /// Load configuration from the default path (~/.relaychat/config.toml),
    /// then apply environment overrides.
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::config_dir().join("config.toml");
        let mut config = Self::load_from(&config_path)?;
        config.apply_env_with(|key| std::env::var(key).ok())?;
        config.validate()?;
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

    /// Apply environment overrides using `lookup` to read variables.
    ///
    /// Credential variables override the file even when set to an empty
    /// string, so an exported-but-empty key is reported as missing.
    pub fn apply_env_with<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(endpoint) = lookup(ENV_ENDPOINT) {
            self.llm.endpoint = Some(endpoint);
        }
        if let Some(api_key) = lookup(ENV_API_KEY) {
            self.llm.api_key = Some(api_key);
        }
        if let Some(deployment) = lookup(ENV_DEPLOYMENT) {
            self.llm.deployment = Some(deployment);
        }
        if let Some(version) = lookup(ENV_API_VERSION).filter(|v| !v.trim().is_empty()) {
            self.llm.api_version = version;
        }
        if let Some(host) = lookup(ENV_HOST).filter(|v| !v.trim().is_empty()) {
            self.gateway.host = host;
        }
        if let Some(port) = lookup(ENV_PORT).filter(|v| !v.trim().is_empty()) {
            self.gateway.port = port.trim().parse().map_err(|_| {
                ConfigError::ValidationError(format!("{ENV_PORT} must be a port number, got '{port}'"))
            })?;
        }
        Ok(())
    }

    /// Get the configuration directory path.
    pub fn config_dir() -> PathBuf {
        dirs_home().join(".relaychat")
    }

    /// Validate the configuration.
    fn validate(&self) -> Result<(), ConfigError> {
        if self.llm.assistant_temperature < 0.0 || self.llm.assistant_temperature > 2.0 {
            return Err(ConfigError::ValidationError(
                "llm.assistant_temperature must be between 0.0 and 2.0".into(),
            ));
        }

        if self.llm.request_timeout_secs == 0 {
            return Err(ConfigError::ValidationError(
                "llm.request_timeout_secs must be > 0".into(),
            ));
        }

        if self.llm.api_version.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "llm.api_version must not be empty".into(),
            ));
        }

        if self.conversation.termination_keyword.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "conversation.termination_keyword must not be empty".into(),
            ));
        }

        Ok(())
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

    #[error("Missing Azure OpenAI credentials: {}", .0.join(", "))]
    MissingCredentials(Vec<&'static str>),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn default_config_is_valid() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.gateway.port, 8501);
        assert_eq!(config.conversation.termination_keyword, "TERMINATE");
        assert_eq!(config.conversation.user_proxy_max_auto_replies, 10);
        assert_eq!(config.conversation.planner_proxy_max_auto_replies, 0);
        assert_eq!(config.llm.request_timeout_secs, 600);
        assert_eq!(config.llm.seed, Some(42));
    }

    #[test]
    fn config_roundtrip_toml() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).unwrap();
        let parsed: AppConfig = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed.gateway.port, config.gateway.port);
        assert_eq!(parsed.llm.api_version, config.llm.api_version);
    }

    #[test]
    fn stop_sequences_parse_from_toml() {
        let config: AppConfig = toml::from_str("[llm]\nstop = [\"<|end|>\"]\n").unwrap();
        assert_eq!(config.llm.stop, vec!["<|end|>".to_string()]);
        assert!(AppConfig::default().llm.stop.is_empty());
    }

    #[test]
    fn env_supplies_credentials() {
        let mut config = AppConfig::default();
        config
            .apply_env_with(env(&[
                (ENV_ENDPOINT, "https://example.openai.azure.com/"),
                (ENV_API_KEY, "secret"),
                (ENV_DEPLOYMENT, "gpt-4o"),
            ]))
            .unwrap();

        let agent = config.llm.agent_config().unwrap();
        assert_eq!(agent.model_name, "gpt-4o");
        assert_eq!(agent.endpoint, "https://example.openai.azure.com/");
        assert_eq!(agent.api_version, "2024-06-01");
    }

    #[test]
    fn any_empty_credential_is_missing() {
        let mut config = AppConfig::default();
        config
            .apply_env_with(env(&[
                (ENV_ENDPOINT, "https://example.openai.azure.com"),
                (ENV_API_KEY, "  "),
                (ENV_DEPLOYMENT, "gpt-4o"),
            ]))
            .unwrap();

        assert_eq!(config.llm.missing_credentials(), vec![ENV_API_KEY]);
        let err = config.llm.agent_config().unwrap_err();
        assert!(matches!(err, ConfigError::MissingCredentials(_)));
        assert!(err.to_string().contains(ENV_API_KEY));
    }

    #[test]
    fn no_credentials_reports_all_three() {
        let config = AppConfig::default();
        assert_eq!(
            config.llm.missing_credentials(),
            vec![ENV_ENDPOINT, ENV_API_KEY, ENV_DEPLOYMENT]
        );
    }

    #[test]
    fn invalid_port_env_rejected() {
        let mut config = AppConfig::default();
        let err = config
            .apply_env_with(env(&[(ENV_PORT, "not-a-port")]))
            .unwrap_err();
        assert!(matches!(err, ConfigError::ValidationError(_)));
    }

    #[test]
    fn port_and_version_overrides() {
        let mut config = AppConfig::default();
        config
            .apply_env_with(env(&[(ENV_PORT, "9000"), (ENV_API_VERSION, "2023-07-01-preview")]))
            .unwrap();
        assert_eq!(config.gateway.port, 9000);
        assert_eq!(config.llm.api_version, "2023-07-01-preview");
    }

    #[test]
    fn debug_output_redacts_key() {
        let mut config = AppConfig::default();
        config.llm.api_key = Some("super-secret".into());
        let debug = format!("{:?}", config);
        assert!(!debug.contains("super-secret"));
        assert!(debug.contains("[REDACTED]"));

        config.llm.endpoint = Some("https://e".into());
        config.llm.deployment = Some("d".into());
        let agent = config.llm.agent_config().unwrap();
        assert!(!format!("{agent:?}").contains("super-secret"));
    }

    #[test]
    fn empty_termination_keyword_rejected() {
        let mut config = AppConfig::default();
        config.conversation.termination_keyword = "   ".into();
        assert!(config.validate().is_err());
    }

    #[test]
    fn missing_config_file_returns_defaults() {
        let result = AppConfig::load_from(Path::new("/nonexistent/config.toml"));
        assert!(result.is_ok());
        assert_eq!(result.unwrap().gateway.port, 8501);
    }

    #[test]
    fn load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"
[llm]
endpoint = "https://file.openai.azure.com"
deployment = "gpt-35-turbo"
request_timeout_secs = 30

[conversation]
user_proxy_max_auto_replies = 4

[gateway]
port = 9100
"#
        )
        .unwrap();

        let config = AppConfig::load_from(file.path()).unwrap();
        assert_eq!(config.llm.deployment.as_deref(), Some("gpt-35-turbo"));
        assert_eq!(config.llm.request_timeout_secs, 30);
        assert_eq!(config.conversation.user_proxy_max_auto_replies, 4);
        assert_eq!(config.conversation.termination_keyword, "TERMINATE");
        assert_eq!(config.gateway.port, 9100);
        assert_eq!(config.llm.missing_credentials(), vec![ENV_API_KEY]);
    }

    #[test]
    fn malformed_file_is_parse_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "[gateway\nport = ").unwrap();
        let err = AppConfig::load_from(file.path()).unwrap_err();
        assert!(matches!(err, ConfigError::ParseError { .. }));
    }
}
