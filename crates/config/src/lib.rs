//! Configuration loading, validation, and management for AgentBridge.
//!
//! Loads configuration from `~/.agentbridge/config.toml` (or an explicit
//! path) with environment variable overrides. Validates all settings at
//! startup.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// The root configuration structure.
///
/// Maps directly to `~/.agentbridge/config.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Agent backend connection
    #[serde(default)]
    pub backend: BackendConfig,

    /// HTTP gateway settings
    #[serde(default)]
    pub gateway: GatewayConfig,

    /// Session overlay state cache
    #[serde(default)]
    pub sessions: CacheConfig,

    /// Derived session-key cache.
    ///
    /// Configured independently of `sessions`; the two may drift.
    #[serde(default)]
    pub session_keys: CacheConfig,

    /// Proxy tool settings
    #[serde(default)]
    pub tools: ToolsConfig,
}

/// Redact a secret string for Debug output.
fn redact(s: &Option<String>) -> &'static str {
    match s {
        Some(_) => "[REDACTED]",
        None => "None",
    }
}

#[derive(Clone, Serialize, Deserialize)]
pub struct BackendConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Project name sent to hosted backends
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project: Option<String>,

    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_base_url() -> String {
    "http://localhost:8283".into()
}
fn default_timeout_secs() -> u64 {
    300
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            api_key: None,
            project: None,
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl std::fmt::Debug for BackendConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BackendConfig")
            .field("base_url", &self.base_url)
            .field("api_key", &redact(&self.api_key))
            .field("project", &self.project)
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default = "default_host")]
    pub host: String,

    /// Maximum request body size; system prompts can be large
    #[serde(default = "default_body_limit")]
    pub body_limit_bytes: usize,

    /// Expose the read-only `/debug/sessions` dump
    #[serde(default)]
    pub debug_sessions: bool,

    /// Allowed CORS origins; empty disables CORS headers
    #[serde(default)]
    pub cors_origins: Vec<String>,
}

fn default_port() -> u16 {
    8400
}
fn default_host() -> String {
    "127.0.0.1".into()
}
fn default_body_limit() -> usize {
    8 * 1024 * 1024
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            host: default_host(),
            body_limit_bytes: default_body_limit(),
            debug_sessions: false,
            cors_origins: vec![],
        }
    }
}

/// Capacity and TTL of one process-local cache.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheConfig {
    #[serde(default = "default_max_entries")]
    pub max_entries: usize,

    #[serde(default = "default_ttl_seconds")]
    pub ttl_seconds: u64,
}

fn default_max_entries() -> usize {
    100
}
fn default_ttl_seconds() -> u64 {
    3 * 60 * 60
}

impl CacheConfig {
    pub fn ttl(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.ttl_seconds)
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_entries: default_max_entries(),
            ttl_seconds: default_ttl_seconds(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolsConfig {
    /// Prefix that marks backend tools owned by the gateway
    #[serde(default = "default_tool_prefix")]
    pub prefix: String,
}

fn default_tool_prefix() -> String {
    "proxy_".into()
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            prefix: default_tool_prefix(),
        }
    }
}

impl AppConfig {
    /// Load configuration from the default path (~/.agentbridge/config.toml).
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_with_env(&Self::config_dir().join("config.toml"))
    }

    /// Load from `path`, then apply environment overrides and validate.
    ///
    /// Recognised variables:
    /// - `LETTA_BASE_URL`, `LETTA_API_KEY`, `LETTA_PROJECT`
    /// - `PROXY_DEBUG_SESSIONS=1`
    /// - `AGENTBRIDGE_PORT`
    pub fn load_with_env(path: &Path) -> Result<Self, ConfigError> {
        let mut config = Self::load_from(path)?;
        config.apply_env(|key| std::env::var(key).ok())?;
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

    /// Apply overrides from an environment lookup function.
    fn apply_env(&mut self, var: impl Fn(&str) -> Option<String>) -> Result<(), ConfigError> {
        if let Some(url) = var("LETTA_BASE_URL") {
            self.backend.base_url = url;
        }
        if let Some(key) = var("LETTA_API_KEY") {
            self.backend.api_key = Some(key);
        }
        if let Some(project) = var("LETTA_PROJECT") {
            self.backend.project = Some(project);
        }
        if let Some(flag) = var("PROXY_DEBUG_SESSIONS") {
            self.gateway.debug_sessions = flag == "1";
        }
        if let Some(port) = var("AGENTBRIDGE_PORT") {
            self.gateway.port = port.parse().map_err(|_| {
                ConfigError::ValidationError(format!("AGENTBRIDGE_PORT is not a port: {port}"))
            })?;
        }
        Ok(())
    }

    /// Get the configuration directory path.
    pub fn config_dir() -> PathBuf {
        dirs_home().join(".agentbridge")
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let url = &self.backend.base_url;
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            return Err(ConfigError::ValidationError(format!(
                "backend.base_url must start with http:// or https:// (got '{url}')"
            )));
        }

        for (name, cache) in [("sessions", &self.sessions), ("session_keys", &self.session_keys)] {
            if cache.max_entries == 0 {
                return Err(ConfigError::ValidationError(format!(
                    "{name}.max_entries must be > 0"
                )));
            }
            if cache.ttl_seconds == 0 {
                return Err(ConfigError::ValidationError(format!(
                    "{name}.ttl_seconds must be > 0"
                )));
            }
        }

        if self.tools.prefix.is_empty() {
            return Err(ConfigError::ValidationError(
                "tools.prefix must not be empty".into(),
            ));
        }
        let mut prefix_chars = self.tools.prefix.chars();
        let leads = prefix_chars
            .next()
            .is_some_and(|c| c.is_ascii_alphabetic() || c == '_');
        if !leads || !prefix_chars.all(|c| c.is_ascii_alphanumeric() || c == '_') {
            return Err(ConfigError::ValidationError(format!(
                "tools.prefix '{}' must be a Python identifier",
                self.tools.prefix
            )));
        }

        Ok(())
    }

    /// Whether the two caches are configured differently.
    pub fn caches_diverge(&self) -> bool {
        self.sessions != self.session_keys
    }

    /// Whether the backend looks like the hosted cloud service.
    pub fn is_hosted_backend(&self) -> bool {
        self.backend.base_url.contains("letta.com")
    }

    /// A copy safe to print: the API key is masked.
    pub fn redacted(&self) -> Self {
        let mut config = self.clone();
        if config.backend.api_key.is_some() {
            config.backend.api_key = Some("[REDACTED]".into());
        }
        config
    }

    /// Generate a default config TOML string.
    pub fn default_toml() -> String {
        let config = Self::default();
        toml::to_string_pretty(&config).unwrap_or_default()
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
