//! Configuration management for the MCP server.
//!
//! This module provides a centralized configuration structure that can be
//! populated from environment variables or defaults. Values passed
//! explicitly to the server builder take precedence over anything loaded
//! here.

use super::error::{Error, Result};
use super::transport::TransportConfig;
use crate::domains::plugins::PluginConfig;
use crate::domains::plugins::capsule::DEFAULT_BASE_URL;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// Main configuration structure for the MCP server.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Server identification and metadata.
    pub server: ServerConfig,

    /// Logging configuration.
    pub logging: LoggingConfig,

    /// Transport configuration.
    pub transport: TransportConfig,

    /// Inbound request authentication.
    pub auth: AuthConfig,

    /// Capsule CRM plugin settings.
    pub capsule: CapsuleConfig,
}

/// Server identification configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Overrides the name chosen by the server type.
    pub name: Option<String>,

    /// The version of the server.
    pub version: String,
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level filter (e.g., "info", "debug", "trace").
    pub level: String,
}

/// Inbound authentication for the HTTP transport.
#[derive(Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    /// Static bearer key clients must present on `/mcp`.
    pub api_key: Option<String>,

    /// Enforce the key. Has no effect when no key is configured.
    pub auth_required: bool,

    /// Bypass inbound authentication and allow synthetic upstream tokens.
    pub test_mode: bool,
}

/// Configuration for the Capsule CRM plugin.
#[derive(Clone, Serialize, Deserialize)]
pub struct CapsuleConfig {
    pub base_url: String,
    pub api_token: Option<String>,
    pub timeout_secs: Option<u64>,
    pub user_agent: Option<String>,
}

/// Custom Debug implementation to redact secrets from logs.
impl std::fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthConfig")
            .field("api_key", &self.api_key.as_ref().map(|_| "[REDACTED]"))
            .field("auth_required", &self.auth_required)
            .field("test_mode", &self.test_mode)
            .finish()
    }
}

impl std::fmt::Debug for CapsuleConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CapsuleConfig")
            .field("base_url", &self.base_url)
            .field("api_token", &self.api_token.as_ref().map(|_| "[REDACTED]"))
            .field("timeout_secs", &self.timeout_secs)
            .field("user_agent", &self.user_agent)
            .finish()
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            name: None,
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            auth_required: true,
            test_mode: false,
        }
    }
}

impl Default for CapsuleConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            api_token: None,
            timeout_secs: None,
            user_agent: None,
        }
    }
}

impl CapsuleConfig {
    /// Plugin configuration map for [`CapsulePlugin`](crate::domains::plugins::CapsulePlugin).
    pub fn to_plugin_config(&self) -> PluginConfig {
        let mut config = PluginConfig::new().with("base_url", self.base_url.clone());
        if let Some(token) = &self.api_token {
            config = config.with("api_token", token.clone());
        }
        if let Some(secs) = self.timeout_secs {
            config = config.with("timeout_secs", secs);
        }
        if let Some(user_agent) = &self.user_agent {
            config = config.with("user_agent", user_agent.clone());
        }
        config
    }
}

fn parse_bool(value: &str) -> bool {
    matches!(value.to_lowercase().as_str(), "1" | "true" | "yes" | "on")
}

impl Config {
    /// Create a new configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Load configuration from environment variables.
    ///
    /// A `.env` file in the working directory is read first if present.
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();

        let mut config = Self::default();

        if let Ok(name) = std::env::var("MCP_SERVER_NAME") {
            config.server.name = Some(name);
        }

        if let Ok(level) = std::env::var("MCP_LOG_LEVEL") {
            config.logging.level = level;
        }

        // Load transport configuration from environment
        config.transport = TransportConfig::from_env();

        if let Ok(key) = std::env::var("MCP_API_KEY") {
            config.auth.api_key = Some(key).filter(|k| !k.is_empty());
        }
        if let Ok(required) = std::env::var("MCP_AUTH_REQUIRED") {
            config.auth.auth_required = parse_bool(&required);
        }
        if let Ok(test_mode) = std::env::var("MCP_TEST_MODE") {
            config.auth.test_mode = parse_bool(&test_mode);
        }
        if config.auth.test_mode {
            info!("Test mode enabled: inbound authentication is bypassed");
        }

        if let Ok(token) = std::env::var("CAPSULE_API_TOKEN") {
            config.capsule.api_token = Some(token).filter(|t| !t.is_empty());
        }
        if let Ok(base_url) = std::env::var("CAPSULE_BASE_URL") {
            config.capsule.base_url = base_url;
        }
        if let Ok(timeout) = std::env::var("CAPSULE_TIMEOUT_SECS") {
            config.capsule.timeout_secs = timeout.parse().ok();
        }

        debug!(?config, "Configuration loaded");
        config
    }
}

/// Read a required environment variable.
///
/// When the variable is unset and `test_mode` is on, `default_for_tests`
/// is returned if one was given.
pub fn require_env_var(name: &str, default_for_tests: Option<&str>, test_mode: bool) -> Result<String> {
    match std::env::var(name) {
        Ok(value) => Ok(value),
        Err(_) => match default_for_tests {
            Some(default) if test_mode => Ok(default.to_string()),
            _ => Err(Error::config(format!(
                "Required environment variable {} is not set",
                name
            ))),
        },
    }
}
