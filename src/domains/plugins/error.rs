//! Plugin-specific error types.

use thiserror::Error;

use crate::client::ApiError;

/// Result type for plugin operations.
pub type PluginResult<T> = Result<T, PluginError>;

/// Errors that can occur while setting up or tearing down a plugin.
#[derive(Debug, Error)]
pub enum PluginError {
    /// `authenticate()` returned false during `initialize()`.
    #[error("Failed to authenticate with {0}")]
    Authentication(String),

    /// Required configuration is missing or malformed.
    #[error("Configuration error: {0}")]
    Config(String),

    /// The plugin's upstream client could not be built or used.
    #[error("Client error: {0}")]
    Client(#[from] ApiError),
}

impl PluginError {
    /// Create an authentication failure for the named plugin.
    pub fn authentication(plugin: impl Into<String>) -> Self {
        Self::Authentication(plugin.into())
    }

    /// Create a configuration error.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }
}
