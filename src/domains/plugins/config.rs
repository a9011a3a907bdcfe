//! Per-plugin configuration.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::error::{PluginError, PluginResult};

/// String-keyed configuration map handed to a plugin at construction.
#[derive(Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PluginConfig {
    values: Map<String, Value>,
}

/// Keys whose values never appear in `Debug` output.
const SECRET_KEYS: &[&str] = &["api_token", "api_key", "token", "password", "secret"];

impl std::fmt::Debug for PluginConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut map = f.debug_map();
        for (key, value) in &self.values {
            if SECRET_KEYS.contains(&key.as_str()) {
                map.entry(key, &"[REDACTED]");
            } else {
                map.entry(key, value);
            }
        }
        map.finish()
    }
}

impl PluginConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a value (builder style).
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.values.insert(key.into(), value.into());
        self
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }

    /// String value for `key`; nulls and non-strings count as absent.
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.values.get(key).and_then(Value::as_str)
    }

    /// String value for `key`, or `default`.
    pub fn get_str_or<'a>(&'a self, key: &str, default: &'a str) -> &'a str {
        self.get_str(key).unwrap_or(default)
    }

    /// Unsigned integer value for `key`.
    pub fn get_u64(&self, key: &str) -> Option<u64> {
        self.values.get(key).and_then(Value::as_u64)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    /// Fail unless every key in `required` is present.
    pub fn validate_required(&self, plugin: &str, required: &[&str]) -> PluginResult<()> {
        let missing: Vec<&str> = required
            .iter()
            .copied()
            .filter(|key| !self.values.contains_key(*key))
            .collect();

        if missing.is_empty() {
            Ok(())
        } else {
            Err(PluginError::config(format!(
                "Missing required configuration keys for {}: {:?}",
                plugin, missing
            )))
        }
    }
}
