//! Capsule CRM plugin.
//!
//! Read-only access to a Capsule CRM account: contacts, opportunities,
//! support cases, tasks, timeline entries, projects, tags, users and the
//! account's reference data.

mod params;
mod tools;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{Map, json};
use tracing::{debug, info, warn};

use super::{Lifecycle, Plugin, PluginConfig, PluginError, PluginResult, ToolProvider};
use crate::client::{ApiClient, BearerToken, RequestOptions};
use crate::domains::tools::ToolSurface;

/// Plugin name reported in logs and the health endpoint.
pub const PLUGIN_NAME: &str = "Capsule CRM";

/// Default Capsule API root.
pub const DEFAULT_BASE_URL: &str = "https://api.capsulecrm.com/api/v2";

/// Capsule CRM integration.
pub struct CapsulePlugin {
    config: PluginConfig,
    client: Arc<ApiClient>,
    has_token: bool,
    test_mode: bool,
}

impl CapsulePlugin {
    /// Build the plugin from its configuration.
    ///
    /// Recognised keys: `base_url`, `api_token`, `timeout_secs`, `user_agent`. A missing
    /// token is not an error here; it surfaces from `authenticate`.
    pub fn new(config: PluginConfig, test_mode: bool) -> PluginResult<Self> {
        let base_url = config.get_str_or("base_url", DEFAULT_BASE_URL).to_string();
        let token = config
            .get_str("api_token")
            .filter(|t| !t.is_empty())
            .map(str::to_string);
        let has_token = token.is_some();

        let mut builder =
            ApiClient::builder(base_url).auth(BearerToken::new(token).test_mode(test_mode));
        if let Some(secs) = config.get_u64("timeout_secs") {
            builder = builder.timeout(Duration::from_secs(secs));
        }
        if let Some(user_agent) = config.get_str("user_agent") {
            builder = builder.user_agent(user_agent);
        }
        let client = builder.build()?;

        debug!(base_url = %client.base_url(), has_token, "Capsule plugin configured");

        Ok(Self {
            config,
            client: Arc::new(client),
            has_token,
            test_mode,
        })
    }

    pub fn client(&self) -> &ApiClient {
        &self.client
    }
}

#[async_trait]
impl Lifecycle for CapsulePlugin {
    async fn initialize(&self) -> PluginResult<()> {
        if !self.authenticate().await {
            return Err(PluginError::authentication(PLUGIN_NAME));
        }
        info!("{} plugin initialized", PLUGIN_NAME);
        Ok(())
    }

    async fn cleanup(&self) -> PluginResult<()> {
        // Connections are not pooled, nothing to release.
        Ok(())
    }
}

impl ToolProvider for CapsulePlugin {
    fn register_tools(&self, surface: &mut ToolSurface) {
        let before = surface.len();
        tools::register(&self.client, surface);
        info!(
            "{} registered {} tools",
            PLUGIN_NAME,
            surface.len() - before
        );
    }
}

#[async_trait]
impl Plugin for CapsulePlugin {
    fn name(&self) -> &str {
        PLUGIN_NAME
    }

    fn config(&self) -> &PluginConfig {
        &self.config
    }

    async fn authenticate(&self) -> bool {
        if !self.has_token {
            if self.test_mode {
                debug!("No Capsule token configured, using test token");
                return true;
            }
            warn!("No Capsule API token configured");
            return false;
        }

        let mut query = Map::new();
        query.insert("perPage".into(), json!(1));
        match self.client.get("users", RequestOptions::new().query(query)).await {
            Ok(_) => true,
            Err(e) => {
                warn!("Capsule authentication failed: {}", e);
                false
            }
        }
    }
}
