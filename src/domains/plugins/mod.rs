//! Plugins domain module.
//!
//! A plugin bundles one upstream client configuration with the tools it
//! registers. The server drives every plugin through the same lifecycle:
//! `initialize` (which authenticates against the upstream) and then
//! `register_tools`, and finally `cleanup` on shutdown.
//!
//! - `config.rs` - per-plugin configuration map
//! - `error.rs` - plugin lifecycle errors
//! - `capsule/` - the bundled Capsule CRM plugin

pub mod capsule;
mod config;
mod error;

use async_trait::async_trait;

use crate::domains::tools::ToolSurface;

pub use capsule::CapsulePlugin;
pub use config::PluginConfig;
pub use error::{PluginError, PluginResult};

/// Startup and shutdown hooks.
#[async_trait]
pub trait Lifecycle: Send + Sync {
    /// Called once before the plugin's tools are registered.
    async fn initialize(&self) -> PluginResult<()>;

    /// Called once on server shutdown.
    async fn cleanup(&self) -> PluginResult<()>;
}

/// Anything that can register tools on a dispatch surface.
pub trait ToolProvider: Send + Sync {
    fn register_tools(&self, surface: &mut ToolSurface);
}

/// A named, configured bundle of upstream access and tools.
#[async_trait]
pub trait Plugin: Lifecycle + ToolProvider {
    fn name(&self) -> &str;

    fn config(&self) -> &PluginConfig;

    /// Check the upstream credential. `false` means the plugin cannot serve.
    async fn authenticate(&self) -> bool;
}
