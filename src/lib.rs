//! MCP Server Toolkit
//!
//! Expose third-party REST APIs as Model Context Protocol tools, and serve
//! them over STDIO or over HTTP behind a static bearer key.
//!
//! # Architecture
//!
//! - **core**: configuration, errors, the auth-gate, server lifecycle and transports
//! - **client**: the upstream JSON client and its auth strategies
//! - **domains**: business logic organized by bounded contexts
//!   - **tools**: tool dispatch surface, category registry, parameter shaping
//!   - **plugins**: plugin contracts and the Capsule CRM plugin
//!
//! # Example
//!
//! ```rust,no_run
//! use mcp_server_toolkit::core::{Config, McpServer, TransportService};
//! use mcp_server_toolkit::domains::plugins::CapsulePlugin;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::from_env();
//!     let plugin = CapsulePlugin::new(config.capsule.to_plugin_config(), false)?;
//!     let server = McpServer::builder("Capsule CRM MCP Server")
//!         .with_config(&config)
//!         .plugin(plugin)
//!         .build();
//!     TransportService::new(config.transport).run(server).await?;
//!     Ok(())
//! }
//! ```

pub mod client;
pub mod core;
pub mod domains;

// Re-export commonly used types for convenience
pub use core::{Config, Error, McpServer, Result};
