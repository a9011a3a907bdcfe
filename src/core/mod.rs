//! Core module containing shared infrastructure components.
//!
//! This module provides the foundational building blocks for the MCP server,
//! including error handling, configuration, inbound request authentication,
//! server lifecycle management and transport layer abstractions.

pub mod config;
pub mod error;
pub mod security;
pub mod server;
pub mod transport;

pub use config::{Config, require_env_var};
pub use error::{Error, Result};
pub use security::{AuthGate, RequestAuthError};
pub use server::{McpServer, ServerBuilder, ServerHooks, ServerState};
pub use transport::{TransportConfig, TransportService};
