// Security module for inbound request authentication
//
// This module decides whether an inbound HTTP request may reach the MCP
// endpoint. The HTTP transport applies it as middleware; the STDIO
// transport has no inbound authentication.

pub mod auth_gate;

pub use auth_gate::{AuthGate, MCP_PATH_PREFIX, RequestAuthError};
