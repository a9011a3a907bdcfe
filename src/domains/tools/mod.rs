//! Tools domain module.
//!
//! This module handles everything between an inbound tool call and the
//! upstream request it turns into.
//!
//! ## Architecture
//!
//! - `surface.rs` - the dispatch surface tools are registered against
//! - `registry.rs` - category bookkeeping (no effect on dispatch)
//! - `params.rs` - pagination normalization and upstream parameter builders
//! - `error.rs` - Tool-specific error types
//!
//! ## Adding a New Tool
//!
//! 1. Define a params struct deriving `Deserialize` and `JsonSchema`
//! 2. Build the definition and handler with [`typed_tool`]
//! 3. Register it from a [`ToolProvider`](crate::domains::plugins::ToolProvider)
//!    with `surface.register_in(category, tool, handler)`

mod error;
pub mod params;
mod registry;
mod surface;

pub use error::ToolError;
pub use params::{Pagination, PaginationLimits};
pub use registry::{RegistryEntry, ToolRegistry};
pub use surface::{ToolFuture, ToolHandler, ToolSurface, into_call_result, typed_tool};
