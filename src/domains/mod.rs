//! Domains module containing business logic organized by bounded contexts.
//!
//! - **tools**: the dispatch surface every transport calls through, the
//!   category registry and upstream parameter shaping
//! - **plugins**: plugin contracts and the bundled upstream integrations

pub mod plugins;
pub mod tools;
