//! Upstream REST client.
//!
//! - `api_client.rs` - the JSON client and its request options
//! - `auth.rs` - outbound authentication strategies
//! - `error.rs` - the single upstream error surface

mod api_client;
pub mod auth;
mod error;

pub use api_client::{ApiClient, ApiClientBuilder, DEFAULT_TIMEOUT, DEFAULT_USER_AGENT, RequestOptions};
pub use auth::{ApiKeyAuth, AuthStrategy, BearerToken, CustomHeaders};
pub use error::{ApiError, ApiResult, ErrorDetail};
