//! Transport service - orchestrates different transport types.
//!
//! Wraps the chosen transport in the server lifecycle: the server is
//! started before the transport accepts traffic and shut down after the
//! transport returns, whether it returned cleanly or not.

use tracing::{error, info};

use super::TransportConfig;
use crate::core::{McpServer, Result};

#[cfg(feature = "stdio")]
use super::stdio::StdioTransport;

#[cfg(feature = "http")]
use super::http::HttpTransport;

/// Transport service - manages the transport layer for the MCP server.
pub struct TransportService {
    config: TransportConfig,
}

impl TransportService {
    /// Create a new transport service with the given configuration.
    pub fn new(config: TransportConfig) -> Self {
        Self { config }
    }

    /// Start `server`, serve until the transport stops, then shut it down.
    ///
    /// A plugin that fails to initialize aborts before any transport is opened.
    pub async fn run(self, server: McpServer) -> Result<()> {
        info!("Starting transport: {}", self.config.description());

        server.start().await?;

        let outcome = match self.config {
            #[cfg(feature = "stdio")]
            TransportConfig::Stdio => StdioTransport::run(server.clone()).await,
            #[cfg(feature = "http")]
            TransportConfig::Http(cfg) => HttpTransport::new(cfg).run(server.clone()).await,
        };

        if let Err(e) = &outcome {
            error!("Transport stopped with error: {}", e);
        }
        server.shutdown().await;

        outcome.map_err(Into::into)
    }
}

#[cfg(all(test, feature = "http"))]
mod tests {
    use super::*;
    use crate::core::ServerState;
    use crate::core::transport::HttpConfig;

    #[tokio::test]
    async fn test_bind_failure_still_shuts_down() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();

        let server = McpServer::builder("test").build();
        let service = TransportService::new(TransportConfig::Http(HttpConfig {
            port,
            host: "127.0.0.1".to_string(),
            enable_cors: false,
        }));

        let err = service.run(server.clone()).await.unwrap_err();
        assert!(err.to_string().contains("Failed to bind"));
        assert_eq!(server.state().await, ServerState::Stopped);
        drop(listener);
    }
}
