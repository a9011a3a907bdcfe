//! MCP Server Toolkit entry point.
//!
//! Parses the server type and mode, loads configuration, initializes
//! logging and runs the chosen server on the chosen transport.

use anyhow::Result;
use clap::{Parser, ValueEnum};
use tracing::{Level, info};
use tracing_subscriber::{EnvFilter, fmt};

use mcp_server_toolkit::core::{Config, McpServer, TransportConfig, TransportService};
use mcp_server_toolkit::domains::plugins::CapsulePlugin;

/// MCP Server Toolkit
#[derive(Parser, Debug)]
#[command(name = "mcp-server-toolkit", version, about = "MCP Server Toolkit")]
struct Cli {
    /// Type of MCP server to run
    #[arg(value_enum)]
    server_type: ServerType,

    /// Server mode: http for web server, stdio for MCP client
    #[arg(value_enum)]
    mode: Mode,

    /// Host to bind to (http mode only)
    #[arg(long, default_value = "127.0.0.1")]
    host: String,

    /// Port to bind to (http mode only)
    #[arg(long, default_value_t = 8000)]
    port: u16,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum ServerType {
    Capsule,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Mode {
    Http,
    Stdio,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Load configuration from environment
    let mut config = Config::from_env();

    // Initialize logging
    init_logging(&config.logging.level);

    config.transport = transport_for(&cli, &config.transport)?;

    let server = match cli.server_type {
        ServerType::Capsule => capsule_server(&config)?,
    };

    info!("Starting {} v{}", server.name(), server.version());
    if matches!(cli.mode, Mode::Http) {
        info!("Use /health to check server status; MCP endpoint at /mcp/");
    }

    TransportService::new(config.transport).run(server).await?;

    info!("Server shut down");
    Ok(())
}

/// The CLI mode wins over `MCP_TRANSPORT`; CORS still follows the environment.
fn transport_for(cli: &Cli, loaded: &TransportConfig) -> Result<TransportConfig> {
    match cli.mode {
        #[cfg(feature = "stdio")]
        Mode::Stdio => Ok(TransportConfig::stdio()),
        #[cfg(feature = "http")]
        Mode::Http => {
            #[allow(irrefutable_let_patterns)]
            let enable_cors = if let TransportConfig::Http(http) = loaded {
                http.enable_cors
            } else {
                true
            };
            Ok(TransportConfig::Http(
                mcp_server_toolkit::core::transport::HttpConfig {
                    host: cli.host.clone(),
                    port: cli.port,
                    enable_cors,
                },
            ))
        }
        #[allow(unreachable_patterns)]
        mode => anyhow::bail!("{:?} mode is not compiled into this binary", mode),
    }
}

fn capsule_server(config: &Config) -> Result<McpServer> {
    let plugin = CapsulePlugin::new(config.capsule.to_plugin_config(), config.auth.test_mode)?;

    Ok(McpServer::builder("Capsule CRM MCP Server")
        .with_config(config)
        .instructions(
            "Read-only access to a Capsule CRM account: contacts, opportunities, \
             cases, tasks, timeline entries, projects and reference data.",
        )
        .plugin(plugin)
        .build())
}

/// Initialize the logging subsystem.
///
/// Logs go to stderr; stdout carries the MCP stream in stdio mode.
fn init_logging(level: &str) {
    let level = match level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let filter = EnvFilter::from_default_env().add_directive(level.into());

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .with_writer(std::io::stderr)
        .init();
}
