//! openEHR MCP Server - Main binary

use anyhow::Result;
use clap::Parser;
use openehr_mcp::transport::TransportFactory;
use openehr_mcp::{EhrbaseClient, EhrbaseConfig, EhrbaseOverrides, JsonFormat, ServerConfig, TransportKind};
use tokio::signal;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "openehr-mcp")]
#[command(about = "openEHR Model Context Protocol Server")]
#[command(version)]
struct Cli {
    /// Transport mode: stdio or http
    #[arg(long, default_value = "stdio")]
    transport: TransportKind,

    /// Host to bind to for HTTP transport
    #[arg(long, default_value = "localhost")]
    host: String,

    /// Port to bind to for HTTP transport
    #[arg(long, default_value = "3000")]
    port: u16,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    log_level: String,

    /// EHRbase REST base URL (falls back to EHRBASE_URL)
    #[arg(long)]
    ehrbase_url: Option<String>,

    /// EHR used when a tool call gives none (falls back to DEFAULT_EHR_ID)
    #[arg(long)]
    default_ehr_id: Option<String>,

    /// JSON format mode: canonical, wt_flat or wt_structured (falls back to EHRBASE_JSON_FORMAT)
    #[arg(long)]
    json_format: Option<JsonFormat>,

    /// List available transports and exit
    #[arg(long)]
    list_transports: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    if cli.list_transports {
        println!("Available transports:");
        for line in TransportFactory::describe() {
            println!("  {line}");
        }
        return Ok(());
    }

    // Initialize tracing - stdout belongs to the MCP stream in stdio mode
    if cli.transport == TransportKind::Stdio {
        tracing_subscriber::registry()
            .with(
                tracing_subscriber::fmt::layer()
                    .with_target(false)
                    .with_thread_ids(false)
                    .with_file(false)
                    .with_line_number(false)
                    .with_writer(std::io::stderr),
            )
            .with(tracing_subscriber::EnvFilter::new(&cli.log_level))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(
                tracing_subscriber::fmt::layer()
                    .with_target(false)
                    .with_thread_ids(true)
                    .with_file(true)
                    .with_line_number(true),
            )
            .with(tracing_subscriber::EnvFilter::new(&cli.log_level))
            .init();
    }

    info!("Starting openEHR MCP Server v{}", openehr_mcp::VERSION);

    let config = ServerConfig {
        host: cli.host,
        port: cli.port,
        log_level: cli.log_level,
        transport: cli.transport,
        ehrbase: EhrbaseConfig::resolve(EhrbaseOverrides {
            base_url: cli.ehrbase_url,
            default_ehr_id: cli.default_ehr_id,
            json_format: cli.json_format,
        }),
    };
    info!("Server configuration: {:?}", config);

    let client = EhrbaseClient::new(&config.ehrbase);

    let shutdown_signal = async {
        match signal::ctrl_c().await {
            Ok(_) => info!("Received Ctrl+C, shutting down..."),
            Err(err) => error!("Unable to listen for shutdown signal: {}", err),
        }
    };

    match config.transport {
        TransportKind::Stdio => {
            let transport = TransportFactory::create_stdio(client);

            tokio::select! {
                result = transport.start() => {
                    match result {
                        Ok(_) => info!("Stdio transport completed successfully"),
                        Err(e) => error!("Stdio transport error: {:#}", e),
                    }
                }
                _ = shutdown_signal => {
                    info!("Shutdown signal received, stopping stdio transport");
                }
            }
        }
        TransportKind::Http => {
            let transport = TransportFactory::create_http(&config.host, config.port, client);

            tokio::select! {
                result = transport.start() => {
                    if let Err(e) = result {
                        error!("HTTP transport error: {:#}", e);
                        return Err(e);
                    }
                }
                _ = shutdown_signal => {
                    info!("Shutdown signal received, stopping HTTP transport");
                }
            }
        }
    }

    info!("openEHR MCP Server shutdown complete");
    Ok(())
}
