//! Transport integration using rmcp SDK
//!
//! Serves [`OpenEhrMcpServer`] over stdio or MCP streamable HTTP.

use anyhow::{Context, Result};
use hyper_util::{rt::TokioIo, service::TowerToHyperService};
use rmcp::ServiceExt;
use rmcp::transport::streamable_http_server::{
    StreamableHttpServerConfig, StreamableHttpService, session::local::LocalSessionManager,
};
use std::sync::Arc;
use tracing::{debug, info};

use crate::config::TransportKind;
use crate::ehrbase::EhrbaseClient;
use crate::server::OpenEhrMcpServer;

/// HTTP transport server using MCP streamable HTTP protocol
pub struct HttpTransportServer {
    pub host: String,
    pub port: u16,
    client: EhrbaseClient,
}

impl HttpTransportServer {
    pub fn new(host: String, port: u16, client: EhrbaseClient) -> Self {
        Self { host, port, client }
    }

    /// Start the HTTP server with MCP streamable HTTP protocol support
    pub async fn start(&self) -> Result<()> {
        info!(
            "Starting MCP HTTP streamable transport server on {}:{}",
            self.host, self.port
        );

        // One handler per session, all sharing the same EHRbase client
        let server = OpenEhrMcpServer::new(self.client.clone());
        let session_manager = Arc::new(LocalSessionManager::default());
        let config = StreamableHttpServerConfig::default();
        let service = StreamableHttpService::new(move || Ok(server.clone()), session_manager, config);

        let bind_address = format!("{}:{}", self.host, self.port);
        let listener = tokio::net::TcpListener::bind(&bind_address)
            .await
            .with_context(|| format!("Failed to bind {bind_address}"))?;
        info!("MCP HTTP streamable server listening on {}", listener.local_addr()?);

        loop {
            let (stream, addr) = listener.accept().await?;
            debug!("Accepted connection from {}", addr);
            let service = service.clone();

            tokio::spawn(async move {
                let io = TokioIo::new(stream);
                let hyper_service = TowerToHyperService::new(service);
                if let Err(e) = hyper::server::conn::http1::Builder::new()
                    .serve_connection(io, hyper_service)
                    .await
                {
                    debug!("Connection error: {}", e);
                }
            });
        }
    }
}

/// Stdio transport server using MCP stdio protocol
pub struct StdioTransportServer {
    client: EhrbaseClient,
}

impl StdioTransportServer {
    pub fn new(client: EhrbaseClient) -> Self {
        Self { client }
    }

    /// Serves until the client closes stdin
    pub async fn start(&self) -> Result<()> {
        info!("Starting MCP stdio transport server");

        let service = OpenEhrMcpServer::new(self.client.clone())
            .serve(rmcp::transport::stdio())
            .await
            .context("Failed to start stdio MCP service")?;
        info!("Stdio transport ready for MCP communication");

        let reason = service.waiting().await?;
        info!("Stdio transport server shutting down: {:?}", reason);
        Ok(())
    }
}

/// Factory for creating transport servers
pub struct TransportFactory;

impl TransportFactory {
    pub fn create_http(host: &str, port: u16, client: EhrbaseClient) -> HttpTransportServer {
        HttpTransportServer::new(host.to_string(), port, client)
    }

    pub fn create_stdio(client: EhrbaseClient) -> StdioTransportServer {
        StdioTransportServer::new(client)
    }

    /// Human-readable list of the supported transports
    pub fn describe() -> Vec<String> {
        TransportKind::ALL
            .iter()
            .map(|kind| format!("{:<6} {}", kind.as_str(), kind.description()))
            .collect()
    }
}
