//! # openEHR MCP Server
//!
//! Model Context Protocol server for openEHR clinical data repositories,
//! exposing EHRbase templates, EHRs, compositions and AQL queries as MCP tools.

pub mod config;
pub mod ehrbase;
pub mod prompts;
pub mod server;
pub mod tools;
pub mod transport;

// Re-export commonly used types
pub use config::{EhrbaseConfig, EhrbaseOverrides, ServerConfig, TransportKind};
pub use ehrbase::{ApiResponse, EhrbaseClient, EhrbaseError, JsonFormat};
pub use server::OpenEhrMcpServer;

/// Current version of the MCP server
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
