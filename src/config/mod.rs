//! Configuration management

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::ehrbase::format::{JSON_FORMAT_ENV, JsonFormat};

/// Environment variable holding the EHRbase REST base URL
pub const EHRBASE_URL_ENV: &str = "EHRBASE_URL";
/// Environment variable holding the EHR used when a tool call omits one
pub const DEFAULT_EHR_ID_ENV: &str = "DEFAULT_EHR_ID";

pub const DEFAULT_EHRBASE_URL: &str = "http://localhost:8080/ehrbase/rest";

/// MCP transport the server speaks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransportKind {
    #[default]
    Stdio,
    Http,
}

impl TransportKind {
    pub const ALL: [TransportKind; 2] = [Self::Stdio, Self::Http];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Stdio => "stdio",
            Self::Http => "http",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            Self::Stdio => "MCP over stdin/stdout (for desktop hosts)",
            Self::Http => "MCP streamable HTTP",
        }
    }
}

impl fmt::Display for TransportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TransportKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "stdio" => Ok(Self::Stdio),
            "http" => Ok(Self::Http),
            other => Err(format!("unknown transport '{other}' (expected stdio or http)")),
        }
    }
}

/// Connection settings for the EHRbase server
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct EhrbaseConfig {
    /// REST base URL (default: http://localhost:8080/ehrbase/rest)
    pub base_url: String,
    /// EHR used by tools when the caller gives none
    pub default_ehr_id: Option<String>,
    /// JSON serialization mode (default: wt_flat)
    pub json_format: JsonFormat,
}

/// Explicit values that take precedence over the environment
#[derive(Debug, Clone, Default)]
pub struct EhrbaseOverrides {
    pub base_url: Option<String>,
    pub default_ehr_id: Option<String>,
    pub json_format: Option<JsonFormat>,
}

impl Default for EhrbaseConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_EHRBASE_URL.to_string(),
            default_ehr_id: None,
            json_format: JsonFormat::default(),
        }
    }
}

impl EhrbaseConfig {
    /// Resolves each field from the override, then the process environment, then the default
    pub fn resolve(overrides: EhrbaseOverrides) -> Self {
        Self::resolve_with(overrides, |key| std::env::var(key).ok())
    }

    pub fn resolve_with<F>(overrides: EhrbaseOverrides, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let env_value = |key: &str| lookup(key).filter(|value| !value.is_empty());

        let base_url = overrides
            .base_url
            .or_else(|| env_value(EHRBASE_URL_ENV))
            .unwrap_or_else(|| DEFAULT_EHRBASE_URL.to_string());

        let default_ehr_id = overrides.default_ehr_id.or_else(|| env_value(DEFAULT_EHR_ID_ENV));

        let json_format = overrides
            .json_format
            .or_else(|| {
                let raw = env_value(JSON_FORMAT_ENV)?;
                raw.parse()
                    .map_err(|e| warn!("Ignoring {}: {}", JSON_FORMAT_ENV, e))
                    .ok()
            })
            .unwrap_or_default();

        Self {
            base_url,
            default_ehr_id,
            json_format,
        }
    }
}

/// Server configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    /// Server host (default: localhost)
    pub host: String,
    /// Server port (default: 3000)
    pub port: u16,
    /// Log level (default: info)
    pub log_level: String,
    pub transport: TransportKind,
    pub ehrbase: EhrbaseConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 3000,
            log_level: "info".to_string(),
            transport: TransportKind::default(),
            ehrbase: EhrbaseConfig::default(),
        }
    }
}

impl ServerConfig {
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
