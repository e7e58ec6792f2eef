//! JSON format modes and wire-format negotiation
//!
//! EHRbase serves the same clinical data as canonical JSON, web-template flat
//! JSON or web-template structured JSON. The active [`JsonFormat`] decides which
//! [`FormatKind`] each operation category requests.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Environment variable consulted when no explicit mode is configured
pub const JSON_FORMAT_ENV: &str = "EHRBASE_JSON_FORMAT";

/// Process-wide JSON serialization mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JsonFormat {
    /// `application/json` everywhere
    Canonical,
    /// Web template for templates, flat JSON for compositions
    #[default]
    WtFlat,
    /// Web template for templates, structured JSON for compositions
    WtStructured,
}

impl JsonFormat {
    pub const ALL: [JsonFormat; 3] = [Self::Canonical, Self::WtFlat, Self::WtStructured];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Canonical => "canonical",
            Self::WtFlat => "wt_flat",
            Self::WtStructured => "wt_structured",
        }
    }
}

impl fmt::Display for JsonFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for JsonFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "canonical" => Ok(Self::Canonical),
            "wt_flat" => Ok(Self::WtFlat),
            "wt_structured" => Ok(Self::WtStructured),
            other => Err(format!(
                "unknown JSON format '{other}' (expected canonical, wt_flat or wt_structured)"
            )),
        }
    }
}

/// Header set sent for one wire format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FormatHeaders {
    pub accept: &'static str,
    pub content_type: &'static str,
    pub prefer: Option<&'static str>,
}

/// Wire format requested from EHRbase
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FormatKind {
    #[default]
    Json,
    Xml,
    WebTemplate,
    FlatJson,
    StructuredJson,
}

impl FormatKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Json => "json",
            Self::Xml => "xml",
            Self::WebTemplate => "web_template",
            Self::FlatJson => "flat_json",
            Self::StructuredJson => "structured_json",
        }
    }

    pub fn headers(&self) -> FormatHeaders {
        match self {
            Self::Json => FormatHeaders {
                accept: "application/json",
                content_type: "application/json",
                prefer: None,
            },
            Self::Xml => FormatHeaders {
                accept: "application/xml",
                content_type: "application/xml",
                prefer: None,
            },
            Self::WebTemplate => FormatHeaders {
                accept: "application/openehr.wt+json",
                content_type: "application/json",
                prefer: None,
            },
            Self::FlatJson => FormatHeaders {
                accept: "application/openehr.wt.flat.schema+json",
                content_type: "application/openehr.wt.flat.schema+json",
                prefer: Some("return=representation"),
            },
            Self::StructuredJson => FormatHeaders {
                accept: "application/openehr.wt.structured.schema+json",
                content_type: "application/json",
                prefer: None,
            },
        }
    }
}

impl fmt::Display for FormatKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-category format resolution for one client instance.
///
/// The mode is fixed at construction. Every accessor takes an optional override
/// that wins over the mode unconditionally.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FormatConfig {
    json_format: JsonFormat,
}

impl FormatConfig {
    pub fn with_mode(json_format: JsonFormat) -> Self {
        Self { json_format }
    }

    pub fn json_format(&self) -> JsonFormat {
        self.json_format
    }

    /// Template listing is always plain JSON.
    pub fn template_list_format(&self, override_format: Option<FormatKind>) -> FormatKind {
        override_format.unwrap_or(FormatKind::Json)
    }

    pub fn template_format(&self, override_format: Option<FormatKind>) -> FormatKind {
        override_format.unwrap_or(match self.json_format {
            JsonFormat::Canonical => FormatKind::Json,
            JsonFormat::WtFlat | JsonFormat::WtStructured => FormatKind::WebTemplate,
        })
    }

    pub fn composition_format(&self, override_format: Option<FormatKind>) -> FormatKind {
        override_format.unwrap_or(match self.json_format {
            JsonFormat::Canonical => FormatKind::Json,
            JsonFormat::WtFlat => FormatKind::FlatJson,
            JsonFormat::WtStructured => FormatKind::StructuredJson,
        })
    }

    pub fn ehr_format(&self, override_format: Option<FormatKind>) -> FormatKind {
        override_format.unwrap_or(FormatKind::Json)
    }

    pub fn query_format(&self, override_format: Option<FormatKind>) -> FormatKind {
        override_format.unwrap_or(FormatKind::Json)
    }
}
