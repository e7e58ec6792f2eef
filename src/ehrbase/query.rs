//! Ad-hoc AQL execution

use serde_json::{Map, Value, json};
use tracing::info;

use super::error::Result;
use super::format::{FormatConfig, FormatKind};
use super::http::{ApiResponse, EhrbaseHttpClient, EhrbaseRequest};

const AQL_PATH: &str = "openehr/v1/query/aql";

/// Builds the `{q, query_parameters?}` payload; empty parameter maps are omitted.
pub fn query_payload(query: &str, query_parameters: Option<Map<String, Value>>) -> Value {
    let mut payload = json!({ "q": query });
    if let Some(params) = query_parameters.filter(|p| !p.is_empty()) {
        info!(?params, "With parameters");
        payload["query_parameters"] = Value::Object(params);
    }
    payload
}

#[derive(Debug, Clone)]
pub struct QueryClient {
    http: EhrbaseHttpClient,
    formats: FormatConfig,
}

impl QueryClient {
    pub fn new(http: EhrbaseHttpClient, formats: FormatConfig) -> Self {
        Self { http, formats }
    }

    pub async fn execute_adhoc_query(
        &self,
        query: &str,
        query_parameters: Option<Map<String, Value>>,
        format: Option<FormatKind>,
    ) -> Result<ApiResponse> {
        info!("Executing ad-hoc query: {}", query);
        self.http
            .send(
                EhrbaseRequest::post(AQL_PATH)
                    .format(self.formats.query_format(format))
                    .json(Some(query_payload(query, query_parameters))),
            )
            .await
    }
}
