//! HTTP transport for the EHRbase REST API
//!
//! One [`EhrbaseRequest`] becomes exactly one HTTP call. Success responses are
//! normalized into an [`ApiResponse`] because EHRbase signals success
//! inconsistently: some operations return a body, some return 204, and EHR
//! creation may return 201 with only a `Location` header.

use std::collections::BTreeMap;
use std::time::Instant;

use reqwest::header::{ACCEPT, CONTENT_TYPE, HeaderMap, HeaderName, HeaderValue, IF_MATCH, LOCATION};
use reqwest::{Method, StatusCode};
use serde::{Serialize, Serializer};
use serde_json::{Value, json};
use tracing::{error, info, instrument, warn};

use super::error::{EhrbaseError, Result};
use super::format::FormatKind;
use crate::config::EhrbaseConfig;

const PREFER: HeaderName = HeaderName::from_static("prefer");

/// Request body variants
#[derive(Debug, Clone, Default, PartialEq)]
pub enum RequestBody {
    #[default]
    Empty,
    Json(Value),
    /// Pre-serialized content, sent as-is (template upload)
    Raw(String),
}

/// A single call against EHRbase
#[derive(Debug, Clone)]
pub struct EhrbaseRequest {
    pub method: Method,
    pub path: String,
    pub format: FormatKind,
    pub body: RequestBody,
    pub template_id: Option<String>,
    pub version_uid: Option<String>,
    pub query: Vec<(String, String)>,
}

impl EhrbaseRequest {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            format: FormatKind::Json,
            body: RequestBody::Empty,
            template_id: None,
            version_uid: None,
            query: Vec::new(),
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    pub fn post(path: impl Into<String>) -> Self {
        Self::new(Method::POST, path)
    }

    pub fn put(path: impl Into<String>) -> Self {
        Self::new(Method::PUT, path)
    }

    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(Method::DELETE, path)
    }

    pub fn format(mut self, format: FormatKind) -> Self {
        self.format = format;
        self
    }

    pub fn json(mut self, body: Option<Value>) -> Self {
        self.body = body.map(RequestBody::Json).unwrap_or_default();
        self
    }

    pub fn raw(mut self, content: impl Into<String>) -> Self {
        self.body = RequestBody::Raw(content.into());
        self
    }

    /// Only sent for composition paths, where EHRbase needs it to resolve flat/structured bodies
    pub fn template_id(mut self, template_id: Option<String>) -> Self {
        self.template_id = template_id;
        self
    }

    /// Sent as `If-Match` on PUT
    pub fn version_uid(mut self, version_uid: Option<String>) -> Self {
        self.version_uid = version_uid;
        self
    }

    pub fn query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((key.into(), value.into()));
        self
    }

    /// Query parameters in send order: `templateId` first, then caller parameters
    pub fn query_params(&self) -> Vec<(String, String)> {
        let mut params = Vec::with_capacity(self.query.len() + 1);
        if let Some(template_id) = &self.template_id {
            if self.path.contains("composition") {
                params.push(("templateId".to_string(), template_id.clone()));
            }
        }
        params.extend(self.query.iter().cloned());
        params
    }

    /// Format headers plus `If-Match` for conditional updates
    pub fn headers(&self) -> Result<HeaderMap> {
        let format = self.format.headers();
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static(format.accept));
        headers.insert(CONTENT_TYPE, HeaderValue::from_static(format.content_type));
        if let Some(prefer) = format.prefer {
            headers.insert(PREFER, HeaderValue::from_static(prefer));
        }

        if self.method == Method::PUT {
            if let Some(version_uid) = &self.version_uid {
                let value = HeaderValue::from_str(version_uid).map_err(|_| {
                    EhrbaseError::invalid_input(format!(
                        "Version UID is not a valid header value: {version_uid}"
                    ))
                })?;
                headers.insert(IF_MATCH, value);
            }
        }

        Ok(headers)
    }
}

/// Normalized outcome of a successful call
#[derive(Debug, Clone, PartialEq)]
pub enum ApiResponse {
    /// Parsed JSON body
    Body(Value),
    /// 204 No Content
    NoContent,
    /// 201 Created with an empty body
    Created {
        /// Last path segment of the `Location` header, if present
        ehr_id: Option<String>,
    },
    /// 2xx whose body was not JSON
    Unparsed {
        status_code: u16,
        headers: BTreeMap<String, String>,
        content_type: String,
        content_length: usize,
    },
}

impl ApiResponse {
    pub fn body(&self) -> Option<&Value> {
        match self {
            Self::Body(value) => Some(value),
            _ => None,
        }
    }

    pub fn created_id(&self) -> Option<&str> {
        match self {
            Self::Created { ehr_id } => ehr_id.as_deref(),
            _ => None,
        }
    }

    pub fn is_degraded(&self) -> bool {
        matches!(self, Self::Unparsed { .. })
    }

    /// JSON rendering handed to tool callers
    pub fn to_value(&self) -> Value {
        match self {
            Self::Body(value) => value.clone(),
            Self::NoContent => json!({
                "status": "success",
                "message": "Operation completed successfully"
            }),
            Self::Created { ehr_id } => json!({
                "status": "success",
                "message": "Resource created successfully",
                "ehr_id": ehr_id
            }),
            Self::Unparsed {
                status_code,
                headers,
                content_type,
                content_length,
            } => json!({
                "status": "success",
                "status_code": status_code,
                "headers": headers,
                "content_type": content_type,
                "content_length": content_length
            }),
        }
    }

    pub fn into_value(self) -> Value {
        match self {
            Self::Body(value) => value,
            other => other.to_value(),
        }
    }
}

impl Serialize for ApiResponse {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        self.to_value().serialize(serializer)
    }
}

/// Turns a successful status, its headers and raw body into an [`ApiResponse`]
pub fn normalize_success(status: StatusCode, headers: &HeaderMap, body: &[u8]) -> ApiResponse {
    if status == StatusCode::NO_CONTENT {
        return ApiResponse::NoContent;
    }

    if status == StatusCode::CREATED && body.iter().all(u8::is_ascii_whitespace) {
        let ehr_id = headers
            .get(LOCATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|location| location.rsplit('/').next())
            .filter(|segment| !segment.is_empty())
            .map(str::to_string);
        return ApiResponse::Created { ehr_id };
    }

    match serde_json::from_slice::<Value>(body) {
        Ok(value) => ApiResponse::Body(value),
        Err(e) => {
            let preview = String::from_utf8_lossy(&body[..body.len().min(100)]);
            warn!("Failed to parse JSON response: {}. Content: {}...", e, preview);

            let headers_map: BTreeMap<String, String> = headers
                .iter()
                .filter_map(|(name, value)| {
                    value.to_str().ok().map(|v| (name.as_str().to_string(), v.to_string()))
                })
                .collect();
            let content_type = headers
                .get(CONTENT_TYPE)
                .and_then(|v| v.to_str().ok())
                .unwrap_or("unknown")
                .to_string();

            ApiResponse::Unparsed {
                status_code: status.as_u16(),
                headers: headers_map,
                content_type,
                content_length: body.len(),
            }
        }
    }
}

/// Low-level EHRbase client shared by the domain clients
#[derive(Debug, Clone)]
pub struct EhrbaseHttpClient {
    client: reqwest::Client,
    base_url: String,
    default_ehr_id: Option<String>,
}

impl EhrbaseHttpClient {
    pub fn new(base_url: impl Into<String>, default_ehr_id: Option<String>) -> Self {
        Self::with_client(reqwest::Client::new(), base_url, default_ehr_id)
    }

    pub fn with_client(
        client: reqwest::Client,
        base_url: impl Into<String>,
        default_ehr_id: Option<String>,
    ) -> Self {
        let base_url = base_url.into();
        info!("Initialized EhrbaseHttpClient with URL: {}", base_url);
        Self {
            client,
            base_url,
            default_ehr_id,
        }
    }

    pub fn from_config(config: &EhrbaseConfig) -> Self {
        Self::new(config.base_url.clone(), config.default_ehr_id.clone())
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn default_ehr_id(&self) -> Option<&str> {
        self.default_ehr_id.as_deref()
    }

    pub fn url_for(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }

    /// Issues the request and normalizes the response.
    ///
    /// 4xx/5xx statuses become [`EhrbaseError::Status`] carrying the code and response text.
    #[instrument(skip(self, request), fields(method = %request.method, path = %request.path))]
    pub async fn send(&self, request: EhrbaseRequest) -> Result<ApiResponse> {
        let url = self.url_for(&request.path);
        let headers = request.headers()?;
        let params = request.query_params();

        info!(
            format = request.format.headers().accept,
            has_json = matches!(request.body, RequestBody::Json(_)),
            params = ?params,
            "OUTGOING EHRbase Request"
        );

        let mut builder = self.client.request(request.method.clone(), &url).headers(headers);
        if !params.is_empty() {
            builder = builder.query(&params);
        }
        if request.method == Method::POST || request.method == Method::PUT {
            builder = match request.body {
                RequestBody::Json(value) => builder.body(serde_json::to_vec(&value)?),
                RequestBody::Raw(content) => builder.body(content),
                RequestBody::Empty => builder,
            };
        }

        let start = Instant::now();
        let response = match builder.send().await {
            Ok(response) => response,
            Err(e) => {
                error!(
                    "EHRbase request error: {} - {} after {}ms",
                    request.path,
                    e,
                    start.elapsed().as_millis()
                );
                return Err(e.into());
            }
        };

        let status = response.status();
        if status.is_client_error() || status.is_server_error() {
            let body = response.text().await.unwrap_or_default();
            error!(
                "EHRbase request error: {} - {} after {}ms",
                request.path,
                status,
                start.elapsed().as_millis()
            );
            return Err(EhrbaseError::Status { status, url, body });
        }

        let response_headers = response.headers().clone();
        let body = response.bytes().await?;
        let result = normalize_success(status, &response_headers, &body);

        info!(
            status_code = status.as_u16(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "INCOMING EHRbase Response"
        );
        Ok(result)
    }
}
