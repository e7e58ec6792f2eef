//! # EHRbase client
//!
//! Typed access to the openEHR REST API of an EHRbase server. [`EhrbaseClient`]
//! bundles the template, composition, EHR and query clients behind one object
//! that shares a single HTTP client and format configuration.

pub mod composition;
pub mod ehr;
pub mod error;
pub mod format;
pub mod http;
pub mod query;
pub mod template;

use serde_json::{Map, Value, json};
use tracing::info;

use crate::config::EhrbaseConfig;
use composition::CompositionClient;
use ehr::EhrClient;
use format::{FormatConfig, FormatKind};
use http::EhrbaseHttpClient;
use query::QueryClient;
use template::TemplateClient;

pub use error::{EhrbaseError, Result};
pub use format::JsonFormat;
pub use http::ApiResponse;

/// AQL listing every EHR identifier
pub const LIST_EHRS_AQL: &str = "SELECT e/ehr_id/value AS ehr_id FROM EHR e";

/// AQL listing compositions of one template, parameterized by `$template_id`
pub const LIST_COMPOSITIONS_AQL: &str = "SELECT e/ehr_id/value AS ehr_id, c AS composition FROM EHR e CONTAINS COMPOSITION c WHERE c/archetype_details/template_id/value = $template_id";

/// Facade over all EHRbase operations
#[derive(Debug, Clone)]
pub struct EhrbaseClient {
    http: EhrbaseHttpClient,
    formats: FormatConfig,
    templates: TemplateClient,
    compositions: CompositionClient,
    ehrs: EhrClient,
    queries: QueryClient,
}

impl EhrbaseClient {
    pub fn new(config: &EhrbaseConfig) -> Self {
        info!("Using JSON format mode: {}", config.json_format);
        Self::from_parts(
            EhrbaseHttpClient::from_config(config),
            FormatConfig::with_mode(config.json_format),
        )
    }

    pub fn from_parts(http: EhrbaseHttpClient, formats: FormatConfig) -> Self {
        Self {
            templates: TemplateClient::new(http.clone(), formats),
            compositions: CompositionClient::new(http.clone(), formats),
            ehrs: EhrClient::new(http.clone(), formats),
            queries: QueryClient::new(http.clone(), formats),
            http,
            formats,
        }
    }

    pub fn base_url(&self) -> &str {
        self.http.base_url()
    }

    pub fn default_ehr_id(&self) -> Option<&str> {
        self.http.default_ehr_id()
    }

    pub fn json_format(&self) -> JsonFormat {
        self.formats.json_format()
    }

    pub fn templates(&self) -> &TemplateClient {
        &self.templates
    }

    pub fn compositions(&self) -> &CompositionClient {
        &self.compositions
    }

    pub fn ehrs(&self) -> &EhrClient {
        &self.ehrs
    }

    pub fn queries(&self) -> &QueryClient {
        &self.queries
    }

    // Templates

    pub async fn get_template_list(&self) -> Result<ApiResponse> {
        self.templates.list_templates(None).await
    }

    pub async fn get_template(&self, template_id: &str) -> Result<ApiResponse> {
        self.templates.get_template(template_id, None).await
    }

    pub async fn get_template_example(&self, template_id: &str) -> Result<ApiResponse> {
        self.templates.get_example_composition(template_id, None).await
    }

    pub async fn upload_template(&self, template_xml: impl Into<String>) -> Result<ApiResponse> {
        self.templates.upload_template(template_xml).await
    }

    // Compositions

    pub async fn create_composition(
        &self,
        ehr_id: &str,
        composition: Value,
        template_id: Option<String>,
    ) -> Result<ApiResponse> {
        self.compositions
            .create_composition(ehr_id, composition, template_id, None)
            .await
    }

    pub async fn get_composition(&self, ehr_id: &str, composition_uid: &str) -> Result<ApiResponse> {
        self.compositions
            .get_composition(ehr_id, composition_uid, None)
            .await
    }

    pub async fn update_composition(
        &self,
        ehr_id: &str,
        composition_uid: &str,
        composition: Value,
        template_id: Option<String>,
    ) -> Result<ApiResponse> {
        self.compositions
            .update_composition(ehr_id, composition_uid, composition, template_id, None)
            .await
    }

    pub async fn delete_composition(
        &self,
        ehr_id: &str,
        preceding_version_uid: &str,
    ) -> Result<ApiResponse> {
        self.compositions
            .delete_composition(ehr_id, preceding_version_uid, None)
            .await
    }

    // EHRs

    pub async fn create_ehr(&self, ehr_status: Option<Value>) -> Result<ApiResponse> {
        self.ehrs.create_ehr(ehr_status, None).await
    }

    pub async fn get_ehr(&self, ehr_id: &str) -> Result<ApiResponse> {
        self.ehrs.get_ehr(ehr_id, None).await
    }

    pub async fn get_ehr_by_subject_id(
        &self,
        subject_id: &str,
        subject_namespace: &str,
    ) -> Result<ApiResponse> {
        self.ehrs
            .get_ehr_by_subject_id(subject_id, subject_namespace, None)
            .await
    }

    pub async fn get_ehr_status(&self, ehr_id: &str) -> Result<ApiResponse> {
        self.ehrs.get_ehr_status(ehr_id, None).await
    }

    pub async fn update_ehr_status(
        &self,
        ehr_id: &str,
        status_data: Value,
        version_uid: Option<String>,
    ) -> Result<ApiResponse> {
        self.ehrs
            .update_ehr_status(ehr_id, status_data, version_uid, None)
            .await
    }

    pub async fn delete_ehr(&self, ehr_id: &str) -> bool {
        self.ehrs.delete_ehr(ehr_id).await
    }

    // Queries

    pub async fn execute_adhoc_query(
        &self,
        query: &str,
        query_parameters: Option<Map<String, Value>>,
    ) -> Result<ApiResponse> {
        self.queries
            .execute_adhoc_query(query, query_parameters, None)
            .await
    }

    /// All EHR IDs known to the server as `{ehr_ids, total}`
    pub async fn list_ehr_ids(&self) -> Result<Value> {
        let result = self.execute_adhoc_query(LIST_EHRS_AQL, None).await?;
        let ehr_ids: Vec<Value> = result
            .body()
            .and_then(|body| body.get("rows"))
            .and_then(Value::as_array)
            .map(|rows| {
                rows.iter()
                    .filter_map(|row| row.as_array().and_then(|cells| cells.first()).cloned())
                    .collect()
            })
            .unwrap_or_default();

        info!("Listed {} EHRs", ehr_ids.len());
        Ok(json!({
            "total": ehr_ids.len(),
            "ehr_ids": ehr_ids
        }))
    }

    /// Raw AQL result set of every composition created from `template_id`
    pub async fn list_compositions(&self, template_id: &str) -> Result<ApiResponse> {
        let mut params = Map::new();
        params.insert("template_id".to_string(), Value::String(template_id.to_string()));

        let result = self
            .execute_adhoc_query(LIST_COMPOSITIONS_AQL, Some(params))
            .await?;
        let count = result
            .body()
            .and_then(|body| body.get("rows"))
            .and_then(Value::as_array)
            .map_or(0, Vec::len);
        info!("Listed {} compositions for template {}", count, template_id);
        Ok(result)
    }

    /// Format the composition operations will request unless overridden
    pub fn composition_format(&self) -> FormatKind {
        self.formats.composition_format(None)
    }
}
