//! Template operations: listing, retrieval, example generation and upload

use std::path::Path;

use tracing::info;

use super::error::Result;
use super::format::{FormatConfig, FormatKind};
use super::http::{ApiResponse, EhrbaseHttpClient, EhrbaseRequest};

const TEMPLATE_PATH: &str = "openehr/v1/definition/template/adl1.4";

/// Client for ADL 1.4 operational templates
#[derive(Debug, Clone)]
pub struct TemplateClient {
    http: EhrbaseHttpClient,
    formats: FormatConfig,
}

impl TemplateClient {
    pub fn new(http: EhrbaseHttpClient, formats: FormatConfig) -> Self {
        Self { http, formats }
    }

    pub async fn list_templates(&self, format: Option<FormatKind>) -> Result<ApiResponse> {
        info!("Listing all templates");
        self.http
            .send(EhrbaseRequest::get(TEMPLATE_PATH).format(self.formats.template_list_format(format)))
            .await
    }

    pub async fn get_template(
        &self,
        template_id: &str,
        format: Option<FormatKind>,
    ) -> Result<ApiResponse> {
        info!("Retrieving template {}", template_id);
        self.http
            .send(
                EhrbaseRequest::get(format!("{TEMPLATE_PATH}/{template_id}"))
                    .format(self.formats.template_format(format)),
            )
            .await
    }

    /// The example is a composition, so it follows the composition format
    pub async fn get_example_composition(
        &self,
        template_id: &str,
        format: Option<FormatKind>,
    ) -> Result<ApiResponse> {
        info!("Generating example composition for template {}", template_id);
        self.http
            .send(
                EhrbaseRequest::get(format!("{TEMPLATE_PATH}/{template_id}/example"))
                    .format(self.formats.composition_format(format)),
            )
            .await
    }

    /// Uploads an operational template given as raw XML
    pub async fn upload_template(&self, template_xml: impl Into<String>) -> Result<ApiResponse> {
        info!("Uploading template to EHRbase");
        self.http
            .send(
                EhrbaseRequest::post(TEMPLATE_PATH)
                    .format(FormatKind::Xml)
                    .raw(template_xml),
            )
            .await
    }

    pub async fn upload_template_file(&self, path: impl AsRef<Path>) -> Result<ApiResponse> {
        let path = path.as_ref();
        info!("Reading template from file: {}", path.display());
        let content = tokio::fs::read_to_string(path).await?;
        self.upload_template(content).await
    }
}
