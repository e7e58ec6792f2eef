//! Core MCP server implementation

use std::future::Future;
use std::time::Instant;

use rmcp::{
    ErrorData as McpError, RoleServer, ServerHandler,
    handler::server::{
        router::{prompt::PromptRouter, tool::ToolRouter},
        wrapper::Parameters,
    },
    model::{
        GetPromptRequestParam, GetPromptResult, Implementation, ListPromptsResult,
        PaginatedRequestParam, PromptMessage, PromptMessageRole, ProtocolVersion,
        ServerCapabilities, ServerInfo,
    },
    prompt, prompt_handler, prompt_router,
    service::RequestContext,
    tool, tool_handler, tool_router,
};
use serde_json::Value;
use tracing::{error, info};

use crate::ehrbase::EhrbaseClient;
use crate::prompts::{self, VitalSignCaptureArgs};
use crate::tools::{
    self, CompositionCreateParams, CompositionDeleteParams, CompositionGetParams,
    CompositionUpdateParams, EhrBySubjectParams, EhrCreateParams, EhrDeleteParams, EhrIdParams,
    EhrStatusUpdateParams, QueryParams, TemplateIdParams, TemplateUploadParams,
};

const INSTRUCTIONS: &str = "openEHR MCP Server: manage EHRs, compositions and templates on an \
EHRbase server and run AQL queries. Tool results are JSON; failures start with 'Error:'.";

/// Renders a tool outcome as pretty JSON, or as an `Error: ...` string
pub fn render_tool_result(result: anyhow::Result<Value>) -> String {
    match result {
        Ok(value) => serde_json::to_string_pretty(&value)
            .unwrap_or_else(|e| format!("Error: failed to serialize result: {e}")),
        Err(e) => format!("Error: {e:#}"),
    }
}

/// MCP server exposing EHRbase operations as tools
#[derive(Clone)]
pub struct OpenEhrMcpServer {
    client: EhrbaseClient,
    tool_router: ToolRouter<Self>,
    prompt_router: PromptRouter<Self>,
}

impl OpenEhrMcpServer {
    pub fn new(client: EhrbaseClient) -> Self {
        Self {
            client,
            tool_router: Self::tool_router(),
            prompt_router: Self::prompt_router(),
        }
    }

    pub fn client(&self) -> &EhrbaseClient {
        &self.client
    }

    /// Names of every registered tool
    pub fn tool_names(&self) -> Vec<String> {
        self.tool_router
            .list_all()
            .into_iter()
            .map(|tool| tool.name.to_string())
            .collect()
    }

    pub fn prompt_names(&self) -> Vec<String> {
        self.prompt_router
            .list_all()
            .into_iter()
            .map(|prompt| prompt.name)
            .collect()
    }

    async fn run<F>(&self, tool: &'static str, call: F) -> String
    where
        F: Future<Output = anyhow::Result<Value>>,
    {
        info!("MCP Tool call: {}", tool);
        let start = Instant::now();
        let result = call.await;
        let elapsed = start.elapsed().as_secs_f64();

        match &result {
            Ok(_) => info!("{} completed in {:.2}s", tool, elapsed),
            Err(e) => error!("{} failed after {:.2}s: {:#}", tool, elapsed, e),
        }
        render_tool_result(result)
    }
}

#[tool_router]
impl OpenEhrMcpServer {
    #[tool(
        description = "List all available openEHR templates from the EHRbase server. Templates define the structure of clinical data compositions."
    )]
    pub async fn openehr_template_list(&self) -> String {
        self.run("openehr_template_list", tools::template_list(&self.client))
            .await
    }

    #[tool(
        description = "Retrieve an openEHR template by its ID. In web template modes the template is returned as a web template describing the structure required for valid compositions."
    )]
    pub async fn openehr_template_get(&self, Parameters(params): Parameters<TemplateIdParams>) -> String {
        self.run("openehr_template_get", tools::template_get(&self.client, params))
            .await
    }

    #[tool(
        description = "Generate an example composition for a template, in the configured composition format. Use it as the starting point for openehr_composition_create."
    )]
    pub async fn openehr_template_example_composition(
        &self,
        Parameters(params): Parameters<TemplateIdParams>,
    ) -> String {
        self.run(
            "openehr_template_example_composition",
            tools::template_example_composition(&self.client, params),
        )
        .await
    }

    #[tool(description = "Upload an operational template (OPT XML) to the EHRbase server.")]
    pub async fn openehr_template_upload(
        &self,
        Parameters(params): Parameters<TemplateUploadParams>,
    ) -> String {
        self.run("openehr_template_upload", tools::template_upload(&self.client, params))
            .await
    }

    #[tool(
        description = "Create a new EHR, optionally with an EHR_STATUS document. Returns the created EHR, or its ID when the server only sends a Location header."
    )]
    pub async fn openehr_ehr_create(&self, Parameters(params): Parameters<EhrCreateParams>) -> String {
        self.run("openehr_ehr_create", tools::ehr_create(&self.client, params))
            .await
    }

    #[tool(description = "Retrieve an EHR by its ID.")]
    pub async fn openehr_ehr_get(&self, Parameters(params): Parameters<EhrIdParams>) -> String {
        self.run("openehr_ehr_get", tools::ehr_get(&self.client, params))
            .await
    }

    #[tool(description = "List the IDs of all EHRs stored on the server.")]
    pub async fn openehr_ehr_list(&self) -> String {
        self.run("openehr_ehr_list", tools::ehr_list(&self.client)).await
    }

    #[tool(description = "Find the EHR of a subject by subject ID and namespace.")]
    pub async fn openehr_ehr_get_by_subject(
        &self,
        Parameters(params): Parameters<EhrBySubjectParams>,
    ) -> String {
        self.run("openehr_ehr_get_by_subject", tools::ehr_get_by_subject(&self.client, params))
            .await
    }

    #[tool(description = "Retrieve the EHR_STATUS of an EHR.")]
    pub async fn openehr_ehr_status_get(&self, Parameters(params): Parameters<EhrIdParams>) -> String {
        self.run("openehr_ehr_status_get", tools::ehr_status_get(&self.client, params))
            .await
    }

    #[tool(
        description = "Replace the EHR_STATUS of an EHR. Requires the current status version UID, given explicitly or embedded as uid.value in the document."
    )]
    pub async fn openehr_ehr_status_update(
        &self,
        Parameters(params): Parameters<EhrStatusUpdateParams>,
    ) -> String {
        self.run("openehr_ehr_status_update", tools::ehr_status_update(&self.client, params))
            .await
    }

    #[tool(
        description = "Permanently delete an EHR through the EHRbase admin API. Reports whether the deletion succeeded."
    )]
    pub async fn openehr_ehr_delete(&self, Parameters(params): Parameters<EhrDeleteParams>) -> String {
        self.run("openehr_ehr_delete", tools::ehr_delete(&self.client, params))
            .await
    }

    #[tool(
        description = "Create a composition in an EHR. The body must follow the configured composition format; the template ID is taken from the first flat key when not given."
    )]
    pub async fn openehr_composition_create(
        &self,
        Parameters(params): Parameters<CompositionCreateParams>,
    ) -> String {
        self.run("openehr_composition_create", tools::composition_create(&self.client, params))
            .await
    }

    #[tool(description = "Retrieve a composition by its UID.")]
    pub async fn openehr_composition_get(
        &self,
        Parameters(params): Parameters<CompositionGetParams>,
    ) -> String {
        self.run("openehr_composition_get", tools::composition_get(&self.client, params))
            .await
    }

    #[tool(
        description = "Update a composition, creating a new version. Pass the UID of the version being replaced; the response carries the new version UID."
    )]
    pub async fn openehr_composition_update(
        &self,
        Parameters(params): Parameters<CompositionUpdateParams>,
    ) -> String {
        self.run("openehr_composition_update", tools::composition_update(&self.client, params))
            .await
    }

    #[tool(description = "Delete a composition by the full UID of its latest version.")]
    pub async fn openehr_composition_delete(
        &self,
        Parameters(params): Parameters<CompositionDeleteParams>,
    ) -> String {
        self.run("openehr_composition_delete", tools::composition_delete(&self.client, params))
            .await
    }

    #[tool(description = "List all compositions created from a template, with their EHR IDs.")]
    pub async fn openehr_compositions_list(
        &self,
        Parameters(params): Parameters<TemplateIdParams>,
    ) -> String {
        self.run("openehr_compositions_list", tools::compositions_list(&self.client, params))
            .await
    }

    #[tool(
        description = "Execute an ad-hoc AQL query. Named parameters ($name in the query) are passed in query_parameters."
    )]
    pub async fn openehr_query_adhoc(&self, Parameters(params): Parameters<QueryParams>) -> String {
        self.run("openehr_query_adhoc", tools::query_adhoc(&self.client, params))
            .await
    }
}

#[prompt_router]
impl OpenEhrMcpServer {
    #[prompt(
        name = "vital_sign_capture",
        description = "Create a new composition for the given EHR using the latest template"
    )]
    pub async fn vital_sign_capture(
        &self,
        Parameters(args): Parameters<VitalSignCaptureArgs>,
    ) -> Result<GetPromptResult, McpError> {
        Ok(GetPromptResult {
            description: Some(prompts::VITAL_SIGN_CAPTURE_DESCRIPTION.to_string()),
            messages: vec![PromptMessage::new_text(
                PromptMessageRole::User,
                prompts::vital_sign_capture(&args.ehr_id),
            )],
        })
    }
}

#[tool_handler]
#[prompt_handler]
impl ServerHandler for OpenEhrMcpServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            protocol_version: ProtocolVersion::LATEST,
            capabilities: ServerCapabilities::builder()
                .enable_tools()
                .enable_prompts()
                .build(),
            server_info: Implementation::from_build_env(),
            instructions: Some(INSTRUCTIONS.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EhrbaseConfig;
    use anyhow::anyhow;
    use serde_json::json;

    fn create_test_server(url: &str, default_ehr_id: Option<&str>) -> OpenEhrMcpServer {
        OpenEhrMcpServer::new(EhrbaseClient::new(&EhrbaseConfig {
            base_url: url.to_string(),
            default_ehr_id: default_ehr_id.map(str::to_string),
            ..EhrbaseConfig::default()
        }))
    }

    #[test]
    fn test_server_info() {
        let server = create_test_server("http://localhost:8080/ehrbase/rest", None);
        let info = server.get_info();

        assert_eq!(info.protocol_version, ProtocolVersion::LATEST);
        assert!(info.capabilities.tools.is_some());
        assert!(info.capabilities.prompts.is_some());
        assert!(info.instructions.unwrap().contains("EHRbase"));
    }

    #[test]
    fn test_tools_list() {
        let server = create_test_server("http://localhost:8080/ehrbase/rest", None);
        let mut names = server.tool_names();
        names.sort();

        assert_eq!(
            names,
            vec![
                "openehr_composition_create",
                "openehr_composition_delete",
                "openehr_composition_get",
                "openehr_composition_update",
                "openehr_compositions_list",
                "openehr_ehr_create",
                "openehr_ehr_delete",
                "openehr_ehr_get",
                "openehr_ehr_get_by_subject",
                "openehr_ehr_list",
                "openehr_ehr_status_get",
                "openehr_ehr_status_update",
                "openehr_query_adhoc",
                "openehr_template_example_composition",
                "openehr_template_get",
                "openehr_template_list",
                "openehr_template_upload",
            ]
        );
        assert_eq!(server.prompt_names(), vec!["vital_sign_capture"]);
    }

    #[test]
    fn test_render_tool_result() {
        assert_eq!(
            render_tool_result(Ok(json!({"ehr_ids": [], "total": 0}))),
            "{\n  \"ehr_ids\": [],\n  \"total\": 0\n}"
        );

        let err = anyhow!("EHRbase returned 404").context("Failed to retrieve EHR e1");
        assert_eq!(
            render_tool_result(Err(err)),
            "Error: Failed to retrieve EHR e1: EHRbase returned 404"
        );
    }

    #[tokio::test]
    async fn test_tool_errors_use_prefix() {
        let server = create_test_server("http://127.0.0.1:1", None);

        let output = server
            .openehr_ehr_get(Parameters(EhrIdParams { ehr_id: None }))
            .await;
        assert_eq!(output, "Error: No EHR ID provided");

        let output = server
            .openehr_composition_create(Parameters(CompositionCreateParams {
                composition_data: json!("not json"),
                ehr_id: Some("e1".to_string()),
                template_id: None,
            }))
            .await;
        assert_eq!(
            output,
            "Error: composition_data must be a valid JSON string, received: not json"
        );

        let output = server.openehr_template_list().await;
        assert!(output.starts_with("Error: Failed to list templates: "));
    }

    #[tokio::test]
    async fn test_vital_sign_prompt() {
        let server = create_test_server("http://localhost", None);
        let result = server
            .vital_sign_capture(Parameters(VitalSignCaptureArgs {
                ehr_id: "ehr-9".to_string(),
            }))
            .await
            .unwrap();

        assert_eq!(result.messages.len(), 1);
        assert!(matches!(result.messages[0].role, PromptMessageRole::User));
    }

    #[test]
    fn test_prompt_listing_exposes_arguments() {
        let server = create_test_server("http://localhost", None);
        let prompts = server.prompt_router.list_all();
        let prompt = prompts
            .iter()
            .find(|prompt| prompt.name == "vital_sign_capture")
            .unwrap();

        assert!(prompt.description.as_deref().is_some_and(|d| !d.is_empty()));
        let arguments = prompt.arguments.as_ref().unwrap();
        assert!(arguments.iter().any(|argument| argument.name == "ehr_id"));
    }
}
