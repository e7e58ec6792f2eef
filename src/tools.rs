//! MCP tool implementations
//!
//! Parameter types derive `JsonSchema` so the rmcp `#[tool]` macros can
//! advertise them. Each tool is a plain async function over an
//! [`EhrbaseClient`] returning JSON; rendering to the wire string (and the
//! `Error: ...` convention) happens in [`crate::server`].

use anyhow::{Context, Result, anyhow, bail};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::info;

use crate::ehrbase::EhrbaseClient;

/// Input parameters for tools addressing a template
#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct TemplateIdParams {
    /// The unique identifier of the openEHR template
    pub template_id: String,
}

/// Input parameters for template upload
#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct TemplateUploadParams {
    /// Operational template (OPT, ADL 1.4) as raw XML
    pub template_xml: String,
}

/// Input parameters for EHR creation
#[derive(Debug, Default, Serialize, Deserialize, JsonSchema)]
pub struct EhrCreateParams {
    /// Optional EHR_STATUS document, as a JSON object or a JSON string
    pub ehr_status: Option<Value>,
}

/// Input parameters for tools addressing one EHR
#[derive(Debug, Default, Serialize, Deserialize, JsonSchema)]
pub struct EhrIdParams {
    /// EHR ID; the configured default EHR is used when omitted
    pub ehr_id: Option<String>,
}

/// Input parameters for EHR deletion
#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct EhrDeleteParams {
    /// The EHR to delete; never defaulted
    pub ehr_id: String,
}

/// Input parameters for EHR lookup by subject
#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct EhrBySubjectParams {
    /// The subject (patient) identifier
    pub subject_id: String,
    /// The namespace the subject identifier belongs to
    pub subject_namespace: String,
}

/// Input parameters for EHR status update
#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct EhrStatusUpdateParams {
    /// The new EHR_STATUS document, as a JSON object or a JSON string
    pub status_data: Value,
    /// Current status version UID; read from `status_data.uid.value` when omitted
    pub version_uid: Option<String>,
    /// EHR ID; the configured default EHR is used when omitted
    pub ehr_id: Option<String>,
}

/// Input parameters for composition creation
#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct CompositionCreateParams {
    /// Composition in the configured format, as a JSON object or a JSON string
    pub composition_data: Value,
    /// EHR ID; the configured default EHR is used when omitted
    pub ehr_id: Option<String>,
    /// Template ID; derived from the first flat-format key when omitted
    pub template_id: Option<String>,
}

/// Input parameters for composition retrieval
#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct CompositionGetParams {
    /// Versioned-object UID or full version UID of the composition
    pub composition_uid: String,
    /// EHR ID; the configured default EHR is used when omitted
    pub ehr_id: Option<String>,
}

/// Input parameters for composition update
#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct CompositionUpdateParams {
    /// UID of the version being replaced (`<object-uid>::<system>::<version>`)
    pub composition_uid: String,
    /// Updated composition, as a JSON object or a JSON string
    pub composition_data: Value,
    /// EHR ID; the configured default EHR is used when omitted
    pub ehr_id: Option<String>,
    /// Template ID; derived from the first flat-format key when omitted
    pub template_id: Option<String>,
}

/// Input parameters for composition deletion
#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct CompositionDeleteParams {
    /// Full version UID of the latest composition version
    pub preceding_version_uid: String,
    /// EHR ID; the configured default EHR is used when omitted
    pub ehr_id: Option<String>,
}

/// Input parameters for ad-hoc AQL
#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct QueryParams {
    /// The AQL query string
    pub query: String,
    /// Named query parameters, as a JSON object or a JSON string
    pub query_parameters: Option<Value>,
}

/// Accepts either a JSON value or a string containing JSON.
///
/// `null` and empty strings count as absent.
pub fn parse_json_argument(name: &str, value: Option<Value>) -> Result<Option<Value>> {
    match value {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(raw)) if raw.trim().is_empty() => Ok(None),
        Some(Value::String(raw)) => serde_json::from_str(&raw)
            .map(Some)
            .map_err(|_| anyhow!("{name} must be a valid JSON string, received: {raw}")),
        Some(other) => Ok(Some(other)),
    }
}

fn required_json(name: &str, value: Value, missing: &str) -> Result<Value> {
    let parsed = parse_json_argument(name, Some(value))?;
    match parsed {
        Some(Value::Object(map)) if map.is_empty() => bail!("{missing}"),
        Some(value) => Ok(value),
        None => bail!("{missing}"),
    }
}

fn required_str<'a>(value: &'a str, missing: &str) -> Result<&'a str> {
    let value = value.trim();
    if value.is_empty() {
        bail!("{missing}");
    }
    Ok(value)
}

/// Explicit EHR ID, else the configured default
pub fn resolve_ehr_id(client: &EhrbaseClient, ehr_id: Option<String>) -> Result<String> {
    ehr_id
        .filter(|id| !id.trim().is_empty())
        .or_else(|| client.default_ehr_id().map(str::to_string))
        .ok_or_else(|| anyhow!("No EHR ID provided"))
}

pub async fn template_list(client: &EhrbaseClient) -> Result<Value> {
    let templates = client
        .get_template_list()
        .await
        .context("Failed to list templates")?
        .into_value();

    if let Some(templates) = templates.as_array() {
        info!("Returning template list with {} templates", templates.len());
    }
    Ok(templates)
}

pub async fn template_get(client: &EhrbaseClient, params: TemplateIdParams) -> Result<Value> {
    let template_id = required_str(&params.template_id, "No template ID provided")?;
    let template = client
        .get_template(template_id)
        .await
        .with_context(|| format!("Failed to retrieve template {template_id}"))?;
    Ok(template.into_value())
}

pub async fn template_example_composition(
    client: &EhrbaseClient,
    params: TemplateIdParams,
) -> Result<Value> {
    let template_id = required_str(&params.template_id, "No template ID provided")?;
    let example = client
        .get_template_example(template_id)
        .await
        .with_context(|| format!("Failed to generate example for template {template_id}"))?;
    Ok(example.into_value())
}

pub async fn template_upload(client: &EhrbaseClient, params: TemplateUploadParams) -> Result<Value> {
    required_str(&params.template_xml, "No template XML provided")?;
    let uploaded = client
        .upload_template(params.template_xml)
        .await
        .context("Failed to upload template")?;
    Ok(uploaded.into_value())
}

pub async fn ehr_create(client: &EhrbaseClient, params: EhrCreateParams) -> Result<Value> {
    let ehr_status = parse_json_argument("ehr_status", params.ehr_status)?;
    let created = client
        .create_ehr(ehr_status)
        .await
        .context("Failed to create EHR")?;

    if let Some(ehr_id) = created.created_id() {
        info!("Created EHR {}", ehr_id);
    }
    Ok(created.into_value())
}

pub async fn ehr_get(client: &EhrbaseClient, params: EhrIdParams) -> Result<Value> {
    let ehr_id = resolve_ehr_id(client, params.ehr_id)?;
    let ehr = client
        .get_ehr(&ehr_id)
        .await
        .with_context(|| format!("Failed to retrieve EHR {ehr_id}"))?;
    Ok(ehr.into_value())
}

pub async fn ehr_list(client: &EhrbaseClient) -> Result<Value> {
    client.list_ehr_ids().await.context("Failed to list EHRs")
}

pub async fn ehr_get_by_subject(client: &EhrbaseClient, params: EhrBySubjectParams) -> Result<Value> {
    if params.subject_id.trim().is_empty() || params.subject_namespace.trim().is_empty() {
        bail!("Both subject_id and subject_namespace are required");
    }

    let ehr = client
        .get_ehr_by_subject_id(&params.subject_id, &params.subject_namespace)
        .await
        .context("Failed to retrieve EHR by subject")?;
    Ok(ehr.into_value())
}

pub async fn ehr_status_get(client: &EhrbaseClient, params: EhrIdParams) -> Result<Value> {
    let ehr_id = resolve_ehr_id(client, params.ehr_id)?;
    let status = client
        .get_ehr_status(&ehr_id)
        .await
        .with_context(|| format!("Failed to retrieve status of EHR {ehr_id}"))?;
    Ok(status.into_value())
}

pub async fn ehr_status_update(client: &EhrbaseClient, params: EhrStatusUpdateParams) -> Result<Value> {
    let ehr_id = resolve_ehr_id(client, params.ehr_id)?;
    let status_data = required_json("status_data", params.status_data, "No EHR status data provided")?;

    let updated = client
        .update_ehr_status(&ehr_id, status_data, params.version_uid)
        .await
        .with_context(|| format!("Failed to update status of EHR {ehr_id}"))?;
    Ok(updated.into_value())
}

/// Admin deletion; the outcome is reported in the payload, never as an error
pub async fn ehr_delete(client: &EhrbaseClient, params: EhrDeleteParams) -> Result<Value> {
    let ehr_id = required_str(&params.ehr_id, "No EHR ID provided")?;

    let deleted = client.delete_ehr(ehr_id).await;
    Ok(json!({
        "ehr_id": ehr_id,
        "deleted": deleted
    }))
}

pub async fn composition_create(
    client: &EhrbaseClient,
    params: CompositionCreateParams,
) -> Result<Value> {
    let composition = required_json(
        "composition_data",
        params.composition_data,
        "No composition data provided",
    )?;
    let ehr_id = resolve_ehr_id(client, params.ehr_id)?;

    let created = client
        .create_composition(&ehr_id, composition, params.template_id)
        .await
        .with_context(|| format!("Failed to create composition in EHR {ehr_id}"))?;
    Ok(created.into_value())
}

pub async fn composition_get(client: &EhrbaseClient, params: CompositionGetParams) -> Result<Value> {
    let composition_uid = required_str(&params.composition_uid, "No composition UID provided")?;
    let ehr_id = resolve_ehr_id(client, params.ehr_id)?;

    let composition = client
        .get_composition(&ehr_id, composition_uid)
        .await
        .with_context(|| format!("Failed to retrieve composition {composition_uid}"))?;
    Ok(composition.into_value())
}

pub async fn composition_update(
    client: &EhrbaseClient,
    params: CompositionUpdateParams,
) -> Result<Value> {
    let composition_uid = required_str(&params.composition_uid, "No composition UID provided")?;
    let composition = required_json(
        "composition_data",
        params.composition_data,
        "No composition data provided",
    )?;
    let ehr_id = resolve_ehr_id(client, params.ehr_id)?;

    let updated = client
        .update_composition(&ehr_id, composition_uid, composition, params.template_id)
        .await
        .with_context(|| format!("Failed to update composition {composition_uid}"))?;
    Ok(updated.into_value())
}

pub async fn composition_delete(
    client: &EhrbaseClient,
    params: CompositionDeleteParams,
) -> Result<Value> {
    let version_uid = required_str(
        &params.preceding_version_uid,
        "No composition version UID provided",
    )?;
    let ehr_id = resolve_ehr_id(client, params.ehr_id)?;

    let deleted = client
        .delete_composition(&ehr_id, version_uid)
        .await
        .with_context(|| format!("Failed to delete composition {version_uid}"))?;
    Ok(deleted.into_value())
}

pub async fn compositions_list(client: &EhrbaseClient, params: TemplateIdParams) -> Result<Value> {
    let template_id = required_str(&params.template_id, "No template ID provided")?;
    let compositions = client
        .list_compositions(template_id)
        .await
        .with_context(|| format!("Failed to list compositions for template {template_id}"))?;
    Ok(compositions.into_value())
}

pub async fn query_adhoc(client: &EhrbaseClient, params: QueryParams) -> Result<Value> {
    let query = required_str(&params.query, "No query provided")?;
    let query_parameters = match parse_json_argument("query_parameters", params.query_parameters)? {
        None => None,
        Some(Value::Object(map)) => Some(map),
        Some(other) => bail!("query_parameters must be a JSON object, received: {other}"),
    };

    let result = client
        .execute_adhoc_query(query, query_parameters)
        .await
        .context("Failed to execute query")?;
    Ok(result.into_value())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EhrbaseConfig;
    use crate::ehrbase::JsonFormat;
    use mockito::Matcher;

    fn client(url: String, default_ehr_id: Option<&str>) -> EhrbaseClient {
        EhrbaseClient::new(&EhrbaseConfig {
            base_url: url,
            default_ehr_id: default_ehr_id.map(str::to_string),
            json_format: JsonFormat::WtFlat,
        })
    }

    #[test]
    fn test_parse_json_argument_accepts_object_or_string() {
        let object = json!({"tid/x": 1});
        assert_eq!(
            parse_json_argument("composition_data", Some(object.clone())).unwrap(),
            Some(object.clone())
        );
        assert_eq!(
            parse_json_argument("composition_data", Some(json!(r#"{"tid/x": 1}"#))).unwrap(),
            Some(object)
        );
        assert_eq!(parse_json_argument("x", None).unwrap(), None);
        assert_eq!(parse_json_argument("x", Some(Value::Null)).unwrap(), None);
        assert_eq!(parse_json_argument("x", Some(json!("  "))).unwrap(), None);
    }

    #[test]
    fn test_parse_json_argument_rejects_malformed_string() {
        let err = parse_json_argument("composition_data", Some(json!("{not json"))).unwrap_err();
        assert_eq!(
            err.to_string(),
            "composition_data must be a valid JSON string, received: {not json"
        );
    }

    #[test]
    fn test_resolve_ehr_id_falls_back_to_default() {
        let with_default = client("http://localhost".to_string(), Some("default-ehr"));
        assert_eq!(resolve_ehr_id(&with_default, None).unwrap(), "default-ehr");
        assert_eq!(resolve_ehr_id(&with_default, Some(String::new())).unwrap(), "default-ehr");
        assert_eq!(resolve_ehr_id(&with_default, Some("e1".to_string())).unwrap(), "e1");

        let without_default = client("http://localhost".to_string(), None);
        let err = resolve_ehr_id(&without_default, None).unwrap_err();
        assert_eq!(err.to_string(), "No EHR ID provided");
    }

    #[tokio::test]
    async fn test_local_validation_happens_before_network() {
        // Nothing listens here, so any request would surface as a transport error
        let client = client("http://127.0.0.1:1".to_string(), None);

        let err = composition_create(
            &client,
            CompositionCreateParams {
                composition_data: json!("{broken"),
                ehr_id: Some("e1".to_string()),
                template_id: None,
            },
        )
        .await
        .unwrap_err();
        assert!(err.to_string().starts_with("composition_data must be a valid JSON string"));

        let err = composition_get(
            &client,
            CompositionGetParams {
                composition_uid: "obj::1".to_string(),
                ehr_id: None,
            },
        )
        .await
        .unwrap_err();
        assert_eq!(err.to_string(), "No EHR ID provided");

        let err = composition_delete(
            &client,
            CompositionDeleteParams {
                preceding_version_uid: " ".to_string(),
                ehr_id: Some("e1".to_string()),
            },
        )
        .await
        .unwrap_err();
        assert_eq!(err.to_string(), "No composition version UID provided");

        let err = query_adhoc(
            &client,
            QueryParams {
                query: "SELECT 1".to_string(),
                query_parameters: Some(json!([1, 2])),
            },
        )
        .await
        .unwrap_err();
        assert!(err.to_string().starts_with("query_parameters must be a JSON object"));
    }

    #[tokio::test]
    async fn test_composition_create_accepts_json_string() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/openehr/v1/ehr/default-ehr/composition")
            .match_query(Matcher::UrlEncoded("templateId".into(), "tid".into()))
            .match_body(Matcher::Json(json!({"tid/x": 1})))
            .with_status(201)
            .with_body(r#"{"tid/_uid": "obj::local::1"}"#)
            .create_async()
            .await;

        let created = composition_create(
            &client(server.url(), Some("default-ehr")),
            CompositionCreateParams {
                composition_data: json!(r#"{"tid/x": 1}"#),
                ehr_id: None,
                template_id: None,
            },
        )
        .await
        .unwrap();

        assert_eq!(created["tid/_uid"], "obj::local::1");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_ehr_delete_reports_failure_in_payload() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("DELETE", "/admin/ehr/missing")
            .with_status(404)
            .create_async()
            .await;

        let result = ehr_delete(
            &client(server.url(), None),
            EhrDeleteParams {
                ehr_id: "missing".to_string(),
            },
        )
        .await
        .unwrap();

        assert_eq!(result, json!({"ehr_id": "missing", "deleted": false}));
    }

    #[tokio::test]
    async fn test_remote_failure_keeps_context() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/openehr/v1/ehr/unknown")
            .with_status(404)
            .with_body("EHR not found")
            .create_async()
            .await;

        let err = ehr_get(
            &client(server.url(), None),
            EhrIdParams {
                ehr_id: Some("unknown".to_string()),
            },
        )
        .await
        .unwrap_err();

        let message = format!("{err:#}");
        assert!(message.starts_with("Failed to retrieve EHR unknown: "));
        assert!(message.contains("404"));
        assert!(message.contains("EHR not found"));
    }
}
