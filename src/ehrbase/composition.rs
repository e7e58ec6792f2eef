//! Composition operations: create, retrieve, update and delete

use serde_json::Value;
use tracing::{debug, info};

use super::error::Result;
use super::format::{FormatConfig, FormatKind};
use super::http::{ApiResponse, EhrbaseHttpClient, EhrbaseRequest};

/// Template ID embedded as the prefix of the first flat-format key (`<template>/...`).
///
/// Not validated against the server's template registry.
pub fn extract_template_id(composition: &Value) -> Option<String> {
    let first_key = composition.as_object()?.keys().next()?;
    let (template_id, _) = first_key.split_once('/')?;
    Some(template_id.to_string())
}

/// Versioned-object UID of a composition UID (`obj::system::2` -> `obj`)
pub fn versioned_object_uid(composition_uid: &str) -> &str {
    composition_uid
        .split_once("::")
        .map_or(composition_uid, |(object_uid, _)| object_uid)
}

/// Version UID reported in a flat-format create/update response (`<template>/_uid`)
pub fn composition_uid(response: &Value) -> Option<&str> {
    response
        .as_object()?
        .iter()
        .find(|(key, _)| key.ends_with("/_uid"))
        .and_then(|(_, value)| value.as_str())
}

/// Client for composition operations within an EHR
#[derive(Debug, Clone)]
pub struct CompositionClient {
    http: EhrbaseHttpClient,
    formats: FormatConfig,
}

impl CompositionClient {
    pub fn new(http: EhrbaseHttpClient, formats: FormatConfig) -> Self {
        Self { http, formats }
    }

    fn resolve_template_id(composition: &Value, template_id: Option<String>) -> Option<String> {
        template_id.or_else(|| {
            let extracted = extract_template_id(composition);
            if let Some(id) = &extracted {
                info!("Extracted template ID from composition data: {}", id);
            }
            extracted
        })
    }

    pub async fn create_composition(
        &self,
        ehr_id: &str,
        composition: Value,
        template_id: Option<String>,
        format: Option<FormatKind>,
    ) -> Result<ApiResponse> {
        info!("Creating composition for EHR {}", ehr_id);
        let template_id = Self::resolve_template_id(&composition, template_id);

        self.http
            .send(
                EhrbaseRequest::post(format!("openehr/v1/ehr/{ehr_id}/composition"))
                    .format(self.formats.composition_format(format))
                    .json(Some(composition))
                    .template_id(template_id),
            )
            .await
    }

    pub async fn get_composition(
        &self,
        ehr_id: &str,
        composition_uid: &str,
        format: Option<FormatKind>,
    ) -> Result<ApiResponse> {
        info!("Retrieving composition {} from EHR {}", composition_uid, ehr_id);
        self.http
            .send(
                EhrbaseRequest::get(format!("openehr/v1/ehr/{ehr_id}/composition/{composition_uid}"))
                    .format(self.formats.composition_format(format)),
            )
            .await
    }

    /// Updates a composition, producing a new version.
    ///
    /// `composition_uid` may be a bare versioned-object UID or a full version UID;
    /// the path always uses the object UID and the given UID is sent as `If-Match`.
    pub async fn update_composition(
        &self,
        ehr_id: &str,
        composition_uid: &str,
        composition: Value,
        template_id: Option<String>,
        format: Option<FormatKind>,
    ) -> Result<ApiResponse> {
        info!("Updating composition {} in EHR {}", composition_uid, ehr_id);
        let template_id = Self::resolve_template_id(&composition, template_id);

        let object_uid = versioned_object_uid(composition_uid);
        if object_uid != composition_uid {
            debug!("Extracted versioned_object_uid: {}", object_uid);
        }

        self.http
            .send(
                EhrbaseRequest::put(format!("openehr/v1/ehr/{ehr_id}/composition/{object_uid}"))
                    .format(self.formats.composition_format(format))
                    .json(Some(composition))
                    .template_id(template_id)
                    .version_uid(Some(composition_uid.to_string())),
            )
            .await
    }

    /// Soft delete by preceding version UID
    pub async fn delete_composition(
        &self,
        ehr_id: &str,
        preceding_version_uid: &str,
        format: Option<FormatKind>,
    ) -> Result<ApiResponse> {
        info!("Deleting composition {} from EHR {}", preceding_version_uid, ehr_id);
        self.http
            .send(
                EhrbaseRequest::delete(format!(
                    "openehr/v1/ehr/{ehr_id}/composition/{preceding_version_uid}"
                ))
                .format(self.formats.composition_format(format)),
            )
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ehrbase::format::JsonFormat;
    use mockito::Matcher;
    use proptest::prelude::*;
    use serde_json::json;

    fn client(url: String, mode: JsonFormat) -> CompositionClient {
        CompositionClient::new(EhrbaseHttpClient::new(url, None), FormatConfig::with_mode(mode))
    }

    #[test]
    fn test_extract_template_id() {
        let composition = json!({
            "tid/x": 1,
            "other/y": 2
        });
        assert_eq!(extract_template_id(&composition), Some("tid".to_string()));

        assert_eq!(extract_template_id(&json!({"plain": 1})), None);
        assert_eq!(extract_template_id(&json!({})), None);
        assert_eq!(extract_template_id(&json!(["tid/x"])), None);
    }

    #[test]
    fn test_extract_template_id_uses_first_key_only() {
        let composition = json!({
            "ctx": "no separator",
            "tid/x": 1
        });
        assert_eq!(extract_template_id(&composition), None);
    }

    #[test]
    fn test_versioned_object_uid() {
        assert_eq!(versioned_object_uid("obj::1"), "obj");
        assert_eq!(versioned_object_uid("obj::local.ehrbase.org::3"), "obj");
        assert_eq!(versioned_object_uid("obj"), "obj");
    }

    #[test]
    fn test_composition_uid_from_flat_response() {
        let response = json!({
            "vital_signs_basic.v1/category|code": "433",
            "vital_signs_basic.v1/_uid": "abc::local.ehrbase.org::1"
        });
        assert_eq!(composition_uid(&response), Some("abc::local.ehrbase.org::1"));
        assert_eq!(composition_uid(&json!({"a": 1})), None);
    }

    proptest! {
        #[test]
        fn prop_object_uid_never_contains_separator(object in "[a-f0-9-]{1,36}", version in 1u32..1000) {
            let full = format!("{object}::local.ehrbase.org::{version}");
            prop_assert_eq!(versioned_object_uid(&full), object.as_str());
            prop_assert_eq!(versioned_object_uid(&object), object.as_str());
        }

        #[test]
        fn prop_template_id_is_prefix_before_slash(template in "[a-z_.0-9]{1,20}", rest in "[a-z/|_]{0,20}") {
            let composition = json!({ format!("{template}/{rest}"): 1 });
            prop_assert_eq!(extract_template_id(&composition), Some(template));
        }
    }

    #[tokio::test]
    async fn test_update_with_full_version_uid() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("PUT", "/openehr/v1/ehr/e1/composition/obj")
            .match_header("if-match", "obj::1")
            .match_query(Matcher::UrlEncoded("templateId".into(), "tid".into()))
            .with_status(200)
            .with_body(r#"{"tid/_uid": "obj::2"}"#)
            .create_async()
            .await;

        let result = client(server.url(), JsonFormat::WtFlat)
            .update_composition("e1", "obj::1", json!({"tid/x": 2}), None, None)
            .await
            .unwrap();

        assert_eq!(composition_uid(result.body().unwrap()), Some("obj::2"));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_update_with_bare_uid() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("PUT", "/openehr/v1/ehr/e1/composition/obj")
            .match_header("if-match", "obj")
            .match_query(Matcher::UrlEncoded("templateId".into(), "tid".into()))
            .with_status(200)
            .with_body("{}")
            .create_async()
            .await;

        client(server.url(), JsonFormat::WtFlat)
            .update_composition("e1", "obj", json!({"tid/x": 2}), None, None)
            .await
            .unwrap();
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_explicit_template_id_wins_over_extraction() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/openehr/v1/ehr/e1/composition")
            .match_query(Matcher::UrlEncoded("templateId".into(), "explicit".into()))
            .with_status(201)
            .with_body("{}")
            .create_async()
            .await;

        client(server.url(), JsonFormat::WtFlat)
            .create_composition("e1", json!({"tid/x": 1}), Some("explicit".to_string()), None)
            .await
            .unwrap();
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_composition_format_per_mode() {
        let cases = [
            (JsonFormat::Canonical, "application/json"),
            (JsonFormat::WtFlat, "application/openehr.wt.flat.schema+json"),
            (JsonFormat::WtStructured, "application/openehr.wt.structured.schema+json"),
        ];

        for (mode, accept) in cases {
            let mut server = mockito::Server::new_async().await;
            let mock = server
                .mock("GET", "/openehr/v1/ehr/e1/composition/obj::1")
                .match_header("accept", accept)
                .with_status(200)
                .with_body("{}")
                .create_async()
                .await;

            client(server.url(), mode)
                .get_composition("e1", "obj::1", None)
                .await
                .unwrap();
            mock.assert_async().await;
        }
    }

    #[tokio::test]
    async fn test_override_wins_over_mode() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/openehr/v1/ehr/e1/composition/obj")
            .match_header("accept", "application/json")
            .with_status(200)
            .with_body("{}")
            .create_async()
            .await;

        client(server.url(), JsonFormat::WtFlat)
            .get_composition("e1", "obj", Some(FormatKind::Json))
            .await
            .unwrap();
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_delete_uses_preceding_version_uid() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("DELETE", "/openehr/v1/ehr/e1/composition/obj::2")
            .with_status(204)
            .create_async()
            .await;

        let result = client(server.url(), JsonFormat::WtFlat)
            .delete_composition("e1", "obj::2", None)
            .await
            .unwrap();

        assert_eq!(result, ApiResponse::NoContent);
        mock.assert_async().await;
    }
}
