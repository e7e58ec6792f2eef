//! EHR operations: creation, retrieval, status management and admin deletion

use serde_json::{Value, json};
use tracing::{error, info};

use super::error::{EhrbaseError, Result};
use super::format::{FormatConfig, FormatKind};
use super::http::{ApiResponse, EhrbaseHttpClient, EhrbaseRequest};

const EHR_PATH: &str = "openehr/v1/ehr";

/// Version UID embedded in an EHR status document (`uid.value`)
pub fn status_version_uid(status: &Value) -> Option<&str> {
    status.get("uid")?.get("value")?.as_str()
}

/// Minimal EHR_STATUS document whose subject is an external PERSON reference
pub fn subject_ehr_status(subject_id: &str, namespace: &str, scheme: &str) -> Value {
    json!({
        "_type": "EHR_STATUS",
        "archetype_node_id": "openEHR-EHR-EHR_STATUS.generic.v1",
        "name": {"value": "ehr status"},
        "subject": {
            "external_ref": {
                "id": {
                    "_type": "GENERIC_ID",
                    "value": subject_id,
                    "scheme": scheme
                },
                "namespace": namespace,
                "type": "PERSON"
            }
        },
        "is_modifiable": "true",
        "is_queryable": "true"
    })
}

/// EHR ID of a create response: `Location` header, else `ehr_id.value`, else a plain `ehr_id`
pub fn created_ehr_id(response: &ApiResponse) -> Option<String> {
    if let Some(id) = response.created_id() {
        return Some(id.to_string());
    }
    let ehr_id = response.body()?.get("ehr_id")?;
    ehr_id
        .get("value")
        .unwrap_or(ehr_id)
        .as_str()
        .map(str::to_string)
}

#[derive(Debug, Clone)]
pub struct EhrClient {
    http: EhrbaseHttpClient,
    formats: FormatConfig,
}

impl EhrClient {
    pub fn new(http: EhrbaseHttpClient, formats: FormatConfig) -> Self {
        Self { http, formats }
    }

    /// Creates an EHR, optionally seeded with an EHR_STATUS document.
    ///
    /// EHRbase usually answers 201 with only a `Location` header, in which case
    /// the new ID is available through [`ApiResponse::created_id`].
    pub async fn create_ehr(
        &self,
        ehr_status: Option<Value>,
        format: Option<FormatKind>,
    ) -> Result<ApiResponse> {
        info!("Creating new EHR");
        self.http
            .send(
                EhrbaseRequest::post(EHR_PATH)
                    .format(self.formats.ehr_format(format))
                    .json(ehr_status),
            )
            .await
    }

    pub async fn get_ehr(&self, ehr_id: &str, format: Option<FormatKind>) -> Result<ApiResponse> {
        info!("Retrieving EHR with ID {}", ehr_id);
        self.http
            .send(EhrbaseRequest::get(format!("{EHR_PATH}/{ehr_id}")).format(self.formats.ehr_format(format)))
            .await
    }

    pub async fn get_ehr_by_subject_id(
        &self,
        subject_id: &str,
        subject_namespace: &str,
        format: Option<FormatKind>,
    ) -> Result<ApiResponse> {
        if subject_id.is_empty() || subject_namespace.is_empty() {
            return Err(EhrbaseError::invalid_input(
                "Both subject_id and subject_namespace are required",
            ));
        }

        info!(
            "Getting EHR for subject {} in namespace {}",
            subject_id, subject_namespace
        );
        self.http
            .send(
                EhrbaseRequest::get(EHR_PATH)
                    .format(self.formats.ehr_format(format))
                    .query("subject_id", subject_id)
                    .query("subject_namespace", subject_namespace),
            )
            .await
    }

    pub async fn get_ehr_status(&self, ehr_id: &str, format: Option<FormatKind>) -> Result<ApiResponse> {
        info!("Retrieving status for EHR {}", ehr_id);
        self.http
            .send(
                EhrbaseRequest::get(format!("{EHR_PATH}/{ehr_id}/ehr_status"))
                    .format(self.formats.ehr_format(format)),
            )
            .await
    }

    /// Replaces the EHR status under optimistic concurrency.
    ///
    /// Without an explicit `version_uid` the document's own `uid.value` is used;
    /// if neither exists this fails with [`EhrbaseError::MissingVersion`] and no
    /// request is sent.
    pub async fn update_ehr_status(
        &self,
        ehr_id: &str,
        status_data: Value,
        version_uid: Option<String>,
        format: Option<FormatKind>,
    ) -> Result<ApiResponse> {
        info!("Updating status for EHR {}", ehr_id);

        let version_uid = match version_uid.filter(|v| !v.is_empty()) {
            Some(explicit) => explicit,
            None => {
                let extracted = status_version_uid(&status_data)
                    .filter(|v| !v.is_empty())
                    .ok_or(EhrbaseError::MissingVersion)?
                    .to_string();
                info!("Extracted version UID from status data: {}", extracted);
                extracted
            }
        };

        self.http
            .send(
                EhrbaseRequest::put(format!("{EHR_PATH}/{ehr_id}/ehr_status"))
                    .format(self.formats.ehr_format(format))
                    .json(Some(status_data))
                    .version_uid(Some(version_uid)),
            )
            .await
    }

    /// Deletes an EHR through the admin API. Requires admin privileges on the server.
    ///
    /// Failures are logged and reported as `false`.
    pub async fn delete_ehr(&self, ehr_id: &str) -> bool {
        info!("Deleting EHR with ID {} using admin API", ehr_id);
        match self
            .http
            .send(EhrbaseRequest::delete(format!("admin/ehr/{ehr_id}")))
            .await
        {
            Ok(_) => true,
            Err(e) => {
                error!("Failed to delete EHR {}: {}", ehr_id, e);
                false
            }
        }
    }
}
