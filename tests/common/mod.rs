#![allow(dead_code)]

use openehr_mcp::{EhrbaseClient, EhrbaseConfig, JsonFormat, OpenEhrMcpServer};
use serde_json::{Value, json};

pub const TEMPLATE_ID: &str = "vital_signs_basic.v1";

/// Test utilities for integration testing
pub mod test_utils {
    use super::*;

    /// Client pointed at a mock EHRbase
    pub fn client(base_url: &str, json_format: JsonFormat) -> EhrbaseClient {
        client_with_default_ehr(base_url, json_format, None)
    }

    pub fn client_with_default_ehr(
        base_url: &str,
        json_format: JsonFormat,
        default_ehr_id: Option<&str>,
    ) -> EhrbaseClient {
        EhrbaseClient::new(&EhrbaseConfig {
            base_url: base_url.to_string(),
            default_ehr_id: default_ehr_id.map(str::to_string),
            json_format,
        })
    }

    pub fn server(base_url: &str, default_ehr_id: Option<&str>) -> OpenEhrMcpServer {
        OpenEhrMcpServer::new(client_with_default_ehr(
            base_url,
            JsonFormat::WtFlat,
            default_ehr_id,
        ))
    }

    /// Flat-format vital signs composition
    pub fn create_vital_signs_composition() -> Value {
        json!({
            "vital_signs_basic.v1/category|code": "433",
            "vital_signs_basic.v1/category|value": "event",
            "vital_signs_basic.v1/category|terminology": "openehr",
            "vital_signs_basic.v1/context/start_time": "2025-03-14T09:30:00Z",
            "vital_signs_basic.v1/context/setting|code": "238",
            "vital_signs_basic.v1/context/setting|value": "other care",
            "vital_signs_basic.v1/context/setting|terminology": "openehr",
            "vital_signs_basic.v1/vital_signs/blood_pressure/systolic|magnitude": 120,
            "vital_signs_basic.v1/vital_signs/blood_pressure/systolic|unit": "mm[Hg]",
            "vital_signs_basic.v1/vital_signs/blood_pressure/diastolic|magnitude": 80,
            "vital_signs_basic.v1/vital_signs/blood_pressure/diastolic|unit": "mm[Hg]",
            "vital_signs_basic.v1/vital_signs/pulse/rate|magnitude": 72,
            "vital_signs_basic.v1/vital_signs/pulse/rate|unit": "/min",
            "vital_signs_basic.v1/language|code": "en",
            "vital_signs_basic.v1/language|terminology": "ISO_639-1",
            "vital_signs_basic.v1/territory|code": "DE",
            "vital_signs_basic.v1/territory|terminology": "ISO_3166-1",
            "vital_signs_basic.v1/composer|name": "Dr. Test"
        })
    }

    /// Flat create/update response carrying the composition version UID
    pub fn composition_response(uid: &str) -> Value {
        let mut response = create_vital_signs_composition();
        response[format!("{TEMPLATE_ID}/_uid")] = json!(uid);
        response
    }

    pub fn create_ehr_status(uid: &str) -> Value {
        json!({
            "_type": "EHR_STATUS",
            "uid": {"_type": "OBJECT_VERSION_ID", "value": uid},
            "archetype_node_id": "openEHR-EHR-EHR_STATUS.generic.v1",
            "name": {"value": "EHR Status"},
            "subject": {"_type": "PARTY_SELF"},
            "is_modifiable": true,
            "is_queryable": true
        })
    }
}

pub mod assertions {
    /// Asserts a tool output is JSON and returns it
    pub fn assert_tool_success(output: &str) -> serde_json::Value {
        assert!(!output.starts_with("Error"), "tool failed: {output}");
        serde_json::from_str(output).expect("tool output should be JSON")
    }

    pub fn assert_tool_error(output: &str, expected_prefix: &str) {
        assert!(
            output.starts_with(expected_prefix),
            "expected '{expected_prefix}...', got: {output}"
        );
    }
}
