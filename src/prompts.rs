//! Prompt templates offered to MCP hosts

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Arguments of the `vital_sign_capture` prompt
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct VitalSignCaptureArgs {
    /// EHR the captured vital signs are stored in
    pub ehr_id: String,
}

pub const VITAL_SIGN_CAPTURE_DESCRIPTION: &str =
    "Create a new composition for the given EHR using the latest template";

/// Guides the model from template selection to composition creation
pub fn vital_sign_capture(ehr_id: &str) -> String {
    format!(
        "You are a healthcare professional capturing vital signs for a patient represented by EHR ID {ehr_id}.

Please proceed as follows:

1. Using the openehr_template_list tool, choose the latest template that has vital signs in its name (abort if you don't find one)
2. If there are multiple, ask the user to choose one
3. Obtain an example composition for that template ID using the openehr_template_example_composition tool
4. Analyze the example composition to determine which clinical data is needed and prompt the user for it
5. Once you have all the necessary data (you might have to ask a couple of times), use the openehr_composition_create tool to store it in the EHR with ID {ehr_id}
"
    )
}
