//! Outbound calls through the voice platform.
//!
//! `initiator` turns a patient into a call request; `vapi` submits it.
//! The [`VoiceClient`] seam lets tests record requests without HTTP.

pub mod initiator;
pub mod vapi;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

pub use initiator::{CallError, CallInitiator};
pub use vapi::VapiClient;

/// Call type echoed back in webhook metadata.
pub const CALL_TYPE: &str = "pharmacy_delivery";

#[derive(Debug, thiserror::Error)]
pub enum VoiceError {
    #[error("Voice platform unreachable at {0}")]
    Connection(String),
    #[error("Voice platform request timed out after {0}s")]
    Timeout(u64),
    #[error("Voice platform request failed: {0}")]
    Transport(String),
    #[error("Voice platform error: {status} - {body}")]
    Rejected { status: u16, body: String },
    #[error("Unexpected voice platform response: {0}")]
    Decode(String),
}

impl VoiceError {
    /// Connection failures, timeouts and server-side errors may succeed on
    /// a second attempt. Client errors will not.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Connection(_) | Self::Timeout(_) => true,
            Self::Rejected { status, .. } => *status >= 500,
            Self::Transport(_) | Self::Decode(_) => false,
        }
    }
}

// ═══════════════════════════════════════════════════════════
// Wire types for POST /call
// ═══════════════════════════════════════════════════════════

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Customer {
    pub number: String,
}

/// Values substituted into the workflow template. Only the first name
/// of the patient is ever included.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TemplateVariables {
    pub pharmacy_name: String,
    pub patient_first_name: String,
    pub security_question_text: String,
    pub delivery_date: String,
    // Workflow state slots, filled in by the platform during the call.
    pub verified: String,
    pub delivery_window: String,
    pub med_change: String,
    pub last_shipment_issue: String,
    pub issue_note: String,
    #[serde(flatten)]
    pub hidden: HiddenVariables,
}

/// Echoed back in webhooks, never spoken.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HiddenVariables {
    #[serde(rename = "patientId")]
    pub patient_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowOverrides {
    pub variable_values: TemplateVariables,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CallMetadata {
    pub patient_id: String,
    pub call_type: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StartCallRequest {
    pub customer: Customer,
    pub phone_number_id: String,
    pub workflow_id: String,
    pub workflow_overrides: WorkflowOverrides,
    pub metadata: CallMetadata,
}

/// What the platform returns for a started call. Unknown fields ignored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CallReference {
    pub id: String,
    #[serde(default)]
    pub status: Option<String>,
}

#[async_trait]
pub trait VoiceClient: Send + Sync {
    async fn start_call(&self, request: &StartCallRequest) -> Result<CallReference, VoiceError>;
}
