use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Outcome of a call attempt. Unknown values from the store are kept
/// verbatim rather than rejected.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum CallStatus {
    Completed,
    Abandoned,
    Other(String),
}

impl CallStatus {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Completed => "completed",
            Self::Abandoned => "abandoned",
            Self::Other(s) => s,
        }
    }
}

impl From<String> for CallStatus {
    fn from(s: String) -> Self {
        match s.as_str() {
            "completed" => Self::Completed,
            "abandoned" => Self::Abandoned,
            _ => Self::Other(s),
        }
    }
}

impl From<CallStatus> for String {
    fn from(status: CallStatus) -> Self {
        match status {
            CallStatus::Other(s) => s,
            known => known.as_str().to_string(),
        }
    }
}

impl std::fmt::Display for CallStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Shipment feedback captured during a call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShipmentFeedback {
    pub issue: String,
    pub note: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rating: Option<Value>,
}

/// One row of the append-only call log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CallRecord {
    pub id: String,
    pub patient_id: String,
    /// Voice-platform call id, the dedupe key for repeated webhook deliveries.
    #[serde(default)]
    pub call_ref: Option<String>,
    pub started_at: DateTime<Utc>,
    #[serde(default)]
    pub ended_at: Option<DateTime<Utc>>,
    pub status: CallStatus,
    #[serde(default)]
    pub available_on_scheduled_date: Option<bool>,
    #[serde(default)]
    pub delivery_window: Option<String>,
    #[serde(default)]
    pub med_change: Option<String>,
    #[serde(default)]
    pub shipment_feedback: Option<Value>,
    #[serde(default)]
    pub free_text_notes: Option<String>,
    #[serde(default)]
    pub transcript: Option<Value>,
    #[serde(default)]
    pub model_raw: Option<Value>,
    #[serde(default)]
    pub meta: Option<Value>,
}

/// Insert form for the call log. Only `patient_id` and `status` are
/// required; `started_at` defaults to the insert time.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NewCallRecord {
    pub patient_id: String,
    pub call_ref: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    pub ended_at: Option<DateTime<Utc>>,
    pub status: CallStatus,
    pub available_on_scheduled_date: Option<bool>,
    pub delivery_window: Option<String>,
    pub med_change: Option<String>,
    pub shipment_feedback: Option<Value>,
    pub free_text_notes: Option<String>,
    pub transcript: Option<Value>,
    pub model_raw: Option<Value>,
    pub meta: Option<Value>,
}

impl NewCallRecord {
    pub fn new(patient_id: impl Into<String>, status: CallStatus) -> Self {
        Self {
            patient_id: patient_id.into(),
            call_ref: None,
            started_at: None,
            ended_at: None,
            status,
            available_on_scheduled_date: None,
            delivery_window: None,
            med_change: None,
            shipment_feedback: None,
            free_text_notes: None,
            transcript: None,
            model_raw: None,
            meta: None,
        }
    }
}

/// Aggregate shown on the dashboard. One row per stored record, so a
/// deduplicated redelivery never moves these numbers.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallSummary {
    pub total: u64,
    pub completed: u64,
    pub abandoned: u64,
    pub other: u64,
}

impl CallSummary {
    pub fn record(&mut self, status: &CallStatus) {
        self.total += 1;
        match status {
            CallStatus::Completed => self.completed += 1,
            CallStatus::Abandoned => self.abandoned += 1,
            CallStatus::Other(_) => self.other += 1,
        }
    }
}
