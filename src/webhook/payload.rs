//! Wire shapes posted by the voice platform and their normalization.
//!
//! Each endpoint parses its body into a typed shape first. Where the
//! platform is known to send more than one layout, the alternatives are an
//! untagged enum with an explicit `Unrecognized` arm, and normalization
//! matches on all of them.

use chrono::{DateTime, Utc};
use serde::de::IgnoredAny;
use serde::Deserialize;
use serde_json::{Map, Value};

use crate::models::{CallStatus, NewCallRecord, ShipmentFeedback};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ShapeError {
    #[error("Request body is not valid JSON: {0}")]
    Malformed(String),
    #[error("Missing patientId")]
    MissingPatientId,
    #[error("Missing security answer")]
    MissingAnswer,
    #[error("Missing result object")]
    MissingResult,
}

/// Parse a webhook body. Bodies are taken as raw bytes so a bad payload is
/// always a 400, whatever the content type says.
pub fn parse<T: for<'de> Deserialize<'de>>(body: &[u8]) -> Result<T, ShapeError> {
    serde_json::from_slice(body).map_err(|e| ShapeError::Malformed(e.to_string()))
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

// ═══════════════════════════════════════════════════════════
// Shared call envelope: { call: { id, metadata: { patientId } } }
// ═══════════════════════════════════════════════════════════

#[derive(Debug, Default, Deserialize)]
pub struct CallEnvelope {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub metadata: Option<CallMetadata>,
}

#[derive(Debug, Default, Deserialize)]
pub struct CallMetadata {
    #[serde(default, rename = "patientId")]
    pub patient_id: Option<String>,
}

impl CallEnvelope {
    fn patient_id(&self) -> Option<String> {
        non_blank(self.metadata.as_ref().and_then(|m| m.patient_id.clone()))
    }
}

// ═══════════════════════════════════════════════════════════
// Identity check
// ═══════════════════════════════════════════════════════════

#[derive(Debug, Deserialize)]
pub struct IdentityPayload {
    #[serde(default)]
    pub call: Option<CallEnvelope>,
    #[serde(default)]
    pub message: Option<SpokenMessage>,
    #[serde(default, rename = "securityAnswer")]
    pub security_answer: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SpokenMessage {
    #[serde(default)]
    pub content: Option<String>,
}

#[derive(Debug, PartialEq, Eq)]
pub struct IdentityQuery {
    pub patient_id: String,
    pub answer: String,
}

impl IdentityPayload {
    /// The spoken answer comes from `message.content`, falling back to a
    /// top-level `securityAnswer`.
    pub fn normalize(self) -> Result<IdentityQuery, ShapeError> {
        let patient_id = self
            .call
            .as_ref()
            .and_then(CallEnvelope::patient_id)
            .ok_or(ShapeError::MissingPatientId)?;
        let answer = non_blank(self.message.and_then(|m| m.content))
            .or_else(|| non_blank(self.security_answer))
            .ok_or(ShapeError::MissingAnswer)?;
        Ok(IdentityQuery { patient_id, answer })
    }
}

// ═══════════════════════════════════════════════════════════
// Completion: answers collected into workflow variables
// ═══════════════════════════════════════════════════════════

#[derive(Debug, Deserialize)]
pub struct CompletionPayload {
    #[serde(default)]
    pub call: Option<CallEnvelope>,
    #[serde(default, rename = "variableValues")]
    pub variable_values: Option<CollectedAnswers>,
}

#[derive(Debug, Default, Deserialize)]
pub struct CollectedAnswers {
    #[serde(default)]
    pub delivery_window: Option<String>,
    #[serde(default)]
    pub med_change: Option<String>,
    #[serde(default)]
    pub last_shipment_issue: Option<String>,
    #[serde(default)]
    pub issue_note: Option<String>,
}

impl CompletionPayload {
    pub fn into_call_record(self, now: DateTime<Utc>) -> Result<NewCallRecord, ShapeError> {
        let call = self.call.unwrap_or_default();
        let patient_id = call.patient_id().ok_or(ShapeError::MissingPatientId)?;
        let answers = self.variable_values.unwrap_or_default();
        let issue_note = non_blank(answers.issue_note);

        let mut record = NewCallRecord::new(patient_id, CallStatus::Completed);
        record.call_ref = non_blank(call.id);
        record.started_at = Some(now);
        record.ended_at = Some(now);
        record.delivery_window = non_blank(answers.delivery_window);
        record.med_change = non_blank(answers.med_change);
        record.shipment_feedback = non_blank(answers.last_shipment_issue).map(|issue| {
            feedback_json(ShipmentFeedback {
                issue,
                note: issue_note.clone(),
                rating: None,
            })
        });
        record.free_text_notes = Some(issue_note.unwrap_or_default());
        Ok(record)
    }
}

fn feedback_json(feedback: ShipmentFeedback) -> Value {
    // A struct of strings and JSON values always serializes.
    serde_json::to_value(feedback).unwrap_or(Value::Null)
}

// ═══════════════════════════════════════════════════════════
// Stored result: { patientId, result: {...}, callId? }
// ═══════════════════════════════════════════════════════════

#[derive(Debug, Deserialize)]
pub struct StoredResultPayload {
    #[serde(default, rename = "patientId")]
    pub patient_id: Option<String>,
    #[serde(default)]
    pub result: Option<Map<String, Value>>,
    #[serde(default, rename = "callId")]
    pub call_id: Option<String>,
}

impl StoredResultPayload {
    pub fn into_call_record(self, now: DateTime<Utc>) -> Result<NewCallRecord, ShapeError> {
        let patient_id = non_blank(self.patient_id).ok_or(ShapeError::MissingPatientId)?;
        let result = self.result.ok_or(ShapeError::MissingResult)?;

        let issue_note = text(&result, "issue_note");
        let mut record = NewCallRecord::new(patient_id, CallStatus::Completed);
        record.call_ref = non_blank(self.call_id);
        record.started_at = Some(now);
        record.ended_at = Some(now);
        record.available_on_scheduled_date = flag(&result, "available_on_scheduled_date");
        record.delivery_window = text(&result, "delivery_window");
        record.med_change = text(&result, "med_change");
        record.shipment_feedback = text(&result, "last_shipment_issue").map(|issue| {
            feedback_json(ShipmentFeedback {
                issue,
                note: issue_note.clone(),
                rating: result.get("shipment_rating").filter(|v| !v.is_null()).cloned(),
            })
        });
        record.free_text_notes = Some(
            issue_note
                .or_else(|| text(&result, "notes"))
                .unwrap_or_default(),
        );
        record.model_raw = Some(Value::Object(result));
        Ok(record)
    }
}

// ═══════════════════════════════════════════════════════════
// Generic result: two accepted layouts for each of its parts
// ═══════════════════════════════════════════════════════════

#[derive(Debug, Deserialize)]
pub struct NestedVariables {
    #[serde(rename = "patientId")]
    pub patient_id: String,
}

/// Where the patient id sits in a generic result payload.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum PatientIdShape {
    /// `{ "variables": { "patientId": ... } }`
    Nested { variables: NestedVariables },
    /// `{ "patientId": ... }`
    Flat {
        #[serde(rename = "patientId")]
        patient_id: String,
    },
    Unrecognized(IgnoredAny),
}

/// Where the structured result sits in a generic result payload.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum ResultShape {
    /// `{ "resultJson": { ... } }`
    ResultJson {
        #[serde(rename = "resultJson")]
        result_json: Map<String, Value>,
    },
    /// `{ "result": { ... } }`
    Result { result: Map<String, Value> },
    Unrecognized(IgnoredAny),
}

/// A generic result payload after normalization.
#[derive(Debug, Clone, PartialEq)]
pub struct GenericResult {
    pub patient_id: String,
    pub result: Map<String, Value>,
    pub call_ref: Option<String>,
    pub transcript: Option<Value>,
    /// The payload exactly as delivered, kept for audit.
    pub raw: Value,
}

impl GenericResult {
    pub fn from_payload(payload: Value) -> Result<Self, ShapeError> {
        let patient_id = match PatientIdShape::deserialize(&payload) {
            Ok(PatientIdShape::Nested { variables }) => variables.patient_id,
            Ok(PatientIdShape::Flat { patient_id }) => patient_id,
            Ok(PatientIdShape::Unrecognized(_)) | Err(_) => String::new(),
        };
        let patient_id = non_blank(Some(patient_id)).ok_or(ShapeError::MissingPatientId)?;

        let result = match ResultShape::deserialize(&payload) {
            Ok(ResultShape::ResultJson { result_json }) => result_json,
            Ok(ResultShape::Result { result }) => result,
            Ok(ResultShape::Unrecognized(_)) | Err(_) => return Err(ShapeError::MissingResult),
        };

        let call_ref = payload
            .pointer("/call/id")
            .or_else(|| payload.get("callId"))
            .and_then(Value::as_str)
            .map(str::to_string);
        let transcript = payload.get("transcript").filter(|t| !t.is_null()).cloned();

        Ok(Self {
            patient_id,
            result,
            call_ref: non_blank(call_ref),
            transcript,
            raw: payload,
        })
    }

    /// `true` as a boolean or as the string the platform substitutes.
    pub fn verified(&self) -> bool {
        match self.result.get("verified") {
            Some(Value::Bool(b)) => *b,
            Some(Value::String(s)) => s.trim().eq_ignore_ascii_case("true"),
            _ => false,
        }
    }

    pub fn status(&self) -> CallStatus {
        if self.verified() {
            CallStatus::Completed
        } else {
            CallStatus::Abandoned
        }
    }

    pub fn into_call_record(self) -> NewCallRecord {
        let mut record = NewCallRecord::new(self.patient_id.clone(), self.status());
        record.call_ref = self.call_ref;
        record.available_on_scheduled_date = flag(&self.result, "available_on_scheduled_date");
        record.delivery_window = text(&self.result, "delivery_window");
        record.med_change = text(&self.result, "med_change");
        record.shipment_feedback = self
            .result
            .get("shipment_feedback")
            .filter(|v| !v.is_null())
            .cloned();
        record.free_text_notes = Some(text(&self.result, "free_text_notes").unwrap_or_default());
        record.transcript = self.transcript;
        record.model_raw = Some(self.raw);
        record
    }
}

/// Text answer from a result object. Numbers and booleans are rendered;
/// blank strings count as absent.
fn text(result: &Map<String, Value>, key: &str) -> Option<String> {
    match result.get(key)? {
        Value::String(s) => non_blank(Some(s.trim().to_string())),
        Value::Bool(b) => Some(b.to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn flag(result: &Map<String, Value>, key: &str) -> Option<bool> {
    match result.get(key)? {
        Value::Bool(b) => Some(*b),
        Value::String(s) if s.eq_ignore_ascii_case("true") => Some(true),
        Value::String(s) if s.eq_ignore_ascii_case("false") => Some(false),
        _ => None,
    }
}
