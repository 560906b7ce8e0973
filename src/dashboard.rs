//! Read/write facade behind the staff dashboard.
//!
//! Reads can run in an explicit demo mode: when enabled and the store
//! fails, listings come back tagged `"mode": "demo"` with placeholder
//! records and a notice. With demo mode off, store failures surface.

use std::sync::Arc;

use chrono::{DateTime, TimeZone, Utc};
use serde::Serialize;
use serde_json::json;

use crate::models::{CallRecord, CallStatus, CallSummary, NewPatient, Patient, ValidationError};
use crate::store::{Store, StoreError};
use crate::voice::{CallError, CallInitiator, CallReference};

pub const DEFAULT_CALL_LIMIT: u32 = 10;
pub const MAX_CALL_LIMIT: u32 = 100;

const DEMO_NOTICE: &str =
    "Using demo data - connect your database to see real data";

/// A listing that says where its records came from.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "mode", rename_all = "lowercase")]
pub enum Listing<T> {
    Live { records: Vec<T> },
    Demo { records: Vec<T>, notice: String },
}

impl<T> Listing<T> {
    pub fn records(&self) -> &[T] {
        match self {
            Self::Live { records } | Self::Demo { records, .. } => records,
        }
    }

    pub fn is_demo(&self) -> bool {
        matches!(self, Self::Demo { .. })
    }
}

#[derive(Debug, thiserror::Error)]
pub enum DashboardError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("Patient not found")]
    PatientNotFound,
    #[error(transparent)]
    Call(#[from] CallError),
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Clamp a requested call-log page size to `1..=MAX_CALL_LIMIT`.
pub fn clamp_limit(requested: Option<u32>) -> u32 {
    requested
        .unwrap_or(DEFAULT_CALL_LIMIT)
        .clamp(1, MAX_CALL_LIMIT)
}

pub struct Dashboard {
    store: Arc<dyn Store>,
    initiator: Arc<CallInitiator>,
    demo_mode: bool,
}

impl Dashboard {
    pub fn new(store: Arc<dyn Store>, initiator: Arc<CallInitiator>, demo_mode: bool) -> Self {
        Self {
            store,
            initiator,
            demo_mode,
        }
    }

    /// All patients, newest first.
    pub async fn list_patients(&self) -> Result<Listing<Patient>, StoreError> {
        let result = self.store.list_patients().await;
        self.live_or_demo(result, demo_patients)
    }

    /// The most recent call records, newest first.
    pub async fn recent_calls(&self, limit: u32) -> Result<Listing<CallRecord>, StoreError> {
        let result = self.store.recent_calls(limit).await;
        self.live_or_demo(result, || {
            let mut calls = demo_calls();
            calls.truncate(limit as usize);
            calls
        })
    }

    fn live_or_demo<T>(
        &self,
        result: Result<Vec<T>, StoreError>,
        placeholders: impl FnOnce() -> Vec<T>,
    ) -> Result<Listing<T>, StoreError> {
        match result {
            Ok(records) => Ok(Listing::Live { records }),
            Err(e) if self.demo_mode => {
                tracing::warn!(error = %e, "Store unavailable, serving demo records");
                Ok(Listing::Demo {
                    records: placeholders(),
                    notice: DEMO_NOTICE.to_string(),
                })
            }
            Err(e) => Err(e),
        }
    }

    pub async fn create_patient(&self, input: NewPatient) -> Result<Patient, DashboardError> {
        let patient = self.store.insert_patient(input.validated()?).await?;
        tracing::info!(patient_id = "[REDACTED]", "Patient created");
        Ok(patient)
    }

    /// Look the patient up and start a call to them.
    pub async fn trigger_call(&self, patient_id: &str) -> Result<CallReference, DashboardError> {
        let patient = self
            .store
            .get_patient(patient_id)
            .await?
            .ok_or(DashboardError::PatientNotFound)?;
        Ok(self.initiator.place_call(&patient).await?)
    }

    pub async fn summary(&self) -> Result<CallSummary, StoreError> {
        self.store.call_status_counts().await
    }
}

// ═══════════════════════════════════════════════════════════
// Demo placeholders
// ═══════════════════════════════════════════════════════════

fn at(y: i32, mo: u32, d: u32, h: u32, mi: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(y, mo, d, h, mi, 0)
        .single()
        .unwrap_or_default()
}

fn demo_patient(n: u8, first: &str, last: &str, created_at: DateTime<Utc>) -> Patient {
    Patient {
        id: format!("demo-{n}"),
        first_name: first.into(),
        last_name: last.into(),
        phone_e164: format!("+123456789{}", n - 1),
        email: None,
        security_question: None,
        security_answer: None,
        created_at,
    }
}

pub fn demo_patients() -> Vec<Patient> {
    vec![
        demo_patient(1, "John", "Doe", at(2024, 1, 15, 10, 0)),
        demo_patient(2, "Jane", "Smith", at(2024, 1, 10, 10, 0)),
        demo_patient(3, "Bob", "Wilson", at(2024, 1, 8, 10, 0)),
    ]
}

pub fn demo_calls() -> Vec<CallRecord> {
    vec![
        CallRecord {
            id: "demo-1".into(),
            patient_id: "demo-1".into(),
            call_ref: None,
            started_at: at(2024, 1, 15, 10, 0),
            ended_at: Some(at(2024, 1, 15, 10, 5)),
            status: CallStatus::Completed,
            available_on_scheduled_date: Some(true),
            delivery_window: Some("Morning (9-12 PM)".into()),
            med_change: Some("None".into()),
            shipment_feedback: Some(json!({"rating": 5, "comments": "Satisfied with delivery"})),
            free_text_notes: Some("Patient confirmed medication pickup and adherence".into()),
            transcript: None,
            model_raw: None,
            meta: None,
        },
        CallRecord {
            id: "demo-2".into(),
            patient_id: "demo-2".into(),
            call_ref: None,
            started_at: at(2024, 1, 10, 14, 30),
            ended_at: Some(at(2024, 1, 10, 14, 35)),
            status: CallStatus::Completed,
            available_on_scheduled_date: Some(false),
            delivery_window: Some("Afternoon (1-5 PM)".into()),
            med_change: Some("Dosage increased".into()),
            shipment_feedback: Some(json!({"rating": 3, "comments": "Delivery was late"})),
            free_text_notes: Some("Patient requested earlier delivery window".into()),
            transcript: None,
            model_raw: None,
            meta: None,
        },
    ]
}
