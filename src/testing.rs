//! Shared fakes and helpers for unit tests.

use std::sync::Mutex;

use async_trait::async_trait;
use axum::Router;
use chrono::Utc;

use crate::access::{AuthError, AuthSession, AuthUser, IdentityProvider};
use crate::models::{CallRecord, CallSummary, NewCallRecord, NewPatient, Patient};
use crate::store::{CallInsert, Store, StoreError};
use crate::voice::{
    CallMetadata, CallReference, Customer, HiddenVariables, StartCallRequest, TemplateVariables,
    VoiceClient, VoiceError, WorkflowOverrides,
};

/// Serve `app` on an ephemeral localhost port and return its base URL.
pub async fn spawn_stub(app: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{addr}")
}

pub fn jane_patient() -> Patient {
    Patient {
        id: "p1".into(),
        first_name: "Jane".into(),
        last_name: "Doe".into(),
        phone_e164: "+15551230000".into(),
        email: Some("jane@example.com".into()),
        security_question: None,
        security_answer: None,
        created_at: Utc::now(),
    }
}

pub fn sample_call_request() -> StartCallRequest {
    StartCallRequest {
        customer: Customer {
            number: "+15551230000".into(),
        },
        phone_number_id: "pn-1".into(),
        workflow_id: "wf-1".into(),
        workflow_overrides: WorkflowOverrides {
            variable_values: TemplateVariables {
                pharmacy_name: "MedMe Pharmacy".into(),
                patient_first_name: "Jane".into(),
                security_question_text: "What is your last name?".into(),
                delivery_date: "2025-01-01".into(),
                verified: "false".into(),
                delivery_window: String::new(),
                med_change: String::new(),
                last_shipment_issue: String::new(),
                issue_note: String::new(),
                hidden: HiddenVariables {
                    patient_id: "p1".into(),
                },
            },
        },
        metadata: CallMetadata {
            patient_id: "p1".into(),
            call_type: "pharmacy_delivery".into(),
        },
    }
}

/// Voice client that records requests and answers with sequential ids.
#[derive(Default)]
pub struct RecordingVoice {
    sent: Mutex<Vec<StartCallRequest>>,
}

impl RecordingVoice {
    pub fn requests(&self) -> Vec<StartCallRequest> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl VoiceClient for RecordingVoice {
    async fn start_call(&self, request: &StartCallRequest) -> Result<CallReference, VoiceError> {
        let mut sent = self.sent.lock().unwrap();
        sent.push(request.clone());
        Ok(CallReference {
            id: format!("call-{}", sent.len()),
            status: Some("queued".into()),
        })
    }
}

/// Identity provider with one known user behind `good-token`.
pub struct FixedIdentity;

pub const GOOD_TOKEN: &str = "good-token";

#[async_trait]
impl IdentityProvider for FixedIdentity {
    async fn user_for_token(&self, access_token: &str) -> Result<AuthUser, AuthError> {
        if access_token == GOOD_TOKEN {
            Ok(AuthUser {
                id: "user-1".into(),
                email: Some("staff@pharmacy.test".into()),
            })
        } else {
            Err(AuthError::InvalidToken)
        }
    }

    async fn sign_in(&self, email: &str, password: &str) -> Result<AuthSession, AuthError> {
        if password == "hunter22" {
            Ok(AuthSession {
                access_token: GOOD_TOKEN.into(),
                expires_in: 3600,
                user: AuthUser {
                    id: "user-1".into(),
                    email: Some(email.into()),
                },
            })
        } else {
            Err(AuthError::InvalidCredentials)
        }
    }
}

/// Store whose every operation fails as if the backend were unreachable.
pub struct FailingStore;

fn unreachable_store() -> StoreError {
    StoreError::Transport("connection refused".into())
}

#[async_trait]
impl Store for FailingStore {
    fn backend(&self) -> &'static str {
        "failing"
    }

    async fn list_patients(&self) -> Result<Vec<Patient>, StoreError> {
        Err(unreachable_store())
    }

    async fn get_patient(&self, _id: &str) -> Result<Option<Patient>, StoreError> {
        Err(unreachable_store())
    }

    async fn insert_patient(&self, _patient: NewPatient) -> Result<Patient, StoreError> {
        Err(unreachable_store())
    }

    async fn recent_calls(&self, _limit: u32) -> Result<Vec<CallRecord>, StoreError> {
        Err(unreachable_store())
    }

    async fn insert_call(&self, _call: NewCallRecord) -> Result<CallInsert, StoreError> {
        Err(unreachable_store())
    }

    async fn call_status_counts(&self) -> Result<CallSummary, StoreError> {
        Err(unreachable_store())
    }
}
