use std::time::Duration;

use async_trait::async_trait;
use reqwest::{RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;

use super::{CallInsert, Store, StoreError};
use crate::models::{CallRecord, CallStatus, CallSummary, NewCallRecord, NewPatient, Patient};

const REQUEST_TIMEOUT_SECS: u64 = 10;

/// Postgres `invalid_text_representation`, e.g. a non-UUID compared
/// against a uuid key column.
const INVALID_TEXT_REPRESENTATION: &str = "22P02";

/// Hosted Postgres reached through its REST gateway (`/rest/v1/<table>`),
/// authenticated with the service-role key. Server-side only: the key
/// bypasses row-level security.
pub struct RestStore {
    base_url: String,
    service_key: String,
    client: reqwest::Client,
}

#[derive(Deserialize)]
struct IdRow {
    id: String,
}

#[derive(Deserialize)]
struct StatusRow {
    status: String,
}

/// Error body returned by the gateway on a rejected query.
#[derive(Deserialize)]
struct GatewayError {
    #[serde(default)]
    code: Option<String>,
}

/// Whether a 400 says the filter value cannot be a key of the column at all.
fn is_malformed_key(body: &str) -> bool {
    serde_json::from_str::<GatewayError>(body)
        .ok()
        .and_then(|e| e.code)
        .is_some_and(|code| code == INVALID_TEXT_REPRESENTATION)
}

impl RestStore {
    pub fn new(base_url: &str, service_key: &str) -> Result<Self, StoreError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .map_err(|e| StoreError::Transport(e.to_string()))?;
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            service_key: service_key.to_string(),
            client,
        })
    }

    fn table(&self, name: &str) -> String {
        format!("{}/rest/v1/{name}", self.base_url)
    }

    fn authed(&self, builder: RequestBuilder) -> RequestBuilder {
        builder
            .header("apikey", &self.service_key)
            .bearer_auth(&self.service_key)
    }

    async fn send(&self, builder: RequestBuilder) -> Result<Response, StoreError> {
        self.authed(builder)
            .send()
            .await
            .map_err(|e| StoreError::Transport(e.without_url().to_string()))
    }

    async fn find_call_by_ref(&self, call_ref: &str) -> Result<Option<String>, StoreError> {
        let req = self.client.get(self.table("call_log")).query(&[
            ("select", "id".to_string()),
            ("call_ref", format!("eq.{call_ref}")),
            ("limit", "1".to_string()),
        ]);
        let rows: Vec<IdRow> = read_json(self.send(req).await?).await?;
        Ok(rows.into_iter().next().map(|row| row.id))
    }
}

async fn read_json<T: DeserializeOwned>(response: Response) -> Result<T, StoreError> {
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(StoreError::Upstream {
            status: status.as_u16(),
            body,
        });
    }
    response
        .json::<T>()
        .await
        .map_err(|e| StoreError::Decode(e.to_string()))
}

/// Inserts return the written rows; exactly one is expected.
fn single<T>(rows: Vec<T>) -> Result<T, StoreError> {
    rows.into_iter()
        .next()
        .ok_or_else(|| StoreError::Decode("insert returned no rows".into()))
}

#[async_trait]
impl Store for RestStore {
    fn backend(&self) -> &'static str {
        "hosted"
    }

    async fn list_patients(&self) -> Result<Vec<Patient>, StoreError> {
        let req = self
            .client
            .get(self.table("patients"))
            .query(&[("select", "*"), ("order", "created_at.desc")]);
        read_json(self.send(req).await?).await
    }

    async fn get_patient(&self, id: &str) -> Result<Option<Patient>, StoreError> {
        let req = self.client.get(self.table("patients")).query(&[
            ("select", "*".to_string()),
            ("id", format!("eq.{id}")),
            ("limit", "1".to_string()),
        ]);
        let response = self.send(req).await?;

        // An id that is not even a valid key matches no patient.
        if response.status() == StatusCode::BAD_REQUEST {
            let body = response.text().await.unwrap_or_default();
            if is_malformed_key(&body) {
                return Ok(None);
            }
            return Err(StoreError::Upstream { status: 400, body });
        }

        let rows: Vec<Patient> = read_json(response).await?;
        Ok(rows.into_iter().next())
    }

    async fn insert_patient(&self, patient: NewPatient) -> Result<Patient, StoreError> {
        let req = self
            .client
            .post(self.table("patients"))
            .header("Prefer", "return=representation")
            .json(&[patient]);
        single(read_json(self.send(req).await?).await?)
    }

    async fn recent_calls(&self, limit: u32) -> Result<Vec<CallRecord>, StoreError> {
        let req = self.client.get(self.table("call_log")).query(&[
            ("select", "*".to_string()),
            ("order", "started_at.desc".to_string()),
            ("limit", limit.to_string()),
        ]);
        read_json(self.send(req).await?).await
    }

    async fn insert_call(&self, call: NewCallRecord) -> Result<CallInsert, StoreError> {
        if let Some(call_ref) = &call.call_ref {
            if let Some(existing_id) = self.find_call_by_ref(call_ref).await? {
                return Ok(CallInsert::Duplicate { existing_id });
            }
        }

        let req = self
            .client
            .post(self.table("call_log"))
            .header("Prefer", "return=representation")
            .json(&[&call]);
        let response = self.send(req).await?;

        // Lost a race with a concurrent redelivery: the unique call_ref
        // constraint fired, so the winner's row is the record.
        if response.status() == StatusCode::CONFLICT {
            if let Some(call_ref) = &call.call_ref {
                if let Some(existing_id) = self.find_call_by_ref(call_ref).await? {
                    return Ok(CallInsert::Duplicate { existing_id });
                }
            }
        }

        Ok(CallInsert::Recorded(single(read_json(response).await?)?))
    }

    async fn call_status_counts(&self) -> Result<CallSummary, StoreError> {
        let req = self
            .client
            .get(self.table("call_log"))
            .query(&[("select", "status")]);
        let rows: Vec<StatusRow> = read_json(self.send(req).await?).await?;

        let mut summary = CallSummary::default();
        for row in rows {
            summary.record(&CallStatus::from(row.status));
        }
        Ok(summary)
    }
}
