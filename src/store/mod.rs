//! Storage interface for patients and the call log.
//!
//! Two backends implement [`Store`]: SQLite for local deployments and
//! tests, and the hosted Postgres REST endpoint used in production. Both
//! are constructed once at startup and shared behind an `Arc`.

mod rest;
mod sqlite;

use async_trait::async_trait;

use crate::db::DatabaseError;
use crate::models::{CallRecord, CallSummary, NewCallRecord, NewPatient, Patient};

pub use rest::RestStore;
pub use sqlite::SqliteStore;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error(transparent)]
    Database(#[from] DatabaseError),
    #[error("Storage lock poisoned")]
    LockPoisoned,
    #[error("Storage request failed: {0}")]
    Transport(String),
    #[error("Storage returned {status}: {body}")]
    Upstream { status: u16, body: String },
    #[error("Unexpected storage response: {0}")]
    Decode(String),
}

/// Result of appending to the call log.
#[derive(Debug, Clone, PartialEq)]
pub enum CallInsert {
    Recorded(CallRecord),
    /// A record with the same platform call reference already exists.
    Duplicate { existing_id: String },
}

impl CallInsert {
    pub fn id(&self) -> &str {
        match self {
            Self::Recorded(record) => &record.id,
            Self::Duplicate { existing_id } => existing_id,
        }
    }

    pub fn is_duplicate(&self) -> bool {
        matches!(self, Self::Duplicate { .. })
    }
}

#[async_trait]
pub trait Store: Send + Sync {
    /// Short backend name for health output.
    fn backend(&self) -> &'static str;

    /// All patients, newest first.
    async fn list_patients(&self) -> Result<Vec<Patient>, StoreError>;

    async fn get_patient(&self, id: &str) -> Result<Option<Patient>, StoreError>;

    /// Insert a validated patient; the store assigns id and creation time.
    async fn insert_patient(&self, patient: NewPatient) -> Result<Patient, StoreError>;

    /// Most recent `limit` call records, newest first.
    async fn recent_calls(&self, limit: u32) -> Result<Vec<CallRecord>, StoreError>;

    /// Append one call record. Deduplicates on `call_ref` when present.
    async fn insert_call(&self, call: NewCallRecord) -> Result<CallInsert, StoreError>;

    async fn call_status_counts(&self) -> Result<CallSummary, StoreError>;
}
