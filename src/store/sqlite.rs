use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::Utc;
use rusqlite::Connection;
use uuid::Uuid;

use super::{CallInsert, Store, StoreError};
use crate::db::{self, repository};
use crate::models::{CallRecord, CallSummary, NewCallRecord, NewPatient, Patient};

/// SQLite-backed store. One connection behind a mutex; every operation is
/// a short synchronous statement, so the guard never crosses an `.await`.
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        Ok(Self::from_connection(db::open_database(path)?))
    }

    pub fn in_memory() -> Result<Self, StoreError> {
        Ok(Self::from_connection(db::open_memory_database()?))
    }

    pub fn from_connection(conn: Connection) -> Self {
        Self {
            conn: Mutex::new(conn),
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>, StoreError> {
        self.conn.lock().map_err(|_| StoreError::LockPoisoned)
    }
}

#[async_trait]
impl Store for SqliteStore {
    fn backend(&self) -> &'static str {
        "sqlite"
    }

    async fn list_patients(&self) -> Result<Vec<Patient>, StoreError> {
        let conn = self.lock()?;
        Ok(repository::list_patients(&conn)?)
    }

    async fn get_patient(&self, id: &str) -> Result<Option<Patient>, StoreError> {
        let conn = self.lock()?;
        Ok(repository::get_patient(&conn, id)?)
    }

    async fn insert_patient(&self, patient: NewPatient) -> Result<Patient, StoreError> {
        let patient = Patient {
            id: Uuid::new_v4().to_string(),
            first_name: patient.first_name,
            last_name: patient.last_name,
            phone_e164: patient.phone_e164,
            email: patient.email,
            security_question: patient.security_question,
            security_answer: patient.security_answer,
            created_at: Utc::now(),
        };
        let conn = self.lock()?;
        repository::insert_patient(&conn, &patient)?;
        Ok(patient)
    }

    async fn recent_calls(&self, limit: u32) -> Result<Vec<CallRecord>, StoreError> {
        let conn = self.lock()?;
        Ok(repository::recent_calls(&conn, limit)?)
    }

    async fn insert_call(&self, call: NewCallRecord) -> Result<CallInsert, StoreError> {
        let conn = self.lock()?;

        // Lookup and insert share the lock, so concurrent redeliveries of
        // one call reference cannot both pass the check.
        if let Some(call_ref) = &call.call_ref {
            if let Some(existing_id) = repository::find_call_by_ref(&conn, call_ref)? {
                return Ok(CallInsert::Duplicate { existing_id });
            }
        }

        let record = CallRecord {
            id: Uuid::new_v4().to_string(),
            patient_id: call.patient_id,
            call_ref: call.call_ref,
            started_at: call.started_at.unwrap_or_else(Utc::now),
            ended_at: call.ended_at,
            status: call.status,
            available_on_scheduled_date: call.available_on_scheduled_date,
            delivery_window: call.delivery_window,
            med_change: call.med_change,
            shipment_feedback: call.shipment_feedback,
            free_text_notes: call.free_text_notes,
            transcript: call.transcript,
            model_raw: call.model_raw,
            meta: call.meta,
        };
        repository::insert_call(&conn, &record)?;
        Ok(CallInsert::Recorded(record))
    }

    async fn call_status_counts(&self) -> Result<CallSummary, StoreError> {
        let conn = self.lock()?;
        Ok(repository::call_status_counts(&conn)?)
    }
}
