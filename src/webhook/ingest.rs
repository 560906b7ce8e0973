use crate::models::NewCallRecord;
use crate::store::{CallInsert, Store, StoreError};

#[derive(Debug, thiserror::Error)]
pub enum IngestError {
    /// Deliberately the same for unknown and inaccessible patients.
    #[error("Patient not found or access denied")]
    UnknownPatient,
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Append a webhook outcome to the call log.
///
/// The referenced patient must exist; nothing is written otherwise.
/// Redelivered outcomes carrying a known call reference are reported as
/// duplicates instead of being written again.
pub async fn ingest(store: &dyn Store, record: NewCallRecord) -> Result<CallInsert, IngestError> {
    if store.get_patient(&record.patient_id).await?.is_none() {
        tracing::warn!(patient_id = "[REDACTED]", "Webhook references unknown patient");
        return Err(IngestError::UnknownPatient);
    }

    let status = record.status.clone();
    let outcome = store.insert_call(record).await?;
    match &outcome {
        CallInsert::Recorded(call) => {
            tracing::info!(call_log_id = %call.id, %status, "Call outcome recorded");
        }
        CallInsert::Duplicate { existing_id } => {
            tracing::info!(call_log_id = %existing_id, "Duplicate webhook delivery ignored");
        }
    }
    Ok(outcome)
}
