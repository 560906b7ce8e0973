use rusqlite::{params, Connection, OptionalExtension, Row};

use super::{decode_json, decode_ts, encode_json, encode_ts};
use crate::db::DatabaseError;
use crate::models::{CallRecord, CallStatus, CallSummary};

const CALL_COLUMNS: &str = "id, patient_id, call_ref, started_at, ended_at, status,
     available_on_scheduled_date, delivery_window, med_change, shipment_feedback,
     free_text_notes, transcript, model_raw, meta";

pub fn insert_call(conn: &Connection, call: &CallRecord) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO call_log (id, patient_id, call_ref, started_at, ended_at, status,
         available_on_scheduled_date, delivery_window, med_change, shipment_feedback,
         free_text_notes, transcript, model_raw, meta)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)",
        params![
            call.id,
            call.patient_id,
            call.call_ref,
            encode_ts(&call.started_at),
            call.ended_at.as_ref().map(encode_ts),
            call.status.as_str(),
            call.available_on_scheduled_date.map(|b| b as i32),
            call.delivery_window,
            call.med_change,
            encode_json(&call.shipment_feedback),
            call.free_text_notes,
            encode_json(&call.transcript),
            encode_json(&call.model_raw),
            encode_json(&call.meta),
        ],
    )?;
    Ok(())
}

/// Id of the row already stored for a platform call reference, if any.
pub fn find_call_by_ref(conn: &Connection, call_ref: &str) -> Result<Option<String>, DatabaseError> {
    let id = conn
        .query_row(
            "SELECT id FROM call_log WHERE call_ref = ?1",
            params![call_ref],
            |row| row.get::<_, String>(0),
        )
        .optional()?;
    Ok(id)
}

/// Most recent `limit` calls, newest first.
pub fn recent_calls(conn: &Connection, limit: u32) -> Result<Vec<CallRecord>, DatabaseError> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {CALL_COLUMNS} FROM call_log ORDER BY started_at DESC, rowid DESC LIMIT ?1"
    ))?;
    let rows = stmt.query_map(params![limit], read_row)?;

    let mut calls = Vec::new();
    for row in rows {
        calls.push(into_call(row?)?);
    }
    Ok(calls)
}

pub fn call_status_counts(conn: &Connection) -> Result<CallSummary, DatabaseError> {
    let mut stmt = conn.prepare("SELECT status, COUNT(*) FROM call_log GROUP BY status")?;
    let rows = stmt.query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?)))?;

    let mut summary = CallSummary::default();
    for row in rows {
        let (status, count) = row?;
        let count = count.max(0) as u64;
        summary.total += count;
        match CallStatus::from(status) {
            CallStatus::Completed => summary.completed += count,
            CallStatus::Abandoned => summary.abandoned += count,
            CallStatus::Other(_) => summary.other += count,
        }
    }
    Ok(summary)
}

struct CallRow {
    id: String,
    patient_id: String,
    call_ref: Option<String>,
    started_at: String,
    ended_at: Option<String>,
    status: String,
    available_on_scheduled_date: Option<i32>,
    delivery_window: Option<String>,
    med_change: Option<String>,
    shipment_feedback: Option<String>,
    free_text_notes: Option<String>,
    transcript: Option<String>,
    model_raw: Option<String>,
    meta: Option<String>,
}

fn read_row(row: &Row<'_>) -> rusqlite::Result<CallRow> {
    Ok(CallRow {
        id: row.get(0)?,
        patient_id: row.get(1)?,
        call_ref: row.get(2)?,
        started_at: row.get(3)?,
        ended_at: row.get(4)?,
        status: row.get(5)?,
        available_on_scheduled_date: row.get(6)?,
        delivery_window: row.get(7)?,
        med_change: row.get(8)?,
        shipment_feedback: row.get(9)?,
        free_text_notes: row.get(10)?,
        transcript: row.get(11)?,
        model_raw: row.get(12)?,
        meta: row.get(13)?,
    })
}

fn into_call(row: CallRow) -> Result<CallRecord, DatabaseError> {
    Ok(CallRecord {
        id: row.id,
        patient_id: row.patient_id,
        call_ref: row.call_ref,
        started_at: decode_ts("call_log.started_at", &row.started_at)?,
        ended_at: row
            .ended_at
            .map(|ts| decode_ts("call_log.ended_at", &ts))
            .transpose()?,
        status: CallStatus::from(row.status),
        available_on_scheduled_date: row.available_on_scheduled_date.map(|v| v != 0),
        delivery_window: row.delivery_window,
        med_change: row.med_change,
        shipment_feedback: decode_json("call_log.shipment_feedback", row.shipment_feedback)?,
        free_text_notes: row.free_text_notes,
        transcript: decode_json("call_log.transcript", row.transcript)?,
        model_raw: decode_json("call_log.model_raw", row.model_raw)?,
        meta: decode_json("call_log.meta", row.meta)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repository::insert_patient;
    use crate::db::sqlite::open_memory_database;
    use crate::models::Patient;
    use chrono::{Duration, Utc};
    use serde_json::json;

    fn seeded() -> Connection {
        let conn = open_memory_database().unwrap();
        insert_patient(
            &conn,
            &Patient {
                id: "p1".into(),
                first_name: "Jane".into(),
                last_name: "Doe".into(),
                phone_e164: "+15551230000".into(),
                email: None,
                security_question: None,
                security_answer: None,
                created_at: Utc::now(),
            },
        )
        .unwrap();
        conn
    }

    fn call(id: &str, status: CallStatus, minutes_ago: i64) -> CallRecord {
        CallRecord {
            id: id.into(),
            patient_id: "p1".into(),
            call_ref: None,
            started_at: Utc::now() - Duration::minutes(minutes_ago),
            ended_at: None,
            status,
            available_on_scheduled_date: Some(true),
            delivery_window: Some("Morning".into()),
            med_change: None,
            shipment_feedback: Some(json!({"issue": "late", "note": null})),
            free_text_notes: None,
            transcript: None,
            model_raw: Some(json!({"verified": true})),
            meta: None,
        }
    }

    #[test]
    fn insert_then_read_preserves_json_columns() {
        let conn = seeded();
        let original = call("c1", CallStatus::Completed, 0);
        insert_call(&conn, &original).unwrap();

        let stored = recent_calls(&conn, 10).unwrap();
        assert_eq!(stored, vec![original]);
    }

    #[test]
    fn recent_calls_is_newest_first_and_limited() {
        let conn = seeded();
        for (i, minutes) in [50, 10, 30].iter().enumerate() {
            insert_call(&conn, &call(&format!("c{i}"), CallStatus::Completed, *minutes)).unwrap();
        }
        let ids: Vec<String> = recent_calls(&conn, 2).unwrap().into_iter().map(|c| c.id).collect();
        assert_eq!(ids, vec!["c1", "c2"]);
    }

    #[test]
    fn call_for_unknown_patient_violates_foreign_key() {
        let conn = seeded();
        let mut orphan = call("c1", CallStatus::Completed, 0);
        orphan.patient_id = "ghost".into();
        assert!(insert_call(&conn, &orphan).is_err());
    }

    #[test]
    fn find_by_ref_returns_existing_row() {
        let conn = seeded();
        let mut first = call("c1", CallStatus::Completed, 0);
        first.call_ref = Some("vapi-123".into());
        insert_call(&conn, &first).unwrap();

        assert_eq!(find_call_by_ref(&conn, "vapi-123").unwrap().as_deref(), Some("c1"));
        assert_eq!(find_call_by_ref(&conn, "vapi-999").unwrap(), None);
    }

    #[test]
    fn status_counts_group_unknown_statuses_as_other() {
        let conn = seeded();
        insert_call(&conn, &call("c1", CallStatus::Completed, 3)).unwrap();
        insert_call(&conn, &call("c2", CallStatus::Abandoned, 2)).unwrap();
        insert_call(&conn, &call("c3", CallStatus::Other("voicemail".into()), 1)).unwrap();

        let summary = call_status_counts(&conn).unwrap();
        assert_eq!(
            summary,
            CallSummary {
                total: 3,
                completed: 1,
                abandoned: 1,
                other: 1
            }
        );
    }
}
