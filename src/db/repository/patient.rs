use rusqlite::{params, Connection, OptionalExtension, Row};

use super::{decode_ts, encode_ts};
use crate::db::DatabaseError;
use crate::models::Patient;

const PATIENT_COLUMNS: &str = "id, first_name, last_name, phone_e164, email,
     security_question, security_answer, created_at";

pub fn insert_patient(conn: &Connection, patient: &Patient) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO patients (id, first_name, last_name, phone_e164, email,
         security_question, security_answer, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        params![
            patient.id,
            patient.first_name,
            patient.last_name,
            patient.phone_e164,
            patient.email,
            patient.security_question,
            patient.security_answer,
            encode_ts(&patient.created_at),
        ],
    )?;
    Ok(())
}

pub fn get_patient(conn: &Connection, id: &str) -> Result<Option<Patient>, DatabaseError> {
    let raw = conn
        .query_row(
            &format!("SELECT {PATIENT_COLUMNS} FROM patients WHERE id = ?1"),
            params![id],
            read_row,
        )
        .optional()?;
    raw.map(into_patient).transpose()
}

/// All patients, newest first.
pub fn list_patients(conn: &Connection) -> Result<Vec<Patient>, DatabaseError> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {PATIENT_COLUMNS} FROM patients ORDER BY created_at DESC, rowid DESC"
    ))?;
    let rows = stmt.query_map([], read_row)?;

    let mut patients = Vec::new();
    for row in rows {
        patients.push(into_patient(row?)?);
    }
    Ok(patients)
}

type PatientRow = (
    String,
    String,
    String,
    String,
    Option<String>,
    Option<String>,
    Option<String>,
    String,
);

fn read_row(row: &Row<'_>) -> rusqlite::Result<PatientRow> {
    Ok((
        row.get(0)?,
        row.get(1)?,
        row.get(2)?,
        row.get(3)?,
        row.get(4)?,
        row.get(5)?,
        row.get(6)?,
        row.get(7)?,
    ))
}

fn into_patient(row: PatientRow) -> Result<Patient, DatabaseError> {
    let (id, first_name, last_name, phone_e164, email, security_question, security_answer, created_at) =
        row;
    Ok(Patient {
        id,
        first_name,
        last_name,
        phone_e164,
        email,
        security_question,
        security_answer,
        created_at: decode_ts("patients.created_at", &created_at)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::sqlite::open_memory_database;
    use chrono::{Duration, Utc};

    fn patient(id: &str, minutes_ago: i64) -> Patient {
        Patient {
            id: id.into(),
            first_name: "Jane".into(),
            last_name: "Doe".into(),
            phone_e164: "+15551230000".into(),
            email: None,
            security_question: None,
            security_answer: Some("blue".into()),
            created_at: Utc::now() - Duration::minutes(minutes_ago),
        }
    }

    #[test]
    fn insert_then_get_round_trips_every_column() {
        let conn = open_memory_database().unwrap();
        let p = patient("p1", 0);
        insert_patient(&conn, &p).unwrap();
        assert_eq!(get_patient(&conn, "p1").unwrap(), Some(p));
    }

    #[test]
    fn get_unknown_patient_is_none() {
        let conn = open_memory_database().unwrap();
        assert_eq!(get_patient(&conn, "missing").unwrap(), None);
    }

    #[test]
    fn list_is_newest_first() {
        let conn = open_memory_database().unwrap();
        insert_patient(&conn, &patient("old", 60)).unwrap();
        insert_patient(&conn, &patient("new", 1)).unwrap();
        insert_patient(&conn, &patient("mid", 30)).unwrap();

        let ids: Vec<String> = list_patients(&conn).unwrap().into_iter().map(|p| p.id).collect();
        assert_eq!(ids, vec!["new", "mid", "old"]);
    }

    #[test]
    fn duplicate_id_is_rejected() {
        let conn = open_memory_database().unwrap();
        insert_patient(&conn, &patient("p1", 0)).unwrap();
        assert!(insert_patient(&conn, &patient("p1", 0)).is_err());
    }
}
