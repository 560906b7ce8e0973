//! Repository layer: row-level operations on `patients` and `call_log`.

mod call_log;
mod patient;

use chrono::{DateTime, SecondsFormat, Utc};

use super::DatabaseError;

pub use call_log::*;
pub use patient::*;

/// Fixed-width UTC RFC 3339, so text order equals time order.
fn encode_ts(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn decode_ts(field: &'static str, raw: &str) -> Result<DateTime<Utc>, DatabaseError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|ts| ts.with_timezone(&Utc))
        .map_err(|_| DatabaseError::Corrupt {
            field,
            value: raw.to_string(),
        })
}

fn encode_json(value: &Option<serde_json::Value>) -> Option<String> {
    value.as_ref().map(|v| v.to_string())
}

fn decode_json(
    field: &'static str,
    raw: Option<String>,
) -> Result<Option<serde_json::Value>, DatabaseError> {
    raw.map(|s| {
        serde_json::from_str(&s).map_err(|_| DatabaseError::Corrupt { field, value: s })
    })
    .transpose()
}
