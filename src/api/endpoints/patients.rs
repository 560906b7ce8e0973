use axum::body::Bytes;
use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde::Serialize;

use super::parse_body;
use crate::api::error::ApiError;
use crate::api::types::ApiContext;
use crate::dashboard::Listing;
use crate::models::{NewPatient, Patient};

#[derive(Serialize)]
pub struct CreatedPatient {
    pub success: bool,
    pub patient: Patient,
}

/// `GET /patients`: all patients, newest first.
pub async fn list(State(ctx): State<ApiContext>) -> Result<Json<Listing<Patient>>, ApiError> {
    Ok(Json(ctx.dashboard.list_patients().await?))
}

/// `POST /patients`: create a patient. Optional fields default to null.
pub async fn create(
    State(ctx): State<ApiContext>,
    body: Bytes,
) -> Result<(StatusCode, Json<CreatedPatient>), ApiError> {
    let input: NewPatient = parse_body(&body)?;
    let patient = ctx.dashboard.create_patient(input).await?;
    Ok((
        StatusCode::CREATED,
        Json(CreatedPatient {
            success: true,
            patient,
        }),
    ))
}
