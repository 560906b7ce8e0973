use axum::body::Bytes;
use axum::extract::rejection::QueryRejection;
use axum::extract::{Query, State};
use axum::Json;
use serde::{Deserialize, Serialize};

use super::parse_body;
use crate::api::error::ApiError;
use crate::api::types::ApiContext;
use crate::dashboard::{clamp_limit, Listing};
use crate::models::{CallRecord, CallSummary};
use crate::voice::CallReference;

#[derive(Deserialize)]
pub struct TriggerCall {
    #[serde(default, rename = "patientId")]
    pub patient_id: Option<String>,
}

#[derive(Serialize)]
pub struct CallStarted {
    pub success: bool,
    pub call: CallReference,
}

#[derive(Deserialize)]
pub struct CallsQuery {
    pub limit: Option<u32>,
}

/// `POST /call`: start a delivery-confirmation call for one patient.
pub async fn trigger(
    State(ctx): State<ApiContext>,
    body: Bytes,
) -> Result<Json<CallStarted>, ApiError> {
    let request: TriggerCall = parse_body(&body)?;
    let patient_id = request
        .patient_id
        .filter(|id| !id.trim().is_empty())
        .ok_or(ApiError::BadRequest("patientId is required".into()))?;

    let call = ctx.dashboard.trigger_call(&patient_id).await?;
    Ok(Json(CallStarted {
        success: true,
        call,
    }))
}

/// `GET /calls?limit=N`: most recent call records, newest first.
pub async fn recent(
    State(ctx): State<ApiContext>,
    query: Result<Query<CallsQuery>, QueryRejection>,
) -> Result<Json<Listing<CallRecord>>, ApiError> {
    let Query(query) = query.map_err(|e| ApiError::BadRequest(e.body_text()))?;
    let limit = clamp_limit(query.limit);
    Ok(Json(ctx.dashboard.recent_calls(limit).await?))
}

/// `GET /calls/summary`: record counts by status.
pub async fn summary(State(ctx): State<ApiContext>) -> Result<Json<CallSummary>, ApiError> {
    Ok(Json(ctx.dashboard.summary().await?))
}
