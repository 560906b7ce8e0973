//! Voice-platform webhooks. All routes sit behind the shared-secret check.
//!
//! `POST /vapi/verifyIdentity`: mid-call identity check
//! `POST /vapi/complete`: answers collected by the workflow
//! `POST /vapi/storeResult`: structured result object
//! `POST /vapi/webhook`: generic result, nested or flat layout

use axum::body::Bytes;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::Utc;
use serde::Serialize;
use serde_json::json;

use crate::api::error::ApiError;
use crate::api::types::ApiContext;
use crate::models::NewCallRecord;
use crate::store::CallInsert;
use crate::verification::verify_identity;
use crate::webhook::{
    ingest, payload, CompletionPayload, GenericResult, IdentityPayload, StoredResultPayload,
};

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Recorded {
    pub success: bool,
    pub message: &'static str,
    pub call_log_id: String,
    pub duplicate: bool,
}

impl Recorded {
    fn new(message: &'static str, outcome: &CallInsert) -> Self {
        Self {
            success: true,
            message,
            call_log_id: outcome.id().to_string(),
            duplicate: outcome.is_duplicate(),
        }
    }
}

/// `POST /vapi/verifyIdentity`
///
/// The platform substitutes `variable` into its workflow, so every outcome
/// carries it as a string, failures included.
pub async fn verify(State(ctx): State<ApiContext>, body: Bytes) -> Response {
    let query = match payload::parse::<IdentityPayload>(&body).and_then(IdentityPayload::normalize)
    {
        Ok(query) => query,
        Err(e) => {
            tracing::warn!(error = %e, "Identity check rejected");
            return (
                StatusCode::BAD_REQUEST,
                Json(json!({ "variable": "false", "error": "Missing required fields" })),
            )
                .into_response();
        }
    };

    match verify_identity(ctx.store.as_ref(), &query.patient_id, &query.answer).await {
        Ok(outcome) => Json(json!({
            "variable": outcome.variable(),
            "message": outcome.message(),
        }))
        .into_response(),
        Err(e) => {
            tracing::error!(error = %e, "Identity check failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "variable": "false", "error": "Internal server error" })),
            )
                .into_response()
        }
    }
}

/// `POST /vapi/complete`
pub async fn complete(
    State(ctx): State<ApiContext>,
    body: Bytes,
) -> Result<Json<Recorded>, ApiError> {
    let record = payload::parse::<CompletionPayload>(&body)?.into_call_record(Utc::now())?;
    let outcome = record_call(&ctx, record).await?;
    Ok(Json(Recorded::new(
        "Call completed and logged successfully",
        &outcome,
    )))
}

/// `POST /vapi/storeResult`
pub async fn store_result(
    State(ctx): State<ApiContext>,
    body: Bytes,
) -> Result<Json<Recorded>, ApiError> {
    let record = payload::parse::<StoredResultPayload>(&body)?.into_call_record(Utc::now())?;
    let outcome = record_call(&ctx, record).await?;
    Ok(Json(Recorded::new("Call result stored successfully", &outcome)))
}

/// `POST /vapi/webhook`
pub async fn generic(
    State(ctx): State<ApiContext>,
    body: Bytes,
) -> Result<Json<serde_json::Value>, ApiError> {
    let raw: serde_json::Value = payload::parse(&body)?;
    let record = GenericResult::from_payload(raw)?.into_call_record();
    let outcome = record_call(&ctx, record).await?;
    Ok(Json(json!({
        "ok": true,
        "callLogId": outcome.id(),
        "duplicate": outcome.is_duplicate(),
    })))
}

async fn record_call(ctx: &ApiContext, record: NewCallRecord) -> Result<CallInsert, ApiError> {
    Ok(ingest(ctx.store.as_ref(), record).await?)
}
