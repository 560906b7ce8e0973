//! Shared-secret check for voice-platform webhooks.
//!
//! Runs before the body is read. A missing server-side secret rejects
//! every delivery.

use axum::http::Request;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use subtle::ConstantTimeEq;

use crate::api::error::ApiError;
use crate::api::types::ApiContext;

pub const WEBHOOK_SECRET_HEADER: &str = "x-webhook-secret";

pub async fn require_webhook_secret(req: Request<axum::body::Body>, next: Next) -> Response {
    match check(&req) {
        Ok(()) => next.run(req).await,
        Err(err) => err.into_response(),
    }
}

fn check(req: &Request<axum::body::Body>) -> Result<(), ApiError> {
    let ctx = req
        .extensions()
        .get::<ApiContext>()
        .ok_or(ApiError::Internal("missing API context".into()))?;

    let Some(expected) = ctx.webhook_secret.as_deref() else {
        tracing::error!("VAPI_WEBHOOK_SECRET not configured, rejecting webhook");
        return Err(unauthorized());
    };

    let presented = req
        .headers()
        .get(WEBHOOK_SECRET_HEADER)
        .map(|v| v.as_bytes())
        .unwrap_or_default();

    if bool::from(presented.ct_eq(expected.as_bytes())) {
        Ok(())
    } else {
        tracing::warn!(path = %req.uri().path(), "Invalid webhook secret");
        Err(unauthorized())
    }
}

fn unauthorized() -> ApiError {
    ApiError::Unauthorized("Unauthorized".into())
}
