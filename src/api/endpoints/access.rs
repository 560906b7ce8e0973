//! Staff sign-in and the pharmacy access gate.
//!
//! `POST /auth/login`: Unprotected: password grant via the identity provider
//! `POST /validate-pharmacy-code`: Account session: issues the access grant cookie
//! `POST /auth/logout`: Staff: revokes the grant and clears the cookie

use axum::body::Bytes;
use axum::extract::State;
use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::{Extension, Json};
use serde::{Deserialize, Serialize};
use serde_json::json;

use super::parse_body;
use crate::access::{validate_credentials, AuthError, AuthSession};
use crate::api::error::ApiError;
use crate::api::types::{ApiContext, StaffContext};

#[derive(Deserialize)]
pub struct LoginRequest {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

#[derive(Deserialize)]
pub struct PharmacyCode {
    #[serde(default, rename = "pharmacyCode")]
    pub pharmacy_code: Option<String>,
}

#[derive(Serialize)]
pub struct LoggedOut {
    pub success: bool,
}

/// `POST /auth/login`
pub async fn login(
    State(ctx): State<ApiContext>,
    body: Bytes,
) -> Result<Json<AuthSession>, ApiError> {
    let request: LoginRequest = parse_body(&body)?;
    let email = request.email.trim();
    validate_credentials(email, &request.password)?;

    let identity = ctx
        .identity
        .as_ref()
        .ok_or(AuthError::NotConfigured("SUPABASE_URL/SUPABASE_ANON_KEY"))?;

    let session = identity.sign_in(email, &request.password).await?;
    tracing::info!(user_id = %session.user.id, "Staff signed in");
    Ok(Json(session))
}

/// `POST /validate-pharmacy-code`
pub async fn validate_code(
    State(ctx): State<ApiContext>,
    Extension(staff): Extension<StaffContext>,
    body: Bytes,
) -> Result<Response, ApiError> {
    let request: PharmacyCode = serde_json::from_slice(&body).unwrap_or(PharmacyCode {
        pharmacy_code: None,
    });

    match ctx.gate.unlock(&staff.user.id, request.pharmacy_code.as_deref()) {
        Ok(token) => {
            tracing::info!(user_id = %staff.user.id, "Pharmacy access granted");
            let cookie = HeaderValue::from_str(&ctx.gate.access_cookie(&token))
                .map_err(|e| ApiError::Internal(e.to_string()))?;
            let mut response = Json(json!({ "valid": true })).into_response();
            response.headers_mut().insert(header::SET_COOKIE, cookie);
            Ok(response)
        }
        Err(e @ (AuthError::CodeRequired | AuthError::InvalidCode)) => {
            tracing::warn!(user_id = %staff.user.id, "Pharmacy code rejected");
            Ok((
                StatusCode::BAD_REQUEST,
                Json(json!({ "valid": false, "error": e.to_string() })),
            )
                .into_response())
        }
        Err(e) => Err(e.into()),
    }
}

/// `POST /auth/logout`
pub async fn logout(
    State(ctx): State<ApiContext>,
    Extension(staff): Extension<StaffContext>,
) -> Result<Response, ApiError> {
    if let Some(grant) = &staff.grant {
        ctx.gate.revoke(grant);
    }
    tracing::info!(user_id = %staff.user.id, "Staff signed out");

    let cookie = HeaderValue::from_str(&ctx.gate.cleared_cookie())
        .map_err(|e| ApiError::Internal(e.to_string()))?;
    let mut response = Json(LoggedOut { success: true }).into_response();
    response.headers_mut().insert(header::SET_COOKIE, cookie);
    Ok(response)
}
