//! Staff session middleware.
//!
//! `require_account` verifies the bearer access token with the identity
//! provider. `require_staff` additionally requires the pharmacy access
//! grant cookie issued by `/validate-pharmacy-code`. Both inject
//! `StaffContext` for downstream handlers.

use axum::http::{HeaderValue, Request};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};

use crate::access::gate::grant_from_headers;
use crate::access::{AuthError, AuthUser};
use crate::api::error::ApiError;
use crate::api::types::{ApiContext, StaffContext};

/// Require a valid account session.
pub async fn require_account(req: Request<axum::body::Body>, next: Next) -> Response {
    match require_inner(req, next, false).await {
        Ok(resp) => resp,
        Err(err) => err.into_response(),
    }
}

/// Require a valid account session and a pharmacy access grant.
pub async fn require_staff(req: Request<axum::body::Body>, next: Next) -> Response {
    match require_inner(req, next, true).await {
        Ok(resp) => resp,
        Err(err) => err.into_response(),
    }
}

async fn require_inner(
    mut req: Request<axum::body::Body>,
    next: Next,
    need_grant: bool,
) -> Result<Response, ApiError> {
    let ctx: ApiContext = req
        .extensions()
        .get::<ApiContext>()
        .cloned()
        .ok_or(ApiError::Internal("missing API context".into()))?;

    let token = bearer_token(&req).ok_or(AuthError::MissingToken)?;
    let user = authenticate(&ctx, &token).await?;

    let grant = grant_from_headers(req.headers());
    if need_grant {
        let granted = grant
            .as_deref()
            .is_some_and(|token| ctx.gate.has_access(token, &user.id));
        if !granted {
            return Err(AuthError::NoAccessGrant.into());
        }
    }

    req.extensions_mut().insert(StaffContext { user, grant });

    let mut response = next.run(req).await;
    response
        .headers_mut()
        .insert("Cache-Control", HeaderValue::from_static("no-store"));
    Ok(response)
}

fn bearer_token(req: &Request<axum::body::Body>) -> Option<String> {
    req.headers()
        .get("Authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_string)
}

async fn authenticate(ctx: &ApiContext, token: &str) -> Result<AuthUser, ApiError> {
    let identity = ctx
        .identity
        .as_ref()
        .ok_or(AuthError::NotConfigured("SUPABASE_URL/SUPABASE_ANON_KEY"))?;

    Ok(identity.user_for_token(token).await?)
}
