//! HTTP router.
//!
//! Route groups and their middleware (outermost → innermost):
//! - public: audit → handler (`/health`, `/auth/login`)
//! - account: audit → account session → handler (`/validate-pharmacy-code`)
//! - staff: audit → account session + access grant → handler (dashboard)
//! - webhooks: audit → shared secret → handler (`/vapi/*`)

use axum::http::{header, HeaderValue};
use axum::routing::{get, post};
use axum::Router;
use tower_http::set_header::SetResponseHeaderLayer;

use crate::api::endpoints;
use crate::api::middleware;
use crate::api::types::ApiContext;

/// Build the full application router.
///
/// Middleware uses `Extension<ApiContext>` (injected as the outermost layer
/// of each group). Handlers use `State<ApiContext>` (provided via
/// `with_state`). Path params use `:param` syntax (axum 0.7).
pub fn app_router(ctx: ApiContext) -> Router {
    let public = Router::new()
        .route("/health", get(endpoints::health::check))
        .route("/auth/login", post(endpoints::access::login))
        .with_state(ctx.clone());

    let account = Router::new()
        .route(
            "/validate-pharmacy-code",
            post(endpoints::access::validate_code),
        )
        .with_state(ctx.clone())
        .layer(axum::middleware::from_fn(middleware::session::require_account))
        .layer(axum::Extension(ctx.clone()));

    let staff = Router::new()
        .route(
            "/patients",
            get(endpoints::patients::list).post(endpoints::patients::create),
        )
        .route("/call", post(endpoints::calls::trigger))
        .route("/calls", get(endpoints::calls::recent))
        .route("/calls/summary", get(endpoints::calls::summary))
        .route("/auth/logout", post(endpoints::access::logout))
        .with_state(ctx.clone())
        .layer(axum::middleware::from_fn(middleware::session::require_staff))
        .layer(axum::Extension(ctx.clone()));

    let webhooks = Router::new()
        .route("/vapi/verifyIdentity", post(endpoints::vapi::verify))
        .route("/vapi/complete", post(endpoints::vapi::complete))
        .route("/vapi/storeResult", post(endpoints::vapi::store_result))
        .route("/vapi/webhook", post(endpoints::vapi::generic))
        .with_state(ctx.clone())
        .layer(axum::middleware::from_fn(
            middleware::webhook_secret::require_webhook_secret,
        ))
        .layer(axum::Extension(ctx));

    Router::new()
        .merge(public)
        .merge(account)
        .merge(staff)
        .merge(webhooks)
        .layer(axum::middleware::from_fn(middleware::audit::log_access))
        .layer(SetResponseHeaderLayer::if_not_present(
            header::X_CONTENT_TYPE_OPTIONS,
            HeaderValue::from_static("nosniff"),
        ))
}
