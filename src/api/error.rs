//! API error types with structured JSON responses.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use crate::access::AuthError;
use crate::dashboard::DashboardError;
use crate::store::StoreError;
use crate::voice::CallError;
use crate::webhook::{IngestError, ShapeError};

/// Structured error response body.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: ErrorDetail,
}

#[derive(Debug, Serialize)]
pub struct ErrorDetail {
    pub code: &'static str,
    pub message: String,
}

/// API-level errors with HTTP status mapping.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("Invalid request: {0}")]
    BadRequest(String),
    #[error("Unauthorized: {0}")]
    Unauthorized(String),
    #[error("Forbidden: {0}")]
    Forbidden(String),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Configuration error: {0}")]
    Config(String),
    #[error("Upstream failure: {0}")]
    Upstream(String),
    #[error("Internal error: {0}")]
    Internal(String),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Config(_) | ApiError::Upstream(_) | ApiError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Message safe to return to the caller.
    pub fn public_message(&self) -> String {
        match self {
            ApiError::BadRequest(m)
            | ApiError::Unauthorized(m)
            | ApiError::Forbidden(m)
            | ApiError::NotFound(m)
            | ApiError::Config(m)
            | ApiError::Upstream(m) => m.clone(),
            ApiError::Internal(_) => "An internal error occurred".to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let code = match &self {
            ApiError::BadRequest(_) => "BAD_REQUEST",
            ApiError::Unauthorized(_) => "UNAUTHORIZED",
            ApiError::Forbidden(_) => "FORBIDDEN",
            ApiError::NotFound(_) => "NOT_FOUND",
            ApiError::Config(_) => "CONFIG",
            ApiError::Upstream(_) => "UPSTREAM",
            ApiError::Internal(_) => "INTERNAL",
        };
        match &self {
            ApiError::Internal(detail) => tracing::error!(detail, "API internal error"),
            ApiError::Config(detail) => tracing::error!(detail, "Missing configuration"),
            ApiError::Upstream(detail) => tracing::warn!(detail, "Upstream request failed"),
            _ => {}
        }

        let body = ErrorBody {
            error: ErrorDetail {
                code,
                message: self.public_message(),
            },
        };
        (self.status(), Json(body)).into_response()
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Database(_) | StoreError::LockPoisoned => {
                ApiError::Internal(err.to_string())
            }
            StoreError::Transport(_) | StoreError::Upstream { .. } | StoreError::Decode(_) => {
                ApiError::Upstream(err.to_string())
            }
        }
    }
}

impl From<CallError> for ApiError {
    fn from(err: CallError) -> Self {
        match err {
            CallError::NotConfigured(_) => ApiError::Config(err.to_string()),
            CallError::InvalidPhone => ApiError::BadRequest(err.to_string()),
            CallError::Voice(e) => ApiError::Upstream(e.to_string()),
        }
    }
}

impl From<DashboardError> for ApiError {
    fn from(err: DashboardError) -> Self {
        match err {
            DashboardError::Validation(e) => ApiError::BadRequest(e.to_string()),
            DashboardError::PatientNotFound => ApiError::NotFound(err.to_string()),
            DashboardError::Call(e) => e.into(),
            DashboardError::Store(e) => e.into(),
        }
    }
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::MissingToken | AuthError::InvalidToken | AuthError::InvalidCredentials => {
                ApiError::Unauthorized(err.to_string())
            }
            AuthError::InvalidInput(_) | AuthError::CodeRequired | AuthError::InvalidCode => {
                ApiError::BadRequest(err.to_string())
            }
            AuthError::NoAccessGrant => ApiError::Forbidden(err.to_string()),
            AuthError::NotConfigured(_) => ApiError::Config(err.to_string()),
            AuthError::Provider(_) => ApiError::Upstream(err.to_string()),
        }
    }
}

impl From<IngestError> for ApiError {
    fn from(err: IngestError) -> Self {
        match err {
            IngestError::UnknownPatient => ApiError::Forbidden(err.to_string()),
            // Webhook callers get no storage detail; it is logged instead.
            IngestError::Store(e) => ApiError::Internal(e.to_string()),
        }
    }
}

impl From<ShapeError> for ApiError {
    fn from(err: ShapeError) -> Self {
        ApiError::BadRequest(err.to_string())
    }
}
