//! Endpoint handlers, one module per surface.

pub mod access;
pub mod calls;
pub mod health;
pub mod patients;
pub mod vapi;

use serde::de::DeserializeOwned;

use crate::api::error::ApiError;

/// Parse a JSON request body. Any malformed body is a 400, regardless of
/// the declared content type.
pub(crate) fn parse_body<T: DeserializeOwned>(body: &[u8]) -> Result<T, ApiError> {
    serde_json::from_slice(body).map_err(|e| ApiError::BadRequest(format!("Invalid JSON body: {e}")))
}
