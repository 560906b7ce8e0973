use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Serialize;

use super::{AuthError, AuthSession, AuthUser, IdentityProvider};

const REQUEST_TIMEOUT_SECS: u64 = 10;

/// Client for the hosted auth service (`/auth/v1`), called with the public
/// anon key.
pub struct GoTrueClient {
    base_url: String,
    anon_key: String,
    client: reqwest::Client,
}

#[derive(Serialize)]
struct PasswordGrant<'a> {
    email: &'a str,
    password: &'a str,
}

impl GoTrueClient {
    pub fn new(base_url: &str, anon_key: &str) -> Result<Self, AuthError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .map_err(|e| AuthError::Provider(e.to_string()))?;
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            anon_key: anon_key.to_string(),
            client,
        })
    }
}

fn transport(e: reqwest::Error) -> AuthError {
    AuthError::Provider(e.without_url().to_string())
}

#[async_trait]
impl IdentityProvider for GoTrueClient {
    async fn user_for_token(&self, access_token: &str) -> Result<AuthUser, AuthError> {
        let response = self
            .client
            .get(format!("{}/auth/v1/user", self.base_url))
            .header("apikey", &self.anon_key)
            .bearer_auth(access_token)
            .send()
            .await
            .map_err(transport)?;

        match response.status() {
            s if s.is_success() => response
                .json::<AuthUser>()
                .await
                .map_err(|e| AuthError::Provider(e.to_string())),
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Err(AuthError::InvalidToken),
            s => Err(AuthError::Provider(format!("user lookup returned {s}"))),
        }
    }

    async fn sign_in(&self, email: &str, password: &str) -> Result<AuthSession, AuthError> {
        let response = self
            .client
            .post(format!("{}/auth/v1/token", self.base_url))
            .query(&[("grant_type", "password")])
            .header("apikey", &self.anon_key)
            .json(&PasswordGrant { email, password })
            .send()
            .await
            .map_err(transport)?;

        match response.status() {
            s if s.is_success() => response
                .json::<AuthSession>()
                .await
                .map_err(|e| AuthError::Provider(e.to_string())),
            StatusCode::BAD_REQUEST | StatusCode::UNAUTHORIZED => {
                Err(AuthError::InvalidCredentials)
            }
            s => Err(AuthError::Provider(format!("sign-in returned {s}"))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::extract::Query;
    use axum::http::HeaderMap;
    use axum::response::{IntoResponse, Response};
    use axum::routing::{get, post};
    use axum::{Json, Router};
    use serde_json::{json, Value};
    use std::collections::HashMap;

    use crate::testing::spawn_stub;

    const ANON: &str = "anon-key";

    fn has_anon_key(headers: &HeaderMap) -> bool {
        headers.get("apikey").and_then(|v| v.to_str().ok()) == Some(ANON)
    }

    async fn user(headers: HeaderMap) -> Response {
        let bearer = headers.get("authorization").and_then(|v| v.to_str().ok());
        if has_anon_key(&headers) && bearer == Some("Bearer good-token") {
            Json(json!({"id": "user-1", "email": "staff@pharmacy.test", "role": "authenticated"}))
                .into_response()
        } else {
            (StatusCode::UNAUTHORIZED, Json(json!({"msg": "invalid JWT"}))).into_response()
        }
    }

    async fn token(
        headers: HeaderMap,
        Query(q): Query<HashMap<String, String>>,
        Json(body): Json<Value>,
    ) -> Response {
        if !has_anon_key(&headers) || q.get("grant_type").map(String::as_str) != Some("password") {
            return StatusCode::UNPROCESSABLE_ENTITY.into_response();
        }
        if body["password"] == "hunter22" {
            Json(json!({
                "access_token": "good-token",
                "token_type": "bearer",
                "expires_in": 3600,
                "refresh_token": "r",
                "user": {"id": "user-1", "email": body["email"]}
            }))
            .into_response()
        } else {
            (StatusCode::BAD_REQUEST, Json(json!({"error": "invalid_grant"}))).into_response()
        }
    }

    async fn provider() -> GoTrueClient {
        let app = Router::new()
            .route("/auth/v1/user", get(user))
            .route("/auth/v1/token", post(token));
        GoTrueClient::new(&spawn_stub(app).await, ANON).unwrap()
    }

    #[tokio::test]
    async fn resolves_user_for_valid_token() {
        let user = provider().await.user_for_token("good-token").await.unwrap();
        assert_eq!(user.id, "user-1");
        assert_eq!(user.email.as_deref(), Some("staff@pharmacy.test"));
    }

    #[tokio::test]
    async fn rejected_token_is_invalid() {
        assert!(matches!(
            provider().await.user_for_token("stale").await,
            Err(AuthError::InvalidToken)
        ));
    }

    #[tokio::test]
    async fn password_grant_returns_session() {
        let session = provider()
            .await
            .sign_in("staff@pharmacy.test", "hunter22")
            .await
            .unwrap();
        assert_eq!(session.access_token, "good-token");
        assert_eq!(session.expires_in, 3600);
        assert_eq!(session.user.id, "user-1");
    }

    #[tokio::test]
    async fn wrong_password_is_invalid_credentials() {
        assert!(matches!(
            provider().await.sign_in("staff@pharmacy.test", "nope-nope").await,
            Err(AuthError::InvalidCredentials)
        ));
    }
}
