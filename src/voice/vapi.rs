use std::time::Duration;

use async_trait::async_trait;

use super::{CallReference, StartCallRequest, VoiceClient, VoiceError};

/// Pause before the second attempt; later attempts wait proportionally longer.
const RETRY_BACKOFF_MS: u64 = 250;

/// HTTP client for the Vapi call API.
pub struct VapiClient {
    base_url: String,
    api_key: String,
    client: reqwest::Client,
    timeout_secs: u64,
    max_attempts: u32,
    retry_backoff: Duration,
}

impl VapiClient {
    pub fn new(
        base_url: &str,
        api_key: &str,
        timeout_secs: u64,
        max_attempts: u32,
    ) -> Result<Self, VoiceError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| VoiceError::Transport(e.to_string()))?;

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            client,
            timeout_secs,
            max_attempts: max_attempts.max(1),
            retry_backoff: Duration::from_millis(RETRY_BACKOFF_MS),
        })
    }

    pub fn with_retry_backoff(mut self, backoff: Duration) -> Self {
        self.retry_backoff = backoff;
        self
    }

    async fn post_call_once(
        &self,
        request: &StartCallRequest,
    ) -> Result<CallReference, VoiceError> {
        let url = format!("{}/call", self.base_url);
        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    VoiceError::Timeout(self.timeout_secs)
                } else if e.is_connect() {
                    VoiceError::Connection(self.base_url.clone())
                } else {
                    VoiceError::Transport(e.without_url().to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(VoiceError::Rejected {
                status: status.as_u16(),
                body,
            });
        }

        response
            .json::<CallReference>()
            .await
            .map_err(|e| VoiceError::Decode(e.to_string()))
    }
}

#[async_trait]
impl VoiceClient for VapiClient {
    /// Submit the call, retrying transient failures up to `max_attempts`.
    /// A retried request may start a second call if the first one reached
    /// the platform but its response was lost.
    async fn start_call(&self, request: &StartCallRequest) -> Result<CallReference, VoiceError> {
        let mut attempt = 1;
        loop {
            match self.post_call_once(request).await {
                Ok(call) => return Ok(call),
                Err(e) if e.is_retryable() && attempt < self.max_attempts => {
                    let delay = self.retry_backoff * attempt;
                    tracing::warn!(
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "Call initiation failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    use axum::extract::State;
    use axum::http::{HeaderMap, StatusCode};
    use axum::response::{IntoResponse, Response};
    use axum::routing::post;
    use axum::{Json, Router};
    use serde_json::{json, Value};

    use crate::testing::{sample_call_request, spawn_stub};

    #[derive(Clone)]
    struct Platform {
        hits: Arc<AtomicU32>,
        /// Requests answered with 503 before the platform recovers.
        failures_before_success: u32,
        reject_with: Option<StatusCode>,
    }

    async fn start_call(
        State(platform): State<Platform>,
        headers: HeaderMap,
        Json(body): Json<Value>,
    ) -> Response {
        let hit = platform.hits.fetch_add(1, Ordering::SeqCst) + 1;
        if headers.get("authorization").and_then(|v| v.to_str().ok()) != Some("Bearer vapi-key") {
            return (StatusCode::UNAUTHORIZED, "bad key").into_response();
        }
        if let Some(status) = platform.reject_with {
            return (status, "workflow not found").into_response();
        }
        if hit <= platform.failures_before_success {
            return (StatusCode::SERVICE_UNAVAILABLE, "busy").into_response();
        }
        assert_eq!(body["customer"]["number"], "+15551230000");
        (
            StatusCode::CREATED,
            Json(json!({"id": "call-123", "status": "queued", "orgId": "org"})),
        )
            .into_response()
    }

    async fn platform(failures_before_success: u32, reject_with: Option<StatusCode>) -> (String, Arc<AtomicU32>) {
        let hits = Arc::new(AtomicU32::new(0));
        let app = Router::new()
            .route("/call", post(start_call))
            .with_state(Platform {
                hits: hits.clone(),
                failures_before_success,
                reject_with,
            });
        (spawn_stub(app).await, hits)
    }

    #[tokio::test]
    async fn returns_platform_call_reference() {
        let (url, hits) = platform(0, None).await;
        let client = VapiClient::new(&url, "vapi-key", 5, 2).unwrap();

        let call = client.start_call(&sample_call_request()).await.unwrap();
        assert_eq!(call.id, "call-123");
        assert_eq!(call.status.as_deref(), Some("queued"));
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn retries_server_errors_within_budget() {
        let (url, hits) = platform(1, None).await;
        let client = VapiClient::new(&url, "vapi-key", 5, 2).unwrap();

        assert!(client.start_call(&sample_call_request()).await.is_ok());
        assert_eq!(hits.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn retry_waits_before_next_attempt() {
        let (url, hits) = platform(1, None).await;
        let client = VapiClient::new(&url, "vapi-key", 5, 2)
            .unwrap()
            .with_retry_backoff(std::time::Duration::from_millis(200));

        let started = std::time::Instant::now();
        assert!(client.start_call(&sample_call_request()).await.is_ok());
        assert!(started.elapsed() >= std::time::Duration::from_millis(200));
        assert_eq!(hits.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn gives_up_after_max_attempts() {
        let (url, hits) = platform(5, None).await;
        let client = VapiClient::new(&url, "vapi-key", 5, 2).unwrap();

        let err = client.start_call(&sample_call_request()).await.unwrap_err();
        assert!(matches!(err, VoiceError::Rejected { status: 503, .. }));
        assert_eq!(hits.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn client_errors_are_not_retried() {
        let (url, hits) = platform(0, Some(StatusCode::BAD_REQUEST)).await;
        let client = VapiClient::new(&url, "vapi-key", 5, 3).unwrap();

        let err = client.start_call(&sample_call_request()).await.unwrap_err();
        assert_eq!(err.to_string(), "Voice platform error: 400 - workflow not found");
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn unreachable_platform_is_a_connection_error() {
        // Bind then drop a listener to get a port nothing listens on.
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let client = VapiClient::new(&format!("http://{addr}"), "vapi-key", 2, 1).unwrap();
        let err = client.start_call(&sample_call_request()).await.unwrap_err();
        assert!(matches!(err, VoiceError::Connection(_)));
        assert!(err.is_retryable());
    }
}
