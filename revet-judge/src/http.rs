//! HTTP judgment-service client with rate limiting

use crate::JudgmentProvider;
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use revet_core::{JudgeError, RevetResult};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Semaphore;

#[derive(Debug, Serialize)]
struct JudgeRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    max_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct JudgeResponse {
    text: String,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    error: ApiErrorBody,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    message: String,
}

/// HTTP judgment-service client with rate limiting.
///
/// POSTs `{model, prompt, max_tokens}` to the configured endpoint and
/// expects a `{text}` response body.
pub struct HttpJudgeProvider {
    client: Client,
    api_key: String,
    endpoint: String,
    model: String,
    rate_limiter: Arc<Semaphore>,
    last_request: Arc<AtomicU64>,
    min_request_interval_ms: u64,
    start_time: Instant,
}

impl HttpJudgeProvider {
    /// Create a new HTTP judgment provider.
    ///
    /// # Arguments
    /// * `endpoint` - Full URL of the judgment endpoint
    /// * `api_key` - Bearer token
    /// * `model` - Model name passed through to the service
    /// * `requests_per_minute` - Maximum requests per minute
    pub fn new(
        endpoint: impl Into<String>,
        api_key: impl Into<String>,
        model: impl Into<String>,
        requests_per_minute: u32,
    ) -> Self {
        let rpm = requests_per_minute.max(1);
        let permits = rpm as usize;
        let min_interval_ms = (60_000 / rpm as u64).max(10);

        Self {
            client: Client::new(),
            api_key: api_key.into(),
            endpoint: endpoint.into(),
            model: model.into(),
            rate_limiter: Arc::new(Semaphore::new(permits)),
            last_request: Arc::new(AtomicU64::new(0)),
            min_request_interval_ms: min_interval_ms,
            start_time: Instant::now(),
        }
    }
}

#[async_trait]
impl JudgmentProvider for HttpJudgeProvider {
    async fn call(&self, prompt: &str, max_tokens: u32) -> RevetResult<String> {
        // Rate limiting: acquire permit
        let _permit = self.rate_limiter.acquire().await.map_err(|e| {
            JudgeError::RequestFailed {
                provider: self.model.clone(),
                message: format!("Rate limiter error: {}", e),
            }
        })?;

        // Enforce minimum interval between requests
        let now_ms = self.start_time.elapsed().as_millis() as u64;
        let last_ms = self.last_request.load(Ordering::Relaxed);
        let elapsed = now_ms.saturating_sub(last_ms);

        if elapsed < self.min_request_interval_ms {
            let wait_ms = self.min_request_interval_ms - elapsed;
            tokio::time::sleep(Duration::from_millis(wait_ms)).await;
        }

        self.last_request.store(now_ms, Ordering::Relaxed);

        let body = JudgeRequest {
            model: &self.model,
            prompt,
            max_tokens,
        };

        tracing::debug!(model = %self.model, prompt_chars = prompt.len(), "dispatching judgment call");

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| JudgeError::RequestFailed {
                provider: self.model.clone(),
                message: format!("HTTP request failed: {}", e),
            })?;

        let status = response.status();

        if status.is_success() {
            let parsed: JudgeResponse =
                response.json().await.map_err(|e| JudgeError::InvalidResponse {
                    provider: self.model.clone(),
                    reason: format!("Failed to parse response body: {}", e),
                })?;
            Ok(parsed.text)
        } else {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());

            let message = if let Ok(api_error) = serde_json::from_str::<ApiError>(&error_text) {
                api_error.error.message
            } else {
                error_text
            };

            Err(match status {
                StatusCode::TOO_MANY_REQUESTS => JudgeError::RateLimited {
                    provider: self.model.clone(),
                },
                StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => JudgeError::InvalidApiKey {
                    provider: self.model.clone(),
                },
                _ => JudgeError::RequestFailed {
                    provider: self.model.clone(),
                    message,
                },
            }
            .into())
        }
    }

    fn model_id(&self) -> &str {
        &self.model
    }
}

impl std::fmt::Debug for HttpJudgeProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpJudgeProvider")
            .field("endpoint", &self.endpoint)
            .field("model", &self.model)
            .field("api_key", &"[REDACTED]")
            .finish()
    }
}

// ============================================================================
// TESTS
// ============================================================================
