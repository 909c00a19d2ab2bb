//! HTTP transport for finalized payload batches.
//!
//! [`HttpBatchSender`] posts a JSON array of finalized payloads to the
//! ingestion endpoint's `/data/batch` route, authenticating with an optional
//! bearer token. Failures are classified into [`TransportError`] variants
//! the orchestrating scheduler can act on; the sender itself makes exactly
//! one attempt per call, since retry policy lives with the scheduler.

use std::time::Duration;

use reqwest::header::RETRY_AFTER;
use reqwest::{Client, StatusCode};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::dispatch::BatchSender;
use crate::types::FinalizedPayload;

/// HTTP request timeout.
const REQUEST_TIMEOUT_SECS: u64 = 30;

/// Endpoint route batches are posted to, relative to the API base URL.
const BATCH_ROUTE: &str = "/data/batch";

/// Fallback retry hint when a 429 response omits the Retry-After header.
const DEFAULT_RETRY_AFTER_SECS: u64 = 60;

/// Errors that can occur while delivering a batch.
#[derive(Error, Debug)]
pub enum TransportError {
    /// The request could not be performed (connect, timeout, protocol).
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The endpoint rejected the credentials (401).
    #[error("authentication failed: invalid or expired token")]
    AuthFailed,

    /// The endpoint asked us to back off (429).
    #[error("rate limited, retry after {retry_after_secs} seconds")]
    RateLimited { retry_after_secs: u64 },

    /// Any other non-success response.
    #[error("server error: {status} - {message}")]
    ServerError { status: u16, message: String },
}

/// Batch sender backed by a pooled `reqwest` client.
#[derive(Debug, Clone)]
pub struct HttpBatchSender {
    api_url: String,
    token: Option<String>,
    client: Client,
}

impl HttpBatchSender {
    /// Creates a sender for the given API base URL and optional bearer token.
    #[must_use]
    pub fn new(api_url: String, token: Option<String>) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .pool_max_idle_per_host(5)
            .build()
            .expect("failed to create HTTP client");

        Self {
            api_url: api_url.trim_end_matches('/').to_string(),
            token,
            client,
        }
    }

    async fn post_batch(&self, batch: &[FinalizedPayload]) -> Result<(), TransportError> {
        let url = format!("{}{BATCH_ROUTE}", self.api_url);

        debug!(url = %url, payloads = batch.len(), "Posting payload batch");

        let mut request = self.client.post(&url).json(batch);
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await?;
        let status = response.status();

        match status {
            StatusCode::OK | StatusCode::CREATED | StatusCode::ACCEPTED => {
                info!(payloads = batch.len(), "Payload batch accepted");
                Ok(())
            }
            StatusCode::UNAUTHORIZED => {
                warn!("Ingestion endpoint rejected credentials");
                Err(TransportError::AuthFailed)
            }
            StatusCode::TOO_MANY_REQUESTS => {
                let retry_after_secs = response
                    .headers()
                    .get(RETRY_AFTER)
                    .and_then(|v| v.to_str().ok())
                    .and_then(|s| s.parse::<u64>().ok())
                    .unwrap_or(DEFAULT_RETRY_AFTER_SECS);
                warn!(retry_after_secs, "Rate limited by ingestion endpoint");
                Err(TransportError::RateLimited { retry_after_secs })
            }
            _ => {
                let message = response.text().await.unwrap_or_default();
                warn!(status = status.as_u16(), message = %message, "Batch rejected");
                Err(TransportError::ServerError {
                    status: status.as_u16(),
                    message,
                })
            }
        }
    }
}

impl BatchSender for HttpBatchSender {
    async fn send(&self, batch: &[FinalizedPayload]) -> Result<(), TransportError> {
        if batch.is_empty() {
            return Ok(());
        }
        self.post_batch(batch).await
    }
}
