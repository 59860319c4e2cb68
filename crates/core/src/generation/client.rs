use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use std::time::Duration;
use tracing::debug;

use crate::config::GenerationConfig;
use crate::ticket::InboundRequest;

/// Error type for generation calls.
///
/// Callers treat every variant the same way (no retry); the variants exist
/// for logs and metrics.
#[derive(Debug, thiserror::Error)]
pub enum GenerationError {
    #[error("HTTP error: {0}")]
    Http(String),

    #[error("Generation service returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Timeout after {0:?}")]
    Timeout(Duration),
}

impl GenerationError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout(_))
    }

    /// Short label for metrics.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Http(_) => "http_error",
            Self::Status { .. } => "bad_status",
            Self::Timeout(_) => "timeout",
        }
    }
}

/// Request body sent to the generation service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationRequest {
    pub user_input: String,
    pub customer_name: Option<String>,
    pub customer_id: Option<String>,
}

impl From<&InboundRequest> for GenerationRequest {
    fn from(request: &InboundRequest) -> Self {
        Self {
            user_input: request.user_input.clone(),
            customer_name: request.customer_name.clone(),
            customer_id: request.customer_id.clone(),
        }
    }
}

/// Trait for generation service clients.
#[async_trait]
pub trait GenerationClient: Send + Sync {
    /// Where requests go (for logging).
    fn endpoint(&self) -> &str;

    /// Issue one request and return the raw response body.
    async fn generate(&self, request: &GenerationRequest) -> Result<String, GenerationError>;
}

/// HTTP client for the generation service: one `POST` per call with a hard timeout.
pub struct HttpGenerationClient {
    client: Client,
    url: String,
    timeout: Duration,
}

impl HttpGenerationClient {
    pub fn new(config: &GenerationConfig) -> Result<Self, GenerationError> {
        Self::with_timeout(config.url.clone(), config.timeout())
    }

    pub fn with_timeout(url: impl Into<String>, timeout: Duration) -> Result<Self, GenerationError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| GenerationError::Http(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            url: url.into(),
            timeout,
        })
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    fn map_error(&self, e: reqwest::Error) -> GenerationError {
        if e.is_timeout() {
            GenerationError::Timeout(self.timeout)
        } else {
            GenerationError::Http(e.to_string())
        }
    }
}

#[async_trait]
impl GenerationClient for HttpGenerationClient {
    fn endpoint(&self) -> &str {
        &self.url
    }

    async fn generate(&self, request: &GenerationRequest) -> Result<String, GenerationError> {
        debug!(url = %self.url, "Calling generation service");

        let response = self
            .client
            .post(&self.url)
            .header("content-type", "application/json")
            .json(request)
            .send()
            .await
            .map_err(|e| self.map_error(e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(GenerationError::Status {
                status: status.as_u16(),
                body: body.chars().take(200).collect(),
            });
        }

        response.text().await.map_err(|e| self.map_error(e))
    }
}
