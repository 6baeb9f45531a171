//! Testing Farm API client.
//!
//! A Testing Farm notification carries only the request id. The parser
//! fetches the full request (result, environment, artifacts, xunit report)
//! through [`TestingFarmClient::get_request_details`] before it can build a
//! result event. Every failure of that call is reported as an error so the
//! caller can retry the whole parse later.

use async_trait::async_trait;
use reqwest::StatusCode;
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, error, instrument};

use crate::config::ServiceConfig;

// ============================================================================
// Errors
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum TestingFarmError {
    #[error("Testing Farm request timed out after {timeout:?}")]
    Timeout { timeout: Duration },

    #[error("HTTP request to Testing Farm failed: {message}")]
    Http { message: String },

    #[error("Testing Farm returned status {status}: {message}")]
    HttpStatus { status: u16, message: String },

    #[error("Testing Farm request not found: {request_id}")]
    NotFound { request_id: String },

    #[error("Invalid response from Testing Farm: {message}")]
    InvalidResponse { message: String },

    #[error("Client configuration error: {message}")]
    Configuration { message: String },
}

impl TestingFarmError {
    /// Check if error is transient and should be retried
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Timeout { .. } => true,
            Self::Http { .. } => true,
            Self::HttpStatus { status, .. } => *status >= 500 || *status == 429,
            Self::NotFound { .. } => false,
            Self::InvalidResponse { .. } => false,
            Self::Configuration { .. } => false,
        }
    }
}

// ============================================================================
// Client
// ============================================================================

/// Source of Testing Farm request details.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TestingFarmClient: Send + Sync {
    /// Fetch the full request document for `request_id`.
    async fn get_request_details(&self, request_id: &str) -> Result<Value, TestingFarmError>;
}

/// Configuration for [`HttpTestingFarmClient`].
#[derive(Debug, Clone)]
pub struct TestingFarmClientConfig {
    /// API base URL, e.g. `https://api.dev.testing-farm.io/v0.1`
    pub api_url: String,
    /// Bound for a single request
    pub timeout: Duration,
    pub user_agent: String,
}

impl Default for TestingFarmClientConfig {
    fn default() -> Self {
        Self {
            api_url: "https://api.dev.testing-farm.io/v0.1".to_string(),
            timeout: Duration::from_secs(30),
            user_agent: format!("forge-intake/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

impl TestingFarmClientConfig {
    /// Configuration matching the service settings.
    pub fn from_service_config(config: &ServiceConfig) -> Self {
        Self::default()
            .with_api_url(config.testing_farm_api_url.clone())
            .with_timeout(config.testing_farm_timeout())
    }

    pub fn with_api_url(mut self, api_url: impl Into<String>) -> Self {
        self.api_url = api_url.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }
}

/// [`TestingFarmClient`] talking to the Testing Farm REST API.
#[derive(Debug, Clone)]
pub struct HttpTestingFarmClient {
    http_client: reqwest::Client,
    config: TestingFarmClientConfig,
}

impl HttpTestingFarmClient {
    /// Build the client.
    ///
    /// # Errors
    ///
    /// Returns `TestingFarmError::Configuration` if the HTTP client cannot be created.
    pub fn new(config: TestingFarmClientConfig) -> Result<Self, TestingFarmError> {
        let http_client = reqwest::Client::builder()
            .timeout(config.timeout)
            .user_agent(&config.user_agent)
            .build()
            .map_err(|e| TestingFarmError::Configuration {
                message: format!("Failed to create HTTP client: {}", e),
            })?;

        Ok(Self {
            http_client,
            config,
        })
    }

    pub fn config(&self) -> &TestingFarmClientConfig {
        &self.config
    }

    fn map_send_error(&self, e: reqwest::Error) -> TestingFarmError {
        if e.is_timeout() {
            TestingFarmError::Timeout {
                timeout: self.config.timeout,
            }
        } else {
            TestingFarmError::Http {
                message: e.to_string(),
            }
        }
    }
}

#[async_trait]
impl TestingFarmClient for HttpTestingFarmClient {
    #[instrument(skip(self), fields(api_url = %self.config.api_url))]
    async fn get_request_details(&self, request_id: &str) -> Result<Value, TestingFarmError> {
        let url = format!(
            "{}/requests/{}",
            self.config.api_url.trim_end_matches('/'),
            request_id
        );

        let response = self
            .http_client
            .get(&url)
            .header("Accept", "application/json")
            .send()
            .await
            .map_err(|e| self.map_send_error(e))?;

        let status = response.status();
        if !status.is_success() {
            let message = response
                .text()
                .await
                .unwrap_or_else(|_| "Unable to read error body".to_string());
            error!(request_id, status = status.as_u16(), "Failed to get request details");
            return Err(match status {
                StatusCode::NOT_FOUND => TestingFarmError::NotFound {
                    request_id: request_id.to_string(),
                },
                _ => TestingFarmError::HttpStatus {
                    status: status.as_u16(),
                    message,
                },
            });
        }

        let details = response.json::<Value>().await.map_err(|e| {
            if e.is_timeout() {
                TestingFarmError::Timeout {
                    timeout: self.config.timeout,
                }
            } else {
                TestingFarmError::InvalidResponse {
                    message: format!("Failed to parse request details: {}", e),
                }
            }
        })?;

        match &details {
            Value::Object(map) if !map.is_empty() => {
                debug!(request_id, "Fetched Testing Farm request details");
                Ok(details)
            }
            _ => Err(TestingFarmError::InvalidResponse {
                message: format!("Empty request details for {}", request_id),
            }),
        }
    }
}

#[cfg(test)]
#[path = "testing_farm_tests.rs"]
mod tests;
