//! Remote review commands
//!
//! The backend owns review execution; this client only asks it to start or
//! retry and reports whether the request was accepted.

use crate::error::CommandError;
use async_trait::async_trait;
use serde::Deserialize;
use std::sync::Arc;

/// Start / retry requests against the review backend
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ReviewCommands: Send + Sync {
    /// Ask the backend to start a review of `attempt_id`
    async fn request_start(&self, attempt_id: &str) -> Result<(), CommandError>;

    /// Ask the backend to retry the review of `attempt_id`
    async fn request_retry(&self, attempt_id: &str) -> Result<(), CommandError>;
}

#[async_trait]
impl<T: ReviewCommands + ?Sized> ReviewCommands for Arc<T> {
    async fn request_start(&self, attempt_id: &str) -> Result<(), CommandError> {
        (**self).request_start(attempt_id).await
    }

    async fn request_retry(&self, attempt_id: &str) -> Result<(), CommandError> {
        (**self).request_retry(attempt_id).await
    }
}

/// Backend response envelope
#[derive(Debug, Deserialize)]
struct ApiResponse {
    #[serde(default = "accepted")]
    success: bool,
    #[serde(default)]
    message: Option<String>,
}

fn accepted() -> bool {
    true
}

/// HTTP implementation of [`ReviewCommands`]
#[derive(Debug, Clone)]
pub struct HttpReviewCommands {
    client: reqwest::Client,
    base_url: String,
}

impl HttpReviewCommands {
    /// Create client for the backend at `base_url`
    #[inline]
    #[must_use]
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_client(reqwest::Client::new(), base_url)
    }

    /// Create with a preconfigured HTTP client
    #[inline]
    #[must_use]
    pub fn with_client(client: reqwest::Client, base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self { client, base_url }
    }

    /// URL of a review action for an attempt
    #[must_use]
    pub fn endpoint(&self, attempt_id: &str, action: &str) -> String {
        format!(
            "{}/api/task-attempts/{attempt_id}/review/{action}",
            self.base_url
        )
    }

    async fn post(&self, attempt_id: &str, action: &str) -> Result<(), CommandError> {
        let url = self.endpoint(attempt_id, action);
        tracing::debug!(%url, "sending review command");

        let response = self.client.post(&url).send().await?;
        let status = response.status();
        let body = response.json::<ApiResponse>().await.ok();

        if !status.is_success() {
            let message = body
                .and_then(|b| b.message)
                .unwrap_or_else(|| format!("review {action} returned {status}"));
            return Err(CommandError::Rejected {
                status: Some(status.as_u16()),
                message,
            });
        }

        match body {
            Some(ApiResponse {
                success: false,
                message,
            }) => Err(CommandError::Rejected {
                status: Some(status.as_u16()),
                message: message.unwrap_or_else(|| format!("review {action} was refused")),
            }),
            _ => Ok(()),
        }
    }
}

#[async_trait]
impl ReviewCommands for HttpReviewCommands {
    async fn request_start(&self, attempt_id: &str) -> Result<(), CommandError> {
        self.post(attempt_id, "start").await
    }

    async fn request_retry(&self, attempt_id: &str) -> Result<(), CommandError> {
        self.post(attempt_id, "retry").await
    }
}
