//! HTTP activation backend (`POST {base}/activations`).

use std::time::Duration;

use reqwest::Client;

use crate::activation::{ActivationBackend, ActivationRequest, ActivationResponse};
use crate::engine::Activation;
use crate::error::ActivationError;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Starts activations against a remote backend.
#[derive(Debug, Clone)]
pub struct HttpActivationBackend {
    client: Client,
    base_url: String,
}

impl HttpActivationBackend {
    /// Creates a backend client for `base_url`.
    ///
    /// # Errors
    ///
    /// Returns [`ActivationError::Unreachable`] if the HTTP client cannot be
    /// built.
    pub fn new(base_url: &str) -> Result<Self, ActivationError> {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| ActivationError::Unreachable(e.to_string()))?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    /// Base URL without trailing slash.
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

#[async_trait::async_trait]
impl ActivationBackend for HttpActivationBackend {
    async fn start_activation(
        &self,
        request: &ActivationRequest,
    ) -> Result<Activation, ActivationError> {
        let url = format!("{}/activations", self.base_url);
        tracing::debug!(%url, stakeholders = request.stakeholder_count, "starting activation");

        let response = self
            .client
            .post(&url)
            .json(request)
            .send()
            .await
            .map_err(|e| ActivationError::Unreachable(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = if body.trim().is_empty() {
                status
                    .canonical_reason()
                    .unwrap_or("unknown status")
                    .to_string()
            } else {
                body.trim().to_string()
            };
            tracing::warn!(status = status.as_u16(), %message, "activation rejected");
            return Err(ActivationError::StartFailed {
                status: status.as_u16(),
                message,
            });
        }

        let body: ActivationResponse = response
            .json()
            .await
            .map_err(|e| ActivationError::MalformedResponse(e.to_string()))?;
        Ok(body.into())
    }

    fn name(&self) -> &'static str {
        "http"
    }
}
