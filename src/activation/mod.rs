//! Activation backends
//!
//! Starting a run means asking a backend for an execution id and a start
//! time. The engine treats the backend as a black box; a failed start is
//! terminal for that attempt and never retried here.

pub mod http;

pub use http::HttpActivationBackend;

use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::config::schema::{RosterMember, ScenarioConfig};
use crate::engine::{Activation, RunId};
use crate::error::ActivationError;

/// Body of `POST /activations`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivationRequest {
    pub stakeholder_count: usize,
    pub target_duration_minutes: f64,
    pub stakeholder_roster: Vec<RosterMember>,
}

impl ActivationRequest {
    /// Builds the request for `scenario`.
    #[must_use]
    pub fn from_scenario(scenario: &ScenarioConfig) -> Self {
        Self {
            stakeholder_count: scenario.total_members(),
            target_duration_minutes: scenario.scenario.target_completion.as_secs_f64() / 60.0,
            stakeholder_roster: scenario.roster.clone(),
        }
    }
}

/// Response of `POST /activations`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivationResponse {
    pub execution_id: String,
    pub coordination_start_time: chrono::DateTime<Utc>,
}

impl From<ActivationResponse> for Activation {
    fn from(response: ActivationResponse) -> Self {
        Self {
            execution_id: RunId(response.execution_id),
            start_time: response.coordination_start_time,
        }
    }
}

/// Something that can start an activation.
#[async_trait::async_trait]
pub trait ActivationBackend: Send + Sync {
    /// Starts an activation and returns its id and start time.
    ///
    /// # Errors
    ///
    /// Returns [`ActivationError`] if the backend rejects or cannot be
    /// reached. Callers surface it to the user.
    async fn start_activation(
        &self,
        request: &ActivationRequest,
    ) -> Result<Activation, ActivationError>;

    /// Short name for logs.
    fn name(&self) -> &'static str;
}

/// Offline backend: a random uuid and the current time.
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalActivationBackend;

#[async_trait::async_trait]
impl ActivationBackend for LocalActivationBackend {
    async fn start_activation(
        &self,
        request: &ActivationRequest,
    ) -> Result<Activation, ActivationError> {
        let activation = Activation {
            execution_id: RunId(uuid::Uuid::new_v4().to_string()),
            start_time: Utc::now(),
        };
        tracing::debug!(
            run_id = %activation.execution_id,
            stakeholders = request.stakeholder_count,
            "local activation started"
        );
        Ok(activation)
    }

    fn name(&self) -> &'static str {
        "local"
    }
}
