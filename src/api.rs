//! HTTP control surface for `livecoord serve`
//!
//! Exposes the session's snapshot and lifecycle to a presentation layer.
//! `POST /acknowledge` publishes into the in-process [`ChannelHub`] the
//! session subscribes to, so a demonstration can click stakeholders in
//! without an external event backend.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::engine::RunId;
use crate::error::TransportError;
use crate::session::CoordinationSession;
use crate::transport::{ChannelHub, LiveEvent};

/// Shared state behind every route.
#[derive(Debug)]
pub struct ApiState {
    session: Arc<CoordinationSession>,
    hub: ChannelHub,
}

impl ApiState {
    /// `hub` must be the transport `session` subscribes to.
    #[must_use]
    pub const fn new(session: Arc<CoordinationSession>, hub: ChannelHub) -> Self {
        Self { session, hub }
    }
}

// ============================================================================
// Wire types
// ============================================================================

/// `POST /acknowledge` body. At least one field must be non-empty.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AcknowledgeRequest {
    #[serde(default)]
    pub member_id: Option<String>,
    #[serde(default)]
    pub member_name: Option<String>,
    #[serde(default)]
    pub member_role: Option<String>,
}

impl AcknowledgeRequest {
    fn is_empty(&self) -> bool {
        [&self.member_id, &self.member_name, &self.member_role]
            .iter()
            .all(|f| f.as_deref().is_none_or(str::is_empty))
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct StartResponse {
    run_id: RunId,
    start_time: chrono::DateTime<chrono::Utc>,
    total_members: usize,
    target_completion_seconds: u64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ResetResponse {
    reset: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    run_id: Option<RunId>,
    acknowledged: usize,
    cancelled_timers: usize,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct AcknowledgeResponse {
    run_id: RunId,
    delivered: usize,
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
}

fn error(status: StatusCode, message: impl Into<String>) -> Response {
    (
        status,
        Json(ErrorBody {
            error: message.into(),
        }),
    )
        .into_response()
}

// ============================================================================
// Router
// ============================================================================

/// Builds the router over `state`.
pub fn router(state: Arc<ApiState>) -> Router {
    Router::new()
        .route("/health", get(handle_health))
        .route("/snapshot", get(handle_snapshot))
        .route("/start", post(handle_start))
        .route("/reset", post(handle_reset))
        .route("/acknowledge", post(handle_acknowledge))
        .with_state(state)
}

/// Serves the API on `listener` until `cancel` fires.
///
/// # Errors
///
/// Returns [`TransportError::ConnectionFailed`] if the listener's address
/// cannot be read or the server stops with an I/O error.
pub async fn serve(
    listener: TcpListener,
    state: Arc<ApiState>,
    cancel: CancellationToken,
) -> Result<(), TransportError> {
    let addr: SocketAddr = listener
        .local_addr()
        .map_err(|e| TransportError::ConnectionFailed(format!("local_addr failed: {e}")))?;
    info!(%addr, "HTTP API listening");

    axum::serve(listener, router(state))
        .with_graceful_shutdown(async move {
            cancel.cancelled().await;
        })
        .await
        .map_err(|e| TransportError::ConnectionFailed(format!("server error: {e}")))?;

    debug!("HTTP API shut down");
    Ok(())
}

async fn handle_health() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "ok",
        "name": env!("CARGO_PKG_NAME"),
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

/// Always `200`: an idle session returns an idle snapshot.
async fn handle_snapshot(State(state): State<Arc<ApiState>>) -> Response {
    Json(state.session.snapshot()).into_response()
}

async fn handle_start(State(state): State<Arc<ApiState>>) -> Response {
    match state.session.start().await {
        Ok(run) => Json(StartResponse {
            run_id: run.run_id,
            start_time: run.start_time,
            total_members: run.total_members,
            target_completion_seconds: run.target_completion.as_secs(),
        })
        .into_response(),
        Err(e) => error(StatusCode::BAD_GATEWAY, e.to_string()),
    }
}

async fn handle_reset(State(state): State<Arc<ApiState>>) -> Response {
    let body = state.session.reset().await.map_or(
        ResetResponse {
            reset: false,
            run_id: None,
            acknowledged: 0,
            cancelled_timers: 0,
        },
        |report| ResetResponse {
            reset: true,
            run_id: Some(report.run_id),
            acknowledged: report.acknowledged,
            cancelled_timers: report.cancelled_timers,
        },
    );
    Json(body).into_response()
}

async fn handle_acknowledge(
    State(state): State<Arc<ApiState>>,
    Json(request): Json<AcknowledgeRequest>,
) -> Response {
    if request.is_empty() {
        return error(
            StatusCode::BAD_REQUEST,
            "one of memberId, memberName or memberRole is required",
        );
    }
    let Some(run_id) = state.session.active_run() else {
        return error(StatusCode::CONFLICT, "no active run");
    };

    let delivered = state.hub.publish(
        &run_id,
        LiveEvent::MemberAcknowledged {
            member_id: request.member_id,
            member_name: request.member_name,
            member_role: request.member_role,
            acknowledged_at: Some(chrono::Utc::now()),
            total_stakeholders: None,
        },
    );
    debug!(run_id = %run_id, delivered, "acknowledgment published");

    (
        StatusCode::ACCEPTED,
        Json(AcknowledgeResponse { run_id, delivered }),
    )
        .into_response()
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::activation::{ActivationBackend, ActivationRequest, LocalActivationBackend};
    use crate::config::ConfigLoader;
    use crate::engine::{Activation, Coordinator, Origin};
    use crate::error::ActivationError;
    use crate::observability::EventEmitter;
    use crate::scenarios;
    use axum::body::Body;
    use axum::http::Request;
    use tower::util::ServiceExt;

    fn app_with(backend: Arc<dyn ActivationBackend>) -> Router {
        let config = scenarios::resolve("one-click", &ConfigLoader::with_defaults())
            .unwrap()
            .config;
        let hub = ChannelHub::default();
        let session = CoordinationSession::new(
            Coordinator::new(config),
            backend,
            Arc::new(hub.clone()),
            Arc::new(EventEmitter::noop()),
        );
        router(Arc::new(ApiState::new(Arc::new(session), hub)))
    }

    fn app() -> Router {
        app_with(Arc::new(LocalActivationBackend))
    }

    async fn call(
        app: &Router,
        method: &str,
        uri: &str,
        body: Option<&str>,
    ) -> (StatusCode, serde_json::Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        let body = match body {
            Some(json) => {
                builder = builder.header("content-type", "application/json");
                Body::from(json.to_string())
            }
            None => Body::empty(),
        };
        let resp = app.clone().oneshot(builder.body(body).unwrap()).await.unwrap();
        let status = resp.status();
        let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        let value = if bytes.is_empty() {
            serde_json::Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, value)
    }

    struct DownBackend;

    #[async_trait::async_trait]
    impl ActivationBackend for DownBackend {
        async fn start_activation(
            &self,
            _request: &ActivationRequest,
        ) -> Result<Activation, ActivationError> {
            Err(ActivationError::StartFailed {
                status: 503,
                message: "maintenance".to_string(),
            })
        }

        fn name(&self) -> &'static str {
            "down"
        }
    }

    #[tokio::test]
    async fn health_reports_ok() {
        let (status, body) = call(&app(), "GET", "/health", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
    }

    #[tokio::test]
    async fn idle_snapshot() {
        let (status, body) = call(&app(), "GET", "/snapshot", None).await;
        assert_eq!(status, StatusCode::OK);
        assert!(body["runId"].is_null());
        assert_eq!(body["totalMembers"], 8);
        assert_eq!(body["ledgerSnapshot"].as_array().unwrap().len(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn start_acknowledge_reset() {
        let app = app();
        let (status, started) = call(&app, "POST", "/start", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(started["totalMembers"], 8);
        assert_eq!(started["targetCompletionSeconds"], 12);

        let body = r#"{"memberName":"Sofia Marin"}"#;
        let (status, ack) = call(&app, "POST", "/acknowledge", Some(body)).await;
        assert_eq!(status, StatusCode::ACCEPTED);
        assert_eq!(ack["delivered"], 1);
        assert_eq!(ack["runId"], started["runId"]);

        tokio::time::sleep(Duration::from_millis(100)).await;
        let (_, snapshot) = call(&app, "GET", "/snapshot", None).await;
        assert_eq!(snapshot["runId"], started["runId"]);
        let ledger = snapshot["ledgerSnapshot"].as_array().unwrap();
        assert_eq!(ledger.len(), 1);
        assert_eq!(ledger[0]["memberId"], "ic");
        assert_eq!(ledger[0]["origin"], Origin::Live.as_str());

        let (status, reset) = call(&app, "POST", "/reset", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(reset["reset"], true);
        assert_eq!(reset["acknowledged"], 1);

        let (_, reset) = call(&app, "POST", "/reset", None).await;
        assert_eq!(reset["reset"], false);
    }

    #[tokio::test]
    async fn acknowledge_without_run_conflicts() {
        let (status, body) =
            call(&app(), "POST", "/acknowledge", Some(r#"{"memberId":"ic"}"#)).await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["error"], "no active run");
    }

    #[tokio::test]
    async fn acknowledge_requires_a_member_field() {
        let (status, _) =
            call(&app(), "POST", "/acknowledge", Some(r#"{"memberId":""}"#)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn start_failure_is_bad_gateway() {
        let app = app_with(Arc::new(DownBackend));
        let (status, body) = call(&app, "POST", "/start", None).await;
        assert_eq!(status, StatusCode::BAD_GATEWAY);
        assert!(body["error"].as_str().unwrap().contains("maintenance"));

        let (_, snapshot) = call(&app, "GET", "/snapshot", None).await;
        assert!(snapshot["runId"].is_null());
    }
}
