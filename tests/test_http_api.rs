//! End-to-end: the HTTP API over a real listener, with stakeholders
//! acknowledging through `POST /acknowledge`.

mod common;

use std::sync::Arc;
use std::time::Duration;

use livecoord::activation::LocalActivationBackend;
use livecoord::api::{self, ApiState};
use livecoord::engine::Coordinator;
use livecoord::observability::EventEmitter;
use livecoord::session::CoordinationSession;
use livecoord::transport::ChannelHub;
use serde_json::{Value, json};
use tokio_util::sync::CancellationToken;

async fn spawn_api(scenario: &str) -> (String, CancellationToken) {
    let hub = ChannelHub::default();
    let session = CoordinationSession::new(
        Coordinator::with_seed(common::builtin(scenario), 1),
        Arc::new(LocalActivationBackend),
        Arc::new(hub.clone()),
        Arc::new(EventEmitter::noop()),
    );
    let state = Arc::new(ApiState::new(Arc::new(session), hub));

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let cancel = CancellationToken::new();
    tokio::spawn(api::serve(listener, state, cancel.clone()));
    (format!("http://{addr}"), cancel)
}

async fn snapshot(client: &reqwest::Client, base: &str) -> Value {
    client
        .get(format!("{base}/snapshot"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap()
}

#[tokio::test]
async fn live_roster_completes_the_run() {
    let (base, cancel) = spawn_api("investor").await;
    let client = reqwest::Client::new();

    let started: Value = client
        .post(format!("{base}/start"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let total = started["totalMembers"].as_u64().unwrap();
    assert_eq!(total, 15);

    let roster = common::builtin("investor");
    for member in &roster.roster {
        let resp = client
            .post(format!("{base}/acknowledge"))
            .json(&json!({ "memberId": member.id }))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), reqwest::StatusCode::ACCEPTED);
    }

    let mut phase = Value::Null;
    for _ in 0..40 {
        let snap = snapshot(&client, &base).await;
        phase = snap["phase"].clone();
        if phase == "complete" {
            assert_eq!(snap["acknowledged"], total);
            let ledger = snap["ledgerSnapshot"].as_array().unwrap();
            assert!(ledger.iter().all(|e| e["origin"] == "live"));
            break;
        }
        tokio::time::sleep(Duration::from_millis(100)).await;
    }
    assert_eq!(phase, "complete");

    cancel.cancel();
}

#[tokio::test]
async fn restart_discards_previous_run() {
    let (base, cancel) = spawn_api("one-click").await;
    let client = reqwest::Client::new();

    let first: Value = client
        .post(format!("{base}/start"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    client
        .post(format!("{base}/acknowledge"))
        .json(&json!({ "memberRole": "CISO" }))
        .send()
        .await
        .unwrap();

    let second: Value = client
        .post(format!("{base}/start"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_ne!(first["runId"], second["runId"]);

    let snap = snapshot(&client, &base).await;
    assert_eq!(snap["runId"], second["runId"]);
    assert_eq!(snap["acknowledged"], 0);

    let reset: Value = client
        .post(format!("{base}/reset"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(reset["runId"], second["runId"]);

    cancel.cancel();
}
