//! NDJSON event stream over HTTP.
//!
//! `GET {base}/activations/{run_id}/events` returns a chunked body with one
//! [`LiveEvent`] per line. Blank lines are keep-alives and are skipped.

use std::time::Duration;

use reqwest::Client;
use reqwest::header::ACCEPT;
use tokio_stream::StreamExt;
use tokio_util::codec::{FramedRead, LinesCodec, LinesCodecError};
use tokio_util::io::StreamReader;

use crate::engine::RunId;
use crate::error::TransportError;
use crate::transport::{
    DEFAULT_MAX_EVENT_SIZE, LiveEvent, LiveSubscription, LiveTransport, Result, TransportType,
};

/// Connect timeout for the event stream. The stream itself has no total
/// timeout since it stays open for the whole run.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// HTTP client for the backend's live event stream.
#[derive(Debug, Clone)]
pub struct HttpEventTransport {
    client: Client,
    base_url: String,
    max_event_size: usize,
}

impl HttpEventTransport {
    /// Creates a transport for the backend at `base_url`.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::ConnectionFailed`] if the HTTP client
    /// cannot be built.
    pub fn new(base_url: &str) -> Result<Self> {
        let client = Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .build()
            .map_err(|e| TransportError::ConnectionFailed(e.to_string()))?;
        Ok(Self::with_client(client, base_url))
    }

    /// Creates a transport sharing an existing client.
    #[must_use]
    pub fn with_client(client: Client, base_url: &str) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            max_event_size: DEFAULT_MAX_EVENT_SIZE,
        }
    }

    /// Overrides the maximum accepted event line length.
    #[must_use]
    pub const fn with_max_event_size(mut self, max: usize) -> Self {
        self.max_event_size = max;
        self
    }

    fn events_url(&self, run_id: &RunId) -> String {
        format!("{}/activations/{}/events", self.base_url, run_id)
    }
}

#[async_trait::async_trait]
impl LiveTransport for HttpEventTransport {
    async fn subscribe(&self, run_id: &RunId) -> Result<LiveSubscription> {
        let url = self.events_url(run_id);
        tracing::debug!(%url, "opening live event stream");

        let response = self
            .client
            .get(&url)
            .header(ACCEPT, "application/x-ndjson")
            .send()
            .await
            .map_err(|e| TransportError::ConnectionFailed(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(TransportError::ConnectionFailed(format!(
                "{url} returned {status}"
            )));
        }

        let body = response
            .bytes_stream()
            .map(|chunk| chunk.map_err(std::io::Error::other));
        let lines = FramedRead::new(
            StreamReader::new(body),
            LinesCodec::new_with_max_length(self.max_event_size),
        );

        let max = self.max_event_size;
        let events = lines.filter_map(move |line| match line {
            Ok(line) if line.trim().is_empty() => None,
            Ok(line) => Some(serde_json::from_str::<LiveEvent>(&line).map_err(TransportError::from)),
            Err(LinesCodecError::MaxLineLengthExceeded) => Some(Err(TransportError::Protocol(
                format!("event line exceeds {max} bytes"),
            ))),
            Err(LinesCodecError::Io(e)) => Some(Err(TransportError::Io(e))),
        });

        Ok(Box::pin(events))
    }

    fn transport_type(&self) -> TransportType {
        TransportType::Http
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::Router;
    use axum::extract::Path;
    use axum::http::StatusCode;
    use axum::routing::get;

    async fn serve(router: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        format!("http://{addr}/")
    }

    async fn events(Path(id): Path<String>) -> String {
        format!(
            "{{\"type\":\"member-acknowledged\",\"memberId\":\"{id}-a\"}}\n\
             \n\
             not json\n\
             {{\"type\":\"run-complete\",\"totalStakeholders\":2}}\n"
        )
    }

    #[test]
    fn test_events_url_trims_slash() {
        let transport = HttpEventTransport::with_client(Client::new(), "http://backend:9000/");
        assert_eq!(
            transport.events_url(&RunId::new("exec-1")),
            "http://backend:9000/activations/exec-1/events"
        );
    }

    #[tokio::test]
    async fn test_stream_decodes_lines() {
        let base = serve(Router::new().route("/activations/{id}/events", get(events))).await;
        let transport = HttpEventTransport::new(&base).unwrap();
        let sub = transport.subscribe(&RunId::new("r1")).await.unwrap();
        let items: Vec<Result<LiveEvent>> = sub.collect().await;

        assert_eq!(items.len(), 3);
        assert!(matches!(
            &items[0],
            Ok(LiveEvent::MemberAcknowledged { member_id: Some(id), .. }) if id == "r1-a"
        ));
        assert!(matches!(items[1], Err(TransportError::Json(_))));
        assert!(matches!(
            items[2],
            Ok(LiveEvent::RunComplete {
                total_stakeholders: Some(2)
            })
        ));
    }

    #[tokio::test]
    async fn test_non_success_status_fails_subscribe() {
        let base = serve(Router::new().route(
            "/activations/{id}/events",
            get(|| async { StatusCode::NOT_FOUND }),
        ))
        .await;
        let transport = HttpEventTransport::new(&base).unwrap();
        let err = transport.subscribe(&RunId::new("r1")).await.err().unwrap();
        assert!(matches!(err, TransportError::ConnectionFailed(_)));
    }

    #[tokio::test]
    async fn test_oversized_line_is_protocol_error() {
        let base = serve(Router::new().route(
            "/activations/{id}/events",
            get(|| async { format!("{}\n", "x".repeat(200)) }),
        ))
        .await;
        let transport = HttpEventTransport::new(&base).unwrap().with_max_event_size(64);
        let mut sub = transport.subscribe(&RunId::new("r1")).await.unwrap();
        assert!(matches!(
            sub.next().await,
            Some(Err(TransportError::Protocol(_)))
        ));
    }

    #[tokio::test]
    async fn test_unreachable_backend() {
        let transport = HttpEventTransport::new("http://127.0.0.1:9").unwrap();
        assert!(transport.subscribe(&RunId::new("r1")).await.is_err());
    }
}
