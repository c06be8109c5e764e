//! In-process broadcast hub.
//!
//! One `tokio::sync::broadcast` channel per run id. The HTTP API publishes
//! into it (`POST /acknowledge`) and the session's driver subscribes to it,
//! which gives `serve` a live channel without an external backend.

use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use dashmap::DashMap;
use tokio::sync::broadcast;
use tokio_stream::Stream;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;

use crate::engine::RunId;
use crate::error::TransportError;
use crate::transport::{LiveEvent, LiveSubscription, LiveTransport, Result, TransportType};

/// Default per-run channel capacity.
pub const DEFAULT_HUB_CAPACITY: usize = 256;

type Channels = DashMap<RunId, broadcast::Sender<LiveEvent>>;

/// Per-run broadcast channels keyed by run id.
#[derive(Debug, Clone)]
pub struct ChannelHub {
    channels: Arc<Channels>,
    capacity: usize,
}

impl Default for ChannelHub {
    fn default() -> Self {
        Self::new(DEFAULT_HUB_CAPACITY)
    }
}

impl ChannelHub {
    /// Creates an empty hub whose channels buffer `capacity` events.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            channels: Arc::new(DashMap::new()),
            capacity: capacity.max(1),
        }
    }

    /// Publishes `event` to subscribers of `run_id`. Returns how many
    /// subscribers received it; zero when nobody listens.
    pub fn publish(&self, run_id: &RunId, event: LiveEvent) -> usize {
        self.channels
            .get(run_id)
            .map_or(0, |tx| tx.send(event).unwrap_or(0))
    }

    /// Number of live subscriptions for `run_id`.
    #[must_use]
    pub fn subscriber_count(&self, run_id: &RunId) -> usize {
        self.channels
            .get(run_id)
            .map_or(0, |tx| tx.receiver_count())
    }

    /// Closes the channel for `run_id`; open subscriptions end.
    pub fn close(&self, run_id: &RunId) {
        if self.channels.remove(run_id).is_some() {
            tracing::debug!(run_id = %run_id, "hub channel closed");
        }
    }

    fn open(&self, run_id: &RunId) -> HubSubscription {
        let rx = self
            .channels
            .entry(run_id.clone())
            .or_insert_with(|| broadcast::channel(self.capacity).0)
            .subscribe();
        HubSubscription {
            inner: BroadcastStream::new(rx),
            channels: Arc::clone(&self.channels),
            run_id: run_id.clone(),
        }
    }
}

#[async_trait::async_trait]
impl LiveTransport for ChannelHub {
    async fn subscribe(&self, run_id: &RunId) -> Result<LiveSubscription> {
        tracing::debug!(run_id = %run_id, "subscribing to hub channel");
        Ok(Box::pin(self.open(run_id)))
    }

    fn transport_type(&self) -> TransportType {
        TransportType::Channel
    }
}

/// Subscription handle; removes the run's channel when the last one drops.
struct HubSubscription {
    inner: BroadcastStream<LiveEvent>,
    channels: Arc<Channels>,
    run_id: RunId,
}

impl Stream for HubSubscription {
    type Item = Result<LiveEvent>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        match Pin::new(&mut self.inner).poll_next(cx) {
            Poll::Ready(Some(Ok(event))) => Poll::Ready(Some(Ok(event))),
            Poll::Ready(Some(Err(BroadcastStreamRecvError::Lagged(n)))) => Poll::Ready(Some(Err(
                TransportError::Protocol(format!("subscriber lagged by {n} events")),
            ))),
            Poll::Ready(None) => Poll::Ready(None),
            Poll::Pending => Poll::Pending,
        }
    }
}

impl Drop for HubSubscription {
    fn drop(&mut self) {
        // `inner` still holds its receiver here, so the last subscriber sees 1.
        self.channels
            .remove_if(&self.run_id, |_, tx| tx.receiver_count() <= 1);
    }
}
