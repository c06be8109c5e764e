//! Live event transport
//!
//! Push channel that delivers real acknowledgments for one run. The
//! coordinator subscribes when a run starts and drops the subscription on
//! completion or reset. Transport failures never fail a run: the driver
//! logs them and the fallback simulator carries on.

pub mod http;
pub mod hub;

pub use http::HttpEventTransport;
pub use hub::ChannelHub;

use std::fmt;
use std::pin::Pin;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio_stream::Stream;

use crate::engine::RunId;
use crate::error::TransportError;

/// Result type alias for transport operations.
pub type Result<T> = std::result::Result<T, TransportError>;

/// Maximum length of one NDJSON event line (64 KB).
pub const DEFAULT_MAX_EVENT_SIZE: usize = 64 * 1024;

/// Event pushed by the live channel.
///
/// Every payload field is optional: the run tolerates partial events and
/// resolves members by whatever identifying field is present.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum LiveEvent {
    /// A stakeholder acknowledged
    #[serde(rename_all = "camelCase")]
    MemberAcknowledged {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        member_id: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        member_name: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        member_role: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        acknowledged_at: Option<DateTime<Utc>>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        total_stakeholders: Option<usize>,
    },
    /// The backend declared the run complete
    #[serde(rename_all = "camelCase")]
    RunComplete {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        total_stakeholders: Option<usize>,
    },
}

impl LiveEvent {
    /// Event type name as it appears on the wire.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::MemberAcknowledged { .. } => "member-acknowledged",
            Self::RunComplete { .. } => "run-complete",
        }
    }
}

/// Stream of events for one run. Dropping it unsubscribes.
pub type LiveSubscription = Pin<Box<dyn Stream<Item = Result<LiveEvent>> + Send>>;

/// Source of live events.
#[async_trait::async_trait]
pub trait LiveTransport: Send + Sync {
    /// Opens the event stream for `run_id`.
    ///
    /// # Errors
    ///
    /// Returns an error if the subscription cannot be established. The
    /// caller continues without live events.
    async fn subscribe(&self, run_id: &RunId) -> Result<LiveSubscription>;

    /// Returns the type of this transport for logging.
    fn transport_type(&self) -> TransportType;
}

/// Transport type identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransportType {
    /// In-process broadcast hub
    Channel,
    /// NDJSON event stream over HTTP
    Http,
}

impl TransportType {
    /// Lowercase label for logs and metrics.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Channel => "channel",
            Self::Http => "http",
        }
    }
}

impl fmt::Display for TransportType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transport_type_display() {
        assert_eq!(TransportType::Channel.to_string(), "channel");
        assert_eq!(TransportType::Http.to_string(), "http");
    }

    #[test]
    fn test_member_acknowledged_wire_format() {
        let json = r#"{"type":"member-acknowledged","memberId":"ic","memberName":"Sofia Marin","acknowledgedAt":"2026-03-01T09:00:05Z","totalStakeholders":8}"#;
        let event: LiveEvent = serde_json::from_str(json).unwrap();
        match &event {
            LiveEvent::MemberAcknowledged {
                member_id,
                member_role,
                total_stakeholders,
                ..
            } => {
                assert_eq!(member_id.as_deref(), Some("ic"));
                assert!(member_role.is_none());
                assert_eq!(*total_stakeholders, Some(8));
            }
            LiveEvent::RunComplete { .. } => panic!("wrong variant"),
        }
        assert_eq!(event.kind(), "member-acknowledged");
    }

    #[test]
    fn test_run_complete_wire_format() {
        let event: LiveEvent = serde_json::from_str(r#"{"type":"run-complete"}"#).unwrap();
        assert_eq!(
            event,
            LiveEvent::RunComplete {
                total_stakeholders: None
            }
        );
    }

    #[test]
    fn test_unknown_type_rejected() {
        assert!(serde_json::from_str::<LiveEvent>(r#"{"type":"heartbeat"}"#).is_err());
    }
}
