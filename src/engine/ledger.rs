//! Acknowledgment ledger
//!
//! Append-only, deduplicated record of which roster members acknowledged.
//! Both the live transport and the fallback simulator write through
//! [`AckLedger::record`], which is the only dedup guard: the first writer
//! for a member wins and later writes are rejected without side effects.

use std::collections::HashSet;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::Serialize;

/// Identity of a roster member inside the ledger (the roster member id).
#[derive(Debug, Clone, Hash, Eq, PartialEq, Ord, PartialOrd, Serialize)]
#[serde(transparent)]
pub struct MemberKey(pub String);

impl MemberKey {
    /// Creates a new `MemberKey`.
    #[must_use]
    pub fn new(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    /// Returns the key as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MemberKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Which channel produced an acknowledgment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Origin {
    /// Pushed by the live transport
    Live,
    /// Generated by the fallback simulator
    Simulated,
}

impl Origin {
    /// Returns the lowercase label used in logs and metrics.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Live => "live",
            Self::Simulated => "simulated",
        }
    }
}

impl fmt::Display for Origin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One accepted acknowledgment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AcknowledgmentRecord {
    /// Member that acknowledged
    pub member: MemberKey,
    /// When the acknowledgment happened
    pub acknowledged_at: DateTime<Utc>,
    /// Whole seconds between run start and the acknowledgment
    pub response_time_seconds: u64,
    /// Channel that produced it
    pub origin: Origin,
}

/// Append-only acknowledgment ledger bounded by roster size.
#[derive(Debug, Clone)]
pub struct AckLedger {
    started_at: DateTime<Utc>,
    capacity: usize,
    records: Vec<AcknowledgmentRecord>,
    members: HashSet<MemberKey>,
}

impl AckLedger {
    /// Creates an empty ledger for a run that started at `started_at` with
    /// `capacity` roster members.
    #[must_use]
    pub fn new(capacity: usize, started_at: DateTime<Utc>) -> Self {
        Self {
            started_at,
            capacity,
            records: Vec::with_capacity(capacity),
            members: HashSet::with_capacity(capacity),
        }
    }

    /// Records an acknowledgment.
    ///
    /// Returns `false` without side effects if `member` is already present
    /// or the ledger is full.
    pub fn record(
        &mut self,
        member: MemberKey,
        acknowledged_at: DateTime<Utc>,
        origin: Origin,
    ) -> bool {
        self.try_record(member, acknowledged_at, origin).is_some()
    }

    /// Like [`record`](Self::record), returning a copy of the accepted record.
    pub fn try_record(
        &mut self,
        member: MemberKey,
        acknowledged_at: DateTime<Utc>,
        origin: Origin,
    ) -> Option<AcknowledgmentRecord> {
        if self.records.len() >= self.capacity || self.members.contains(&member) {
            return None;
        }

        let response_time_seconds =
            u64::try_from((acknowledged_at - self.started_at).num_seconds()).unwrap_or(0);

        let record = AcknowledgmentRecord {
            member: member.clone(),
            acknowledged_at,
            response_time_seconds,
            origin,
        };
        self.members.insert(member);
        self.records.push(record.clone());
        Some(record)
    }

    /// Number of accepted acknowledgments.
    #[must_use]
    pub fn size(&self) -> usize {
        self.records.len()
    }

    /// Maximum number of records (roster size).
    #[must_use]
    pub const fn capacity(&self) -> usize {
        self.capacity
    }

    /// Whether no acknowledgment has been accepted yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Whether every roster member has acknowledged.
    #[must_use]
    pub fn is_full(&self) -> bool {
        self.records.len() >= self.capacity
    }

    /// Whether `member` has acknowledged.
    #[must_use]
    pub fn contains(&self, member: &MemberKey) -> bool {
        self.members.contains(member)
    }

    /// Returns the record for `member`, if any.
    #[must_use]
    pub fn get(&self, member: &MemberKey) -> Option<&AcknowledgmentRecord> {
        self.records.iter().find(|r| &r.member == member)
    }

    /// Number of records that came from `origin`.
    #[must_use]
    pub fn count_by_origin(&self, origin: Origin) -> usize {
        self.records.iter().filter(|r| r.origin == origin).count()
    }

    /// Fraction of the roster that has acknowledged; `0.0` for an empty roster.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn ratio(&self) -> f64 {
        if self.capacity == 0 {
            0.0
        } else {
            self.records.len() as f64 / self.capacity as f64
        }
    }

    /// Arrival-ordered copy of all records.
    #[must_use]
    pub fn snapshot(&self) -> Vec<AcknowledgmentRecord> {
        self.records.clone()
    }

    /// Borrowing iterator over records in arrival order.
    pub fn iter(&self) -> impl Iterator<Item = &AcknowledgmentRecord> {
        self.records.iter()
    }

    /// Drops all records. Only used on reset.
    pub fn clear(&mut self) {
        self.records.clear();
        self.members.clear();
    }
}
