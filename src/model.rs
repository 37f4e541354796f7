use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use ulid::Ulid;

/// Half-open interval `[start, end)` in UTC.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Span {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl Span {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        debug_assert!(start < end, "Span start must be before end");
        Self { start, end }
    }

    pub fn duration(&self) -> TimeDelta {
        self.end - self.start
    }

    pub fn overlaps(&self, other: &Span) -> bool {
        self.start < other.end && other.start < self.end
    }

    /// Returns true if `self` fully contains `other`.
    pub fn contains_span(&self, other: &Span) -> bool {
        self.start <= other.start && other.end <= self.end
    }

    /// Widen by `buffer` on both sides. The buffer around a committed
    /// appointment is consumed time, never bookable.
    pub fn expand(&self, buffer: TimeDelta) -> Span {
        Span {
            start: self.start - buffer,
            end: self.end + buffer,
        }
    }
}

/// A committed appointment occupying a span on one resource's calendar.
///
/// Owned by the store; the engine only ever sees an immutable snapshot of
/// the committed set per operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Appointment {
    pub id: Ulid,
    pub resource_id: Ulid,
    pub span: Span,
    pub client_ref: Ulid,
    pub service_ref: Ulid,
}

/// A candidate bookable unit of exactly the policy's slot duration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Slot {
    pub resource_id: Ulid,
    pub span: Span,
}
