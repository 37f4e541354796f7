use ulid::Ulid;

use crate::store::StoreError;

/// Why a proposed appointment was not accepted. A normal business outcome,
/// not a failure — the embedding API layer maps these to user-facing
/// messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    /// Starts before `now + min_notice`.
    TooSoon,
    /// Starts beyond the booking horizon.
    TooFarAhead,
    /// Closed that day, or not fully inside the day's open window.
    OutsideWorkingHours,
    /// Overlaps the buffer-expanded span of an existing appointment.
    Conflict(Ulid),
    /// Commit retries exhausted under concurrent writers.
    Contention,
}

impl std::fmt::Display for RejectReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RejectReason::TooSoon => write!(f, "starts before the minimum notice period"),
            RejectReason::TooFarAhead => write!(f, "starts beyond the booking horizon"),
            RejectReason::OutsideWorkingHours => write!(f, "outside working hours"),
            RejectReason::Conflict(id) => write!(f, "conflicts with appointment {id}"),
            RejectReason::Contention => write!(f, "could not commit under concurrent writes"),
        }
    }
}

#[derive(Debug)]
pub enum EngineError {
    Rejected(RejectReason),
    UnknownResource(Ulid),
    InvalidSpan(&'static str),
    LimitExceeded(&'static str),
    /// Opaque passthrough from the store — surfaced as-is, never interpreted.
    Storage(String),
}

impl std::fmt::Display for EngineError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EngineError::Rejected(reason) => write!(f, "booking rejected: {reason}"),
            EngineError::UnknownResource(id) => write!(f, "unknown resource: {id}"),
            EngineError::InvalidSpan(msg) => write!(f, "invalid interval: {msg}"),
            EngineError::LimitExceeded(msg) => write!(f, "limit exceeded: {msg}"),
            EngineError::Storage(e) => write!(f, "storage error: {e}"),
        }
    }
}

impl std::error::Error for EngineError {}

impl From<StoreError> for EngineError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::UnknownResource(id) => EngineError::UnknownResource(id),
            StoreError::Conflict(id) => EngineError::Rejected(RejectReason::Conflict(id)),
            StoreError::Unavailable(msg) => EngineError::Storage(msg),
        }
    }
}
