//! Operational guard rails, checked at the orchestration edge.

/// Widest availability query, in days.
pub const MAX_RANGE_DAYS: i64 = 366;

/// Longest single appointment, in minutes.
pub const MAX_APPOINTMENT_MINUTES: i64 = 24 * 60;

/// Most committed appointments a single resource calendar will hold.
pub const MAX_APPOINTMENTS_PER_RESOURCE: usize = 100_000;

/// Commit attempts before a booking surfaces `Contention`.
pub const COMMIT_RETRIES: usize = 2;
