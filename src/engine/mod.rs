mod availability;
mod conflict;
mod error;
#[cfg(test)]
mod tests;

pub use availability::{availability, day_slots, merge_overlapping, subtract_intervals};
pub use conflict::admit;
pub use error::{EngineError, RejectReason};

use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, NaiveDate, NaiveTime, TimeDelta, Utc};
use dashmap::DashMap;
use tokio::sync::Mutex;
use tracing::{debug, info};
use ulid::Ulid;

use crate::limits::*;
use crate::model::{Appointment, Slot, Span};
use crate::store::{AppointmentStore, StoreError};

/// Orchestration over the pure availability/admission functions: the read
/// path (`get_availability`) and the write path (`book_appointment`), plus
/// per-resource serialization of admit-then-commit.
pub struct Scheduler<S> {
    store: Arc<S>,
    /// Per-resource critical sections, created lazily. Bookings on
    /// different resources never contend.
    locks: DashMap<Ulid, Arc<Mutex<()>>>,
    clock: fn() -> DateTime<Utc>,
}

impl<S: AppointmentStore> Scheduler<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self::with_clock(store, Utc::now)
    }

    /// Pin the clock — tests use this to make `now` deterministic.
    pub fn with_clock(store: Arc<S>, clock: fn() -> DateTime<Utc>) -> Self {
        Self {
            store,
            locks: DashMap::new(),
            clock,
        }
    }

    fn lock_for(&self, resource_id: Ulid) -> Arc<Mutex<()>> {
        self.locks
            .entry(resource_id)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// Bookable slots for `[from, to]`, ascending by start.
    ///
    /// Takes no lock: the snapshot may be slightly stale relative to an
    /// in-flight booking, and a stale slot is simply re-rejected when
    /// someone tries to book it.
    pub async fn get_availability(
        &self,
        resource_id: Ulid,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<Slot>, EngineError> {
        if from > to {
            return Ok(Vec::new());
        }
        if (to - from).num_days() >= MAX_RANGE_DAYS {
            return Err(EngineError::LimitExceeded("date range too wide"));
        }

        let policy = self.store.load_policy(resource_id).await?;
        let now = (self.clock)();

        // Snapshot the whole requested days plus buffer reach on both
        // sides, so edge appointments still block what they should.
        let day_after = to
            .succ_opt()
            .ok_or(EngineError::InvalidSpan("date range out of bounds"))?;
        let window = Span::new(
            from.and_time(NaiveTime::MIN).and_utc() - policy.buffer(),
            day_after.and_time(NaiveTime::MIN).and_utc() + policy.buffer(),
        );
        let committed = self.store.load_committed(resource_id, window).await?;

        metrics::counter!(crate::observability::AVAILABILITY_QUERIES_TOTAL).increment(1);
        Ok(availability(&policy, &committed, resource_id, from, to, now).collect())
    }

    /// Admit and commit a proposed appointment, returning its id.
    ///
    /// Holds the resource's lock across admit-then-commit so two
    /// overlapping proposals for the same resource can never both land.
    /// The store re-validates on commit; a conflict there means an
    /// external writer slipped in, so the snapshot is re-read and
    /// re-admitted a bounded number of times before surfacing
    /// `Rejected(Contention)`.
    pub async fn book_appointment(
        &self,
        resource_id: Ulid,
        proposed: Span,
        client_ref: Ulid,
        service_ref: Ulid,
    ) -> Result<Ulid, EngineError> {
        if proposed.start >= proposed.end {
            return Err(EngineError::InvalidSpan("appointment must end after it starts"));
        }
        if proposed.duration() > TimeDelta::minutes(MAX_APPOINTMENT_MINUTES) {
            return Err(EngineError::LimitExceeded("appointment too long"));
        }

        let lock = self.lock_for(resource_id);
        let _guard = lock.lock().await;

        let policy = self.store.load_policy(resource_id).await?;
        let now = (self.clock)();
        let probe = proposed.expand(policy.buffer());
        let started = Instant::now();

        for _ in 0..=COMMIT_RETRIES {
            let committed = self.store.load_committed(resource_id, probe).await?;
            if let Err(reason) = admit(&policy, &committed, &proposed, now) {
                debug!(%resource_id, %reason, "booking rejected");
                metrics::counter!(crate::observability::BOOKINGS_REJECTED_TOTAL).increment(1);
                return Err(EngineError::Rejected(reason));
            }

            let appointment = Appointment {
                id: Ulid::new(),
                resource_id,
                span: proposed,
                client_ref,
                service_ref,
            };
            match self.store.commit(&appointment).await {
                Ok(()) => {
                    info!(%resource_id, id = %appointment.id, "booking confirmed");
                    metrics::counter!(crate::observability::BOOKINGS_CONFIRMED_TOTAL)
                        .increment(1);
                    metrics::histogram!(crate::observability::BOOK_DURATION_SECONDS)
                        .record(started.elapsed().as_secs_f64());
                    return Ok(appointment.id);
                }
                // External writer won the race — re-read and re-admit.
                Err(StoreError::Conflict(_)) => continue,
                Err(e) => return Err(e.into()),
            }
        }

        debug!(%resource_id, "commit retries exhausted");
        metrics::counter!(crate::observability::BOOKINGS_REJECTED_TOTAL).increment(1);
        Err(EngineError::Rejected(RejectReason::Contention))
    }
}
