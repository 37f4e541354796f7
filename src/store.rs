use async_trait::async_trait;
use dashmap::DashMap;
use ulid::Ulid;

use crate::limits::MAX_APPOINTMENTS_PER_RESOURCE;
use crate::model::{Appointment, Span};
use crate::policy::SchedulingPolicy;

#[derive(Debug)]
pub enum StoreError {
    UnknownResource(Ulid),
    /// Storage-level overlap re-check failed — the store is the final
    /// authority on non-overlap.
    Conflict(Ulid),
    /// Opaque backend failure, surfaced to callers uninterpreted.
    Unavailable(String),
}

impl std::fmt::Display for StoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StoreError::UnknownResource(id) => write!(f, "unknown resource: {id}"),
            StoreError::Conflict(id) => write!(f, "conflict with appointment: {id}"),
            StoreError::Unavailable(e) => write!(f, "storage unavailable: {e}"),
        }
    }
}

impl std::error::Error for StoreError {}

/// Persistence port the engine talks to. Implementations own policies and
/// committed appointments; the engine only reads snapshots and commits
/// admitted appointments.
#[async_trait]
pub trait AppointmentStore: Send + Sync {
    async fn load_policy(&self, resource_id: Ulid) -> Result<SchedulingPolicy, StoreError>;

    /// Committed appointments whose spans overlap `window`.
    async fn load_committed(
        &self,
        resource_id: Ulid,
        window: Span,
    ) -> Result<Vec<Appointment>, StoreError>;

    /// Durably record an admitted appointment. Must re-validate non-overlap
    /// against the current committed set and fail with `Conflict` rather
    /// than store a double booking.
    async fn commit(&self, appointment: &Appointment) -> Result<(), StoreError>;
}

// ── In-memory store ──────────────────────────────────────────────

struct ResourceCalendar {
    policy: SchedulingPolicy,
    /// Committed appointments, sorted by `span.start`.
    appointments: Vec<Appointment>,
}

impl ResourceCalendar {
    /// Insert maintaining sort order by span.start.
    fn insert(&mut self, appointment: Appointment) {
        let pos = self
            .appointments
            .binary_search_by_key(&appointment.span.start, |a| a.span.start)
            .unwrap_or_else(|e| e);
        self.appointments.insert(pos, appointment);
    }

    /// Appointments whose span overlaps the query window. Binary search
    /// skips everything starting at or after `window.end`.
    fn overlapping(&self, window: &Span) -> impl Iterator<Item = &Appointment> {
        let right_bound = self
            .appointments
            .partition_point(|a| a.span.start < window.end);
        self.appointments[..right_bound]
            .iter()
            .filter(move |a| a.span.end > window.start)
    }
}

/// Reference store for tests and embedding without a database.
#[derive(Default)]
pub struct InMemoryStore {
    resources: DashMap<Ulid, ResourceCalendar>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self { resources: DashMap::new() }
    }

    /// Register a resource, or replace its policy. Policy swaps happen
    /// between engine operations, never during one — the engine loads a
    /// fresh copy per call.
    pub fn register(&self, resource_id: Ulid, policy: SchedulingPolicy) {
        if let Some(mut cal) = self.resources.get_mut(&resource_id) {
            cal.policy = policy;
        } else {
            self.resources.insert(
                resource_id,
                ResourceCalendar { policy, appointments: Vec::new() },
            );
        }
    }

    /// Remove a committed appointment (cancellation lives outside the
    /// engine; it just observes a changed snapshot on the next call).
    pub fn cancel(&self, resource_id: Ulid, appointment_id: Ulid) -> Option<Appointment> {
        let mut cal = self.resources.get_mut(&resource_id)?;
        let pos = cal.appointments.iter().position(|a| a.id == appointment_id)?;
        Some(cal.appointments.remove(pos))
    }

    pub fn appointment_count(&self, resource_id: Ulid) -> usize {
        self.resources
            .get(&resource_id)
            .map(|cal| cal.appointments.len())
            .unwrap_or(0)
    }
}

#[async_trait]
impl AppointmentStore for InMemoryStore {
    async fn load_policy(&self, resource_id: Ulid) -> Result<SchedulingPolicy, StoreError> {
        self.resources
            .get(&resource_id)
            .map(|cal| cal.policy.clone())
            .ok_or(StoreError::UnknownResource(resource_id))
    }

    async fn load_committed(
        &self,
        resource_id: Ulid,
        window: Span,
    ) -> Result<Vec<Appointment>, StoreError> {
        let cal = self
            .resources
            .get(&resource_id)
            .ok_or(StoreError::UnknownResource(resource_id))?;
        Ok(cal.overlapping(&window).copied().collect())
    }

    async fn commit(&self, appointment: &Appointment) -> Result<(), StoreError> {
        let mut cal = self
            .resources
            .get_mut(&appointment.resource_id)
            .ok_or(StoreError::UnknownResource(appointment.resource_id))?;
        if cal.appointments.len() >= MAX_APPOINTMENTS_PER_RESOURCE {
            return Err(StoreError::Unavailable("appointment limit reached".into()));
        }

        // Same buffer convention as admission: existing side expanded,
        // incoming side raw.
        let buffer = cal.policy.buffer();
        let probe = appointment.span.expand(buffer);
        let conflict = cal
            .overlapping(&probe)
            .find(|existing| existing.span.expand(buffer).overlaps(&appointment.span))
            .map(|existing| existing.id);
        if let Some(id) = conflict {
            return Err(StoreError::Conflict(id));
        }

        cal.insert(*appointment);
        Ok(())
    }
}
