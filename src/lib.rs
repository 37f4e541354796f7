//! kairos — appointment scheduling and availability engine.
//!
//! Given a resource's working hours, its committed appointments, and a
//! booking policy (slot duration, inter-appointment buffer, booking
//! horizon, minimum notice), the engine computes bookable slots for a date
//! range and admits or rejects new appointment requests so that no two
//! committed appointments for one resource ever overlap, buffer included.
//!
//! The core algorithms ([`engine::availability`], [`engine::admit`]) are
//! pure functions over immutable snapshots; [`engine::Scheduler`] adds
//! per-resource serialization on the write path and talks to storage
//! through the [`store::AppointmentStore`] port. No HTTP, persistence, or
//! auth lives here — those are the embedding application's concern.

pub mod engine;
pub mod limits;
pub mod model;
pub mod observability;
pub mod policy;
pub mod store;

pub use engine::{EngineError, RejectReason, Scheduler};
pub use model::{Appointment, Slot, Span};
pub use policy::{PolicyError, SchedulingPolicy, WeekdayWindow};
pub use store::{AppointmentStore, InMemoryStore, StoreError};
