use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveTime, TimeZone, Utc, Weekday};
use ulid::Ulid;

use crate::limits::COMMIT_RETRIES;
use crate::model::{Appointment, Span};
use crate::policy::{SchedulingPolicy, WeekdayWindow};
use crate::store::{AppointmentStore, InMemoryStore, StoreError};

use super::{EngineError, RejectReason, Scheduler};

// All tests run against a clock pinned to 2024-03-01 08:00 UTC (a Friday).
fn eight_am() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 1, 8, 0, 0).unwrap()
}

fn at(d: u32, h: u32, m: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, d, h, m, 0).unwrap()
}

fn day(d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 3, d).unwrap()
}

fn hm(h: u32, m: u32) -> NaiveTime {
    NaiveTime::from_hms_opt(h, m, 0).unwrap()
}

/// Open every day 09:00–17:00; 60min slots, 15min buffer, 30 day horizon,
/// no minimum notice.
fn default_policy() -> SchedulingPolicy {
    use Weekday::*;
    let windows = [Mon, Tue, Wed, Thu, Fri, Sat, Sun]
        .into_iter()
        .map(|d| WeekdayWindow::open(d, hm(9, 0), hm(17, 0)))
        .collect();
    SchedulingPolicy::new(windows, 60, 15, 30, 0).unwrap()
}

fn setup(policy: SchedulingPolicy) -> (Arc<InMemoryStore>, Scheduler<InMemoryStore>, Ulid) {
    let store = Arc::new(InMemoryStore::new());
    let rid = Ulid::new();
    store.register(rid, policy);
    let scheduler = Scheduler::with_clock(store.clone(), eight_am);
    (store, scheduler, rid)
}

#[tokio::test]
async fn offered_slot_books_cleanly() {
    let (_, scheduler, rid) = setup(default_policy());

    let slots = scheduler.get_availability(rid, day(4), day(4)).await.unwrap();
    assert_eq!(slots.len(), 8);

    let picked = slots[0];
    scheduler
        .book_appointment(rid, picked.span, Ulid::new(), Ulid::new())
        .await
        .unwrap();

    // The booked slot (and its buffered neighbourhood) is gone.
    let after = scheduler.get_availability(rid, day(4), day(4)).await.unwrap();
    assert!(after.iter().all(|s| !s.span.overlaps(&picked.span)));
    assert!(after.len() < slots.len());
}

#[tokio::test]
async fn double_booking_is_rejected() {
    let (_, scheduler, rid) = setup(default_policy());
    let span = Span::new(at(4, 10, 0), at(4, 11, 0));

    let id = scheduler
        .book_appointment(rid, span, Ulid::new(), Ulid::new())
        .await
        .unwrap();
    let second = scheduler
        .book_appointment(rid, span, Ulid::new(), Ulid::new())
        .await;
    assert!(matches!(
        second,
        Err(EngineError::Rejected(RejectReason::Conflict(conflicting))) if conflicting == id
    ));
}

#[tokio::test]
async fn stale_slot_is_rerejected_not_double_booked() {
    let (_, scheduler, rid) = setup(default_policy());

    // Two callers read the same availability snapshot.
    let slots = scheduler.get_availability(rid, day(4), day(4)).await.unwrap();
    let picked = slots[2];

    scheduler
        .book_appointment(rid, picked.span, Ulid::new(), Ulid::new())
        .await
        .unwrap();
    // The second caller's view is now stale; booking the same slot fails.
    let second = scheduler
        .book_appointment(rid, picked.span, Ulid::new(), Ulid::new())
        .await;
    assert!(matches!(
        second,
        Err(EngineError::Rejected(RejectReason::Conflict(_)))
    ));
}

#[tokio::test]
async fn booking_respects_buffer_on_both_sides() {
    let (_, scheduler, rid) = setup(default_policy());
    scheduler
        .book_appointment(rid, Span::new(at(4, 12, 0), at(4, 13, 0)), Ulid::new(), Ulid::new())
        .await
        .unwrap();

    // Back-to-back after: blocked by the tail buffer.
    let after = scheduler
        .book_appointment(rid, Span::new(at(4, 13, 0), at(4, 14, 0)), Ulid::new(), Ulid::new())
        .await;
    assert!(matches!(after, Err(EngineError::Rejected(RejectReason::Conflict(_)))));

    // Ending right at the start: blocked by the lead buffer.
    let before = scheduler
        .book_appointment(rid, Span::new(at(4, 11, 0), at(4, 12, 0)), Ulid::new(), Ulid::new())
        .await;
    assert!(matches!(before, Err(EngineError::Rejected(RejectReason::Conflict(_)))));

    // Clear of the buffer on the tail side.
    scheduler
        .book_appointment(rid, Span::new(at(4, 13, 15), at(4, 14, 15)), Ulid::new(), Ulid::new())
        .await
        .unwrap();
}

#[tokio::test]
async fn rejects_too_soon_with_minimum_notice() {
    use Weekday::*;
    let windows = [Mon, Tue, Wed, Thu, Fri, Sat, Sun]
        .into_iter()
        .map(|d| WeekdayWindow::open(d, hm(9, 0), hm(17, 0)))
        .collect();
    let policy = SchedulingPolicy::new(windows, 60, 15, 30, 24).unwrap();
    let (_, scheduler, rid) = setup(policy);

    let result = scheduler
        .book_appointment(rid, Span::new(at(1, 10, 0), at(1, 11, 0)), Ulid::new(), Ulid::new())
        .await;
    assert!(matches!(
        result,
        Err(EngineError::Rejected(RejectReason::TooSoon))
    ));
}

#[tokio::test]
async fn rejects_past_horizon() {
    let (_, scheduler, rid) = setup(default_policy());
    let result = scheduler
        .book_appointment(
            rid,
            Span::new(
                Utc.with_ymd_and_hms(2024, 4, 5, 10, 0, 0).unwrap(),
                Utc.with_ymd_and_hms(2024, 4, 5, 11, 0, 0).unwrap(),
            ),
            Ulid::new(),
            Ulid::new(),
        )
        .await;
    assert!(matches!(
        result,
        Err(EngineError::Rejected(RejectReason::TooFarAhead))
    ));
}

#[tokio::test]
async fn rejects_outside_working_hours() {
    let (_, scheduler, rid) = setup(default_policy());
    let result = scheduler
        .book_appointment(rid, Span::new(at(4, 18, 0), at(4, 19, 0)), Ulid::new(), Ulid::new())
        .await;
    assert!(matches!(
        result,
        Err(EngineError::Rejected(RejectReason::OutsideWorkingHours))
    ));
}

#[tokio::test]
async fn rejects_degenerate_span() {
    let (_, scheduler, rid) = setup(default_policy());
    let result = scheduler
        .book_appointment(
            rid,
            Span { start: at(4, 10, 0), end: at(4, 10, 0) },
            Ulid::new(),
            Ulid::new(),
        )
        .await;
    assert!(matches!(result, Err(EngineError::InvalidSpan(_))));
}

#[tokio::test]
async fn rejects_overlong_appointment() {
    let (_, scheduler, rid) = setup(default_policy());
    let result = scheduler
        .book_appointment(rid, Span::new(at(4, 9, 0), at(6, 9, 0)), Ulid::new(), Ulid::new())
        .await;
    assert!(matches!(result, Err(EngineError::LimitExceeded(_))));
}

#[tokio::test]
async fn unknown_resource_surfaces() {
    let store = Arc::new(InMemoryStore::new());
    let scheduler = Scheduler::with_clock(store, eight_am);
    let rid = Ulid::new();

    let result = scheduler.get_availability(rid, day(4), day(5)).await;
    assert!(matches!(result, Err(EngineError::UnknownResource(id)) if id == rid));
}

#[tokio::test]
async fn inverted_range_is_empty() {
    let (_, scheduler, rid) = setup(default_policy());
    let slots = scheduler.get_availability(rid, day(10), day(4)).await.unwrap();
    assert!(slots.is_empty());
}

#[tokio::test]
async fn oversized_range_is_refused() {
    let (_, scheduler, rid) = setup(default_policy());
    let result = scheduler
        .get_availability(rid, day(1), NaiveDate::from_ymd_opt(2026, 1, 1).unwrap())
        .await;
    assert!(matches!(result, Err(EngineError::LimitExceeded(_))));
}

#[tokio::test]
async fn availability_is_stable_for_a_fixed_snapshot() {
    let (_, scheduler, rid) = setup(default_policy());
    scheduler
        .book_appointment(rid, Span::new(at(5, 10, 0), at(5, 11, 0)), Ulid::new(), Ulid::new())
        .await
        .unwrap();

    let a = scheduler.get_availability(rid, day(1), day(7)).await.unwrap();
    let b = scheduler.get_availability(rid, day(1), day(7)).await.unwrap();
    assert_eq!(a, b);
}

#[tokio::test]
async fn cancellation_reopens_the_slot() {
    let (store, scheduler, rid) = setup(default_policy());
    let span = Span::new(at(4, 10, 0), at(4, 11, 0));
    let id = scheduler
        .book_appointment(rid, span, Ulid::new(), Ulid::new())
        .await
        .unwrap();

    store.cancel(rid, id).unwrap();

    // The engine observes the changed snapshot on the next call.
    let slots = scheduler.get_availability(rid, day(4), day(4)).await.unwrap();
    assert!(slots.iter().any(|s| s.span == span));
}

#[tokio::test]
async fn policy_swap_applies_between_operations() {
    use Weekday::*;
    let (store, scheduler, rid) = setup(default_policy());
    assert_eq!(
        scheduler.get_availability(rid, day(4), day(4)).await.unwrap().len(),
        8
    );

    // Collaborator shortens the day to 09:00–12:00.
    let windows = [Mon, Tue, Wed, Thu, Fri, Sat, Sun]
        .into_iter()
        .map(|d| WeekdayWindow::open(d, hm(9, 0), hm(12, 0)))
        .collect();
    store.register(rid, SchedulingPolicy::new(windows, 60, 15, 30, 0).unwrap());

    assert_eq!(
        scheduler.get_availability(rid, day(4), day(4)).await.unwrap().len(),
        3
    );
}

/// A store where an external writer always wins: every commit reports a
/// conflict the admission snapshot never showed.
struct ContestedStore {
    policy: SchedulingPolicy,
    commits: AtomicUsize,
}

#[async_trait]
impl AppointmentStore for ContestedStore {
    async fn load_policy(&self, _resource_id: Ulid) -> Result<SchedulingPolicy, StoreError> {
        Ok(self.policy.clone())
    }

    async fn load_committed(
        &self,
        _resource_id: Ulid,
        _window: Span,
    ) -> Result<Vec<Appointment>, StoreError> {
        Ok(Vec::new())
    }

    async fn commit(&self, _appointment: &Appointment) -> Result<(), StoreError> {
        self.commits.fetch_add(1, Ordering::SeqCst);
        Err(StoreError::Conflict(Ulid::new()))
    }
}

#[tokio::test]
async fn exhausted_commit_retries_surface_contention() {
    let store = Arc::new(ContestedStore {
        policy: default_policy(),
        commits: AtomicUsize::new(0),
    });
    let scheduler = Scheduler::with_clock(store.clone(), eight_am);

    let result = scheduler
        .book_appointment(
            Ulid::new(),
            Span::new(at(4, 10, 0), at(4, 11, 0)),
            Ulid::new(),
            Ulid::new(),
        )
        .await;
    assert!(matches!(
        result,
        Err(EngineError::Rejected(RejectReason::Contention))
    ));
    // One initial attempt plus the bounded retries, then give up.
    assert_eq!(store.commits.load(Ordering::SeqCst), COMMIT_RETRIES + 1);
}

/// Seed a calendar through the public contracts only (book offered slots,
/// never hand-rolled overlap logic), then check the no-overlap invariant.
#[tokio::test]
async fn seeded_calendar_upholds_no_overlap() {
    let (store, scheduler, rid) = setup(default_policy());

    for d in 1..=7 {
        let offered = scheduler.get_availability(rid, day(d), day(d)).await.unwrap();
        for slot in offered.iter().step_by(3) {
            scheduler
                .book_appointment(rid, slot.span, Ulid::new(), Ulid::new())
                .await
                .unwrap();
        }
    }
    assert!(store.appointment_count(rid) > 0);

    let policy = default_policy();
    let all = crate::store::AppointmentStore::load_committed(
        &*store,
        rid,
        Span::new(at(1, 0, 0), at(8, 0, 0)),
    )
    .await
    .unwrap();
    for (i, a) in all.iter().enumerate() {
        for b in &all[i + 1..] {
            assert!(
                !a.span.expand(policy.buffer()).overlaps(&b.span),
                "buffer-expanded overlap between {} and {}",
                a.id,
                b.id
            );
        }
    }

    // Whatever is still offered must clear every committed appointment.
    let offered = scheduler.get_availability(rid, day(1), day(7)).await.unwrap();
    for slot in offered {
        for a in &all {
            assert!(!a.span.expand(policy.buffer()).overlaps(&slot.span));
        }
    }
}
