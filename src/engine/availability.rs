use chrono::{DateTime, NaiveDate, TimeDelta, Utc};
use ulid::Ulid;

use crate::model::{Appointment, Slot, Span};
use crate::policy::SchedulingPolicy;

// ── Interval arithmetic ──────────────────────────────────────────

/// Merge sorted overlapping/adjacent intervals into disjoint intervals.
pub fn merge_overlapping(sorted: &[Span]) -> Vec<Span> {
    let mut merged: Vec<Span> = Vec::new();
    for &span in sorted {
        if let Some(last) = merged.last_mut()
            && span.start <= last.end {
                last.end = last.end.max(span.end);
                continue;
            }
        merged.push(span);
    }
    merged
}

/// Maximal free sub-intervals of `base` after removing `to_remove`.
///
/// `to_remove` must be sorted by start; overlapping removals are fine.
/// Output is ordered by ascending start — callers depend on that.
pub fn subtract_intervals(base: &[Span], to_remove: &[Span]) -> Vec<Span> {
    let mut result = Vec::new();
    let mut ri = 0;

    for &b in base {
        let mut current_start = b.start;
        let current_end = b.end;

        while ri < to_remove.len() && to_remove[ri].end <= current_start {
            ri += 1;
        }

        let mut j = ri;
        while j < to_remove.len() && to_remove[j].start < current_end {
            let r = &to_remove[j];
            if r.start > current_start {
                result.push(Span::new(current_start, r.start));
            }
            current_start = current_start.max(r.end);
            j += 1;
        }

        if current_start < current_end {
            result.push(Span::new(current_start, current_end));
        }
    }

    result
}

// ── Slot generation ──────────────────────────────────────────────

/// Tile a free gap into consecutive fixed-length slots from the gap start.
/// A remainder shorter than `slot` is discarded, never offered.
fn tile(gap: Span, slot: TimeDelta, resource_id: Ulid, out: &mut Vec<Slot>) {
    let mut cursor = gap.start;
    while cursor + slot <= gap.end {
        out.push(Slot {
            resource_id,
            span: Span::new(cursor, cursor + slot),
        });
        cursor = cursor + slot;
    }
}

/// Bookable slots for one calendar day.
///
/// Days before today, past the booking horizon, or closed yield nothing.
/// The minimum-notice rule clips the window start forward to
/// `now + min_notice`; a large notice value can swallow whole days, not
/// just today.
pub fn day_slots(
    policy: &SchedulingPolicy,
    committed: &[Appointment],
    resource_id: Ulid,
    date: NaiveDate,
    now: DateTime<Utc>,
) -> Vec<Slot> {
    if date < now.date_naive() || date > (now + policy.horizon()).date_naive() {
        return Vec::new();
    }
    let Some(window) = policy.window_for(date) else {
        return Vec::new();
    };

    let earliest = now + policy.min_notice();
    let start = window.start.max(earliest);
    if start >= window.end {
        return Vec::new();
    }
    let open = Span::new(start, window.end);

    // Busy time is every committed appointment expanded by the buffer on
    // both sides. Filter against the expanded span so an appointment just
    // outside the window still blocks the edge it reaches into.
    let mut busy: Vec<Span> = committed
        .iter()
        .map(|a| a.span.expand(policy.buffer()))
        .filter(|s| s.overlaps(&window))
        .collect();
    busy.sort_by_key(|s| s.start);
    let busy = merge_overlapping(&busy);

    let free = subtract_intervals(&[open], &busy);

    let mut slots = Vec::new();
    for gap in free {
        tile(gap, policy.slot(), resource_id, &mut slots);
    }
    slots
}

/// Lazy sequence of bookable slots over `[from, to]`, ascending.
///
/// A pure function of its inputs: re-invoking with the same snapshot
/// yields the same output. `from > to` yields an empty sequence.
pub fn availability(
    policy: &SchedulingPolicy,
    committed: &[Appointment],
    resource_id: Ulid,
    from: NaiveDate,
    to: NaiveDate,
    now: DateTime<Utc>,
) -> impl Iterator<Item = Slot> {
    from.iter_days()
        .take_while(move |d| *d <= to)
        .flat_map(move |d| day_slots(policy, committed, resource_id, d, now))
}
