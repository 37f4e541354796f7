use chrono::{DateTime, Utc};

use crate::model::{Appointment, Span};
use crate::policy::SchedulingPolicy;

use super::error::RejectReason;

/// Admission checks for a proposed appointment. Checks run in order and
/// short-circuit on the first failure.
///
/// Buffer convention: the existing committed side is expanded by the full
/// buffer, the proposed side stays raw. Slot generation applies the same
/// rule, so the engine never offers what it would refuse.
pub fn admit(
    policy: &SchedulingPolicy,
    committed: &[Appointment],
    proposed: &Span,
    now: DateTime<Utc>,
) -> Result<(), RejectReason> {
    if proposed.start < now + policy.min_notice() {
        return Err(RejectReason::TooSoon);
    }
    // Horizon is day-granular, matching slot generation: any start on the
    // last in-horizon day is accepted.
    if proposed.start.date_naive() > (now + policy.horizon()).date_naive() {
        return Err(RejectReason::TooFarAhead);
    }

    match policy.window_for(proposed.start.date_naive()) {
        Some(window) if window.contains_span(proposed) => {}
        _ => return Err(RejectReason::OutsideWorkingHours),
    }

    let buffer = policy.buffer();
    for appt in committed {
        if appt.span.expand(buffer).overlaps(proposed) {
            return Err(RejectReason::Conflict(appt.id));
        }
    }

    Ok(())
}
