use chrono::{Datelike, NaiveDate, NaiveTime, TimeDelta, Weekday};
use serde::{Deserialize, Serialize};

use crate::model::Span;

/// Open/closed state and hours for one weekday. Closed days carry
/// placeholder times that are never read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WeekdayWindow {
    pub weekday: Weekday,
    pub is_open: bool,
    pub open: NaiveTime,
    pub close: NaiveTime,
}

impl WeekdayWindow {
    pub fn open(weekday: Weekday, open: NaiveTime, close: NaiveTime) -> Self {
        Self { weekday, is_open: true, open, close }
    }

    pub fn closed(weekday: Weekday) -> Self {
        Self { weekday, is_open: false, open: NaiveTime::MIN, close: NaiveTime::MIN }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PolicyError {
    /// Exactly 7 weekday windows are required.
    WindowCount(usize),
    DuplicateWeekday(Weekday),
    /// An open day whose open time is not before its close time.
    EmptyWindow(Weekday),
    ZeroSlotDuration,
    /// Booking horizon must cover at least one day.
    ZeroHorizon,
}

impl std::fmt::Display for PolicyError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PolicyError::WindowCount(n) => write!(f, "expected 7 weekday windows, got {n}"),
            PolicyError::DuplicateWeekday(d) => write!(f, "duplicate weekday window: {d}"),
            PolicyError::EmptyWindow(d) => write!(f, "open time must be before close time on {d}"),
            PolicyError::ZeroSlotDuration => write!(f, "slot duration must be positive"),
            PolicyError::ZeroHorizon => write!(f, "booking horizon must be at least one day"),
        }
    }
}

impl std::error::Error for PolicyError {}

/// Per-resource working hours plus the global booking knobs.
///
/// Validated once at construction and immutable afterwards. Collaborators
/// may swap in a replacement between engine operations, never during one —
/// the engine loads a fresh copy per call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchedulingPolicy {
    /// One window per weekday, indexed by days-from-Monday.
    windows: [WeekdayWindow; 7],
    pub slot_minutes: u32,
    pub buffer_minutes: u32,
    pub max_advance_days: u32,
    pub min_notice_hours: u32,
}

impl SchedulingPolicy {
    pub fn new(
        windows: Vec<WeekdayWindow>,
        slot_minutes: u32,
        buffer_minutes: u32,
        max_advance_days: u32,
        min_notice_hours: u32,
    ) -> Result<Self, PolicyError> {
        if windows.len() != 7 {
            return Err(PolicyError::WindowCount(windows.len()));
        }
        if slot_minutes == 0 {
            return Err(PolicyError::ZeroSlotDuration);
        }
        if max_advance_days == 0 {
            return Err(PolicyError::ZeroHorizon);
        }

        let mut by_day: [Option<WeekdayWindow>; 7] = [None; 7];
        for w in windows {
            if w.is_open && w.open >= w.close {
                return Err(PolicyError::EmptyWindow(w.weekday));
            }
            let idx = w.weekday.num_days_from_monday() as usize;
            if by_day[idx].is_some() {
                return Err(PolicyError::DuplicateWeekday(w.weekday));
            }
            by_day[idx] = Some(w);
        }
        // 7 windows with no duplicate weekday is a permutation.
        let windows = by_day.map(|w| w.expect("all weekdays present"));

        Ok(Self { windows, slot_minutes, buffer_minutes, max_advance_days, min_notice_hours })
    }

    /// The open window anchored to a concrete calendar date, or `None`
    /// when the resource is closed that day.
    pub fn window_for(&self, date: NaiveDate) -> Option<Span> {
        let w = &self.windows[date.weekday().num_days_from_monday() as usize];
        if !w.is_open {
            return None;
        }
        Some(Span::new(
            date.and_time(w.open).and_utc(),
            date.and_time(w.close).and_utc(),
        ))
    }

    pub fn slot(&self) -> TimeDelta {
        TimeDelta::minutes(self.slot_minutes as i64)
    }

    pub fn buffer(&self) -> TimeDelta {
        TimeDelta::minutes(self.buffer_minutes as i64)
    }

    pub fn min_notice(&self) -> TimeDelta {
        TimeDelta::hours(self.min_notice_hours as i64)
    }

    pub fn horizon(&self) -> TimeDelta {
        TimeDelta::days(self.max_advance_days as i64)
    }
}
