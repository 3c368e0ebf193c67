//! Week-relative event placements and wall-clock spans.
//!
//! An [`EventTiming`] describes where an event sits inside a week
//! (day-of-week plus seconds since midnight) without committing to an
//! absolute date. Projecting it onto a reference date yields the concrete
//! [`TimeSpan`] used for overlap checks and for rewriting the event.

use std::collections::HashMap;

use chrono::{Datelike, Duration, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime, Timelike, Weekday};
use serde::{Deserialize, Serialize};

use crate::event::Event;

pub const SECONDS_PER_DAY: u32 = 24 * 60 * 60;

/// Hypothetical placements keyed by event id.
pub type TimingOverrides = HashMap<String, EventTiming>;

/// A half-open wall-clock interval `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TimeSpan {
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
}

impl TimeSpan {
    pub fn new(start: NaiveDateTime, end: NaiveDateTime) -> Self {
        Self { start, end }
    }

    pub fn starting_at(start: NaiveDateTime, duration: Duration) -> Self {
        Self::new(start, start + duration)
    }

    pub fn duration(&self) -> Duration {
        self.end - self.start
    }

    pub fn hours(&self) -> f64 {
        self.duration().num_seconds() as f64 / 3600.0
    }

    /// Open-interval overlap: touching endpoints do not conflict.
    pub fn overlaps(&self, other: &TimeSpan) -> bool {
        self.start < other.end && other.start < self.end
    }

    pub fn date(&self) -> NaiveDate {
        self.start.date()
    }

    /// Seconds since midnight of the start.
    pub fn start_seconds(&self) -> u32 {
        self.start.time().num_seconds_from_midnight()
    }

    /// Seconds since midnight of the start day at which the span ends.
    /// May exceed a day for spans that cross midnight.
    pub fn end_seconds(&self) -> u32 {
        let secs = self.duration().num_seconds().max(0) as u32;
        self.start_seconds() + secs
    }

    /// The same instants read on a clock at `to` instead of `from`.
    pub fn shifted(&self, from: FixedOffset, to: FixedOffset) -> TimeSpan {
        let delta = Duration::seconds(i64::from(to.local_minus_utc() - from.local_minus_utc()));
        TimeSpan::new(self.start + delta, self.end + delta)
    }

    /// Intersection with `bounds`, `None` when empty.
    pub fn clip(&self, bounds: &TimeSpan) -> Option<TimeSpan> {
        let start = self.start.max(bounds.start);
        let end = self.end.min(bounds.end);
        (start < end).then(|| TimeSpan::new(start, end))
    }
}

/// Day-of-week placement decoupled from any absolute date.
///
/// `day_of_week` counts from Sunday (0) to Saturday (6).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EventTiming {
    pub day_of_week: u8,
    pub start_time_of_day_seconds: u32,
    pub end_time_of_day_seconds: u32,
}

impl EventTiming {
    pub fn new(day_of_week: u8, start_time_of_day_seconds: u32, end_time_of_day_seconds: u32) -> Self {
        Self {
            day_of_week: day_of_week % 7,
            start_time_of_day_seconds,
            end_time_of_day_seconds,
        }
    }

    pub fn from_span(span: &TimeSpan) -> Self {
        Self::new(
            span.start.weekday().num_days_from_sunday() as u8,
            span.start_seconds(),
            span.end_seconds(),
        )
    }

    /// Current placement of an event, `None` without concrete times.
    pub fn of_event(event: &Event) -> Option<Self> {
        event.wall_clock_span().map(|span| Self::from_span(&span))
    }

    pub fn weekday(&self) -> Weekday {
        match self.day_of_week {
            0 => Weekday::Sun,
            1 => Weekday::Mon,
            2 => Weekday::Tue,
            3 => Weekday::Wed,
            4 => Weekday::Thu,
            5 => Weekday::Fri,
            _ => Weekday::Sat,
        }
    }

    pub fn duration(&self) -> Duration {
        Duration::seconds(
            self.end_time_of_day_seconds as i64 - self.start_time_of_day_seconds as i64,
        )
    }

    /// Concrete span in the week (Sunday-based) containing `reference`.
    pub fn project(&self, reference: NaiveDate) -> TimeSpan {
        let start = project_timing(self, reference);
        TimeSpan::new(start, start + self.duration())
    }
}

/// Concrete start of `timing` in the week that contains `reference`.
pub fn project_timing(timing: &EventTiming, reference: NaiveDate) -> NaiveDateTime {
    let week_start =
        reference - Duration::days(reference.weekday().num_days_from_sunday() as i64);
    let day = week_start + Duration::days(timing.day_of_week as i64);
    day.and_time(NaiveTime::MIN) + Duration::seconds(timing.start_time_of_day_seconds as i64)
}

/// Where an event sits once `overrides` are applied.
///
/// An override is projected onto the week of the event's original start.
/// Events without concrete times have no effective span.
pub fn effective_span(event: &Event, overrides: &TimingOverrides) -> Option<TimeSpan> {
    let original = event.wall_clock_span()?;
    match overrides.get(&event.id) {
        Some(timing) => Some(timing.project(original.date())),
        None => Some(original),
    }
}

/// [`effective_span`] read on a clock at `reference`.
///
/// Overrides are wall-clock placements in the event's own offset, so the
/// span is shifted after projection. Use this whenever events from
/// calendars in different offsets are compared.
pub fn effective_span_in(
    event: &Event,
    overrides: &TimingOverrides,
    reference: FixedOffset,
) -> Option<TimeSpan> {
    let span = effective_span(event, overrides)?;
    Some(span.shifted(event.offset()?, reference))
}

pub fn is_weekend(date: NaiveDate) -> bool {
    matches!(date.weekday(), Weekday::Sat | Weekday::Sun)
}
