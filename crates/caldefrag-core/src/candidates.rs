//! Feasible alternate start times for a movable meeting.
//!
//! A candidate must:
//! - keep the event's duration and its minute offset within the half hour
//! - fall on a weekday near the original day
//! - lie inside both participants' working-hours windows
//! - not overlap anything on either calendar, where other events sit at
//!   their current slot in the partial solution
//!
//! Obstacles are compared on the mover's own clock, so calendars kept in
//! different UTC offsets block the right hours.
//!
//! The counterpart's all-day out-of-office events block their whole day.

use std::collections::HashSet;

use chrono::{Datelike, Duration, NaiveDate, NaiveDateTime, NaiveTime, Weekday};
use indexmap::IndexSet;
use tracing::{trace, warn};

use crate::event::Event;
use crate::inputs::Inputs;
use crate::recurrence::RecurrenceType;
use crate::timing::{effective_span_in, is_weekend, EventTiming, TimeSpan, TimingOverrides};

const STEP_SECONDS: u32 = 30 * 60;

/// Which days relative to the original a meeting may move to.
///
/// Receives the recurrence cadence so wider radii for infrequent series can
/// be introduced without changing solver signatures.
pub trait MoveRadiusPolicy {
    fn day_offsets(&self, original: Weekday, recurrence: Option<RecurrenceType>) -> Vec<i64>;
}

/// Same day, the day before, the day after, plus Wednesday for Monday meetings.
#[derive(Debug, Clone, Copy, Default)]
pub struct FixedMoveRadius;

impl MoveRadiusPolicy for FixedMoveRadius {
    fn day_offsets(&self, original: Weekday, _recurrence: Option<RecurrenceType>) -> Vec<i64> {
        let mut offsets = vec![0, -1, 1];
        if original == Weekday::Mon {
            offsets.push(2);
        }
        offsets
    }
}

/// Enumerates candidate start times for one movable event.
pub struct CandidateGenerator<'a> {
    inputs: &'a Inputs,
    radius: &'a dyn MoveRadiusPolicy,
}

impl<'a> CandidateGenerator<'a> {
    pub fn new(inputs: &'a Inputs) -> Self {
        Self {
            inputs,
            radius: &FixedMoveRadius,
        }
    }

    pub fn with_radius(inputs: &'a Inputs, radius: &'a dyn MoveRadiusPolicy) -> Self {
        Self { inputs, radius }
    }

    /// Ordered, de-duplicated candidate starts for `event_id`.
    ///
    /// `timings` is the current partial solution; events listed in `ignored`
    /// are not treated as obstacles (the mover itself never is). Events that
    /// are not movable, lack concrete times or lack a single counterpart
    /// have no candidates.
    pub fn candidates(
        &self,
        event_id: &str,
        timings: &TimingOverrides,
        ignored: &HashSet<String>,
    ) -> Vec<NaiveDateTime> {
        let Some(event) = self.inputs.my_event(event_id) else {
            warn!(event_id, "candidate_unknown_event");
            return Vec::new();
        };
        let (Some(original), Some(reference)) = (event.wall_clock_span(), event.offset()) else {
            warn!(event_id, "candidate_event_without_times");
            return Vec::new();
        };
        let Some(counterpart) = event.counterpart(self.inputs.my_email()) else {
            warn!(event_id, "candidate_event_not_one_on_one");
            return Vec::new();
        };

        let duration = original.duration();
        let phase = original.start_seconds() % STEP_SECONDS;
        let my_hours = self.inputs.my_working_hours();
        let their_hours = self.inputs.their_working_hours(counterpart);

        let skip = |other: &Event| other.id == event.id || ignored.contains(&other.id);
        let obstacles: Vec<TimeSpan> = self
            .inputs
            .my_events()
            .iter()
            .chain(self.inputs.their_events(counterpart))
            .filter(|&other| !skip(other))
            .filter_map(|other| effective_span_in(other, timings, reference))
            .collect();
        let blocked_days: HashSet<NaiveDate> = self
            .inputs
            .their_events(counterpart)
            .iter()
            .filter(|&other| !skip(other) && other.is_out_of_office() && other.is_all_day())
            .flat_map(Event::all_day_dates)
            .collect();

        let recurrence = self.inputs.recurrence(event_id);
        let mut found: IndexSet<NaiveDateTime> = IndexSet::new();

        for offset in self.radius.day_offsets(original.start.weekday(), recurrence) {
            let date = original.date() + Duration::days(offset);
            if is_weekend(date) || blocked_days.contains(&date) {
                continue;
            }
            let midnight = date.and_time(NaiveTime::MIN);

            let mut step = my_hours.start_time_seconds - my_hours.start_time_seconds % STEP_SECONDS;
            while step < my_hours.end_time_seconds {
                let start = midnight + Duration::seconds((step + phase) as i64);
                step += STEP_SECONDS;

                let slot = TimeSpan::starting_at(start, duration);
                if !my_hours.contains(&slot) || !their_hours.contains(&slot) {
                    continue;
                }
                if obstacles.iter().any(|o| o.overlaps(&slot)) {
                    continue;
                }
                found.insert(start);
            }
        }

        trace!(event_id, candidates = found.len(), "candidates_generated");
        found.into_iter().collect()
    }

    /// Candidates as week-relative timings.
    pub fn candidate_timings(
        &self,
        event_id: &str,
        timings: &TimingOverrides,
        ignored: &HashSet<String>,
    ) -> Vec<EventTiming> {
        let Some(duration) = self
            .inputs
            .my_event(event_id)
            .and_then(Event::wall_clock_span)
            .map(|s| s.duration())
        else {
            return Vec::new();
        };
        self.candidates(event_id, timings, ignored)
            .into_iter()
            .map(|start| EventTiming::from_span(&TimeSpan::starting_at(start, duration)))
            .collect()
    }
}
