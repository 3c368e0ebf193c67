//! Solver output and its materialization onto concrete events.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::event::Event;
use crate::inputs::Inputs;
use crate::timing::{EventTiming, TimeSpan, TimingOverrides};

/// Proposed relocations plus the events no feasible slot was found for.
///
/// `timings` only ever holds movable events that actually moved.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Solution {
    pub timings: BTreeMap<String, EventTiming>,
    pub unplaceable_event_ids: BTreeSet<String>,
}

/// One relocation, for reporting.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Change {
    pub event_id: String,
    pub summary: String,
    pub from: TimeSpan,
    pub to: TimeSpan,
}

impl Solution {
    /// Keep only the movable, placeable events whose timing differs from
    /// where they already are.
    pub fn from_timings(
        inputs: &Inputs,
        timings: &TimingOverrides,
        unplaceable: BTreeSet<String>,
    ) -> Self {
        let timings = inputs
            .moveable_events()
            .iter()
            .filter(|id| !unplaceable.contains(*id))
            .filter_map(|id| {
                let timing = timings.get(id)?;
                (inputs.original_timing(id).as_ref() != Some(timing)).then(|| (id.clone(), *timing))
            })
            .collect();
        Self {
            timings,
            unplaceable_event_ids: unplaceable,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.timings.is_empty() && self.unplaceable_event_ids.is_empty()
    }

    /// The moves as an override map for the cost model.
    pub fn overrides(&self) -> TimingOverrides {
        self.timings.iter().map(|(id, t)| (id.clone(), *t)).collect()
    }

    /// Copies of the moved events with start and end rewritten.
    ///
    /// Each timing is projected onto the week of the event's original start
    /// and keeps its original UTC offset. Events without a timing, or
    /// without concrete times, are left out.
    pub fn apply(&self, events: &[Event]) -> Vec<Event> {
        events
            .iter()
            .filter_map(|event| {
                let timing = self.timings.get(&event.id)?;
                let original = event.wall_clock_span()?;
                event.rescheduled(timing.project(original.date()))
            })
            .collect()
    }

    /// Moves in calendar order.
    pub fn changes(&self, inputs: &Inputs) -> Vec<Change> {
        inputs
            .my_events()
            .iter()
            .filter_map(|event| {
                let timing = self.timings.get(&event.id)?;
                let from = event.wall_clock_span()?;
                Some(Change {
                    event_id: event.id.clone(),
                    summary: event.summary.clone(),
                    from,
                    to: timing.project(from.date()),
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::{EventTime, ResponseStatus};
    use crate::working_hours::WorkingHoursWindow;
    use chrono::{FixedOffset, NaiveDate, TimeZone};

    fn one_on_one(id: &str, hour: u32) -> Event {
        let tz = FixedOffset::east_opt(-5 * 3600).unwrap();
        let start = tz.with_ymd_and_hms(2024, 1, 15, hour, 0, 0).unwrap();
        Event::new(id, format!("1:1 {id}"))
            .with_times(start, start + chrono::Duration::hours(1))
            .with_self_attendee("me@acme.com", ResponseStatus::Accepted)
            .with_attendee("you@acme.com", ResponseStatus::Accepted)
    }

    fn inputs() -> Inputs {
        Inputs::builder("me@acme.com", WorkingHoursWindow::DEFAULT)
            .my_events(vec![one_on_one("a", 9), one_on_one("b", 11)])
            .moveable_all(["a", "b"])
            .build()
            .unwrap()
    }

    #[test]
    fn from_timings_drops_identity_and_unplaceable() {
        let inputs = inputs();
        let mut timings = TimingOverrides::new();
        timings.insert("a".into(), inputs.original_timing("a").unwrap());
        timings.insert("b".into(), EventTiming::new(2, 14 * 3600, 15 * 3600));

        let solution = Solution::from_timings(&inputs, &timings, BTreeSet::new());
        assert_eq!(solution.timings.keys().collect::<Vec<_>>(), vec!["b"]);

        let unplaceable: BTreeSet<String> = ["b".to_string()].into_iter().collect();
        let solution = Solution::from_timings(&inputs, &timings, unplaceable);
        assert!(solution.timings.is_empty());
        assert!(solution.unplaceable_event_ids.contains("b"));
    }

    #[test]
    fn apply_rewrites_times_keeping_offset() {
        let inputs = inputs();
        let mut solution = Solution::default();
        solution
            .timings
            .insert("b".into(), EventTiming::new(2, 14 * 3600, 15 * 3600));

        let moved = solution.apply(inputs.my_events());
        assert_eq!(moved.len(), 1);
        let start = moved[0].start.and_then(|s| s.date_time()).unwrap();
        assert_eq!(start.offset().local_minus_utc(), -5 * 3600);
        assert_eq!(
            start.naive_local(),
            NaiveDate::from_ymd_opt(2024, 1, 16).unwrap().and_hms_opt(14, 0, 0).unwrap()
        );
        assert!(matches!(moved[0].end, Some(EventTime::DateTime { .. })));
    }

    #[test]
    fn changes_report_from_and_to() {
        let inputs = inputs();
        let mut solution = Solution::default();
        solution
            .timings
            .insert("a".into(), EventTiming::new(1, 15 * 3600, 16 * 3600));
        let changes = solution.changes(&inputs);
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].summary, "1:1 a");
        assert_eq!(changes[0].to.start_seconds(), 15 * 3600);
        assert_eq!(changes[0].from.start_seconds(), 9 * 3600);
    }
}
