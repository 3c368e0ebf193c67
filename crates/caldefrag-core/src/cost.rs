//! Fragmentation cost of a week's schedule.
//!
//! Each weekday is scored on three factors:
//! - **meeting hours**: time in default-type meetings with attendees, lunch excluded
//! - **longest meeting stretch**: the longest run of meetings separated by at
//!   most a short gap
//! - **focus time**: free gaps of an hour or more inside the working window,
//!   with lunch treated as occupied
//!
//! The week's cost sums meeting hours, penalizes stretches beyond a
//! threshold, credits focus time at a discount and, for a full five-day
//! week, penalizes uneven load between the heaviest and second-lightest day.

use std::collections::BTreeMap;

use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::event::Event;
use crate::timing::{effective_span_in, is_weekend, EventTiming, TimeSpan, TimingOverrides};
use crate::working_hours::WorkingHoursWindow;

/// Penalty for moving a meeting within its original day.
pub const SAME_DAY_MOVE_PENALTY: f64 = 0.125;
/// Penalty for moving a meeting to another day.
pub const DIFFERENT_DAY_MOVE_PENALTY: f64 = 0.25;

/// Tunable weights of the cost function.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CostWeights {
    /// Meetings closer than this continue the same stretch.
    #[serde(default = "default_stretch_merge_gap_minutes")]
    pub stretch_merge_gap_minutes: i64,
    #[serde(default = "default_stretch_threshold_hours")]
    pub stretch_threshold_hours: f64,
    #[serde(default = "default_stretch_weight")]
    pub stretch_weight: f64,
    /// Fraction of an hour of focus time credited against cost.
    #[serde(default = "default_focus_credit")]
    pub focus_credit: f64,
    #[serde(default = "default_imbalance_weight")]
    pub imbalance_weight: f64,
    #[serde(default = "default_lunch_keyword")]
    pub lunch_keyword: String,
    /// Add [`calculate_moving_meeting_penalty`] for every overridden event.
    #[serde(default)]
    pub include_relocation_penalty: bool,
}

fn default_stretch_merge_gap_minutes() -> i64 {
    15
}
fn default_stretch_threshold_hours() -> f64 {
    2.0
}
fn default_stretch_weight() -> f64 {
    3.0
}
fn default_focus_credit() -> f64 {
    0.5
}
fn default_imbalance_weight() -> f64 {
    4.0
}
fn default_lunch_keyword() -> String {
    "lunch".into()
}

impl Default for CostWeights {
    fn default() -> Self {
        Self {
            stretch_merge_gap_minutes: default_stretch_merge_gap_minutes(),
            stretch_threshold_hours: default_stretch_threshold_hours(),
            stretch_weight: default_stretch_weight(),
            focus_credit: default_focus_credit(),
            imbalance_weight: default_imbalance_weight(),
            lunch_keyword: default_lunch_keyword(),
            include_relocation_penalty: false,
        }
    }
}

/// Cost factors for one day.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DayCost {
    /// `None` for the idle day used to cost an empty schedule.
    pub date: Option<NaiveDate>,
    pub meeting_hours: f64,
    pub longest_meeting_stretch_hours: f64,
    pub focus_time_one_hour_plus: f64,
    pub focus_time_two_hours_plus: f64,
}

/// Cost of a week with its per-day breakdown.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeekCost {
    pub days: Vec<DayCost>,
    pub meeting_hours: f64,
    pub stretch_penalty: f64,
    pub focus_credit: f64,
    pub imbalance_penalty: f64,
    pub relocation_penalty: f64,
    pub total: f64,
}

/// Penalty for relocating an event from `original` to `moved`.
pub fn calculate_moving_meeting_penalty(original: &EventTiming, moved: &EventTiming) -> f64 {
    if original == moved {
        0.0
    } else if original.day_of_week == moved.day_of_week {
        SAME_DAY_MOVE_PENALTY
    } else {
        DIFFERENT_DAY_MOVE_PENALTY
    }
}

#[derive(Debug, Clone, Default)]
pub struct CostModel {
    weights: CostWeights,
}

impl CostModel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_weights(weights: CostWeights) -> Self {
        Self { weights }
    }

    pub fn weights(&self) -> &CostWeights {
        &self.weights
    }

    /// Scalar cost of `events` with `overrides` applied.
    pub fn calculate_cost<'a, I>(
        &self,
        events: I,
        overrides: &TimingOverrides,
        working_hours: WorkingHoursWindow,
    ) -> f64
    where
        I: IntoIterator<Item = &'a Event>,
    {
        self.breakdown(events, overrides, working_hours).total
    }

    /// Full cost breakdown of `events` with `overrides` applied.
    ///
    /// Events are bucketed by the weekday of their effective start; weekend
    /// events and events without concrete times are ignored. A schedule with
    /// no weekday events is costed as one idle working day.
    ///
    /// Spans are read on the clock of the first timed event, so events
    /// stored in different UTC offsets line up.
    pub fn breakdown<'a, I>(
        &self,
        events: I,
        overrides: &TimingOverrides,
        working_hours: WorkingHoursWindow,
    ) -> WeekCost
    where
        I: IntoIterator<Item = &'a Event>,
    {
        let events: Vec<&Event> = events.into_iter().collect();
        let reference = events.iter().find_map(|e| e.offset());
        let mut by_day: BTreeMap<NaiveDate, Vec<(TimeSpan, &Event)>> = BTreeMap::new();
        let mut relocation_penalty = 0.0;

        for event in events {
            let Some(span) = reference.and_then(|r| effective_span_in(event, overrides, r)) else {
                continue;
            };
            if self.weights.include_relocation_penalty {
                if let (Some(moved), Some(original)) =
                    (overrides.get(&event.id), EventTiming::of_event(event))
                {
                    relocation_penalty += calculate_moving_meeting_penalty(&original, moved);
                }
            }
            if is_weekend(span.date()) {
                continue;
            }
            by_day.entry(span.date()).or_default().push((span, event));
        }

        let days: Vec<DayCost> = if by_day.is_empty() {
            vec![self.day_cost(None, &[], working_hours)]
        } else {
            by_day
                .iter()
                .map(|(date, entries)| self.day_cost(Some(*date), entries, working_hours))
                .collect()
        };

        self.aggregate(days, relocation_penalty)
    }

    fn aggregate(&self, days: Vec<DayCost>, relocation_penalty: f64) -> WeekCost {
        let w = &self.weights;
        let meeting_hours: f64 = days.iter().map(|d| d.meeting_hours).sum();
        let stretch_penalty: f64 = days
            .iter()
            .map(|d| w.stretch_weight * (d.longest_meeting_stretch_hours - w.stretch_threshold_hours).max(0.0))
            .sum();
        let focus_credit: f64 = days
            .iter()
            .map(|d| w.focus_credit * d.focus_time_one_hour_plus)
            .sum();

        let imbalance_penalty = if days.len() == 5 {
            let mut loads: Vec<f64> = days.iter().map(|d| d.meeting_hours).collect();
            loads.sort_by(f64::total_cmp);
            w.imbalance_weight * (loads[4] - loads[1])
        } else {
            0.0
        };

        WeekCost {
            total: meeting_hours + stretch_penalty - focus_credit + imbalance_penalty + relocation_penalty,
            days,
            meeting_hours,
            stretch_penalty,
            focus_credit,
            imbalance_penalty,
            relocation_penalty,
        }
    }

    /// Cost factors of one day's events, already placed.
    pub fn day_cost(
        &self,
        date: Option<NaiveDate>,
        entries: &[(TimeSpan, &Event)],
        working_hours: WorkingHoursWindow,
    ) -> DayCost {
        let keyword = self.weights.lunch_keyword.as_str();

        let mut meetings: Vec<TimeSpan> = entries
            .iter()
            .filter(|(_, e)| e.is_meeting() && !e.is_lunch(keyword))
            .map(|(span, _)| *span)
            .collect();
        meetings.sort_by_key(|s| (s.start, s.end));

        let meeting_hours = meetings.iter().map(TimeSpan::hours).sum();
        let longest_meeting_stretch_hours = self.longest_stretch(&meetings);

        let mut blocked: Vec<TimeSpan> = meetings.clone();
        blocked.extend(
            entries
                .iter()
                .filter(|(_, e)| e.is_lunch(keyword))
                .map(|(span, _)| *span),
        );

        let (focus_time_one_hour_plus, focus_time_two_hours_plus) = match date {
            Some(date) => focus_gaps(&blocked, working_hours.on(date)),
            None => {
                let hours = working_hours.span_hours();
                (
                    if hours >= 1.0 { hours } else { 0.0 },
                    if hours >= 2.0 { hours } else { 0.0 },
                )
            }
        };

        DayCost {
            date,
            meeting_hours,
            longest_meeting_stretch_hours,
            focus_time_one_hour_plus,
            focus_time_two_hours_plus,
        }
    }

    /// Longest run of meetings where each starts within the merge gap of the run's end.
    fn longest_stretch(&self, sorted: &[TimeSpan]) -> f64 {
        let gap = Duration::minutes(self.weights.stretch_merge_gap_minutes);
        let mut longest = 0.0_f64;
        let mut run: Option<TimeSpan> = None;

        for meeting in sorted {
            run = match run {
                Some(current) if meeting.start <= current.end + gap => {
                    Some(TimeSpan::new(current.start, current.end.max(meeting.end)))
                }
                Some(current) => {
                    longest = longest.max(current.hours());
                    Some(*meeting)
                }
                None => Some(*meeting),
            };
        }
        if let Some(current) = run {
            longest = longest.max(current.hours());
        }
        longest
    }
}

/// Sum of free gaps of at least one and two hours inside `day`.
fn focus_gaps(blocked: &[TimeSpan], day: TimeSpan) -> (f64, f64) {
    let mut clipped: Vec<TimeSpan> = blocked.iter().filter_map(|b| b.clip(&day)).collect();
    clipped.sort_by_key(|s| s.start);

    let mut one_plus = 0.0;
    let mut two_plus = 0.0;
    let mut record = |gap: Duration| {
        let hours = gap.num_seconds() as f64 / 3600.0;
        if hours >= 1.0 {
            one_plus += hours;
        }
        if hours >= 2.0 {
            two_plus += hours;
        }
    };

    let mut cursor = day.start;
    for span in &clipped {
        if span.start > cursor {
            record(span.start - cursor);
        }
        cursor = cursor.max(span.end);
    }
    if day.end > cursor {
        record(day.end - cursor);
    }
    (one_plus, two_plus)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::ResponseStatus;
    use chrono::{FixedOffset, TimeZone};

    fn meeting(id: &str, day: u32, start: (u32, u32), end: (u32, u32)) -> Event {
        let tz = FixedOffset::east_opt(0).unwrap();
        Event::new(id, format!("Meeting {id}"))
            .with_times(
                tz.with_ymd_and_hms(2024, 1, day, start.0, start.1, 0).unwrap(),
                tz.with_ymd_and_hms(2024, 1, day, end.0, end.1, 0).unwrap(),
            )
            .with_self_attendee("me@acme.com", ResponseStatus::Accepted)
            .with_attendee("you@acme.com", ResponseStatus::Accepted)
    }

    fn lunch(day: u32) -> Event {
        let tz = FixedOffset::east_opt(0).unwrap();
        Event::new("lunch", "Lunch").with_times(
            tz.with_ymd_and_hms(2024, 1, day, 12, 0, 0).unwrap(),
            tz.with_ymd_and_hms(2024, 1, day, 13, 0, 0).unwrap(),
        )
    }

    fn wh() -> WorkingHoursWindow {
        WorkingHoursWindow::from_hours(9, 17)
    }

    #[test]
    fn empty_schedule_is_all_focus_time() {
        let cost = CostModel::new().breakdown(&Vec::<Event>::new(), &TimingOverrides::new(), wh());
        assert_eq!(cost.days.len(), 1);
        assert_eq!(cost.days[0].meeting_hours, 0.0);
        assert_eq!(cost.days[0].focus_time_one_hour_plus, 8.0);
        assert_eq!(cost.total, -4.0);
    }

    #[test]
    fn back_to_back_morning_with_lunch() {
        let events = vec![
            meeting("a", 15, (9, 0), (10, 0)),
            meeting("b", 15, (10, 0), (11, 0)),
            meeting("c", 15, (11, 0), (12, 0)),
            lunch(15),
        ];
        let cost = CostModel::new().breakdown(&events, &TimingOverrides::new(), wh());
        let day = &cost.days[0];
        assert_eq!(day.meeting_hours, 3.0);
        assert_eq!(day.longest_meeting_stretch_hours, 3.0);
        assert_eq!(day.focus_time_one_hour_plus, 4.0);
        assert_eq!(day.focus_time_two_hours_plus, 4.0);
        // 3 meeting hours + 3 * (3 - 2) stretch - 0.5 * 4 focus
        assert_eq!(cost.total, 4.0);
    }

    #[test]
    fn short_gaps_continue_a_stretch() {
        let events = vec![
            meeting("a", 15, (9, 0), (10, 0)),
            meeting("b", 15, (10, 15), (11, 0)),
            meeting("c", 15, (11, 30), (12, 0)),
        ];
        let cost = CostModel::new().breakdown(&events, &TimingOverrides::new(), wh());
        assert_eq!(cost.days[0].longest_meeting_stretch_hours, 2.0);
    }

    #[test]
    fn sub_hour_gaps_are_not_focus_time() {
        let events = vec![
            meeting("a", 15, (9, 30), (10, 0)),
            meeting("b", 15, (10, 45), (16, 30)),
        ];
        let cost = CostModel::new().breakdown(&events, &TimingOverrides::new(), wh());
        assert_eq!(cost.days[0].focus_time_one_hour_plus, 0.0);
    }

    #[test]
    fn weekend_events_are_ignored() {
        // 2024-01-20 is a Saturday
        let events = vec![meeting("sat", 20, (9, 0), (10, 0))];
        let cost = CostModel::new().breakdown(&events, &TimingOverrides::new(), wh());
        assert_eq!(cost.days.len(), 1);
        assert_eq!(cost.days[0].date, None);
    }

    #[test]
    fn override_moves_event_between_days() {
        let events = vec![meeting("a", 15, (9, 0), (10, 0)), meeting("b", 15, (10, 0), (11, 0))];
        let mut overrides = TimingOverrides::new();
        overrides.insert("b".into(), EventTiming::new(2, 14 * 3600, 15 * 3600));

        let cost = CostModel::new().breakdown(&events, &overrides, wh());
        let dates: Vec<_> = cost.days.iter().filter_map(|d| d.date).collect();
        assert_eq!(
            dates,
            vec![
                NaiveDate::from_ymd_opt(2024, 1, 15).unwrap(),
                NaiveDate::from_ymd_opt(2024, 1, 16).unwrap()
            ]
        );
        // Original event record is unchanged.
        assert_eq!(events[1].wall_clock_span().unwrap().date().to_string(), "2024-01-15");
    }

    #[test]
    fn events_in_other_offsets_are_read_on_one_clock() {
        let eastern = FixedOffset::west_opt(5 * 3600).unwrap();
        let pacific = FixedOffset::west_opt(8 * 3600).unwrap();
        let early = Event::new("a", "Sync")
            .with_times(
                eastern.with_ymd_and_hms(2024, 1, 15, 9, 0, 0).unwrap(),
                eastern.with_ymd_and_hms(2024, 1, 15, 10, 0, 0).unwrap(),
            )
            .with_attendee("you@acme.com", ResponseStatus::Accepted);
        // 10:00 Pacific is 13:00 Eastern, three hours after the first meeting
        let late = Event::new("b", "Review")
            .with_times(
                pacific.with_ymd_and_hms(2024, 1, 15, 10, 0, 0).unwrap(),
                pacific.with_ymd_and_hms(2024, 1, 15, 11, 0, 0).unwrap(),
            )
            .with_attendee("you@acme.com", ResponseStatus::Accepted);

        let cost = CostModel::new().breakdown(&[early, late], &TimingOverrides::new(), wh());
        let day = &cost.days[0];
        assert_eq!(day.longest_meeting_stretch_hours, 1.0);
        // 10:00-13:00 and 14:00-17:00 Eastern
        assert_eq!(day.focus_time_one_hour_plus, 6.0);
    }

    #[test]
    fn full_week_penalizes_imbalance() {
        let events = vec![
            meeting("mon", 15, (9, 0), (13, 0)),
            meeting("tue", 16, (9, 0), (10, 0)),
            meeting("wed", 17, (9, 0), (10, 0)),
            meeting("thu", 18, (9, 0), (10, 0)),
            meeting("fri", 19, (9, 0), (10, 0)),
        ];
        let cost = CostModel::new().breakdown(&events, &TimingOverrides::new(), wh());
        assert_eq!(cost.days.len(), 5);
        // max 4h minus second-least 1h
        assert_eq!(cost.imbalance_penalty, 12.0);

        let four_days = &events[..4];
        let cost = CostModel::new().breakdown(four_days, &TimingOverrides::new(), wh());
        assert_eq!(cost.imbalance_penalty, 0.0);
    }

    #[test]
    fn moving_penalty_values() {
        let original = EventTiming::new(1, 9 * 3600, 10 * 3600);
        assert_eq!(calculate_moving_meeting_penalty(&original, &original), 0.0);
        assert_eq!(
            calculate_moving_meeting_penalty(&original, &EventTiming::new(1, 11 * 3600, 12 * 3600)),
            0.125
        );
        assert_eq!(
            calculate_moving_meeting_penalty(&original, &EventTiming::new(2, 9 * 3600, 10 * 3600)),
            0.25
        );
    }

    #[test]
    fn relocation_penalty_only_when_enabled() {
        let events = vec![meeting("a", 15, (9, 0), (10, 0))];
        let mut overrides = TimingOverrides::new();
        overrides.insert("a".into(), EventTiming::new(2, 9 * 3600, 10 * 3600));

        let plain = CostModel::new().calculate_cost(&events, &overrides, wh());
        let weights = CostWeights {
            include_relocation_penalty: true,
            ..CostWeights::default()
        };
        let penalized = CostModel::with_weights(weights).calculate_cost(&events, &overrides, wh());
        assert_eq!(penalized - plain, 0.25);
    }
}
