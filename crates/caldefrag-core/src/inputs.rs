//! The aggregate view both solvers work from.
//!
//! [`Inputs`] is assembled once per optimization run, validated up front,
//! and then only read: solvers clone the timing map before mutating it.

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Datelike, Duration, NaiveDate, NaiveTime, Utc};
use indexmap::IndexSet;
use tracing::{debug, info};

use crate::error::ValidationError;
use crate::event::{Event, ResponseStatus};
use crate::recurrence::{RecurrenceClassifier, RecurrenceType};
use crate::source::{fetch_events, EventSource, RecurrenceRuleSource};
use crate::timing::{is_weekend, EventTiming, TimingOverrides};
use crate::working_hours::{WorkingHoursEstimator, WorkingHoursWindow};

#[derive(Debug, Clone)]
pub struct Inputs {
    my_email: String,
    my_events: Vec<Event>,
    my_event_index: HashMap<String, usize>,
    my_working_hours: WorkingHoursWindow,
    their_events: HashMap<String, Vec<Event>>,
    their_working_hours: HashMap<String, WorkingHoursWindow>,
    moveable_events: IndexSet<String>,
    timings: TimingOverrides,
    recurrence: HashMap<String, RecurrenceType>,
}

impl Inputs {
    pub fn builder(my_email: impl Into<String>, my_working_hours: WorkingHoursWindow) -> InputsBuilder {
        InputsBuilder::new(my_email, my_working_hours)
    }

    pub fn my_email(&self) -> &str {
        &self.my_email
    }

    pub fn my_events(&self) -> &[Event] {
        &self.my_events
    }

    pub fn my_event(&self, id: &str) -> Option<&Event> {
        self.my_event_index.get(id).map(|&i| &self.my_events[i])
    }

    pub fn my_working_hours(&self) -> WorkingHoursWindow {
        self.my_working_hours
    }

    /// Counterpart's events; empty when nothing was fetched for them.
    pub fn their_events(&self, email: &str) -> &[Event] {
        self.their_events.get(email).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Counterpart's window; the default window when unknown.
    pub fn their_working_hours(&self, email: &str) -> WorkingHoursWindow {
        self.their_working_hours
            .get(email)
            .copied()
            .unwrap_or_default()
    }

    pub fn counterparts(&self) -> impl Iterator<Item = &str> {
        self.their_events.keys().map(String::as_str)
    }

    /// Movable ids in the order their events appear in my calendar.
    pub fn moveable_events(&self) -> &IndexSet<String> {
        &self.moveable_events
    }

    pub fn is_moveable(&self, id: &str) -> bool {
        self.moveable_events.contains(id)
    }

    /// Already-known placements.
    pub fn timings(&self) -> &TimingOverrides {
        &self.timings
    }

    pub fn recurrence(&self, id: &str) -> Option<RecurrenceType> {
        self.recurrence.get(id).copied()
    }

    /// Original placement of an event, `None` without concrete times.
    pub fn original_timing(&self, id: &str) -> Option<EventTiming> {
        self.my_event(id).and_then(EventTiming::of_event)
    }
}

/// Builds and validates an [`Inputs`] bundle.
pub struct InputsBuilder {
    my_email: String,
    my_working_hours: WorkingHoursWindow,
    my_events: Vec<Event>,
    their_events: HashMap<String, Vec<Event>>,
    their_working_hours: HashMap<String, WorkingHoursWindow>,
    moveable: HashSet<String>,
    timings: TimingOverrides,
    recurrence: HashMap<String, RecurrenceType>,
}

impl InputsBuilder {
    pub fn new(my_email: impl Into<String>, my_working_hours: WorkingHoursWindow) -> Self {
        Self {
            my_email: my_email.into(),
            my_working_hours,
            my_events: Vec::new(),
            their_events: HashMap::new(),
            their_working_hours: HashMap::new(),
            moveable: HashSet::new(),
            timings: TimingOverrides::new(),
            recurrence: HashMap::new(),
        }
    }

    pub fn my_events(mut self, events: Vec<Event>) -> Self {
        self.my_events = events;
        self
    }

    pub fn their_calendar(
        mut self,
        email: impl Into<String>,
        events: Vec<Event>,
        working_hours: WorkingHoursWindow,
    ) -> Self {
        let email = email.into();
        self.their_working_hours.insert(email.clone(), working_hours);
        self.their_events.insert(email, events);
        self
    }

    pub fn moveable(mut self, id: impl Into<String>) -> Self {
        self.moveable.insert(id.into());
        self
    }

    pub fn moveable_all<I, S>(mut self, ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.moveable.extend(ids.into_iter().map(Into::into));
        self
    }

    pub fn timing(mut self, id: impl Into<String>, timing: EventTiming) -> Self {
        self.timings.insert(id.into(), timing);
        self
    }

    pub fn recurrence(mut self, id: impl Into<String>, recurrence: RecurrenceType) -> Self {
        self.recurrence.insert(id.into(), recurrence);
        self
    }

    /// Validate and freeze.
    ///
    /// # Errors
    /// Returns the first violated invariant: unknown or non-two-party movable
    /// events, movable events without concrete times, duplicate ids or an
    /// empty working-hours window.
    pub fn build(self) -> Result<Inputs, ValidationError> {
        if !self.my_working_hours.is_valid() {
            return Err(invalid_hours(&self.my_email, self.my_working_hours));
        }
        for (email, window) in &self.their_working_hours {
            if !window.is_valid() {
                return Err(invalid_hours(email, *window));
            }
        }

        let mut my_event_index = HashMap::with_capacity(self.my_events.len());
        for (i, event) in self.my_events.iter().enumerate() {
            if my_event_index.insert(event.id.clone(), i).is_some() {
                return Err(ValidationError::DuplicateEventId(event.id.clone()));
            }
        }

        let mut ordered: Vec<(usize, String)> = Vec::with_capacity(self.moveable.len());
        for id in self.moveable {
            let &index = my_event_index
                .get(&id)
                .ok_or_else(|| ValidationError::UnknownMovableEvent(id.clone()))?;
            let event = &self.my_events[index];
            let others = event.other_attendees(&self.my_email).count();
            if others != 1 {
                return Err(ValidationError::NotOneOnOne {
                    event_id: id,
                    found: others,
                });
            }
            if event.wall_clock_span().is_none() {
                return Err(ValidationError::MissingTimes(id));
            }
            ordered.push((index, id));
        }
        ordered.sort_by_key(|(index, _)| *index);

        Ok(Inputs {
            my_email: self.my_email,
            my_events: self.my_events,
            my_event_index,
            my_working_hours: self.my_working_hours,
            their_events: self.their_events,
            their_working_hours: self.their_working_hours,
            moveable_events: ordered.into_iter().map(|(_, id)| id).collect(),
            timings: self.timings,
            recurrence: self.recurrence,
        })
    }
}

fn invalid_hours(owner: &str, window: WorkingHoursWindow) -> ValidationError {
    ValidationError::InvalidWorkingHours {
        owner: owner.to_string(),
        start_seconds: window.start_time_seconds,
        end_seconds: window.end_time_seconds,
    }
}

/// Whether an event is a relocatable two-party meeting on a weekday.
pub fn is_moveable_candidate(event: &Event, my_email: &str) -> bool {
    let Some(span) = event.wall_clock_span() else {
        return false;
    };
    event.is_meeting()
        && !is_weekend(span.date())
        && span.date() == (span.end - Duration::seconds(1)).date()
        && event.counterpart(my_email).is_some()
        && event.response_of(my_email) != Some(ResponseStatus::Declined)
}

/// Whether an event touches Monday to Friday of the week starting at
/// `monday`, read on the event's own clock.
fn falls_in_work_week(event: &Event, monday: NaiveDate) -> bool {
    let friday = monday + Duration::days(4);
    let within = |date: NaiveDate| (monday..=friday).contains(&date);
    match event.wall_clock_span() {
        Some(span) => within(span.start.date()) || within((span.end - Duration::seconds(1)).date()),
        None => event.all_day_dates().into_iter().any(within),
    }
}

/// Monday of the week containing `date`.
pub fn week_monday(date: NaiveDate) -> NaiveDate {
    date - Duration::days(date.weekday().num_days_from_monday() as i64)
}

/// Assemble [`Inputs`] for the Monday-to-Friday week containing `week_of`.
///
/// Fetch failures degrade to empty calendars; working hours come from the
/// estimator (and its cache); recurring movable events are classified.
///
/// # Errors
/// Returns a validation error only if the assembled bundle is inconsistent,
/// which indicates a bug in movable-event selection.
pub fn assemble_week(
    source: &dyn EventSource,
    rules: &dyn RecurrenceRuleSource,
    estimator: &WorkingHoursEstimator<'_>,
    my_email: &str,
    week_of: NaiveDate,
    now: DateTime<Utc>,
) -> Result<Inputs, ValidationError> {
    let monday = week_monday(week_of);
    // A day of padding on each side covers Monday to Friday in any UTC offset.
    let time_min = (monday - Duration::days(1)).and_time(NaiveTime::MIN).and_utc();
    let time_max = time_min + Duration::days(7);

    let my_events: Vec<Event> = fetch_events(source, time_min, time_max, my_email)
        .unwrap_or_default()
        .into_iter()
        .filter(|e| falls_in_work_week(e, monday))
        .collect();
    let my_working_hours = estimator.working_hours_for(my_email, source, now);

    let moveable: Vec<&Event> = my_events
        .iter()
        .filter(|e| is_moveable_candidate(e, my_email))
        .collect();

    let counterparts: IndexSet<String> = moveable
        .iter()
        .filter_map(|e| e.counterpart(my_email))
        .map(str::to_string)
        .collect();

    let classifier = RecurrenceClassifier::new(rules);
    let mut builder = InputsBuilder::new(my_email, my_working_hours)
        .moveable_all(moveable.iter().map(|e| e.id.clone()));
    for event in &moveable {
        if let Some(kind) = classifier.classify(event) {
            builder = builder.recurrence(event.id.clone(), kind);
        }
    }

    for email in &counterparts {
        let events = fetch_events(source, time_min, time_max, email).unwrap_or_default();
        let window = estimator.working_hours_for(email, source, now);
        debug!(counterpart = %email, events = events.len(), %window, "counterpart_loaded");
        builder = builder.their_calendar(email.clone(), events, window);
    }

    info!(
        my_events = my_events.len(),
        moveable = moveable.len(),
        counterparts = counterparts.len(),
        %my_working_hours,
        "inputs_assembled"
    );
    builder.my_events(my_events).build()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{FixedOffset, TimeZone};

    fn one_on_one(id: &str, day: u32, hour: u32) -> Event {
        let tz = FixedOffset::east_opt(0).unwrap();
        let start = tz.with_ymd_and_hms(2024, 1, day, hour, 0, 0).unwrap();
        Event::new(id, "1:1")
            .with_times(start, start + Duration::hours(1))
            .with_self_attendee("me@acme.com", ResponseStatus::Accepted)
            .with_attendee("you@acme.com", ResponseStatus::Accepted)
    }

    #[test]
    fn build_orders_moveable_by_calendar_position() {
        let inputs = Inputs::builder("me@acme.com", WorkingHoursWindow::DEFAULT)
            .my_events(vec![one_on_one("a", 15, 9), one_on_one("b", 15, 11), one_on_one("c", 16, 9)])
            .moveable_all(["c", "a"])
            .build()
            .unwrap();
        let ids: Vec<_> = inputs.moveable_events().iter().cloned().collect();
        assert_eq!(ids, vec!["a", "c"]);
        assert!(inputs.my_event("b").is_some());
        assert!(!inputs.is_moveable("b"));
    }

    #[test]
    fn build_rejects_unknown_moveable() {
        let err = Inputs::builder("me@acme.com", WorkingHoursWindow::DEFAULT)
            .my_events(vec![one_on_one("a", 15, 9)])
            .moveable("zzz")
            .build()
            .unwrap_err();
        assert_eq!(err, ValidationError::UnknownMovableEvent("zzz".into()));
    }

    #[test]
    fn build_rejects_group_meeting() {
        let group = one_on_one("g", 15, 9).with_attendee("third@acme.com", ResponseStatus::Accepted);
        let err = Inputs::builder("me@acme.com", WorkingHoursWindow::DEFAULT)
            .my_events(vec![group])
            .moveable("g")
            .build()
            .unwrap_err();
        assert_eq!(
            err,
            ValidationError::NotOneOnOne {
                event_id: "g".into(),
                found: 2
            }
        );
    }

    #[test]
    fn build_rejects_duplicates_and_bad_hours() {
        let err = Inputs::builder("me@acme.com", WorkingHoursWindow::DEFAULT)
            .my_events(vec![one_on_one("a", 15, 9), one_on_one("a", 16, 9)])
            .build()
            .unwrap_err();
        assert_eq!(err, ValidationError::DuplicateEventId("a".into()));

        let err = Inputs::builder("me@acme.com", WorkingHoursWindow::new(10 * 3600, 9 * 3600))
            .build()
            .unwrap_err();
        assert!(matches!(err, ValidationError::InvalidWorkingHours { .. }));
    }

    #[test]
    fn unknown_counterpart_defaults() {
        let inputs = Inputs::builder("me@acme.com", WorkingHoursWindow::DEFAULT)
            .build()
            .unwrap();
        assert!(inputs.their_events("nobody@acme.com").is_empty());
        assert_eq!(inputs.their_working_hours("nobody@acme.com"), WorkingHoursWindow::DEFAULT);
    }

    #[test]
    fn moveable_candidate_rules() {
        assert!(is_moveable_candidate(&one_on_one("a", 15, 9), "me@acme.com"));
        // 2024-01-20 is a Saturday
        assert!(!is_moveable_candidate(&one_on_one("sat", 20, 9), "me@acme.com"));

        let mut declined = one_on_one("d", 15, 9);
        declined.attendees[0].response_status = ResponseStatus::Declined;
        assert!(!is_moveable_candidate(&declined, "me@acme.com"));
    }

    #[test]
    fn work_week_is_read_on_each_event_clock() {
        let eastern = FixedOffset::west_opt(5 * 3600).unwrap();
        let monday = NaiveDate::from_ymd_opt(2024, 1, 15).unwrap();
        let evening = |day: u32| {
            Event::new(format!("e{day}"), "Late").with_times(
                eastern.with_ymd_and_hms(2024, 1, day, 20, 0, 0).unwrap(),
                eastern.with_ymd_and_hms(2024, 1, day, 20, 30, 0).unwrap(),
            )
        };
        // Friday 20:00 Eastern is already Saturday in UTC
        assert!(falls_in_work_week(&evening(19), monday));
        // Sunday 20:00 Eastern is already Monday in UTC
        assert!(!falls_in_work_week(&evening(14), monday));

        let day = |d: u32| NaiveDate::from_ymd_opt(2024, 1, d).unwrap();
        assert!(falls_in_work_week(&Event::new("ooo", "OOO").with_all_day(day(19), day(19)), monday));
        assert!(!falls_in_work_week(&Event::new("sat", "Away").with_all_day(day(20), day(21)), monday));
    }

    #[test]
    fn week_monday_normalizes() {
        let wed = NaiveDate::from_ymd_opt(2024, 1, 17).unwrap();
        assert_eq!(week_monday(wed), NaiveDate::from_ymd_opt(2024, 1, 15).unwrap());
    }
}
