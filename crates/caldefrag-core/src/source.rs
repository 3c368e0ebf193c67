//! Event-source collaborator contract.
//!
//! The optimizer never talks to a calendar provider directly. Callers hand
//! it an [`EventSource`]; any failure there degrades to "no data" so a
//! single bad fetch costs candidates, not the whole run.

use std::collections::HashMap;

use chrono::{DateTime, NaiveTime, Utc};
use tracing::warn;

use crate::error::SourceError;
use crate::event::Event;

/// Safety cap on events returned for one range.
pub const MAX_EVENTS: usize = 2500;

/// Provides single-instance events for a calendar and time range.
pub trait EventSource {
    fn list_events(
        &self,
        time_min: DateTime<Utc>,
        time_max: DateTime<Utc>,
        calendar_id: &str,
    ) -> Result<Vec<Event>, SourceError>;
}

/// Provides the rule text of a recurring series.
pub trait RecurrenceRuleSource {
    fn recurrence_rules(&self, recurring_event_id: &str) -> Result<Vec<String>, SourceError>;
}

/// Sort key placing all-day events at the start of their day.
fn start_key(event: &Event) -> Option<DateTime<Utc>> {
    let start = event.start?;
    Some(match start.date_time() {
        Some(dt) => dt.with_timezone(&Utc),
        None => start.date().and_time(NaiveTime::MIN).and_utc(),
    })
}

/// Fetch events, sorted by start and capped at [`MAX_EVENTS`].
///
/// Provider errors are logged and reported as `None`.
pub fn fetch_events(
    source: &dyn EventSource,
    time_min: DateTime<Utc>,
    time_max: DateTime<Utc>,
    calendar_id: &str,
) -> Option<Vec<Event>> {
    match source.list_events(time_min, time_max, calendar_id) {
        Ok(mut events) => {
            events.sort_by_key(start_key);
            events.truncate(MAX_EVENTS);
            Some(events)
        }
        Err(e) => {
            warn!(calendar_id, error = %e, "event_fetch_failed");
            None
        }
    }
}

/// Calendars held in memory, keyed by calendar id.
#[derive(Debug, Clone, Default)]
pub struct InMemoryEventSource {
    calendars: HashMap<String, Vec<Event>>,
    recurrence: HashMap<String, Vec<String>>,
}

impl InMemoryEventSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_calendar(mut self, calendar_id: impl Into<String>, events: Vec<Event>) -> Self {
        self.calendars.insert(calendar_id.into(), events);
        self
    }

    pub fn with_recurrence(mut self, recurring_event_id: impl Into<String>, rules: Vec<String>) -> Self {
        self.recurrence.insert(recurring_event_id.into(), rules);
        self
    }

    pub fn calendar_ids(&self) -> impl Iterator<Item = &str> {
        self.calendars.keys().map(String::as_str)
    }
}

impl EventSource for InMemoryEventSource {
    fn list_events(
        &self,
        time_min: DateTime<Utc>,
        time_max: DateTime<Utc>,
        calendar_id: &str,
    ) -> Result<Vec<Event>, SourceError> {
        let events = self
            .calendars
            .get(calendar_id)
            .ok_or_else(|| SourceError::CalendarNotFound(calendar_id.to_string()))?;

        Ok(events
            .iter()
            .filter(|event| overlaps_range(event, time_min, time_max))
            .cloned()
            .collect())
    }
}

impl RecurrenceRuleSource for InMemoryEventSource {
    fn recurrence_rules(&self, recurring_event_id: &str) -> Result<Vec<String>, SourceError> {
        self.recurrence
            .get(recurring_event_id)
            .cloned()
            .ok_or_else(|| SourceError::RecurringEventNotFound(recurring_event_id.to_string()))
    }
}

fn overlaps_range(event: &Event, time_min: DateTime<Utc>, time_max: DateTime<Utc>) -> bool {
    let (Some(start), Some(end)) = (event.start, event.end) else {
        return false;
    };
    match (start.date_time(), end.date_time()) {
        (Some(start), Some(end)) => {
            start.with_timezone(&Utc) < time_max && end.with_timezone(&Utc) > time_min
        }
        _ => start.date() <= time_max.date_naive() && end.date() > time_min.date_naive(),
    }
}
