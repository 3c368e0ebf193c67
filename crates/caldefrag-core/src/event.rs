//! Calendar event model.
//!
//! Mirrors the subset of a Google Calendar event resource the optimizer
//! reads: concrete or all-day start/end, attendees with RSVP state, the
//! event type and the recurring parent id. JSON uses the provider's
//! camelCase field names so captured API payloads load unchanged.

use chrono::{DateTime, FixedOffset, NaiveDate, TimeZone};
use serde::{Deserialize, Serialize};

use crate::timing::TimeSpan;

/// Start or end of an event: either a concrete instant or an all-day date.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum EventTime {
    DateTime {
        #[serde(rename = "dateTime")]
        date_time: DateTime<FixedOffset>,
    },
    Date { date: NaiveDate },
}

impl EventTime {
    pub fn at(date_time: DateTime<FixedOffset>) -> Self {
        Self::DateTime { date_time }
    }

    pub fn on(date: NaiveDate) -> Self {
        Self::Date { date }
    }

    pub fn date_time(&self) -> Option<DateTime<FixedOffset>> {
        match self {
            Self::DateTime { date_time } => Some(*date_time),
            Self::Date { .. } => None,
        }
    }

    pub fn date(&self) -> NaiveDate {
        match self {
            Self::DateTime { date_time } => date_time.date_naive(),
            Self::Date { date } => *date,
        }
    }
}

/// Provider event type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub enum EventType {
    #[default]
    Default,
    OutOfOffice,
    FocusTime,
    WorkingLocation,
    /// Any other provider type (`fromGmail`, `birthday`, ...); never a meeting.
    #[serde(other)]
    Other,
}

/// Attendee RSVP state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub enum ResponseStatus {
    #[default]
    NeedsAction,
    Declined,
    Tentative,
    Accepted,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Attendee {
    pub email: String,
    #[serde(default)]
    pub response_status: ResponseStatus,
    /// Set by the provider on the attendee entry of the calendar owner.
    #[serde(default, rename = "self")]
    pub is_self: bool,
}

impl Attendee {
    pub fn new(email: impl Into<String>, response_status: ResponseStatus) -> Self {
        Self {
            email: email.into(),
            response_status,
            is_self: false,
        }
    }

    /// Domain part of the attendee email, lowercased.
    pub fn domain(&self) -> Option<String> {
        email_domain(&self.email)
    }
}

/// A single (already expanded) calendar event instance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Event {
    pub id: String,
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub start: Option<EventTime>,
    #[serde(default)]
    pub end: Option<EventTime>,
    #[serde(default)]
    pub attendees: Vec<Attendee>,
    #[serde(default)]
    pub event_type: EventType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recurring_event_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub organizer_email: Option<String>,
}

impl Event {
    pub fn new(id: impl Into<String>, summary: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            summary: summary.into(),
            start: None,
            end: None,
            attendees: Vec::new(),
            event_type: EventType::Default,
            recurring_event_id: None,
            organizer_email: None,
        }
    }

    /// Set concrete start/end times.
    pub fn with_times(mut self, start: DateTime<FixedOffset>, end: DateTime<FixedOffset>) -> Self {
        self.start = Some(EventTime::at(start));
        self.end = Some(EventTime::at(end));
        self
    }

    /// Make this an all-day event covering `first..=last`.
    pub fn with_all_day(mut self, first: NaiveDate, last: NaiveDate) -> Self {
        self.start = Some(EventTime::on(first));
        self.end = Some(EventTime::on(last.succ_opt().unwrap_or(last)));
        self
    }

    pub fn with_attendee(mut self, email: impl Into<String>, status: ResponseStatus) -> Self {
        self.attendees.push(Attendee::new(email, status));
        self
    }

    /// Add the calendar owner's own attendee entry.
    pub fn with_self_attendee(mut self, email: impl Into<String>, status: ResponseStatus) -> Self {
        let mut attendee = Attendee::new(email, status);
        attendee.is_self = true;
        self.attendees.push(attendee);
        self
    }

    pub fn with_type(mut self, event_type: EventType) -> Self {
        self.event_type = event_type;
        self
    }

    pub fn with_recurring_event_id(mut self, id: impl Into<String>) -> Self {
        self.recurring_event_id = Some(id.into());
        self
    }

    pub fn with_organizer(mut self, email: impl Into<String>) -> Self {
        self.organizer_email = Some(email.into());
        self
    }

    /// UTC offset the start is expressed in, `None` without a concrete start.
    pub fn offset(&self) -> Option<FixedOffset> {
        self.start?.date_time().map(|start| *start.offset())
    }

    /// Concrete start/end in the event's own local wall-clock time.
    ///
    /// `None` for all-day events and for records missing either bound or
    /// whose end does not come after the start.
    pub fn wall_clock_span(&self) -> Option<TimeSpan> {
        self.span_in(self.offset()?)
    }

    /// Concrete start/end read on a clock at `offset`.
    pub fn span_in(&self, offset: FixedOffset) -> Option<TimeSpan> {
        let start = self.start?.date_time()?;
        let end = self.end?.date_time()?;
        if end <= start {
            return None;
        }
        Some(TimeSpan::new(
            start.with_timezone(&offset).naive_local(),
            end.with_timezone(&offset).naive_local(),
        ))
    }

    pub fn is_all_day(&self) -> bool {
        matches!(self.start, Some(EventTime::Date { .. }))
    }

    /// Dates covered by an all-day event (end exclusive, as the provider encodes it).
    pub fn all_day_dates(&self) -> Vec<NaiveDate> {
        let (Some(EventTime::Date { date: first }), Some(end)) = (self.start, self.end) else {
            return Vec::new();
        };
        let end = end.date();
        let mut dates = Vec::new();
        let mut day = first;
        while day < end {
            dates.push(day);
            match day.succ_opt() {
                Some(next) => day = next,
                None => break,
            }
        }
        if dates.is_empty() {
            dates.push(first);
        }
        dates
    }

    pub fn is_out_of_office(&self) -> bool {
        self.event_type == EventType::OutOfOffice
    }

    /// Default-type event with at least one attendee.
    pub fn is_meeting(&self) -> bool {
        self.event_type == EventType::Default && !self.attendees.is_empty()
    }

    /// Case-insensitive substring match of `keyword` on the summary.
    pub fn is_lunch(&self, keyword: &str) -> bool {
        !keyword.is_empty() && self.summary.to_lowercase().contains(&keyword.to_lowercase())
    }

    /// Attendees other than the calendar owner.
    pub fn other_attendees<'a>(&'a self, my_email: &'a str) -> impl Iterator<Item = &'a Attendee> + 'a {
        self.attendees
            .iter()
            .filter(move |a| !a.is_self && !a.email.eq_ignore_ascii_case(my_email))
    }

    /// The single other attendee of a two-party meeting.
    pub fn counterpart(&self, my_email: &str) -> Option<&str> {
        let mut others = self
            .attendees
            .iter()
            .filter(|a| !a.is_self && !a.email.eq_ignore_ascii_case(my_email));
        let first = others.next()?;
        if others.next().is_some() {
            return None;
        }
        Some(first.email.as_str())
    }

    /// RSVP of `email`; organizers without an attendee entry count as accepted.
    pub fn response_of(&self, email: &str) -> Option<ResponseStatus> {
        self.attendees
            .iter()
            .find(|a| a.email.eq_ignore_ascii_case(email))
            .map(|a| a.response_status)
            .or_else(|| {
                self.organizer_email
                    .as_deref()
                    .filter(|o| o.eq_ignore_ascii_case(email))
                    .map(|_| ResponseStatus::Accepted)
            })
    }

    /// Copy of this event moved to `span`, keeping the original UTC offset.
    pub fn rescheduled(&self, span: TimeSpan) -> Option<Event> {
        let offset = *self.start?.date_time()?.offset();
        let start = offset.from_local_datetime(&span.start).single()?;
        let end = offset.from_local_datetime(&span.end).single()?;
        Some(Event {
            start: Some(EventTime::at(start)),
            end: Some(EventTime::at(end)),
            ..self.clone()
        })
    }
}

/// Lowercased domain of an email address.
pub fn email_domain(email: &str) -> Option<String> {
    let (_, domain) = email.rsplit_once('@')?;
    if domain.is_empty() {
        return None;
    }
    Some(domain.to_ascii_lowercase())
}
