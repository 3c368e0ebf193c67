//! Working-hours windows and their estimation from calendar history.
//!
//! A person's usable meeting window is derived from when their real
//! commitments historically start and end: a low percentile of start
//! times and a high percentile of end times, rounded to the half hour.

use chrono::{DateTime, Duration, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::cache::{cache_key, WorkingHoursCache};
use crate::event::{email_domain, Event, ResponseStatus};
use crate::source::{fetch_events, EventSource};
use crate::timing::{TimeSpan, SECONDS_PER_DAY};

const HALF_HOUR: u32 = 30 * 60;

/// Consumer mail domains never count as a shared business domain.
const CONSUMER_DOMAINS: &[&str] = &[
    "gmail.com",
    "googlemail.com",
    "outlook.com",
    "hotmail.com",
    "live.com",
    "yahoo.com",
    "icloud.com",
    "me.com",
    "aol.com",
    "proton.me",
    "protonmail.com",
];

/// A person's usable meeting window in seconds since midnight.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WorkingHoursWindow {
    pub start_time_seconds: u32,
    pub end_time_seconds: u32,
}

impl WorkingHoursWindow {
    pub const DEFAULT: WorkingHoursWindow = WorkingHoursWindow {
        start_time_seconds: 9 * 3600,
        end_time_seconds: 17 * 3600,
    };

    pub fn new(start_time_seconds: u32, end_time_seconds: u32) -> Self {
        Self {
            start_time_seconds,
            end_time_seconds,
        }
    }

    pub fn from_hours(start_hour: u32, end_hour: u32) -> Self {
        Self::new(start_hour * 3600, end_hour * 3600)
    }

    /// Parse `"HH:MM"` bounds.
    pub fn parse(start: &str, end: &str) -> Option<Self> {
        let window = Self::new(parse_hhmm(start)?, parse_hhmm(end)?);
        window.is_valid().then_some(window)
    }

    pub fn is_valid(&self) -> bool {
        self.start_time_seconds < self.end_time_seconds && self.end_time_seconds <= SECONDS_PER_DAY
    }

    pub fn span_hours(&self) -> f64 {
        (self.end_time_seconds.saturating_sub(self.start_time_seconds)) as f64 / 3600.0
    }

    /// The window on a concrete day.
    pub fn on(&self, date: NaiveDate) -> TimeSpan {
        let midnight = date.and_time(NaiveTime::MIN);
        TimeSpan::new(
            midnight + Duration::seconds(self.start_time_seconds as i64),
            midnight + Duration::seconds(self.end_time_seconds as i64),
        )
    }

    /// Whether `span` lies entirely inside the window on its start day.
    pub fn contains(&self, span: &TimeSpan) -> bool {
        span.start_seconds() >= self.start_time_seconds
            && span.end_seconds() <= self.end_time_seconds
    }
}

impl Default for WorkingHoursWindow {
    fn default() -> Self {
        Self::DEFAULT
    }
}

impl std::fmt::Display for WorkingHoursWindow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}-{}",
            format_hhmm(self.start_time_seconds),
            format_hhmm(self.end_time_seconds)
        )
    }
}

fn parse_hhmm(value: &str) -> Option<u32> {
    let (h, m) = value.trim().split_once(':')?;
    let h: u32 = h.parse().ok()?;
    let m: u32 = m.parse().ok()?;
    if h > 24 || m >= 60 || (h == 24 && m != 0) {
        return None;
    }
    Some(h * 3600 + m * 60)
}

pub fn format_hhmm(seconds: u32) -> String {
    format!("{:02}:{:02}", seconds / 3600, (seconds % 3600) / 60)
}

/// Which history counts and which percentiles bound the window.
#[derive(Debug, Clone, PartialEq)]
pub struct WorkingHoursPolicy {
    pub start_percentile: f64,
    pub end_percentile: f64,
    /// Only count meetings the person accepted.
    pub require_accepted: bool,
    /// Only count meetings where every attendee shares the person's business domain.
    pub require_shared_domain: bool,
    pub lookback_days: i64,
    pub default_window: WorkingHoursWindow,
}

impl Default for WorkingHoursPolicy {
    fn default() -> Self {
        Self {
            start_percentile: 0.05,
            end_percentile: 0.90,
            require_accepted: true,
            require_shared_domain: true,
            lookback_days: 90,
            default_window: WorkingHoursWindow::DEFAULT,
        }
    }
}

/// Value at percentile `p` of an ascending slice.
fn percentile(sorted: &[u32], p: f64) -> Option<u32> {
    if sorted.is_empty() {
        return None;
    }
    let idx = (p.clamp(0.0, 1.0) * sorted.len() as f64).floor() as usize;
    Some(sorted[idx.min(sorted.len() - 1)])
}

fn round_to_half_hour(seconds: u32) -> u32 {
    ((seconds + HALF_HOUR / 2) / HALF_HOUR) * HALF_HOUR
}

/// Derives working-hours windows, optionally backed by a TTL cache.
pub struct WorkingHoursEstimator<'a> {
    policy: WorkingHoursPolicy,
    cache: Option<&'a dyn WorkingHoursCache>,
}

impl<'a> WorkingHoursEstimator<'a> {
    pub fn new(policy: WorkingHoursPolicy) -> Self {
        Self {
            policy,
            cache: None,
        }
    }

    pub fn with_cache(mut self, cache: &'a dyn WorkingHoursCache) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn policy(&self) -> &WorkingHoursPolicy {
        &self.policy
    }

    /// Working window for `email`, consulting the cache first.
    ///
    /// Cache failures are logged and fall through to recomputation; a failed
    /// history fetch is treated as an empty history.
    pub fn working_hours_for(
        &self,
        email: &str,
        source: &dyn EventSource,
        now: DateTime<Utc>,
    ) -> WorkingHoursWindow {
        let key = cache_key(email);
        if let Some(cache) = self.cache {
            match cache.get(&key, now) {
                Ok(Some(window)) => {
                    debug!(email, %window, "working_hours_cache_hit");
                    return window;
                }
                Ok(None) => {}
                Err(e) => warn!(email, error = %e, "working_hours_cache_read_failed"),
            }
        }

        let since = now - Duration::days(self.policy.lookback_days);
        let history = fetch_events(source, since, now, email).unwrap_or_default();
        let window = self.estimate_from_events(email, &history);

        if let Some(cache) = self.cache {
            if let Err(e) = cache.put(&key, window, now) {
                warn!(email, error = %e, "working_hours_cache_write_failed");
            }
        }
        window
    }

    /// Estimate from an already-fetched history.
    ///
    /// Tries the strict commitment filter first, then any event with concrete
    /// times, then the policy's default window.
    pub fn estimate_from_events(&self, email: &str, events: &[Event]) -> WorkingHoursWindow {
        let strict: Vec<TimeSpan> = events
            .iter()
            .filter(|e| self.is_commitment(email, e))
            .filter_map(single_day_span)
            .collect();

        let spans = if strict.is_empty() {
            debug!(email, "working_hours_relaxed_filter");
            events.iter().filter_map(single_day_span).collect()
        } else {
            strict
        };

        self.window_from_spans(&spans).unwrap_or_else(|| {
            debug!(email, "working_hours_default_window");
            self.policy.default_window
        })
    }

    fn window_from_spans(&self, spans: &[TimeSpan]) -> Option<WorkingHoursWindow> {
        let mut starts: Vec<u32> = spans.iter().map(TimeSpan::start_seconds).collect();
        let mut ends: Vec<u32> = spans.iter().map(TimeSpan::end_seconds).collect();
        starts.sort_unstable();
        ends.sort_unstable();

        let start = round_to_half_hour(percentile(&starts, self.policy.start_percentile)?);
        let end = round_to_half_hour(percentile(&ends, self.policy.end_percentile)?).min(SECONDS_PER_DAY);
        let window = WorkingHoursWindow::new(start, end);
        window.is_valid().then_some(window)
    }

    fn is_commitment(&self, email: &str, event: &Event) -> bool {
        if !event.is_meeting() {
            return false;
        }
        if self.policy.require_accepted && event.response_of(email) != Some(ResponseStatus::Accepted) {
            return false;
        }
        if self.policy.require_shared_domain {
            let Some(domain) = email_domain(email) else {
                return false;
            };
            if CONSUMER_DOMAINS.contains(&domain.as_str()) {
                return false;
            }
            if !event
                .attendees
                .iter()
                .all(|a| a.domain().as_deref() == Some(domain.as_str()))
            {
                return false;
            }
        }
        true
    }
}

fn single_day_span(event: &Event) -> Option<TimeSpan> {
    let span = event.wall_clock_span()?;
    (span.end_seconds() <= SECONDS_PER_DAY).then_some(span)
}
