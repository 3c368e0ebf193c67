//! Recurrence cadence classification from RRULE text.

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::event::Event;
use crate::source::RecurrenceRuleSource;

/// How often a recurring meeting repeats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RecurrenceType {
    Daily,
    Weekly,
    EveryTwoWeeks,
    ThreeWeeksPlus,
}

impl std::fmt::Display for RecurrenceType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RecurrenceType::Daily => write!(f, "daily"),
            RecurrenceType::Weekly => write!(f, "weekly"),
            RecurrenceType::EveryTwoWeeks => write!(f, "every two weeks"),
            RecurrenceType::ThreeWeeksPlus => write!(f, "three weeks or more"),
        }
    }
}

/// Value of the `INTERVAL=` part of a rule, if present.
fn interval(rule: &str) -> Option<&str> {
    rule.trim_start_matches("RRULE:")
        .split(';')
        .find_map(|part| part.trim().strip_prefix("INTERVAL="))
}

/// Classify a single rule line such as `RRULE:FREQ=WEEKLY;INTERVAL=2`.
///
/// `DAILY` wins over everything; weekly rules split on their interval;
/// any other cadence (monthly, yearly, ...) is three weeks or more.
pub fn classify_rule(rule: &str) -> RecurrenceType {
    let rule = rule.to_ascii_uppercase();
    if rule.contains("DAILY") {
        return RecurrenceType::Daily;
    }
    if rule.contains("WEEKLY") {
        return match interval(&rule) {
            None => RecurrenceType::Weekly,
            Some(n) => match n.trim().parse::<u32>() {
                // INTERVAL=1 is the explicit spelling of a plain weekly rule.
                Ok(1) => RecurrenceType::Weekly,
                Ok(2) => RecurrenceType::EveryTwoWeeks,
                _ => RecurrenceType::ThreeWeeksPlus,
            },
        };
    }
    RecurrenceType::ThreeWeeksPlus
}

/// Classify the rule set of a recurring series; `None` when it carries no rule.
pub fn classify_rules(rules: &[String]) -> Option<RecurrenceType> {
    let rule = rules
        .iter()
        .find(|r| r.trim_start().to_ascii_uppercase().starts_with("RRULE:"))
        .or_else(|| rules.first())?;
    Some(classify_rule(rule))
}

/// Looks up an event's parent series and classifies its cadence.
pub struct RecurrenceClassifier<'a> {
    source: &'a dyn RecurrenceRuleSource,
}

impl<'a> RecurrenceClassifier<'a> {
    pub fn new(source: &'a dyn RecurrenceRuleSource) -> Self {
        Self { source }
    }

    /// `None` for non-recurring events and when the series cannot be read.
    pub fn classify(&self, event: &Event) -> Option<RecurrenceType> {
        let series_id = event.recurring_event_id.as_deref()?;
        match self.source.recurrence_rules(series_id) {
            Ok(rules) => classify_rules(&rules),
            Err(e) => {
                warn!(event_id = %event.id, series_id, error = %e, "recurrence_lookup_failed");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::InMemoryEventSource;

    #[test]
    fn classification_priority() {
        assert_eq!(classify_rule("RRULE:FREQ=DAILY;COUNT=5"), RecurrenceType::Daily);
        assert_eq!(classify_rule("RRULE:FREQ=WEEKLY;BYDAY=MO"), RecurrenceType::Weekly);
        assert_eq!(
            classify_rule("RRULE:FREQ=WEEKLY;INTERVAL=2;BYDAY=TU"),
            RecurrenceType::EveryTwoWeeks
        );
        assert_eq!(
            classify_rule("RRULE:FREQ=WEEKLY;INTERVAL=3"),
            RecurrenceType::ThreeWeeksPlus
        );
        assert_eq!(
            classify_rule("RRULE:FREQ=MONTHLY;BYMONTHDAY=1"),
            RecurrenceType::ThreeWeeksPlus
        );
    }

    #[test]
    fn explicit_interval_one_is_weekly() {
        assert_eq!(
            classify_rule("RRULE:FREQ=WEEKLY;INTERVAL=1;BYDAY=WE"),
            RecurrenceType::Weekly
        );
    }

    #[test]
    fn interval_twenty_is_not_two() {
        assert_eq!(
            classify_rule("RRULE:FREQ=WEEKLY;INTERVAL=20"),
            RecurrenceType::ThreeWeeksPlus
        );
    }

    #[test]
    fn first_rrule_line_is_used() {
        let rules = vec![
            "EXDATE;TZID=UTC:20240115T100000".to_string(),
            "RRULE:FREQ=WEEKLY;INTERVAL=2".to_string(),
        ];
        assert_eq!(classify_rules(&rules), Some(RecurrenceType::EveryTwoWeeks));
        assert_eq!(classify_rules(&[]), None);
    }

    #[test]
    fn classifier_distinguishes_not_recurring() {
        let source = InMemoryEventSource::new()
            .with_recurrence("series-1", vec!["RRULE:FREQ=DAILY".to_string()]);
        let classifier = RecurrenceClassifier::new(&source);

        let single = Event::new("e1", "One-off");
        assert_eq!(classifier.classify(&single), None);

        let instance = Event::new("e2", "Standup").with_recurring_event_id("series-1");
        assert_eq!(classifier.classify(&instance), Some(RecurrenceType::Daily));

        let orphan = Event::new("e3", "Orphan").with_recurring_event_id("missing");
        assert_eq!(classifier.classify(&orphan), None);
    }
}
