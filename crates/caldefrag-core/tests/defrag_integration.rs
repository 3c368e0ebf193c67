//! Integration tests for the defragmentation pipeline.
//!
//! Covers assembling a week from an event source, solving it with both
//! solvers and materializing the result, plus property tests over random
//! schedules.

use std::collections::HashSet;

use caldefrag_core::cache::{cache_key, MemoryCache, WorkingHoursCache};
use caldefrag_core::timing::effective_span_in;
use caldefrag_core::{
    assemble_week, solve, AnnealingConfig, AnnealingSolver, CandidateGenerator, CostModel, Event,
    EventType, GreedySolver, InMemoryEventSource, Inputs, RecurrenceType, ResponseStatus, TimeSpan,
    TimingOverrides, WorkingHoursEstimator, WorkingHoursPolicy, WorkingHoursWindow,
};
use chrono::{DateTime, Duration, FixedOffset, NaiveDate, TimeZone, Utc};
use proptest::prelude::*;

const ME: &str = "me@acme.com";
const ANN: &str = "ann@acme.com";
const BOB: &str = "bob@acme.com";

fn at(day: u32, hour: u32, minute: u32) -> DateTime<FixedOffset> {
    at_offset(-5, day, hour, minute)
}

fn at_offset(utc_hours: i32, day: u32, hour: u32, minute: u32) -> DateTime<FixedOffset> {
    FixedOffset::east_opt(utc_hours * 3600)
        .unwrap()
        .with_ymd_and_hms(2024, 1, day, hour, minute, 0)
        .unwrap()
}

fn one_on_one(id: &str, with: &str, day: u32, hour: u32, minutes: i64) -> Event {
    let start = at(day, hour, 0);
    Event::new(id, format!("1:1 with {with}"))
        .with_times(start, start + Duration::minutes(minutes))
        .with_self_attendee(ME, ResponseStatus::Accepted)
        .with_attendee(with, ResponseStatus::Accepted)
}

fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 13, 12, 0, 0).unwrap()
}

/// Week of Monday 2024-01-15 for me, ann and bob.
fn source() -> InMemoryEventSource {
    let ann_weekly = one_on_one("ann-1", ANN, 15, 10, 60).with_recurring_event_id("series-ann");
    let bob_sync = one_on_one("bob-1", BOB, 16, 14, 30);
    let standup = Event::new("standup", "Team standup")
        .with_times(at(15, 9, 0), at(15, 9, 30))
        .with_self_attendee(ME, ResponseStatus::Accepted)
        .with_attendee(ANN, ResponseStatus::Accepted)
        .with_attendee(BOB, ResponseStatus::Accepted);
    let declined = Event::new("declined", "Vendor pitch")
        .with_times(at(17, 11, 0), at(17, 12, 0))
        .with_self_attendee(ME, ResponseStatus::Declined)
        .with_attendee("vendor@acme.com", ResponseStatus::Accepted);
    let ann_busy = Event::new("ann-busy", "Planning")
        .with_times(at(15, 13, 0), at(15, 15, 0))
        .with_self_attendee(ANN, ResponseStatus::Accepted)
        .with_attendee("cat@acme.com", ResponseStatus::Accepted);
    let bob_ooo = Event::new("bob-ooo", "Out of office")
        .with_type(EventType::OutOfOffice)
        .with_all_day(
            NaiveDate::from_ymd_opt(2024, 1, 17).unwrap(),
            NaiveDate::from_ymd_opt(2024, 1, 17).unwrap(),
        );

    InMemoryEventSource::new()
        .with_calendar(
            ME,
            vec![
                ann_weekly.clone(),
                bob_sync.clone(),
                standup.clone(),
                declined,
            ],
        )
        .with_calendar(ANN, vec![ann_weekly, standup.clone(), ann_busy])
        .with_calendar(BOB, vec![bob_sync, standup, bob_ooo])
        .with_recurrence("series-ann", vec!["RRULE:FREQ=WEEKLY;INTERVAL=2;BYDAY=MO".to_string()])
}

fn assembled() -> Inputs {
    let source = source();
    let cache = MemoryCache::default();
    cache.put(&cache_key(ME), WorkingHoursWindow::from_hours(9, 17), now()).unwrap();
    cache.put(&cache_key(ANN), WorkingHoursWindow::from_hours(9, 16), now()).unwrap();
    cache.put(&cache_key(BOB), WorkingHoursWindow::from_hours(10, 18), now()).unwrap();
    let estimator = WorkingHoursEstimator::new(WorkingHoursPolicy::default()).with_cache(&cache);

    assemble_week(
        &source,
        &source,
        &estimator,
        ME,
        NaiveDate::from_ymd_opt(2024, 1, 17).unwrap(),
        now(),
    )
    .unwrap()
}

#[test]
fn assemble_week_selects_one_on_ones() {
    let inputs = assembled();
    let moveable: Vec<_> = inputs.moveable_events().iter().cloned().collect();
    assert_eq!(moveable, vec!["ann-1", "bob-1"]);
    assert_eq!(inputs.my_events().len(), 4);
    assert_eq!(inputs.their_working_hours(BOB), WorkingHoursWindow::from_hours(10, 18));
    assert_eq!(inputs.their_events(ANN).len(), 3);
    assert_eq!(inputs.recurrence("ann-1"), Some(RecurrenceType::EveryTwoWeeks));
    assert_eq!(inputs.recurrence("bob-1"), None);
}

#[test]
fn candidates_respect_both_calendars() {
    let inputs = assembled();
    let generator = CandidateGenerator::new(&inputs);
    let found = generator.candidates("bob-1", &TimingOverrides::new(), &HashSet::new());

    assert!(!found.is_empty());
    let wednesday = NaiveDate::from_ymd_opt(2024, 1, 17).unwrap();
    assert!(found.iter().all(|c| c.date() != wednesday), "bob is out on Wednesday");
    // bob starts at 10:00, so nothing earlier survives
    assert!(found.iter().all(|c| c.time() >= chrono::NaiveTime::from_hms_opt(10, 0, 0).unwrap()));
}

#[test]
fn greedy_solution_materializes_in_original_offset() {
    let inputs = assembled();
    let solution = solve(&inputs);
    assert!(solution.unplaceable_event_ids.is_empty());

    let moved = solution.apply(inputs.my_events());
    assert_eq!(moved.len(), solution.timings.len());
    for event in &moved {
        let start = event.start.and_then(|s| s.date_time()).unwrap();
        assert_eq!(start.offset().local_minus_utc(), -5 * 3600);
        assert!(inputs.is_moveable(&event.id));
    }

    let model = CostModel::new();
    let wh = inputs.my_working_hours();
    let before = model.calculate_cost(inputs.my_events(), &TimingOverrides::new(), wh);
    let after = model.calculate_cost(inputs.my_events(), &solution.overrides(), wh);
    assert!(after.is_finite() && before.is_finite());

    for change in solution.changes(&inputs) {
        assert_ne!(change.from, change.to);
    }
}

#[test]
fn annealing_is_reproducible_and_never_worse() {
    let inputs = assembled();
    let config = AnnealingConfig {
        max_steps: 400,
        acceptance_seed: Some(3),
        ..Default::default()
    };
    let first = AnnealingSolver::with_config(config.clone()).run(&inputs);
    let second = AnnealingSolver::with_config(config).run(&inputs);
    assert_eq!(first, second);
    assert!(first.best_cost <= first.initial_cost);
}

#[test]
fn assemble_week_reads_the_week_on_the_owner_clock() {
    // Friday 19:30 Eastern is Saturday 00:30 UTC; Sunday 20:00 Eastern is Monday 01:00 UTC.
    let late_friday = Event::new("late", "1:1 with ann")
        .with_times(at(19, 19, 30), at(19, 20, 0))
        .with_self_attendee(ME, ResponseStatus::Accepted)
        .with_attendee(ANN, ResponseStatus::Accepted);
    let sunday_evening = Event::new("sunday", "1:1 with ann")
        .with_times(at(14, 20, 0), at(14, 20, 30))
        .with_self_attendee(ME, ResponseStatus::Accepted)
        .with_attendee(ANN, ResponseStatus::Accepted);
    let source = InMemoryEventSource::new()
        .with_calendar(ME, vec![sunday_evening, late_friday])
        .with_calendar(ANN, Vec::new());
    let estimator = WorkingHoursEstimator::new(WorkingHoursPolicy::default());

    let inputs = assemble_week(
        &source,
        &source,
        &estimator,
        ME,
        NaiveDate::from_ymd_opt(2024, 1, 15).unwrap(),
        now(),
    )
    .unwrap();
    let ids: Vec<&str> = inputs.my_events().iter().map(|e| e.id.as_str()).collect();
    assert_eq!(ids, vec!["late"]);
    assert!(inputs.is_moveable("late"));
}

#[test]
fn idle_week_is_pure_focus_credit() {
    let model = CostModel::new();
    let empty: Vec<Event> = Vec::new();
    let breakdown = model.breakdown(&empty, &TimingOverrides::new(), WorkingHoursWindow::from_hours(9, 17));
    assert_eq!(breakdown.days.len(), 1);
    assert_eq!(breakdown.days[0].focus_time_one_hour_plus, 8.0);
    assert_eq!(breakdown.days[0].meeting_hours, 0.0);
    assert_eq!(breakdown.total, -4.0);
}

// Random schedules for the property tests: Monday 2024-01-15 .. Friday 19th.
// Each counterpart keeps their calendar in a different UTC offset.

const PEOPLE: [&str; 3] = [ANN, BOB, "cat@acme.com"];
const PEOPLE_OFFSETS: [i32; 3] = [-5, -8, 1];

fn meeting_strategy() -> impl Strategy<Value = (u32, u32, bool, usize)> {
    (0u32..5, 9u32..16, any::<bool>(), 0usize..PEOPLE.len())
}

fn busy_strategy() -> impl Strategy<Value = (u32, u32, usize)> {
    (0u32..5, 8u32..18, 0usize..PEOPLE.len())
}

fn random_inputs(meetings: &[(u32, u32, bool, usize)], busy: &[(u32, u32, usize)], my_start: u32) -> Inputs {
    let my_events: Vec<Event> = meetings
        .iter()
        .enumerate()
        .map(|(i, &(day, hour, long, who))| {
            one_on_one(&format!("m{i}"), PEOPLE[who], 15 + day, hour, if long { 60 } else { 30 })
        })
        .collect();

    let mut builder = Inputs::builder(ME, WorkingHoursWindow::from_hours(my_start, 17))
        .moveable_all(my_events.iter().map(|e| e.id.clone()));
    for (p, person) in PEOPLE.iter().enumerate() {
        let events: Vec<Event> = busy
            .iter()
            .enumerate()
            .filter(|(_, b)| b.2 == p)
            .map(|(i, &(day, hour, _))| {
                Event::new(format!("busy{i}"), "Busy")
                    .with_times(
                        at_offset(PEOPLE_OFFSETS[p], 15 + day, hour, 0),
                        at_offset(PEOPLE_OFFSETS[p], 15 + day, hour + 1, 0),
                    )
                    .with_self_attendee(*person, ResponseStatus::Accepted)
                    .with_attendee("zed@acme.com", ResponseStatus::Accepted)
            })
            .collect();
        builder = builder.their_calendar(*person, events, WorkingHoursWindow::from_hours(8 + p as u32, 17));
    }
    builder.my_events(my_events).build().unwrap()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(48))]

    #[test]
    fn candidates_are_feasible(
        meetings in prop::collection::vec(meeting_strategy(), 1..6),
        busy in prop::collection::vec(busy_strategy(), 0..8),
        my_start in 8u32..11,
    ) {
        let inputs = random_inputs(&meetings, &busy, my_start);
        let generator = CandidateGenerator::new(&inputs);
        let overrides = TimingOverrides::new();

        for id in inputs.moveable_events() {
            let event = inputs.my_event(id).unwrap();
            let clock = event.offset().unwrap();
            let duration = event.wall_clock_span().unwrap().duration();
            let counterpart = event.counterpart(ME).unwrap();
            let their_hours = inputs.their_working_hours(counterpart);

            for start in generator.candidates(id, &overrides, &HashSet::new()) {
                let slot = TimeSpan::starting_at(start, duration);
                prop_assert!(inputs.my_working_hours().contains(&slot));
                prop_assert!(their_hours.contains(&slot));
                for other in inputs.my_events().iter().chain(inputs.their_events(counterpart)) {
                    if other.id == *id {
                        continue;
                    }
                    if let Some(span) = effective_span_in(other, &overrides, clock) {
                        prop_assert!(!span.overlaps(&slot), "{} overlaps {}", id, other.id);
                    }
                }
            }
        }
    }

    #[test]
    fn greedy_accounts_for_every_moveable_event(
        meetings in prop::collection::vec(meeting_strategy(), 0..7),
        busy in prop::collection::vec(busy_strategy(), 0..10),
        my_start in 8u32..11,
    ) {
        let inputs = random_inputs(&meetings, &busy, my_start);
        let report = GreedySolver::new().run(&inputs);
        prop_assert_eq!(report.accounted(), inputs.moveable_events().len());
        for id in &report.placement_order {
            prop_assert!(!report.unplaceable_event_ids.contains(id));
        }

        let solution = solve(&inputs);
        prop_assert_eq!(&solution.unplaceable_event_ids, &report.unplaceable_event_ids);
        for id in solution.timings.keys() {
            prop_assert!(inputs.is_moveable(id));
            prop_assert!(!solution.unplaceable_event_ids.contains(id));
        }
        for id in &solution.unplaceable_event_ids {
            prop_assert!(inputs.is_moveable(id));
        }
    }

    #[test]
    fn annealing_never_worse_than_identity(
        meetings in prop::collection::vec(meeting_strategy(), 1..6),
        busy in prop::collection::vec(busy_strategy(), 0..6),
        seed in -50i64..50,
    ) {
        let inputs = random_inputs(&meetings, &busy, 9);
        let config = AnnealingConfig {
            max_steps: 60,
            random_seed: seed,
            acceptance_seed: Some(11),
            ..Default::default()
        };
        let report = AnnealingSolver::with_config(config).run(&inputs);
        prop_assert!(report.best_cost <= report.initial_cost);
        prop_assert_eq!(report.timings.len(), inputs.moveable_events().len());
    }
}
