//! # Caldefrag Core Library
//!
//! This library provides the calendar defragmentation engine: it relocates
//! movable two-party meetings across a week so that focus time is less
//! fragmented, while respecting both participants' working hours and
//! calendars. It follows a CLI-first philosophy where everything is
//! available through the standalone `caldefrag` binary built on this crate.
//!
//! ## Architecture
//!
//! - **Inputs**: events, working hours and recurrence, assembled once per run
//!   from an [`EventSource`] and validated up front
//! - **Cost model**: scores a week with timing overrides applied
//! - **Candidates**: feasible alternate start times for one meeting
//! - **Solvers**: a deterministic greedy constructor and a simulated
//!   annealing search, both returning a [`Solution`]
//! - **Storage**: TOML configuration and a SQLite working-hours cache
//!
//! ## Key Components
//!
//! - [`Inputs`]: validated aggregate both solvers read from
//! - [`CostModel`]: weekly fragmentation cost
//! - [`CandidateGenerator`]: hard-constraint filter over half-hour slots
//! - [`GreedySolver`] / [`AnnealingSolver`]: the two optimizers
//! - [`WorkingHoursEstimator`]: typical working window from history
//! - [`Config`]: application configuration management

pub mod cache;
pub mod candidates;
pub mod config;
pub mod cost;
pub mod error;
pub mod event;
pub mod inputs;
pub mod recurrence;
pub mod solver;
pub mod source;
pub mod timing;
pub mod working_hours;

pub use cache::{MemoryCache, SqliteCache, WorkingHoursCache};
pub use candidates::{CandidateGenerator, FixedMoveRadius, MoveRadiusPolicy};
pub use config::Config;
pub use cost::{calculate_moving_meeting_penalty, CostModel, CostWeights, DayCost, WeekCost};
pub use error::{CacheError, ConfigError, CoreError, SourceError, ValidationError};
pub use event::{Attendee, Event, EventTime, EventType, ResponseStatus};
pub use inputs::{assemble_week, Inputs, InputsBuilder};
pub use recurrence::{RecurrenceClassifier, RecurrenceType};
pub use solver::{
    run_annealing, solve, AnnealingConfig, AnnealingSolver, GreedyReport, GreedySolver, Solution,
};
pub use source::{EventSource, InMemoryEventSource, RecurrenceRuleSource};
pub use timing::{project_timing, EventTiming, TimeSpan, TimingOverrides};
pub use working_hours::{WorkingHoursEstimator, WorkingHoursPolicy, WorkingHoursWindow};
