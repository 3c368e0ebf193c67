//! Solvers that relocate movable meetings to reduce fragmentation.
//!
//! - [`greedy`]: deterministic, most-constrained-first construction
//! - [`annealing`]: simulated annealing seeded with the current placement
//!
//! Both return a [`Solution`]; infeasibility is reported through
//! `unplaceable_event_ids` rather than as an error.

pub mod annealing;
pub mod greedy;
pub mod solution;

pub use annealing::{run_annealing, AnnealingConfig, AnnealingReport, AnnealingSolver, SeededSequence};
pub use greedy::{solve, GreedyReport, GreedySolver};
pub use solution::{Change, Solution};
