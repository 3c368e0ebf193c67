//! Simulated annealing over the full movable-event timing map.
//!
//! Which event to perturb and which of its candidates to try both come from
//! [`SeededSequence`], so the sequence of proposals is reproducible for a
//! given seed. The Metropolis acceptance draw comes from a separate RNG,
//! seeded from `acceptance_seed` when set and from entropy otherwise.

use std::collections::{BTreeSet, HashSet};

use rand::prelude::*;
use rand_pcg::Mcg128Xsl64;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::candidates::{CandidateGenerator, FixedMoveRadius, MoveRadiusPolicy};
use crate::cost::CostModel;
use crate::inputs::Inputs;
use crate::timing::{EventTiming, TimeSpan, TimingOverrides};

use super::solution::Solution;

/// Annealing schedule and seeds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnnealingConfig {
    #[serde(default = "default_max_steps")]
    pub max_steps: usize,
    #[serde(default = "default_initial_temp")]
    pub initial_temp: f64,
    /// Multiplier applied to the temperature at the start of every step.
    #[serde(default = "default_cooling_rate")]
    pub cooling_rate: f64,
    /// Seed of the proposal sequence.
    #[serde(default = "default_random_seed")]
    pub random_seed: i64,
    /// Seed of the acceptance draw (None = entropy).
    #[serde(default)]
    pub acceptance_seed: Option<u64>,
}

fn default_max_steps() -> usize {
    5000
}
fn default_initial_temp() -> f64 {
    2.24
}
fn default_cooling_rate() -> f64 {
    0.99
}
fn default_random_seed() -> i64 {
    1
}

impl Default for AnnealingConfig {
    fn default() -> Self {
        Self {
            max_steps: default_max_steps(),
            initial_temp: default_initial_temp(),
            cooling_rate: default_cooling_rate(),
            random_seed: default_random_seed(),
            acceptance_seed: None,
        }
    }
}

/// Reproducible index source: `floor(|sin(seed) * 10000|) mod n`, then `seed += 1`.
#[derive(Debug, Clone)]
pub struct SeededSequence {
    seed: i64,
}

impl SeededSequence {
    pub fn new(seed: i64) -> Self {
        Self { seed }
    }

    /// Next index below `len`; `None` (without advancing) when `len` is zero.
    pub fn next_index(&mut self, len: usize) -> Option<usize> {
        if len == 0 {
            return None;
        }
        let value = ((self.seed as f64).sin() * 10000.0).abs().floor() as usize;
        self.seed = self.seed.wrapping_add(1);
        Some(value % len)
    }
}

/// Outcome of one annealing run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnnealingReport {
    /// Best timing of every movable event, moved or not.
    pub timings: TimingOverrides,
    pub initial_cost: f64,
    pub best_cost: f64,
    pub steps: usize,
    /// Steps that produced a candidate to evaluate.
    pub proposals: usize,
    pub accepted: usize,
}

pub struct AnnealingSolver<'a> {
    config: AnnealingConfig,
    cost_model: CostModel,
    radius: &'a dyn MoveRadiusPolicy,
}

impl Default for AnnealingSolver<'_> {
    fn default() -> Self {
        Self::new()
    }
}

impl<'a> AnnealingSolver<'a> {
    pub fn new() -> Self {
        Self::with_config(AnnealingConfig::default())
    }

    pub fn with_config(config: AnnealingConfig) -> Self {
        Self {
            config,
            cost_model: CostModel::new(),
            radius: &FixedMoveRadius,
        }
    }

    pub fn with_cost_model(mut self, cost_model: CostModel) -> Self {
        self.cost_model = cost_model;
        self
    }

    pub fn with_radius(mut self, radius: &'a dyn MoveRadiusPolicy) -> Self {
        self.radius = radius;
        self
    }

    pub fn config(&self) -> &AnnealingConfig {
        &self.config
    }

    /// Anneal using the configured acceptance RNG.
    pub fn run(&self, inputs: &Inputs) -> AnnealingReport {
        let mut rng = match self.config.acceptance_seed {
            Some(seed) => Mcg128Xsl64::seed_from_u64(seed),
            None => Mcg128Xsl64::from_entropy(),
        };
        self.run_with_rng(inputs, &mut rng)
    }

    /// Anneal drawing Metropolis acceptance values from `rng`.
    pub fn run_with_rng<R: Rng + ?Sized>(&self, inputs: &Inputs, rng: &mut R) -> AnnealingReport {
        let generator = CandidateGenerator::with_radius(inputs, self.radius);
        let working_hours = inputs.my_working_hours();
        let moveable: Vec<&str> = inputs.moveable_events().iter().map(String::as_str).collect();

        let mut current = inputs.timings().clone();
        for id in &moveable {
            if let Some(original) = inputs.original_timing(id) {
                current.entry((*id).to_string()).or_insert(original);
            }
        }

        let cost_of = |timings: &TimingOverrides| {
            self.cost_model
                .calculate_cost(inputs.my_events(), timings, working_hours)
        };
        let initial_cost = cost_of(&current);
        let mut current_cost = initial_cost;
        let mut best = current.clone();
        let mut best_cost = initial_cost;

        let mut sequence = SeededSequence::new(self.config.random_seed);
        let mut temperature = self.config.initial_temp;
        let mut proposals = 0;
        let mut accepted = 0;
        let no_ignored = HashSet::new();

        if !moveable.is_empty() {
            for step in 0..self.config.max_steps {
                temperature *= self.config.cooling_rate;

                let Some(pick) = sequence.next_index(moveable.len()) else {
                    break;
                };
                let id = moveable[pick];
                let candidates = generator.candidates(id, &current, &no_ignored);
                let Some(choice) = sequence.next_index(candidates.len()) else {
                    continue;
                };
                let Some(duration) = inputs
                    .my_event(id)
                    .and_then(|e| e.wall_clock_span())
                    .map(|span| span.duration())
                else {
                    continue;
                };
                proposals += 1;

                let timing = EventTiming::from_span(&TimeSpan::starting_at(candidates[choice], duration));
                let previous = current.insert(id.to_string(), timing);
                let cost = cost_of(&current);
                let delta = cost - current_cost;

                if delta < 0.0 || rng.gen::<f64>() < (-delta / temperature).exp() {
                    accepted += 1;
                    current_cost = cost;
                    if cost < best_cost {
                        best_cost = cost;
                        best = current.clone();
                        debug!(step, event_id = id, cost, temperature, "annealing_new_best");
                    }
                } else {
                    match previous {
                        Some(previous) => current.insert(id.to_string(), previous),
                        None => current.remove(id),
                    };
                }
            }
        }

        let timings: TimingOverrides = best
            .into_iter()
            .filter(|(id, _)| inputs.is_moveable(id))
            .collect();

        info!(
            steps = self.config.max_steps,
            proposals,
            accepted,
            initial_cost,
            best_cost,
            "annealing_complete"
        );

        AnnealingReport {
            timings,
            initial_cost,
            best_cost,
            steps: self.config.max_steps,
            proposals,
            accepted,
        }
    }

    /// Anneal and keep only the events that moved.
    pub fn solve(&self, inputs: &Inputs) -> Solution {
        let report = self.run(inputs);
        Solution::from_timings(inputs, &report.timings, BTreeSet::new())
    }
}

/// Run annealing with `config` and the default cost model, returning the
/// best timing map found (one entry per movable event).
pub fn run_annealing(inputs: &Inputs, config: AnnealingConfig) -> TimingOverrides {
    AnnealingSolver::with_config(config).run(inputs).timings
}
