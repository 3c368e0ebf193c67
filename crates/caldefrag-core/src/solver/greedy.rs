//! Constructive solver: most-constrained event first, cheapest slot next.

use std::collections::{BTreeSet, HashSet};

use indexmap::IndexSet;
use tracing::{debug, info};

use crate::candidates::{CandidateGenerator, FixedMoveRadius, MoveRadiusPolicy};
use crate::cost::CostModel;
use crate::event::Event;
use crate::inputs::Inputs;
use crate::timing::{EventTiming, TimeSpan, TimingOverrides};

use super::solution::Solution;

/// Outcome of a greedy run before it is reduced to a [`Solution`].
#[derive(Debug, Clone, PartialEq)]
pub struct GreedyReport {
    /// Timing of every placed event, including those left where they were.
    pub timings: TimingOverrides,
    /// Placed event ids in the order they were finalized.
    pub placement_order: Vec<String>,
    pub unplaceable_event_ids: BTreeSet<String>,
}

impl GreedyReport {
    /// Events that were placed or given up on.
    pub fn accounted(&self) -> usize {
        self.placement_order.len() + self.unplaceable_event_ids.len()
    }
}

/// Places movable events one at a time.
///
/// Each round generates candidates for every pending event against the
/// fixed and already-placed events, picks the event with the fewest
/// candidates (calendar order breaks ties) and moves it to the candidate
/// with the lowest marginal cost. Events with no candidates are recorded
/// as unplaceable and stay where they are.
pub struct GreedySolver<'a> {
    cost_model: CostModel,
    radius: &'a dyn MoveRadiusPolicy,
}

impl Default for GreedySolver<'_> {
    fn default() -> Self {
        Self::new()
    }
}

impl<'a> GreedySolver<'a> {
    pub fn new() -> Self {
        Self {
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

    pub fn run(&self, inputs: &Inputs) -> GreedyReport {
        let generator = CandidateGenerator::with_radius(inputs, self.radius);
        let working_hours = inputs.my_working_hours();

        let mut timings = inputs.timings().clone();
        let mut pending: IndexSet<String> = inputs.moveable_events().clone();
        let mut finalized: Vec<&Event> = Vec::new();
        let mut placement_order: Vec<String> = Vec::new();
        let mut unplaceable: BTreeSet<String> = BTreeSet::new();

        while !pending.is_empty() {
            // Pending events have no slot yet, so they never block anyone.
            let ignored: HashSet<String> = pending.iter().cloned().collect();

            let mut selected: Option<(usize, Vec<_>)> = None;
            for (index, id) in pending.iter().enumerate() {
                let candidates = generator.candidates(id, &timings, &ignored);
                let fewer = selected
                    .as_ref()
                    .map_or(true, |(_, best)| candidates.len() < best.len());
                if fewer {
                    selected = Some((index, candidates));
                }
            }
            let Some((index, candidates)) = selected else {
                break;
            };
            let Some(id) = pending.shift_remove_index(index) else {
                break;
            };

            let Some((event, span)) = inputs
                .my_event(&id)
                .and_then(|e| e.wall_clock_span().map(|span| (e, span)))
            else {
                unplaceable.insert(id);
                continue;
            };
            if candidates.is_empty() {
                debug!(event_id = %id, "event_unplaceable");
                unplaceable.insert(id);
                continue;
            }

            let mut best: Option<(f64, EventTiming)> = None;
            for start in &candidates {
                let timing = EventTiming::from_span(&TimeSpan::starting_at(*start, span.duration()));
                timings.insert(id.clone(), timing);
                let cost = self.cost_model.calculate_cost(
                    finalized.iter().copied().chain(std::iter::once(event)),
                    &timings,
                    working_hours,
                );
                if best.map_or(true, |(lowest, _)| cost < lowest) {
                    best = Some((cost, timing));
                }
            }

            if let Some((cost, timing)) = best {
                debug!(
                    event_id = %id,
                    candidates = candidates.len(),
                    cost,
                    day_of_week = timing.day_of_week,
                    start_seconds = timing.start_time_of_day_seconds,
                    "event_placed"
                );
                timings.insert(id.clone(), timing);
                placement_order.push(id);
                finalized.push(event);
            }
        }

        timings.retain(|id, _| placement_order.contains(id));
        GreedyReport {
            timings,
            placement_order,
            unplaceable_event_ids: unplaceable,
        }
    }

    pub fn solve(&self, inputs: &Inputs) -> Solution {
        let report = self.run(inputs);
        let solution = Solution::from_timings(inputs, &report.timings, report.unplaceable_event_ids);
        info!(
            moveable = inputs.moveable_events().len(),
            placed = report.placement_order.len(),
            moved = solution.timings.len(),
            unplaceable = solution.unplaceable_event_ids.len(),
            "greedy_solve_complete"
        );
        solution
    }
}

/// Run the greedy solver with the default cost model and move radius.
pub fn solve(inputs: &Inputs) -> Solution {
    GreedySolver::new().solve(inputs)
}
