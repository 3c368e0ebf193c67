use caldefrag_core::solver::{AnnealingSolver, GreedySolver, Solution};
use caldefrag_core::CostModel;
use clap::{Args, ValueEnum};
use serde_json::json;

use super::scenario::{describe, Loaded, ScenarioArgs};

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum SolverKind {
    Greedy,
    Anneal,
}

#[derive(Args, Debug)]
pub struct SolveArgs {
    #[command(flatten)]
    pub scenario: ScenarioArgs,
    /// Which solver to run
    #[arg(long, value_enum, default_value = "greedy")]
    pub solver: SolverKind,
    /// Annealing steps (defaults to annealing.max_steps)
    #[arg(long)]
    pub steps: Option<usize>,
    /// Proposal sequence seed (defaults to annealing.random_seed)
    #[arg(long, allow_negative_numbers = true)]
    pub seed: Option<i64>,
    /// Seed for the acceptance draw (defaults to annealing.acceptance_seed)
    #[arg(long)]
    pub acceptance_seed: Option<u64>,
    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

pub fn run(args: SolveArgs) -> Result<(), Box<dyn std::error::Error>> {
    let loaded = Loaded::open(&args.scenario)?;
    let inputs = loaded.inputs()?;
    let cost_model = CostModel::with_weights(loaded.config.cost.clone());

    let solution: Solution = match args.solver {
        SolverKind::Greedy => GreedySolver::new()
            .with_cost_model(cost_model.clone())
            .solve(&inputs),
        SolverKind::Anneal => {
            let mut config = loaded.config.annealing.clone();
            if let Some(steps) = args.steps {
                config.max_steps = steps;
            }
            if let Some(seed) = args.seed {
                config.random_seed = seed;
            }
            if args.acceptance_seed.is_some() {
                config.acceptance_seed = args.acceptance_seed;
            }
            AnnealingSolver::with_config(config)
                .with_cost_model(cost_model.clone())
                .solve(&inputs)
        }
    };

    let working_hours = inputs.my_working_hours();
    let before = cost_model.calculate_cost(inputs.my_events(), inputs.timings(), working_hours);
    let mut after_overrides = inputs.timings().clone();
    after_overrides.extend(solution.overrides());
    let after = cost_model.calculate_cost(inputs.my_events(), &after_overrides, working_hours);
    let changes = solution.changes(&inputs);

    if args.json {
        let output = json!({
            "solver": match args.solver {
                SolverKind::Greedy => "greedy",
                SolverKind::Anneal => "anneal",
            },
            "initialCost": before,
            "finalCost": after,
            "timings": solution.timings,
            "unplaceableEventIds": solution.unplaceable_event_ids,
            "changes": changes,
            "events": solution.apply(inputs.my_events()),
        });
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(());
    }

    println!("Working hours: {working_hours}");
    println!("Cost: {before:.3} -> {after:.3}");
    if changes.is_empty() {
        println!("No meetings moved.");
    } else {
        println!("Moved {} meeting(s):", changes.len());
        for change in &changes {
            println!(
                "  {}  {}  {} -> {}",
                change.event_id,
                change.summary,
                describe(&change.from),
                describe(&change.to)
            );
        }
    }
    if !solution.unplaceable_event_ids.is_empty() {
        println!("Unplaceable:");
        for id in &solution.unplaceable_event_ids {
            println!("  {id}");
        }
    }
    Ok(())
}
