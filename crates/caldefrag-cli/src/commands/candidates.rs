use std::collections::HashSet;

use caldefrag_core::{CandidateGenerator, TimeSpan};
use clap::Args;

use super::scenario::{describe, Loaded, ScenarioArgs};

#[derive(Args, Debug)]
pub struct CandidatesArgs {
    #[command(flatten)]
    pub scenario: ScenarioArgs,
    /// Id of the movable event
    #[arg(long)]
    pub event: String,
    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

pub fn run(args: CandidatesArgs) -> Result<(), Box<dyn std::error::Error>> {
    let loaded = Loaded::open(&args.scenario)?;
    let inputs = loaded.inputs()?;

    let event = inputs
        .my_event(&args.event)
        .ok_or_else(|| format!("event not found: {}", args.event))?;
    if !inputs.is_moveable(&args.event) {
        return Err(format!("event is not movable: {}", args.event).into());
    }
    let duration = event
        .wall_clock_span()
        .map(|span| span.duration())
        .ok_or_else(|| format!("event has no concrete times: {}", args.event))?;

    let starts = CandidateGenerator::new(&inputs).candidates(&args.event, inputs.timings(), &HashSet::new());
    let spans: Vec<TimeSpan> = starts
        .into_iter()
        .map(|start| TimeSpan::starting_at(start, duration))
        .collect();

    if args.json {
        println!("{}", serde_json::to_string_pretty(&spans)?);
        return Ok(());
    }

    println!("{} candidate(s) for {}:", spans.len(), args.event);
    for span in &spans {
        println!("  {}", describe(span));
    }
    Ok(())
}
