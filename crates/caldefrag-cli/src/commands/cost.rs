use caldefrag_core::CostModel;
use clap::Args;

use super::scenario::{Loaded, ScenarioArgs};

#[derive(Args, Debug)]
pub struct CostArgs {
    #[command(flatten)]
    pub scenario: ScenarioArgs,
    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

pub fn run(args: CostArgs) -> Result<(), Box<dyn std::error::Error>> {
    let loaded = Loaded::open(&args.scenario)?;
    let inputs = loaded.inputs()?;
    let breakdown = CostModel::with_weights(loaded.config.cost.clone()).breakdown(
        inputs.my_events(),
        inputs.timings(),
        inputs.my_working_hours(),
    );

    if args.json {
        println!("{}", serde_json::to_string_pretty(&breakdown)?);
        return Ok(());
    }

    println!("Working hours: {}", inputs.my_working_hours());
    println!("{:<12} {:>8} {:>8} {:>8} {:>8}", "day", "meet", "stretch", "focus1h", "focus2h");
    for day in &breakdown.days {
        let label = day
            .date
            .map(|d| d.format("%a %m-%d").to_string())
            .unwrap_or_else(|| "(idle)".to_string());
        println!(
            "{:<12} {:>8.2} {:>8.2} {:>8.2} {:>8.2}",
            label,
            day.meeting_hours,
            day.longest_meeting_stretch_hours,
            day.focus_time_one_hour_plus,
            day.focus_time_two_hours_plus
        );
    }
    println!("stretch penalty:    {:.3}", breakdown.stretch_penalty);
    println!("focus credit:       {:.3}", breakdown.focus_credit);
    println!("imbalance penalty:  {:.3}", breakdown.imbalance_penalty);
    if breakdown.relocation_penalty > 0.0 {
        println!("relocation penalty: {:.3}", breakdown.relocation_penalty);
    }
    println!("total:              {:.3}", breakdown.total);
    Ok(())
}
