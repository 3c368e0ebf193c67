use caldefrag_core::source::fetch_events;
use chrono::Duration;
use clap::Args;
use serde_json::json;

use super::scenario::{Loaded, ScenarioArgs};

#[derive(Args, Debug)]
pub struct WorkingHoursArgs {
    #[command(flatten)]
    pub scenario: ScenarioArgs,
    /// Whose working hours to estimate
    #[arg(long)]
    pub email: String,
    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

pub fn run(args: WorkingHoursArgs) -> Result<(), Box<dyn std::error::Error>> {
    let loaded = Loaded::open(&args.scenario)?;
    let source = loaded.scenario.source();
    let estimator = loaded.estimator()?;
    let now = loaded.scenario.now();

    let window = estimator.working_hours_for(&args.email, &source, now);
    let since = now - Duration::days(estimator.policy().lookback_days);
    let history = fetch_events(&source, since, now, &args.email)
        .map(|events| events.len())
        .unwrap_or(0);

    if args.json {
        let output = json!({
            "email": args.email,
            "window": window,
            "display": window.to_string(),
            "historyEvents": history,
        });
        println!("{}", serde_json::to_string_pretty(&output)?);
    } else {
        println!("{}: {window} ({history} events of history)", args.email);
    }
    Ok(())
}
