use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod commands;

#[derive(Parser)]
#[command(name = "caldefrag", version, about = "Calendar defragmentation CLI")]
struct Cli {
    /// Log solver progress to stderr (overridden by RUST_LOG)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Relocate movable meetings in a scenario
    Solve(commands::solve::SolveArgs),
    /// Score a scenario's week as it stands
    Cost(commands::cost::CostArgs),
    /// List feasible start times for one movable meeting
    Candidates(commands::candidates::CandidatesArgs),
    /// Estimate a person's working hours from their calendar
    WorkingHours(commands::working_hours::WorkingHoursArgs),
    /// Configuration management
    Config {
        #[command(subcommand)]
        action: commands::config::ConfigAction,
    },
}

fn init_tracing(verbose: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(if verbose { "debug" } else { "warn" }));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let result = match cli.command {
        Commands::Solve(args) => commands::solve::run(args),
        Commands::Cost(args) => commands::cost::run(args),
        Commands::Candidates(args) => commands::candidates::run(args),
        Commands::WorkingHours(args) => commands::working_hours::run(args),
        Commands::Config { action } => commands::config::run(action),
    };

    if let Err(e) = result {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}
