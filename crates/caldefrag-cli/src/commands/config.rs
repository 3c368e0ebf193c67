use caldefrag_core::{Config, ConfigError};
use clap::{Subcommand, ValueEnum};

/// Top-level tables of the config file.
#[derive(Clone, Copy, Debug, ValueEnum)]
pub enum Section {
    Annealing,
    Cost,
    WorkingHours,
}

impl Section {
    fn render(self, config: &Config) -> Result<String, toml::ser::Error> {
        let (name, body) = match self {
            Section::Annealing => ("annealing", toml::to_string_pretty(&config.annealing)?),
            Section::Cost => ("cost", toml::to_string_pretty(&config.cost)?),
            Section::WorkingHours => ("working_hours", toml::to_string_pretty(&config.working_hours)?),
        };
        Ok(format!("[{name}]\n{body}"))
    }
}

#[derive(Subcommand)]
pub enum ConfigAction {
    /// Print one value (e.g. "annealing.max_steps", "cost.lunch_keyword")
    Get { key: String },
    /// Change one value; the result is validated before it is saved
    Set { key: String, value: String },
    /// Print the config as TOML
    List {
        /// Only print one table
        #[arg(long, value_enum)]
        section: Option<Section>,
    },
    /// Print where the config file lives
    Path,
    /// Restore the defaults
    Reset,
}

pub fn run(action: ConfigAction) -> Result<(), Box<dyn std::error::Error>> {
    match action {
        ConfigAction::Get { key } => {
            let config = Config::load()?;
            let value = config.get(&key).ok_or(ConfigError::UnknownKey(key))?;
            println!("{value}");
        }
        ConfigAction::Set { key, value } => {
            let mut config = Config::load()?;
            config.set(&key, &value)?;
            println!("ok");
        }
        ConfigAction::List { section } => {
            let config = Config::load()?;
            match section {
                Some(section) => print!("{}", section.render(&config)?),
                None => print!("{}", toml::to_string_pretty(&config)?),
            }
        }
        ConfigAction::Path => println!("{}", Config::path()?.display()),
        ConfigAction::Reset => {
            Config::reset()?;
            println!("config reset to defaults at {}", Config::path()?.display());
        }
    }
    Ok(())
}
