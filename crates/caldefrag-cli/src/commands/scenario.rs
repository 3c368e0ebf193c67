//! JSON scenario files: calendars plus the week to optimize.

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};

use caldefrag_core::cache::{cache_key, SqliteCache};
use caldefrag_core::inputs::week_monday;
use caldefrag_core::{
    assemble_week, CacheError, Config, Event, InMemoryEventSource, Inputs, WorkingHoursCache,
    WorkingHoursEstimator, WorkingHoursWindow,
};
use chrono::{DateTime, Duration, NaiveDate, NaiveTime, Utc};
use clap::Args;
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Options shared by every command that reads a scenario.
#[derive(Args, Debug, Clone)]
pub struct ScenarioArgs {
    /// Scenario JSON file
    #[arg(long, short)]
    pub scenario: PathBuf,
    /// Persist working-hours estimates in the local cache database
    #[arg(long)]
    pub cache: bool,
}

/// Explicit `HH:MM` working hours for one person.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HoursSpec {
    pub start: String,
    pub end: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Scenario {
    pub my_email: String,
    /// Any date in the week to optimize.
    pub week_start: NaiveDate,
    /// Events per calendar id (an email address).
    #[serde(default)]
    pub calendars: BTreeMap<String, Vec<Event>>,
    #[serde(default)]
    pub recurrence_rules: BTreeMap<String, Vec<String>>,
    /// Known windows that skip estimation.
    #[serde(default)]
    pub working_hours: BTreeMap<String, HoursSpec>,
    /// Clock used for history lookback and cache expiry; defaults to the
    /// Monday after the week.
    #[serde(default)]
    pub now: Option<DateTime<Utc>>,
}

impl Scenario {
    pub fn load(path: &Path) -> Result<Self, Box<dyn std::error::Error>> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| format!("cannot read scenario {}: {e}", path.display()))?;
        let scenario: Scenario = serde_json::from_str(&content)
            .map_err(|e| format!("invalid scenario {}: {e}", path.display()))?;
        Ok(scenario)
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.now.unwrap_or_else(|| {
            (week_monday(self.week_start) + Duration::days(7))
                .and_time(NaiveTime::MIN)
                .and_utc()
        })
    }

    pub fn source(&self) -> InMemoryEventSource {
        let mut source = InMemoryEventSource::new();
        for (calendar, events) in &self.calendars {
            source = source.with_calendar(calendar.clone(), events.clone());
        }
        for (series, rules) in &self.recurrence_rules {
            source = source.with_recurrence(series.clone(), rules.clone());
        }
        source
    }

    fn pinned(&self) -> Result<HashMap<String, WorkingHoursWindow>, Box<dyn std::error::Error>> {
        self.working_hours
            .iter()
            .map(|(email, spec)| -> Result<_, Box<dyn std::error::Error>> {
                let window = WorkingHoursWindow::parse(&spec.start, &spec.end).ok_or_else(|| {
                    format!("invalid working hours for {email}: {}-{}", spec.start, spec.end)
                })?;
                Ok((cache_key(email), window))
            })
            .collect()
    }
}

/// Scenario-pinned windows in front of an optional persistent cache.
pub struct ScenarioCache {
    pinned: HashMap<String, WorkingHoursWindow>,
    persistent: Option<SqliteCache>,
}

impl ScenarioCache {
    pub fn new(
        scenario: &Scenario,
        persist: bool,
        config: &Config,
    ) -> Result<Self, Box<dyn std::error::Error>> {
        let persistent = if persist {
            match SqliteCache::open_default(config.working_hours.cache_ttl()) {
                Ok(cache) => Some(cache),
                Err(e) => {
                    warn!(error = %e, "working_hours_cache_unavailable");
                    None
                }
            }
        } else {
            None
        };
        Ok(Self {
            pinned: scenario.pinned()?,
            persistent,
        })
    }
}

impl WorkingHoursCache for ScenarioCache {
    fn get(&self, key: &str, now: DateTime<Utc>) -> Result<Option<WorkingHoursWindow>, CacheError> {
        if let Some(window) = self.pinned.get(key) {
            return Ok(Some(*window));
        }
        match &self.persistent {
            Some(cache) => cache.get(key, now),
            None => Ok(None),
        }
    }

    fn put(&self, key: &str, window: WorkingHoursWindow, now: DateTime<Utc>) -> Result<(), CacheError> {
        match &self.persistent {
            Some(cache) if !self.pinned.contains_key(key) => cache.put(key, window, now),
            _ => Ok(()),
        }
    }
}

/// Everything a command needs after reading a scenario.
pub struct Loaded {
    pub scenario: Scenario,
    pub config: Config,
    pub cache: ScenarioCache,
}

impl Loaded {
    pub fn open(args: &ScenarioArgs) -> Result<Self, Box<dyn std::error::Error>> {
        let scenario = Scenario::load(&args.scenario)?;
        let config = Config::load_or_default();
        config.validate()?;
        let cache = ScenarioCache::new(&scenario, args.cache, &config)?;
        Ok(Self {
            scenario,
            config,
            cache,
        })
    }

    pub fn estimator(&self) -> Result<WorkingHoursEstimator<'_>, Box<dyn std::error::Error>> {
        Ok(WorkingHoursEstimator::new(self.config.working_hours.policy()?).with_cache(&self.cache))
    }

    pub fn inputs(&self) -> Result<Inputs, Box<dyn std::error::Error>> {
        let source = self.scenario.source();
        let estimator = self.estimator()?;
        let inputs = assemble_week(
            &source,
            &source,
            &estimator,
            &self.scenario.my_email,
            self.scenario.week_start,
            self.scenario.now(),
        )?;
        Ok(inputs)
    }
}

/// `Mon 2024-01-15 09:30-10:00` style label for a span.
pub fn describe(span: &caldefrag_core::TimeSpan) -> String {
    format!(
        "{} {}-{}",
        span.start.format("%a %Y-%m-%d"),
        span.start.format("%H:%M"),
        span.end.format("%H:%M")
    )
}
