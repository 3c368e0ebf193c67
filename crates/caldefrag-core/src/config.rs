//! TOML-based configuration.
//!
//! Holds the tuning knobs of the optimizer:
//! - Annealing schedule and seeds
//! - Cost-model weights
//! - Working-hours estimation policy and cache lifetime
//!
//! Configuration is stored at `~/.config/caldefrag/config.toml`
//! (`~/.config/caldefrag-dev/` when `CALDEFRAG_ENV=dev`).

use std::path::{Path, PathBuf};

use chrono::Duration;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::cost::CostWeights;
use crate::error::ConfigError;
use crate::solver::AnnealingConfig;
use crate::working_hours::{WorkingHoursPolicy, WorkingHoursWindow};

/// Directory holding the config file and the working-hours cache.
///
/// # Errors
/// Returns an error if the directory cannot be created.
pub fn data_dir() -> Result<PathBuf, ConfigError> {
    let base_dir = dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".config");

    let env = std::env::var("CALDEFRAG_ENV").unwrap_or_else(|_| "production".to_string());

    let dir = if env == "dev" {
        base_dir.join("caldefrag-dev")
    } else {
        base_dir.join("caldefrag")
    };

    std::fs::create_dir_all(&dir)
        .map_err(|e| ConfigError::DirectoryUnavailable(format!("{}: {e}", dir.display())))?;
    Ok(dir)
}

/// Working-hours estimation settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkingHoursSettings {
    #[serde(default = "default_start_percentile")]
    pub start_percentile: f64,
    #[serde(default = "default_end_percentile")]
    pub end_percentile: f64,
    #[serde(default = "default_lookback_days")]
    pub lookback_days: i64,
    /// Fallback window start, `HH:MM`.
    #[serde(default = "default_start")]
    pub default_start: String,
    #[serde(default = "default_end")]
    pub default_end: String,
    #[serde(default = "default_cache_ttl_days")]
    pub cache_ttl_days: i64,
    #[serde(default = "default_true")]
    pub require_accepted: bool,
    #[serde(default = "default_true")]
    pub require_shared_domain: bool,
}

fn default_start_percentile() -> f64 {
    0.05
}
fn default_end_percentile() -> f64 {
    0.90
}
fn default_lookback_days() -> i64 {
    90
}
fn default_start() -> String {
    "09:00".into()
}
fn default_end() -> String {
    "17:00".into()
}
fn default_cache_ttl_days() -> i64 {
    30
}
fn default_true() -> bool {
    true
}

impl Default for WorkingHoursSettings {
    fn default() -> Self {
        Self {
            start_percentile: default_start_percentile(),
            end_percentile: default_end_percentile(),
            lookback_days: default_lookback_days(),
            default_start: default_start(),
            default_end: default_end(),
            cache_ttl_days: default_cache_ttl_days(),
            require_accepted: true,
            require_shared_domain: true,
        }
    }
}

impl WorkingHoursSettings {
    /// The fallback window these settings describe.
    ///
    /// # Errors
    /// Returns an error if the bounds are not valid `HH:MM` times or the
    /// window is empty.
    pub fn default_window(&self) -> Result<WorkingHoursWindow, ConfigError> {
        WorkingHoursWindow::parse(&self.default_start, &self.default_end).ok_or_else(|| {
            ConfigError::InvalidValue {
                key: "working_hours.default_start".into(),
                message: format!(
                    "'{}'-'{}' is not a valid HH:MM window",
                    self.default_start, self.default_end
                ),
            }
        })
    }

    /// # Errors
    /// Returns an error if the fallback window is invalid.
    pub fn policy(&self) -> Result<WorkingHoursPolicy, ConfigError> {
        Ok(WorkingHoursPolicy {
            start_percentile: self.start_percentile,
            end_percentile: self.end_percentile,
            require_accepted: self.require_accepted,
            require_shared_domain: self.require_shared_domain,
            lookback_days: self.lookback_days,
            default_window: self.default_window()?,
        })
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::days(self.cache_ttl_days)
    }
}

/// Application configuration.
///
/// Serialized to/from TOML at `~/.config/caldefrag/config.toml`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub annealing: AnnealingConfig,
    #[serde(default)]
    pub cost: CostWeights,
    #[serde(default)]
    pub working_hours: WorkingHoursSettings,
}

impl Config {
    fn get_json_value_by_path<'a>(
        root: &'a serde_json::Value,
        key: &str,
    ) -> Option<&'a serde_json::Value> {
        if key.is_empty() {
            return None;
        }

        let mut current = root;
        for part in key.split('.') {
            current = current.get(part)?;
        }
        Some(current)
    }

    fn set_json_value_by_path(
        root: &mut serde_json::Value,
        key: &str,
        value: &str,
    ) -> Result<(), ConfigError> {
        let invalid = |message: String| ConfigError::InvalidValue {
            key: key.to_string(),
            message,
        };
        let (parent, leaf) = match key.rsplit_once('.') {
            Some((parent, leaf)) => (Some(parent), leaf),
            None => (None, key),
        };
        if leaf.is_empty() {
            return Err(ConfigError::UnknownKey(key.to_string()));
        }

        let mut current = root;
        for part in parent.into_iter().flat_map(|p| p.split('.')) {
            current = current
                .get_mut(part)
                .ok_or_else(|| ConfigError::UnknownKey(key.to_string()))?;
        }
        let obj = current
            .as_object_mut()
            .ok_or_else(|| ConfigError::UnknownKey(key.to_string()))?;
        let existing = obj
            .get(leaf)
            .ok_or_else(|| ConfigError::UnknownKey(key.to_string()))?;

        let new_value = match existing {
            serde_json::Value::Bool(_) => serde_json::Value::Bool(
                value
                    .parse::<bool>()
                    .map_err(|e| invalid(e.to_string()))?,
            ),
            serde_json::Value::Number(_) => {
                if let Ok(n) = value.parse::<i64>() {
                    serde_json::Value::Number(n.into())
                } else if let Ok(n) = value.parse::<f64>() {
                    serde_json::Number::from_f64(n)
                        .map(serde_json::Value::Number)
                        .ok_or_else(|| invalid(format!("cannot parse '{value}' as number")))?
                } else {
                    return Err(invalid(format!("cannot parse '{value}' as number")));
                }
            }
            serde_json::Value::Object(_) | serde_json::Value::Array(_) => {
                serde_json::from_str(value).map_err(|e| invalid(e.to_string()))?
            }
            // Unset optional value: take it as JSON, else as a string.
            serde_json::Value::Null => serde_json::from_str(value)
                .unwrap_or_else(|_| serde_json::Value::String(value.into())),
            _ => serde_json::Value::String(value.into()),
        };

        obj.insert(leaf.to_string(), new_value);
        Ok(())
    }

    /// Path of the config file.
    ///
    /// # Errors
    /// Returns an error if the data directory is unavailable.
    pub fn path() -> Result<PathBuf, ConfigError> {
        Ok(data_dir()?.join("config.toml"))
    }

    /// Load from disk, writing the defaults if no file exists yet.
    ///
    /// # Errors
    /// Returns an error if the file exists but cannot be parsed, or if the
    /// default config cannot be written.
    pub fn load() -> Result<Self, ConfigError> {
        let path = Self::path()?;
        if path.exists() {
            Self::load_from(&path)
        } else {
            let cfg = Self::default();
            cfg.save_to(&path)?;
            Ok(cfg)
        }
    }

    /// # Errors
    /// Returns an error if the file cannot be read or parsed.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let load_failed = |message: String| ConfigError::LoadFailed {
            path: path.to_path_buf(),
            message,
        };
        let content = std::fs::read_to_string(path).map_err(|e| load_failed(e.to_string()))?;
        let cfg: Config = toml::from_str(&content).map_err(|e| load_failed(e.to_string()))?;
        debug!(path = %path.display(), "config_loaded");
        Ok(cfg)
    }

    /// Persist to the default location.
    ///
    /// # Errors
    /// Returns an error if the config cannot be serialized or written.
    pub fn save(&self) -> Result<(), ConfigError> {
        self.save_to(&Self::path()?)
    }

    /// # Errors
    /// Returns an error if the config cannot be serialized or written.
    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        let save_failed = |message: String| ConfigError::SaveFailed {
            path: path.to_path_buf(),
            message,
        };
        let content = toml::to_string_pretty(self).map_err(|e| save_failed(e.to_string()))?;
        std::fs::write(path, content).map_err(|e| save_failed(e.to_string()))?;
        Ok(())
    }

    /// Load from disk, returning the defaults on any error.
    pub fn load_or_default() -> Self {
        Self::load().unwrap_or_default()
    }

    /// Overwrite the stored config with the defaults.
    ///
    /// # Errors
    /// Returns an error if the defaults cannot be written.
    pub fn reset() -> Result<Self, ConfigError> {
        let cfg = Self::default();
        cfg.save()?;
        Ok(cfg)
    }

    /// Get a config value as string by dot-separated key.
    pub fn get(&self, key: &str) -> Option<String> {
        let json = serde_json::to_value(self).ok()?;
        let val = Self::get_json_value_by_path(&json, key)?;
        match val {
            serde_json::Value::String(s) => Some(s.clone()),
            other => Some(other.to_string()),
        }
    }

    /// Set a value by dot-separated key without persisting it.
    ///
    /// The value is parsed according to the type of the current value and
    /// the resulting config is validated.
    ///
    /// # Errors
    /// Returns an error if the key is unknown or the value is invalid.
    pub fn set_value(&mut self, key: &str, value: &str) -> Result<(), ConfigError> {
        let invalid = |message: String| ConfigError::InvalidValue {
            key: key.to_string(),
            message,
        };
        let mut json = serde_json::to_value(&*self).map_err(|e| invalid(e.to_string()))?;
        Self::set_json_value_by_path(&mut json, key, value)?;
        let updated: Config = serde_json::from_value(json).map_err(|e| invalid(e.to_string()))?;
        updated.validate()?;
        *self = updated;
        Ok(())
    }

    /// Set a value and persist the config.
    ///
    /// # Errors
    /// Returns an error if the key is unknown, the value is invalid, or the
    /// config cannot be saved.
    pub fn set(&mut self, key: &str, value: &str) -> Result<(), ConfigError> {
        self.set_value(key, value)?;
        self.save()
    }

    /// Check value ranges the type system cannot express.
    ///
    /// # Errors
    /// Returns the first out-of-range value.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |key: &str, message: &str| {
            Err(ConfigError::InvalidValue {
                key: key.to_string(),
                message: message.to_string(),
            })
        };
        let a = &self.annealing;
        if !(a.cooling_rate > 0.0 && a.cooling_rate <= 1.0) {
            return invalid("annealing.cooling_rate", "must be in (0, 1]");
        }
        if a.initial_temp <= 0.0 {
            return invalid("annealing.initial_temp", "must be positive");
        }
        let wh = &self.working_hours;
        for (key, p) in [
            ("working_hours.start_percentile", wh.start_percentile),
            ("working_hours.end_percentile", wh.end_percentile),
        ] {
            if !(0.0..=1.0).contains(&p) {
                return invalid(key, "must be between 0 and 1");
            }
        }
        if wh.lookback_days <= 0 {
            return invalid("working_hours.lookback_days", "must be positive");
        }
        if wh.cache_ttl_days < 0 {
            return invalid("working_hours.cache_ttl_days", "must not be negative");
        }
        wh.default_window()?;
        if self.cost.stretch_merge_gap_minutes < 0 {
            return invalid("cost.stretch_merge_gap_minutes", "must not be negative");
        }
        Ok(())
    }
}
