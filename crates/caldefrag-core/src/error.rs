//! Core error types for caldefrag-core.
//!
//! The optimization core never fails: infeasibility is reported as data.
//! These errors only surface at the edges (input validation, configuration,
//! cache backends and event sources).

use std::path::PathBuf;
use thiserror::Error;

/// Core error type for caldefrag-core.
#[derive(Error, Debug)]
pub enum CoreError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Validation errors
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    /// Working-hours cache errors
    #[error("Cache error: {0}")]
    Cache(#[from] CacheError),

    /// Event source errors
    #[error("Event source error: {0}")]
    Source(#[from] SourceError),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Configuration-specific errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Failed to load configuration
    #[error("Failed to load configuration from {path}: {message}")]
    LoadFailed { path: PathBuf, message: String },

    /// Failed to save configuration
    #[error("Failed to save configuration to {path}: {message}")]
    SaveFailed { path: PathBuf, message: String },

    /// Invalid configuration value
    #[error("Invalid configuration value for '{key}': {message}")]
    InvalidValue { key: String, message: String },

    /// Unknown configuration key
    #[error("Unknown configuration key: {0}")]
    UnknownKey(String),

    /// Home/config directory could not be prepared
    #[error("Configuration directory unavailable: {0}")]
    DirectoryUnavailable(String),
}

/// Violations of the invariants an [`Inputs`](crate::inputs::Inputs) bundle must satisfy.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// A movable id has no matching event in the owner's calendar
    #[error("Movable event '{0}' is not present in my events")]
    UnknownMovableEvent(String),

    /// A movable event is not a two-party meeting
    #[error("Movable event '{event_id}' must have exactly one other attendee (found {found})")]
    NotOneOnOne { event_id: String, found: usize },

    /// A movable event has no concrete start/end time
    #[error("Movable event '{0}' has no concrete start and end time")]
    MissingTimes(String),

    /// Working-hours window is empty or out of range
    #[error("Invalid working hours for '{owner}': {start_seconds}..{end_seconds}")]
    InvalidWorkingHours {
        owner: String,
        start_seconds: u32,
        end_seconds: u32,
    },

    /// Duplicate event id in the owner's calendar
    #[error("Duplicate event id '{0}'")]
    DuplicateEventId(String),
}

/// Working-hours cache errors.
#[derive(Error, Debug)]
pub enum CacheError {
    /// Backend query failed
    #[error("Cache backend failed: {0}")]
    Backend(String),

    /// Stored entry could not be decoded
    #[error("Corrupt cache entry for '{key}': {message}")]
    Corrupt { key: String, message: String },

    /// Cache lock poisoned
    #[error("Cache lock poisoned")]
    Poisoned,
}

impl From<rusqlite::Error> for CacheError {
    fn from(err: rusqlite::Error) -> Self {
        CacheError::Backend(err.to_string())
    }
}

/// Errors reported by an event-source collaborator.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SourceError {
    /// The calendar does not exist or is not visible
    #[error("Calendar '{0}' not found")]
    CalendarNotFound(String),

    /// Recurring parent event not found
    #[error("Recurring event '{0}' not found")]
    RecurringEventNotFound(String),

    /// Provider-side failure
    #[error("Provider error: {0}")]
    Provider(String),
}

/// Result type alias for CoreError
pub type Result<T, E = CoreError> = std::result::Result<T, E>;
