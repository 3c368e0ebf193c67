//! TTL cache for working-hours estimates.
//!
//! Estimating a window scans months of history, so results are cached per
//! person. Entries carry their write time and TTL; anything older reads as
//! a miss. Keys embed a schema version so a change to the estimator
//! invalidates old entries without a migration.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Mutex;

use chrono::{DateTime, Duration, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};

use crate::error::CacheError;
use crate::working_hours::WorkingHoursWindow;

/// Bump when the estimator's output for the same history would change.
pub const CACHE_SCHEMA_VERSION: u32 = 2;

/// Default lifetime of a cached estimate.
pub fn default_ttl() -> Duration {
    Duration::days(30)
}

/// Cache key for a person's working hours.
pub fn cache_key(email: &str) -> String {
    format!(
        "working_hours:v{}:{}",
        CACHE_SCHEMA_VERSION,
        email.to_ascii_lowercase()
    )
}

/// Get/put contract for cached working-hours windows.
pub trait WorkingHoursCache {
    /// Fresh entry for `key` as of `now`, `None` when absent or stale.
    fn get(&self, key: &str, now: DateTime<Utc>) -> Result<Option<WorkingHoursWindow>, CacheError>;

    /// Store `window` as written at `now`.
    fn put(&self, key: &str, window: WorkingHoursWindow, now: DateTime<Utc>) -> Result<(), CacheError>;
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct CacheEntry {
    window: WorkingHoursWindow,
    timestamp: i64, // Unix timestamp in milliseconds
    ttl: i64,       // Time to live in milliseconds
}

impl CacheEntry {
    fn new(window: WorkingHoursWindow, now: DateTime<Utc>, ttl: Duration) -> Self {
        Self {
            window,
            timestamp: now.timestamp_millis(),
            ttl: ttl.num_milliseconds(),
        }
    }

    fn is_stale(&self, now: DateTime<Utc>) -> bool {
        now.timestamp_millis() - self.timestamp > self.ttl
    }
}

/// Process-local cache.
pub struct MemoryCache {
    ttl: Duration,
    entries: Mutex<HashMap<String, CacheEntry>>,
}

impl MemoryCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: Mutex::new(HashMap::new()),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.lock().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for MemoryCache {
    fn default() -> Self {
        Self::new(default_ttl())
    }
}

impl WorkingHoursCache for MemoryCache {
    fn get(&self, key: &str, now: DateTime<Utc>) -> Result<Option<WorkingHoursWindow>, CacheError> {
        let entries = self.entries.lock().map_err(|_| CacheError::Poisoned)?;
        Ok(entries
            .get(key)
            .filter(|entry| !entry.is_stale(now))
            .map(|entry| entry.window))
    }

    fn put(&self, key: &str, window: WorkingHoursWindow, now: DateTime<Utc>) -> Result<(), CacheError> {
        let mut entries = self.entries.lock().map_err(|_| CacheError::Poisoned)?;
        entries.insert(key.to_string(), CacheEntry::new(window, now, self.ttl));
        Ok(())
    }
}

/// SQLite key-value backed cache that survives across runs.
pub struct SqliteCache {
    conn: Connection,
    ttl: Duration,
}

impl SqliteCache {
    /// Open (or create) the cache database at `path`.
    ///
    /// # Errors
    /// Returns an error if the database cannot be opened or migrated.
    pub fn open(path: &Path, ttl: Duration) -> Result<Self, CacheError> {
        let conn = Connection::open(path)?;
        let cache = Self { conn, ttl };
        cache.migrate()?;
        Ok(cache)
    }

    /// Open the cache at `~/.config/caldefrag/cache.db`.
    ///
    /// # Errors
    /// Returns an error if the data directory or database is unavailable.
    pub fn open_default(ttl: Duration) -> Result<Self, CacheError> {
        let dir = crate::config::data_dir().map_err(|e| CacheError::Backend(e.to_string()))?;
        Self::open(&dir.join("cache.db"), ttl)
    }

    /// Open an in-memory database.
    pub fn open_in_memory(ttl: Duration) -> Result<Self, CacheError> {
        let conn = Connection::open_in_memory()?;
        let cache = Self { conn, ttl };
        cache.migrate()?;
        Ok(cache)
    }

    fn migrate(&self) -> Result<(), CacheError> {
        self.conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS kv (
                key   TEXT PRIMARY KEY,
                value TEXT NOT NULL
            );",
        )?;
        Ok(())
    }

    /// Delete every cached entry whose key starts with `prefix`.
    pub fn clear_prefix(&self, prefix: &str) -> Result<usize, CacheError> {
        let pattern = format!("{prefix}%");
        Ok(self
            .conn
            .execute("DELETE FROM kv WHERE key LIKE ?1", [&pattern])?)
    }
}

impl WorkingHoursCache for SqliteCache {
    fn get(&self, key: &str, now: DateTime<Utc>) -> Result<Option<WorkingHoursWindow>, CacheError> {
        let raw: Option<String> = self
            .conn
            .query_row("SELECT value FROM kv WHERE key = ?1", [key], |row| row.get(0))
            .optional()?;
        let Some(raw) = raw else {
            return Ok(None);
        };
        let entry: CacheEntry = serde_json::from_str(&raw).map_err(|e| CacheError::Corrupt {
            key: key.to_string(),
            message: e.to_string(),
        })?;
        Ok((!entry.is_stale(now)).then_some(entry.window))
    }

    fn put(&self, key: &str, window: WorkingHoursWindow, now: DateTime<Utc>) -> Result<(), CacheError> {
        let entry = CacheEntry::new(window, now, self.ttl);
        let value = serde_json::to_string(&entry).map_err(|e| CacheError::Backend(e.to_string()))?;
        self.conn.execute(
            "INSERT INTO kv (key, value) VALUES (?1, ?2)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value",
            params![key, value],
        )?;
        Ok(())
    }
}
