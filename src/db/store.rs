//! SQLite database store implementation.

use chrono::{DateTime, NaiveDateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Result as SqlResult};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use thiserror::Error;

use super::models::*;

/// How long a writer waits on another process holding the database lock.
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

const DB_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.9f";

/// Database error types.
#[derive(Error, Debug)]
pub enum DbError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("Migration error: {0}")]
    Migration(String),
    #[error("connection lock poisoned")]
    Poisoned,
    #[error("corrupt value for key {key}: {detail}")]
    Corrupt { key: String, detail: String },
}

/// Thread-safe database store.
///
/// Several `Store` handles (in one process or many) may point at the same
/// file; SQLite's write lock serializes their mutations.
#[derive(Clone)]
pub struct Store {
    conn: Arc<Mutex<Connection>>,
}

impl Store {
    /// Create a new store with the given database path.
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self, DbError> {
        let conn = Connection::open(path)?;
        conn.busy_timeout(BUSY_TIMEOUT)?;
        let store = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        store.init()?;
        Ok(store)
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>, DbError> {
        self.conn.lock().map_err(|_| DbError::Poisoned)
    }

    /// Initialize the database with migrations.
    fn init(&self) -> Result<(), DbError> {
        let conn = self.lock()?;
        conn.execute_batch(include_str!("../../migrations/000001_init.up.sql"))
            .map_err(|e| DbError::Migration(format!("Migration 1 failed: {}", e)))?;
        Ok(())
    }

    /// Cheap liveness check used by providers before fanning out.
    pub fn ping(&self) -> Result<(), DbError> {
        let conn = self.lock()?;
        conn.query_row("SELECT 1", [], |r| r.get::<_, i64>(0))?;
        Ok(())
    }

    // --- Shared key-value area ---

    /// Read an integer value and its last update time.
    pub fn get_kv(&self, key: &str) -> Result<Option<KvEntry>, DbError> {
        let conn = self.lock()?;
        let row: Option<(i64, String)> = conn
            .query_row(
                "SELECT value, updated_at FROM kv_store WHERE key = ?1",
                params![key],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?;

        row.map(|(value, updated_at)| kv_entry(key, value, &updated_at))
            .transpose()
    }

    /// Overwrite an integer value.
    pub fn set_kv(&self, key: &str, value: i64) -> Result<KvEntry, DbError> {
        let now = Utc::now();
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO kv_store (key, value, updated_at) VALUES (?1, ?2, ?3)
             ON CONFLICT(key) DO UPDATE SET value=excluded.value, updated_at=excluded.updated_at",
            params![key, value, format_db_time(now)],
        )?;
        Ok(KvEntry {
            value,
            updated_at: now,
        })
    }

    /// Atomically add `delta` to a value (missing keys start at 0) and
    /// return the new value.
    ///
    /// This is a single UPSERT statement, so it holds the SQLite write lock
    /// for its whole read-modify-write and no concurrent add is lost.
    pub fn add_kv(&self, key: &str, delta: i64) -> Result<KvEntry, DbError> {
        let now = Utc::now();
        let conn = self.lock()?;
        let value: i64 = conn.query_row(
            "INSERT INTO kv_store (key, value, updated_at) VALUES (?1, ?2, ?3)
             ON CONFLICT(key) DO UPDATE SET
             value=kv_store.value + excluded.value, updated_at=excluded.updated_at
             RETURNING value",
            params![key, delta, format_db_time(now)],
            |row| row.get(0),
        )?;
        Ok(KvEntry {
            value,
            updated_at: now,
        })
    }

    // --- Nutrient samples ---

    /// Add nutrient samples in batch.
    pub fn add_nutrient_samples(&self, samples: &[NutrientHistoryEntry]) -> Result<(), DbError> {
        if samples.is_empty() {
            return Ok(());
        }

        let conn = self.lock()?;
        let tx = conn.unchecked_transaction()?;

        {
            let mut stmt = tx.prepare(
                "INSERT INTO nutrient_samples (time, nutrient, amount, unit) VALUES (?1, ?2, ?3, ?4)",
            )?;

            for s in samples {
                stmt.execute(params![format_db_time(s.time), s.nutrient, s.amount, s.unit])?;
            }
        }

        tx.commit()?;
        Ok(())
    }

    /// Sum a nutrient's samples within `[start, end]`.
    ///
    /// Returns `None` when there are no samples in the range.
    pub fn sum_nutrient(
        &self,
        nutrient: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Option<f64>, DbError> {
        let conn = self.lock()?;
        let total: Option<f64> = conn.query_row(
            "SELECT SUM(amount) FROM nutrient_samples
             WHERE nutrient = ?1 AND time >= ?2 AND time <= ?3",
            params![nutrient, format_db_time(start), format_db_time(end)],
            |row| row.get(0),
        )?;
        Ok(total)
    }

    /// Get all samples within `[start, end]` in chronological order.
    pub fn get_nutrient_history(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<NutrientHistoryEntry>, DbError> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT time, nutrient, amount, unit FROM nutrient_samples
             WHERE time >= ?1 AND time <= ?2 ORDER BY time ASC",
        )?;

        let rows = stmt
            .query_map(params![format_db_time(start), format_db_time(end)], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, f64>(2)?,
                    row.get::<_, String>(3)?,
                ))
            })?
            .collect::<SqlResult<Vec<_>>>()?;

        let mut entries = Vec::with_capacity(rows.len());
        for (time_str, nutrient, amount, unit) in rows {
            match parse_db_time(&time_str) {
                Some(time) => entries.push(NutrientHistoryEntry {
                    time,
                    nutrient,
                    amount,
                    unit,
                }),
                None => tracing::warn!("Skipping sample with unparseable time {:?}", time_str),
            }
        }

        Ok(entries)
    }
}

fn kv_entry(key: &str, value: i64, updated_at: &str) -> Result<KvEntry, DbError> {
    let updated_at = parse_db_time(updated_at).ok_or_else(|| DbError::Corrupt {
        key: key.to_string(),
        detail: format!("bad timestamp {:?}", updated_at),
    })?;
    Ok(KvEntry { value, updated_at })
}

fn format_db_time(t: DateTime<Utc>) -> String {
    t.format(DB_TIME_FORMAT).to_string()
}

/// Parse a datetime string from the database.
fn parse_db_time(s: &str) -> Option<DateTime<Utc>> {
    let formats = [
        DB_TIME_FORMAT,
        "%Y-%m-%d %H:%M:%S%.f",
        "%Y-%m-%d %H:%M:%S",
    ];

    for fmt in &formats {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(DateTime::from_naive_utc_and_offset(dt, Utc));
        }
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }

    None
}
